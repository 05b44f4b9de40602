//! User repository

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::errors::StoreResult;
use crate::models::User;

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, is_admin, created_at";

/// Profile fields Telegram gives us on every message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile<'a> {
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
}

/// Insert the user or refresh their profile fields, returning the stored row
pub async fn register_user(pool: &SqlitePool, telegram_id: i64, profile: &UserProfile<'_>) -> StoreResult<User> {
    debug!(telegram_id, "Registering user");

    sqlx::query(
        "INSERT INTO users (telegram_id, username, first_name, last_name) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(telegram_id) DO UPDATE SET
             username = excluded.username,
             first_name = excluded.first_name,
             last_name = excluded.last_name",
    )
    .bind(telegram_id)
    .bind(profile.username)
    .bind(profile.first_name)
    .bind(profile.last_name)
    .execute(pool)
    .await?;

    let user = get_user_by_telegram_id(pool, telegram_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(user)
}

/// Return the user for `telegram_id`, inserting a bare row if none exists
pub async fn get_or_create_user(pool: &SqlitePool, telegram_id: i64) -> StoreResult<User> {
    if let Some(user) = get_user_by_telegram_id(pool, telegram_id).await? {
        return Ok(user);
    }

    sqlx::query("INSERT OR IGNORE INTO users (telegram_id) VALUES (?1)")
        .bind(telegram_id)
        .execute(pool)
        .await?;
    info!(telegram_id, "Created user from storefront order");

    let user = get_user_by_telegram_id(pool, telegram_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(user)
}

pub async fn get_user_by_telegram_id(pool: &SqlitePool, telegram_id: i64) -> StoreResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1"
    ))
    .bind(telegram_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn get_user_by_id(pool: &SqlitePool, user_id: i64) -> StoreResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Most recent users first
pub async fn list_users(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Chat ids of every known user, the broadcast audience
pub async fn list_telegram_ids(pool: &SqlitePool) -> StoreResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT telegram_id FROM users ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(ids)
}

pub async fn count_users(pool: &SqlitePool) -> StoreResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Grant or revoke the admin flag; returns false when the user is unknown
pub async fn set_admin(pool: &SqlitePool, telegram_id: i64, is_admin: bool) -> StoreResult<bool> {
    let result = sqlx::query("UPDATE users SET is_admin = ?1 WHERE telegram_id = ?2")
        .bind(is_admin)
        .bind(telegram_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
