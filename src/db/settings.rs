//! Key/value settings repository

use sqlx::SqlitePool;
use tracing::info;

use crate::errors::StoreResult;

/// Channel users must join when the subscription check is on
pub const CHANNEL_ID: &str = "channel_id";
/// `"1"` when the subscription check is enforced, `"0"` otherwise
pub const SUBSCRIPTION_CHECK: &str = "subscription_check";

pub async fn get_setting(pool: &SqlitePool, key: &str) -> StoreResult<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

/// Insert or replace a setting
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    info!(key, value, "Setting updated");
    Ok(())
}

/// Boolean view of a setting; `None` when it was never set
pub async fn get_flag(pool: &SqlitePool, key: &str) -> StoreResult<Option<bool>> {
    Ok(get_setting(pool, key)
        .await?
        .map(|value| matches!(value.as_str(), "1" | "true" | "on")))
}

pub async fn set_flag(pool: &SqlitePool, key: &str, enabled: bool) -> StoreResult<()> {
    set_setting(pool, key, if enabled { "1" } else { "0" }).await
}
