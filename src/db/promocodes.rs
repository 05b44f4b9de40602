//! Promocode repository.
//!
//! Codes are stored normalized (uppercase ASCII letters and digits) so the
//! UNIQUE constraint on `code` catches duplicates regardless of how the
//! operator typed them.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::errors::{StoreError, StoreResult};
use crate::models::Promocode;

const PROMOCODE_COLUMNS: &str = "id, code, discount, uses_count, max_uses, is_active, created_at";

/// Outcome of checking a code typed by a buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromocodeCheck {
    /// Code applies with this discount percent
    Valid { discount: i64 },
    /// Unknown or deactivated code
    NotFound,
    /// Usage ceiling reached
    Exhausted,
}

/// Uppercase and strip everything that is not `A-Z` or `0-9`
pub fn normalize_code(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Insert a promocode; `max_uses = None` means unlimited.
///
/// Fails with [`StoreError::Duplicate`] when the code already exists.
pub async fn create_promocode(
    pool: &SqlitePool,
    code: &str,
    discount: i64,
    max_uses: Option<i64>,
) -> StoreResult<i64> {
    let result = sqlx::query("INSERT INTO promocodes (code, discount, max_uses) VALUES (?1, ?2, ?3)")
        .bind(code)
        .bind(discount)
        .bind(max_uses)
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "code", code))?;

    let promocode_id = result.last_insert_rowid();
    info!(promocode_id, code, discount, ?max_uses, "Promocode created");
    Ok(promocode_id)
}

/// Look up an active promocode by its normalized code
pub async fn find_active_promocode(pool: &SqlitePool, code: &str) -> StoreResult<Option<Promocode>> {
    let promocode = sqlx::query_as::<_, Promocode>(&format!(
        "SELECT {PROMOCODE_COLUMNS} FROM promocodes WHERE code = ?1 AND is_active = 1"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(promocode)
}

pub async fn check_promocode(pool: &SqlitePool, raw_code: &str) -> StoreResult<PromocodeCheck> {
    let code = normalize_code(raw_code);
    if code.is_empty() {
        return Ok(PromocodeCheck::NotFound);
    }

    let check = match find_active_promocode(pool, &code).await? {
        None => PromocodeCheck::NotFound,
        Some(promo) if promo.is_exhausted() => PromocodeCheck::Exhausted,
        Some(promo) => PromocodeCheck::Valid {
            discount: promo.discount,
        },
    };

    Ok(check)
}

/// Count one use of `code`.
///
/// The ceiling is enforced by the UPDATE itself, so `uses_count` can never pass
/// `max_uses`; returns false when nothing was incremented.
pub async fn increment_usage(pool: &SqlitePool, code: &str) -> StoreResult<bool> {
    let result = sqlx::query(
        "UPDATE promocodes SET uses_count = uses_count + 1
         WHERE code = ?1 AND is_active = 1 AND (max_uses IS NULL OR uses_count < max_uses)",
    )
    .bind(code)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        warn!(code, "Promocode usage not incremented");
        return Ok(false);
    }
    Ok(true)
}

/// All promocodes, newest first
pub async fn list_promocodes(pool: &SqlitePool) -> StoreResult<Vec<Promocode>> {
    let promocodes = sqlx::query_as::<_, Promocode>(&format!(
        "SELECT {PROMOCODE_COLUMNS} FROM promocodes ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(promocodes)
}

pub async fn delete_promocode(pool: &SqlitePool, promocode_id: i64) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM promocodes WHERE id = ?1")
        .bind(promocode_id)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!(promocode_id, "Promocode deleted");
        Ok(true)
    } else {
        Ok(false)
    }
}
