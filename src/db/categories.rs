//! Category repository

use sqlx::SqlitePool;
use tracing::info;

use crate::errors::StoreResult;
use crate::models::Category;

/// Create a new category and return its id
pub async fn create_category(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
    icon: Option<&str>,
    sort_order: i64,
) -> StoreResult<i64> {
    let result = sqlx::query(
        "INSERT INTO categories (name, description, icon, sort_order) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(name)
    .bind(description)
    .bind(icon)
    .bind(sort_order)
    .execute(pool)
    .await?;

    let category_id = result.last_insert_rowid();
    info!(category_id, name, "Category created");
    Ok(category_id)
}

/// All categories in display order
pub async fn list_categories(pool: &SqlitePool) -> StoreResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, description, icon, sort_order FROM categories ORDER BY sort_order, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(categories)
}

/// Ids of all categories, used to validate the product form
pub async fn list_category_ids(pool: &SqlitePool) -> StoreResult<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM categories ORDER BY sort_order, id")
        .fetch_all(pool)
        .await?;

    Ok(ids)
}
