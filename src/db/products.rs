//! Product repository

use sqlx::SqlitePool;
use tracing::info;

use crate::errors::StoreResult;
use crate::models::{NewProduct, Product};

const PRODUCT_COLUMNS: &str =
    "id, category_id, name, description, price, image_ref, stock, is_active, created_at";

/// Stock given to products created from the admin dialogue
pub const DEFAULT_STOCK: i64 = 100;

/// Create a new product and return its id
pub async fn create_product(pool: &SqlitePool, product: &NewProduct) -> StoreResult<i64> {
    let result = sqlx::query(
        "INSERT INTO products (category_id, name, description, price, image_ref, stock)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(product.category_id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(&product.image_ref)
    .bind(product.stock)
    .execute(pool)
    .await?;

    let product_id = result.last_insert_rowid();
    info!(product_id, name = %product.name, price = product.price, "Product created");
    Ok(product_id)
}

pub async fn read_product(pool: &SqlitePool, product_id: i64) -> StoreResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(product)
}

/// Active products, newest first, optionally limited to one category
pub async fn list_active_products(pool: &SqlitePool, category_id: Option<i64>) -> StoreResult<Vec<Product>> {
    let products = match category_id {
        Some(category_id) => {
            sqlx::query_as::<_, Product>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products
                 WHERE category_id = ?1 AND is_active = 1
                 ORDER BY created_at DESC, id DESC"
            ))
            .bind(category_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Product>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products
                 WHERE is_active = 1
                 ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(pool)
            .await?
        }
    };

    Ok(products)
}

/// Every product including hidden ones, for the admin list
pub async fn list_products(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(products)
}

/// Show or hide a product in the storefront
pub async fn set_product_active(pool: &SqlitePool, product_id: i64, is_active: bool) -> StoreResult<bool> {
    let result = sqlx::query("UPDATE products SET is_active = ?1 WHERE id = ?2")
        .bind(is_active)
        .bind(product_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_product(pool: &SqlitePool, product_id: i64) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?1")
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!(product_id, "Product deleted");
        Ok(true)
    } else {
        Ok(false)
    }
}

pub async fn count_active_products(pool: &SqlitePool) -> StoreResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE is_active = 1")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, seed_default_categories};

    fn sample(category_id: i64, name: &str) -> NewProduct {
        NewProduct {
            category_id,
            name: name.to_string(),
            description: "desc".to_string(),
            price: 450,
            image_ref: None,
            stock: DEFAULT_STOCK,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_product() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        seed_default_categories(&pool).await?;

        let product_id = create_product(&pool, &sample(1, "Husky Double Ice")).await?;
        let product = read_product(&pool, product_id).await?.unwrap();

        assert_eq!(product.name, "Husky Double Ice");
        assert_eq!(product.category_id, Some(1));
        assert_eq!(product.price, 450);
        assert_eq!(product.stock, DEFAULT_STOCK);
        assert!(product.is_active);
        Ok(())
    }

    #[tokio::test]
    async fn test_hidden_products_leave_storefront() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        seed_default_categories(&pool).await?;

        let liquid = create_product(&pool, &sample(1, "Liquid")).await?;
        create_product(&pool, &sample(2, "Pod")).await?;

        assert_eq!(list_active_products(&pool, None).await?.len(), 2);
        assert_eq!(list_active_products(&pool, Some(2)).await?.len(), 1);

        assert!(set_product_active(&pool, liquid, false).await?);
        assert_eq!(list_active_products(&pool, Some(1)).await?.len(), 0);
        assert_eq!(count_active_products(&pool).await?, 1);
        assert_eq!(list_products(&pool, 20).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_product() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        seed_default_categories(&pool).await?;

        let product_id = create_product(&pool, &sample(3, "Coil")).await?;
        assert!(delete_product(&pool, product_id).await?);
        assert!(!delete_product(&pool, product_id).await?);
        assert!(read_product(&pool, product_id).await?.is_none());
        Ok(())
    }
}
