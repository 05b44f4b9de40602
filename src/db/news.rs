//! News repository

use sqlx::SqlitePool;
use tracing::info;

use crate::errors::StoreResult;
use crate::models::News;

/// How many news the storefront shows
pub const NEWS_FEED_LIMIT: i64 = 20;

pub async fn create_news(
    pool: &SqlitePool,
    title: &str,
    content: &str,
    image_ref: Option<&str>,
) -> StoreResult<i64> {
    let result = sqlx::query("INSERT INTO news (title, content, image_ref) VALUES (?1, ?2, ?3)")
        .bind(title)
        .bind(content)
        .bind(image_ref)
        .execute(pool)
        .await?;

    let news_id = result.last_insert_rowid();
    info!(news_id, title, "News created");
    Ok(news_id)
}

/// Latest news first
pub async fn list_news(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<News>> {
    let news = sqlx::query_as::<_, News>(
        "SELECT id, title, content, image_ref, created_at FROM news
         ORDER BY created_at DESC, id DESC LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(news)
}

pub async fn delete_news(pool: &SqlitePool, news_id: i64) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM news WHERE id = ?1")
        .bind(news_id)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!(news_id, "News deleted");
        Ok(true)
    } else {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_news_lifecycle() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;

        let first = create_news(&pool, "Opening", "We are open", None).await?;
        let second = create_news(&pool, "Restock", "New pods", Some("file-id")).await?;

        let feed = list_news(&pool, NEWS_FEED_LIMIT).await?;
        assert_eq!(feed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(feed[0].image_ref.as_deref(), Some("file-id"));

        assert!(delete_news(&pool, first).await?);
        assert!(!delete_news(&pool, first).await?);
        assert_eq!(list_news(&pool, NEWS_FEED_LIMIT).await?.len(), 1);
        Ok(())
    }
}
