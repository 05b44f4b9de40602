//! # HTTP API Tests
//!
//! Requests go through the full axum router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use shopbot::api::{router, AppState};
use shopbot::config::Config;
use shopbot::db::{self, orders, products, promocodes};
use shopbot::models::NewProduct;
use shopbot::notifier::RecordingNotifier;
use teloxide::types::ChatId;
use tower::ServiceExt;

const OPERATOR: i64 = 900;

async fn setup() -> Result<(AppState, Arc<RecordingNotifier>)> {
    let config = Config::from_lookup(|key| match key {
        "BOT_TOKEN" => Some("test-token".to_string()),
        "ADMIN_IDS" => Some(OPERATOR.to_string()),
        _ => None,
    })?;
    let pool = db::connect_in_memory().await?;
    db::seed_default_categories(&pool).await?;
    let notifier = Arc::new(RecordingNotifier::new());

    let state = AppState {
        pool,
        notifier: notifier.clone(),
        config: Arc::new(config),
    };
    Ok((state, notifier))
}

async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => request.body(Body::empty())?,
    };

    let response = router(state.clone()).oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

fn two_item_order(promocode: Option<&str>) -> Value {
    json!({
        "userId": 4242,
        "items": [
            { "product_id": 1, "name": "Mango", "quantity": 2, "price": 500 },
            { "product_id": 2, "name": "Coil", "quantity": 1, "price": 1000 }
        ],
        "totalAmount": 1800,
        "deliveryAddress": "Main st. 1",
        "contactInfo": "@buyer",
        "comment": "Ring twice",
        "promocode": promocode
    })
}

#[tokio::test]
async fn test_categories_are_ordered() -> Result<()> {
    let (state, _) = setup().await?;

    let (status, body) = call(&state, "GET", "/api/categories", None).await?;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .map(|list| list.iter().filter_map(|c| c["id"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_promocode_is_invalid() -> Result<()> {
    let (state, _) = setup().await?;
    promocodes::create_promocode(&state.pool, "ONCE", 10, Some(1)).await?;
    promocodes::increment_usage(&state.pool, "ONCE").await?;

    let (status, body) = call(&state, "POST", "/api/validate-promocode", Some(json!({ "code": "once" }))).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "valid": false, "error": "exhausted" }));
    Ok(())
}

#[tokio::test]
async fn test_valid_promocode_reports_discount() -> Result<()> {
    let (state, _) = setup().await?;
    promocodes::create_promocode(&state.pool, "SALE10", 10, None).await?;

    let (_, body) = call(&state, "POST", "/api/validate-promocode", Some(json!({ "code": " sale10 " }))).await?;

    assert_eq!(body, json!({ "valid": true, "discount": 10 }));
    Ok(())
}

#[tokio::test]
async fn test_order_with_promocode_uses_it_once() -> Result<()> {
    let (state, notifier) = setup().await?;
    promocodes::create_promocode(&state.pool, "SALE10", 10, Some(5)).await?;

    let (status, body) = call(&state, "POST", "/api/orders", Some(two_item_order(Some("sale10")))).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let order_uuid = body["orderId"].as_str().unwrap_or_default().to_string();
    assert_eq!(order_uuid.len(), 36);

    // Client total is stored as sent, not recomputed
    let history = orders::list_orders_for_telegram_user(&state.pool, 4242).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].order.order_uuid, order_uuid);
    assert_eq!(history[0].order.total_amount, 1800);
    assert_eq!(history[0].order.promocode.as_deref(), Some("SALE10"));
    assert_eq!(history[0].items.len(), 2);

    let stored = promocodes::list_promocodes(&state.pool).await?;
    assert_eq!(stored[0].uses_count, 1);

    assert_eq!(notifier.sent_to(ChatId(OPERATOR)).await.len(), 1);
    assert_eq!(notifier.sent_to(ChatId(4242)).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_order_with_exhausted_promocode_is_refused() -> Result<()> {
    let (state, notifier) = setup().await?;
    promocodes::create_promocode(&state.pool, "ONCE", 10, Some(1)).await?;
    promocodes::increment_usage(&state.pool, "ONCE").await?;

    let (status, body) = call(&state, "POST", "/api/orders", Some(two_item_order(Some("ONCE")))).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(orders::count_orders(&state.pool).await?, 0);
    assert!(notifier.sent().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_order_without_items_is_refused() -> Result<()> {
    let (state, _) = setup().await?;

    let body = json!({ "userId": 4242, "items": [], "totalAmount": 0 });
    let (status, body) = call(&state, "POST", "/api/orders", Some(body)).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(orders::count_orders(&state.pool).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_orders_of_unknown_user_are_empty() -> Result<()> {
    let (state, _) = setup().await?;

    let (status, body) = call(&state, "GET", "/api/orders?user_id=31337", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    Ok(())
}

#[tokio::test]
async fn test_news_feed_is_newest_first() -> Result<()> {
    let (state, _) = setup().await?;
    db::news::create_news(&state.pool, "First", "a", None).await?;
    db::news::create_news(&state.pool, "Second", "b", None).await?;

    let (_, body) = call(&state, "GET", "/api/news", None).await?;

    assert_eq!(body[0]["title"], json!("Second"));
    assert_eq!(body[1]["title"], json!("First"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_order_body_gets_json_error() -> Result<()> {
    let (state, notifier) = setup().await?;

    let (status, body) = call(&state, "POST", "/api/orders", Some(json!({ "items": [] }))).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().is_some_and(|error| error.contains("userId")));
    assert!(notifier.sent().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_promocode_check_without_json_gets_json_error() -> Result<()> {
    let (state, _) = setup().await?;

    let request = Request::builder()
        .method("POST")
        .uri("/api/validate-promocode")
        .body(Body::from("code=SALE10"))?;
    let response = router(state.clone()).oneshot(request).await?;
    let status = response.status();
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await?)?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    Ok(())
}

#[tokio::test]
async fn test_product_lookup() -> Result<()> {
    let (state, _) = setup().await?;
    let product = NewProduct {
        category_id: 1,
        name: "Mango Ice".to_string(),
        description: "Cold".to_string(),
        price: 650,
        image_ref: None,
        stock: 100,
    };
    let product_id = products::create_product(&state.pool, &product).await?;

    let (status, body) = call(&state, "GET", &format!("/api/products/{product_id}"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Mango Ice"));

    products::set_product_active(&state.pool, product_id, false).await?;
    let (status, body) = call(&state, "GET", &format!("/api/products/{product_id}"), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));

    let (status, _) = call(&state, "GET", "/api/products/999", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&state, "GET", "/api/products/abc", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    Ok(())
}
