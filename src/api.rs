//! # Storefront HTTP API
//!
//! JSON endpoints used by the web app: catalog, news, promocode checks and
//! order placement. Handlers are stateless; everything lives in [`AppState`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use teloxide::types::ChatId;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::bot::ui_builder::{escape_html, format_order_items, format_price, order_status_keyboard};
use crate::config::Config;
use crate::db::promocodes::{self, PromocodeCheck};
use crate::db::{categories, news, orders, products, users};
use crate::errors::StoreError;
use crate::localization::t_args_lang;
use crate::models::{short_ref, Category, News, NewOrder, NewOrderItem, OrderStatus, OrderWithItems, Product};
use crate::notifier::Notifier;

/// Shared handles of the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<Config>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(err @ StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, err.to_string()),
            ApiError::Store(err) => {
                error!(error = %err, "API request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    pub category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PromocodeRequest {
    #[serde(default)]
    pub code: String,
}

/// Answer of `POST /api/validate-promocode`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PromocodeVerdict {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<PromocodeCheck> for PromocodeVerdict {
    fn from(check: PromocodeCheck) -> Self {
        match check {
            PromocodeCheck::Valid { discount } => PromocodeVerdict {
                valid: true,
                discount: Some(discount),
                error: None,
            },
            PromocodeCheck::NotFound => PromocodeVerdict {
                valid: false,
                discount: None,
                error: Some("not found".to_string()),
            },
            PromocodeCheck::Exhausted => PromocodeVerdict {
                valid: false,
                discount: None,
                error: Some("exhausted".to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: i64,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
    pub total_amount: i64,
    pub delivery_address: Option<String>,
    pub contact_info: Option<String>,
    pub comment: Option<String>,
    pub promocode: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let webapp_dir = state.config.webapp_dir.clone();

    let router = Router::new()
        .route("/health", get(health))
        .route("/api/categories", get(list_categories))
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(show_product))
        .route("/api/news", get(list_news))
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/validate-promocode", post(validate_promocode))
        .layer(cors)
        .with_state(state);

    match webapp_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

/// Bind `0.0.0.0:port` and serve until the task is dropped
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server on {addr}"))?;

    info!(address = %addr, "HTTP API listening");
    axum::serve(listener, router(state)).await.context("HTTP server stopped")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(categories::list_categories(&state.pool).await?))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(products::list_active_products(&state.pool, query.category_id).await?))
}

async fn show_product(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Product>, ApiError> {
    let Path(product_id) = path?;
    let product = products::read_product(&state.pool, product_id)
        .await?
        .filter(|product| product.is_active)
        .ok_or(StoreError::NotFound {
            entity: "product",
            id: product_id,
        })?;
    Ok(Json(product))
}

async fn list_news(State(state): State<AppState>) -> Result<Json<Vec<News>>, ApiError> {
    Ok(Json(news::list_news(&state.pool, news::NEWS_FEED_LIMIT).await?))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<OrderWithItems>>, ApiError> {
    let user_id = query
        .user_id
        .ok_or_else(|| ApiError::BadRequest("user_id is required".to_string()))?;
    Ok(Json(orders::list_orders_for_telegram_user(&state.pool, user_id).await?))
}

async fn validate_promocode(
    State(state): State<AppState>,
    body: Result<Json<PromocodeRequest>, JsonRejection>,
) -> Result<Json<PromocodeVerdict>, ApiError> {
    let Json(request) = body?;
    let check = promocodes::check_promocode(&state.pool, &request.code).await?;
    Ok(Json(check.into()))
}

async fn create_order(
    State(state): State<AppState>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let Json(request) = body?;
    let order_uuid = place_order(&state, request).await?;
    Ok(Json(CreateOrderResponse {
        success: true,
        order_id: order_uuid,
    }))
}

/// Store an order from the web app and tell operators and the buyer.
///
/// The steps are not wrapped in a transaction. `total_amount` is stored as sent.
pub async fn place_order(state: &AppState, request: CreateOrderRequest) -> Result<String, ApiError> {
    if request.items.is_empty() {
        return Err(ApiError::BadRequest("order has no items".to_string()));
    }
    if request.items.iter().any(|item| item.quantity <= 0) {
        return Err(ApiError::BadRequest("item quantity must be positive".to_string()));
    }

    let pool = &state.pool;
    let user = users::get_or_create_user(pool, request.user_id).await?;

    let promocode = match request.promocode.as_deref().map(str::trim).filter(|code| !code.is_empty()) {
        Some(raw) => match promocodes::check_promocode(pool, raw).await? {
            PromocodeCheck::Valid { .. } => Some(promocodes::normalize_code(raw)),
            PromocodeCheck::NotFound => return Err(ApiError::BadRequest("promocode not found".to_string())),
            PromocodeCheck::Exhausted => return Err(ApiError::BadRequest("promocode exhausted".to_string())),
        },
        None => None,
    };

    let new_order = NewOrder {
        user_id: user.id,
        total_amount: request.total_amount,
        delivery_address: request.delivery_address,
        contact_info: request.contact_info,
        comment: request.comment,
        promocode,
    };
    let (order_id, order_uuid) = orders::create_order(pool, &new_order).await?;

    if let Some(code) = &new_order.promocode {
        if !promocodes::increment_usage(pool, code).await? {
            warn!(order_id, code = %code, "Promocode ran out while the order was placed");
        }
    }

    for item in &request.items {
        orders::add_order_item(pool, order_id, item).await?;
    }

    info!(
        order_id,
        user_id = request.user_id,
        items = request.items.len(),
        total = new_order.total_amount,
        "Order placed"
    );

    notify_order(state, order_id, &order_uuid, request.user_id, &new_order, &request.items).await;
    Ok(order_uuid)
}

async fn notify_order(
    state: &AppState,
    order_id: i64,
    order_uuid: &str,
    telegram_id: i64,
    order: &NewOrder,
    items: &[NewOrderItem],
) {
    let order_ref = short_ref(order_uuid);
    let or_dash = |value: &Option<String>| {
        value
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| "—".to_string(), escape_html)
    };

    let alert = t_args_lang(
        "order-new",
        &[
            ("order_ref", order_ref),
            ("telegram_id", &telegram_id.to_string()),
            ("total", &format_price(order.total_amount)),
            ("address", &or_dash(&order.delivery_address)),
            ("contact", &or_dash(&order.contact_info)),
            ("comment", &or_dash(&order.comment)),
            (
                "items",
                &format_order_items(items.iter().map(|item| (item.name.as_str(), item.quantity))),
            ),
        ],
        None,
    );

    for admin_id in &state.config.admin_ids {
        state
            .notifier
            .send_with_keyboard(
                ChatId(*admin_id),
                &alert,
                order_status_keyboard(order_id, OrderStatus::Pending, None),
            )
            .await;
    }

    let receipt = t_args_lang("order-accepted", &[("order_ref", order_ref)], None);
    state.notifier.send_text(ChatId(telegram_id), &receipt).await;
}
