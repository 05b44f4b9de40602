//! Order and order item repository.
//!
//! Status writes are not checked against the previous status: any of the five
//! statuses can be written at any time.

use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::errors::StoreResult;
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, OrderSummary, OrderWithItems};

const ORDER_COLUMNS: &str = "id, order_uuid, user_id, total_amount, status, delivery_address, \
     contact_info, comment, promocode, created_at, updated_at";

/// Insert a pending order and return `(id, order_uuid)`
pub async fn create_order(pool: &SqlitePool, order: &NewOrder) -> StoreResult<(i64, String)> {
    let order_uuid = Uuid::new_v4().to_string();

    let result = sqlx::query(
        "INSERT INTO orders (order_uuid, user_id, total_amount, delivery_address, contact_info, comment, promocode)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&order_uuid)
    .bind(order.user_id)
    .bind(order.total_amount)
    .bind(&order.delivery_address)
    .bind(&order.contact_info)
    .bind(&order.comment)
    .bind(&order.promocode)
    .execute(pool)
    .await?;

    let order_id = result.last_insert_rowid();
    info!(order_id, order_uuid = %order_uuid, total_amount = order.total_amount, "Order created");
    Ok((order_id, order_uuid))
}

/// Store one order line; name and price are copied as given
pub async fn add_order_item(pool: &SqlitePool, order_id: i64, item: &NewOrderItem) -> StoreResult<i64> {
    let result = sqlx::query(
        "INSERT INTO order_items (order_id, product_id, product_name, quantity, price)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(&item.name)
    .bind(item.quantity)
    .bind(item.price)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn read_order(pool: &SqlitePool, order_id: i64) -> StoreResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
        .bind(order_id)
        .fetch_optional(pool)
        .await?;

    Ok(order)
}

/// Write a new status; returns false when the order does not exist
pub async fn update_order_status(pool: &SqlitePool, order_id: i64, status: OrderStatus) -> StoreResult<bool> {
    let result = sqlx::query("UPDATE orders SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2")
        .bind(status)
        .bind(order_id)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!(order_id, status = %status, "Order status updated");
        Ok(true)
    } else {
        Ok(false)
    }
}

pub async fn list_order_items(pool: &SqlitePool, order_id: i64) -> StoreResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, product_name, quantity, price
         FROM order_items WHERE order_id = ?1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

/// Latest orders joined with their owners, for the admin screen
pub async fn list_recent_orders(pool: &SqlitePool, limit: i64) -> StoreResult<Vec<OrderSummary>> {
    let orders = sqlx::query_as::<_, OrderSummary>(
        "SELECT o.id, o.order_uuid, o.total_amount, o.status, u.telegram_id, u.first_name
         FROM orders o JOIN users u ON o.user_id = u.id
         ORDER BY o.created_at DESC, o.id DESC LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

/// Orders of the user with this Telegram id, newest first, with their lines
pub async fn list_orders_for_telegram_user(pool: &SqlitePool, telegram_id: i64) -> StoreResult<Vec<OrderWithItems>> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT o.id, o.order_uuid, o.user_id, o.total_amount, o.status, o.delivery_address,
                o.contact_info, o.comment, o.promocode, o.created_at, o.updated_at
         FROM orders o JOIN users u ON o.user_id = u.id
         WHERE u.telegram_id = ?1
         ORDER BY o.created_at DESC, o.id DESC",
    )
    .bind(telegram_id)
    .fetch_all(pool)
    .await?;

    let mut result = Vec::with_capacity(orders.len());
    for order in orders {
        let items = list_order_items(pool, order.id).await?;
        result.push(OrderWithItems { order, items });
    }

    Ok(result)
}

pub async fn count_orders(pool: &SqlitePool) -> StoreResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Sum of all order totals except cancelled ones
pub async fn total_revenue(pool: &SqlitePool) -> StoreResult<i64> {
    let revenue = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(total_amount), 0) FROM orders WHERE status != 'cancelled'",
    )
    .fetch_one(pool)
    .await?;

    Ok(revenue)
}

/// `(order count, amount spent)` of one user, cancelled orders not counted as spent
pub async fn user_order_totals(pool: &SqlitePool, user_id: i64) -> StoreResult<(i64, i64)> {
    let totals = sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status != 'cancelled' THEN total_amount ELSE 0 END), 0)
         FROM orders WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(totals)
}
