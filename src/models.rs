//! # Data Model
//!
//! Typed rows for every table of the shop database. Each struct maps one
//! table column-for-column so repositories can use `sqlx::query_as`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Telegram user known to the shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Human readable name built from the first and last name
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    /// Telegram file id of the product photo
    pub image_ref: Option<String>,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

/// Fields needed to insert a product
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub category_id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image_ref: Option<String>,
    pub stock: i64,
}

/// Lifecycle of an order.
///
/// The database accepts any status write in any order; the admin keyboards
/// only offer pending → confirmed → shipping → completed (or cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipping,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled orders accept no further buttons
    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub order_uuid: String,
    pub user_id: i64,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub delivery_address: Option<String>,
    pub contact_info: Option<String>,
    pub comment: Option<String>,
    pub promocode: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Order {
    /// Short order reference shown to people (first 8 chars of the uuid)
    pub fn short_ref(&self) -> &str {
        short_ref(&self.order_uuid)
    }
}

/// First 8 characters of an order uuid
pub fn short_ref(order_uuid: &str) -> &str {
    order_uuid.get(..8).unwrap_or(order_uuid)
}

/// Order line with name and price snapshotted at order time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub price: i64,
}

/// An order line as sent by the storefront
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub name: String,
    pub quantity: i64,
    pub price: i64,
}

/// Fields needed to insert an order
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: i64,
    pub total_amount: i64,
    pub delivery_address: Option<String>,
    pub contact_info: Option<String>,
    pub comment: Option<String>,
    pub promocode: Option<String>,
}

/// An order together with its lines, as listed to the buyer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Admin list row: order joined with its owner
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: i64,
    pub order_uuid: String,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub telegram_id: i64,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Promocode {
    pub id: i64,
    pub code: String,
    pub discount: i64,
    pub uses_count: i64,
    /// `None` means unlimited
    pub max_uses: Option<i64>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl Promocode {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.max_uses, Some(max) if self.uses_count >= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct News {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_ref: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Aggregate numbers for the admin statistics screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShopStats {
    pub users: i64,
    pub active_products: i64,
    pub orders: i64,
    pub revenue: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_strings() {
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(serde_json::to_string(&OrderStatus::Shipping).unwrap(), "\"shipping\"");
    }

    #[test]
    fn test_final_statuses() {
        assert!(OrderStatus::Completed.is_final());
        assert!(OrderStatus::Cancelled.is_final());
        assert!(!OrderStatus::Shipping.is_final());
    }

    #[test]
    fn test_short_ref() {
        assert_eq!(short_ref("0123456789abcdef"), "01234567");
        assert_eq!(short_ref("abc"), "abc");
    }

    #[test]
    fn test_promocode_exhaustion() {
        let mut promo = Promocode {
            id: 1,
            code: "SALE".to_string(),
            discount: 10,
            uses_count: 3,
            max_uses: Some(3),
            is_active: true,
            created_at: NaiveDateTime::default(),
        };
        assert!(promo.is_exhausted());

        promo.max_uses = None;
        assert!(!promo.is_exhausted());
    }

    #[test]
    fn test_display_name() {
        let user = User {
            id: 1,
            telegram_id: 42,
            username: None,
            first_name: Some("Ivan".to_string()),
            last_name: Some("Petrov".to_string()),
            is_admin: false,
            created_at: NaiveDateTime::default(),
        };
        assert_eq!(user.display_name().as_deref(), Some("Ivan Petrov"));

        let anonymous = User {
            first_name: None,
            last_name: Some(String::new()),
            ..user
        };
        assert_eq!(anonymous.display_name(), None);
    }
}
