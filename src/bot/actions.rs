//! Parsed forms of everything a user can send: slash commands, reply-keyboard
//! buttons and inline callback data.

use std::fmt;
use std::str::FromStr;

use teloxide::utils::command::BotCommands;
use thiserror::Error;

use crate::localization::get_localization_manager;
use crate::models::OrderStatus;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "open the shop")]
    Start(String),
    #[command(description = "how the bot works")]
    Help,
    #[command(description = "admin panel")]
    Admin,
    #[command(description = "stop the current form")]
    Cancel,
    #[command(description = "your orders")]
    Orders,
    #[command(description = "your profile")]
    Profile,
}

/// Buttons of the persistent reply keyboard
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    Profile,
    MyOrders,
    Support,
}

impl MenuAction {
    const ALL: [(MenuAction, &'static str); 3] = [
        (MenuAction::Profile, "menu-profile"),
        (MenuAction::MyOrders, "menu-orders"),
        (MenuAction::Support, "menu-support"),
    ];

    /// Match button text in any supported language
    pub fn from_text(text: &str) -> Option<Self> {
        let manager = get_localization_manager();
        let text = text.trim();

        Self::ALL.into_iter().find_map(|(action, key)| {
            ["en", "ru"]
                .into_iter()
                .any(|language| manager.get_message_in_language(key, language, None) == text)
                .then_some(action)
        })
    }

    pub fn message_key(self) -> &'static str {
        Self::ALL
            .into_iter()
            .find(|(action, _)| *action == self)
            .map(|(_, key)| key)
            .unwrap_or("menu-profile")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown callback data: {0}")]
pub struct UnknownAction(pub String);

/// Inline keyboard callback data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    AdminMenu,
    Stats,
    Orders,
    Products,
    AddProduct,
    News,
    AddNews,
    Promocodes,
    AddPromocode,
    Users,
    Settings,
    SetChannel,
    ToggleSubscriptionCheck,
    Broadcast,
    /// Inline answer to the broadcast confirmation question
    BroadcastConfirm(bool),
    CheckSubscription,
    SetOrderStatus { order_id: i64, status: OrderStatus },
    ArchiveOrder,
    ToggleProduct(i64),
    DeleteProduct(i64),
    DeleteNews(i64),
    DeletePromocode(i64),
}

impl CallbackAction {
    /// Whether only operators may trigger the action
    pub fn is_admin_only(&self) -> bool {
        !matches!(self, CallbackAction::CheckSubscription)
    }
}

const STATUS_PREFIXES: [(&str, OrderStatus); 4] = [
    ("confirm_", OrderStatus::Confirmed),
    ("cancel_", OrderStatus::Cancelled),
    ("shipping_", OrderStatus::Shipping),
    ("complete_", OrderStatus::Completed),
];

fn with_id(data: &str, prefix: &str) -> Option<i64> {
    data.strip_prefix(prefix).and_then(|id| id.parse().ok())
}

impl FromStr for CallbackAction {
    type Err = UnknownAction;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let action = match data {
            "admin_menu" => CallbackAction::AdminMenu,
            "admin_stats" => CallbackAction::Stats,
            "admin_orders" | "orders_back" => CallbackAction::Orders,
            "list_products" => CallbackAction::Products,
            "add_product" | "admin_add_product" => CallbackAction::AddProduct,
            "list_news" => CallbackAction::News,
            "add_news" => CallbackAction::AddNews,
            "list_promocodes" => CallbackAction::Promocodes,
            "add_promocode" => CallbackAction::AddPromocode,
            "admin_users" => CallbackAction::Users,
            "admin_settings" => CallbackAction::Settings,
            "set_channel" => CallbackAction::SetChannel,
            "toggle_sub_check" => CallbackAction::ToggleSubscriptionCheck,
            "broadcast" => CallbackAction::Broadcast,
            "broadcast_yes" => CallbackAction::BroadcastConfirm(true),
            "broadcast_no" => CallbackAction::BroadcastConfirm(false),
            "check_sub" => CallbackAction::CheckSubscription,
            "archive_order" => CallbackAction::ArchiveOrder,
            _ => {
                if let Some(action) = STATUS_PREFIXES.iter().find_map(|(prefix, status)| {
                    with_id(data, prefix).map(|order_id| CallbackAction::SetOrderStatus {
                        order_id,
                        status: *status,
                    })
                }) {
                    action
                } else if let Some(id) = with_id(data, "toggle_product_") {
                    CallbackAction::ToggleProduct(id)
                } else if let Some(id) = with_id(data, "del_product_") {
                    CallbackAction::DeleteProduct(id)
                } else if let Some(id) = with_id(data, "del_news_") {
                    CallbackAction::DeleteNews(id)
                } else if let Some(id) = with_id(data, "del_promo_") {
                    CallbackAction::DeletePromocode(id)
                } else {
                    return Err(UnknownAction(data.to_string()));
                }
            }
        };

        Ok(action)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::AdminMenu => f.write_str("admin_menu"),
            CallbackAction::Stats => f.write_str("admin_stats"),
            CallbackAction::Orders => f.write_str("admin_orders"),
            CallbackAction::Products => f.write_str("list_products"),
            CallbackAction::AddProduct => f.write_str("add_product"),
            CallbackAction::News => f.write_str("list_news"),
            CallbackAction::AddNews => f.write_str("add_news"),
            CallbackAction::Promocodes => f.write_str("list_promocodes"),
            CallbackAction::AddPromocode => f.write_str("add_promocode"),
            CallbackAction::Users => f.write_str("admin_users"),
            CallbackAction::Settings => f.write_str("admin_settings"),
            CallbackAction::SetChannel => f.write_str("set_channel"),
            CallbackAction::ToggleSubscriptionCheck => f.write_str("toggle_sub_check"),
            CallbackAction::Broadcast => f.write_str("broadcast"),
            CallbackAction::BroadcastConfirm(true) => f.write_str("broadcast_yes"),
            CallbackAction::BroadcastConfirm(false) => f.write_str("broadcast_no"),
            CallbackAction::CheckSubscription => f.write_str("check_sub"),
            CallbackAction::ArchiveOrder => f.write_str("archive_order"),
            CallbackAction::SetOrderStatus { order_id, status } => {
                let prefix = STATUS_PREFIXES
                    .iter()
                    .find(|(_, s)| s == status)
                    .map(|(prefix, _)| *prefix)
                    .unwrap_or("confirm_");
                write!(f, "{prefix}{order_id}")
            }
            CallbackAction::ToggleProduct(id) => write!(f, "toggle_product_{id}"),
            CallbackAction::DeleteProduct(id) => write!(f, "del_product_{id}"),
            CallbackAction::DeleteNews(id) => write!(f, "del_news_{id}"),
            CallbackAction::DeletePromocode(id) => write!(f, "del_promo_{id}"),
        }
    }
}
