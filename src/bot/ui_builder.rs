//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, WebAppInfo,
};
use url::Url;

use crate::dialogue::Prompt;
use crate::localization::{t_args_lang, t_lang};
use crate::models::{News, OrderItem, OrderStatus, Product, Promocode, ShopStats, User};

use super::actions::{CallbackAction, MenuAction};
use super::dialogue_manager::{BroadcastReport, FormOutcome};

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `1500` → `1 500 ₽`
pub fn format_price(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + 4);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped} ₽")
}

pub fn status_label(status: OrderStatus, language_code: Option<&str>) -> String {
    t_lang(&format!("status-{}", status.as_str()), language_code)
}

/// One `• name x2` line per order item
pub fn format_order_items<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    items
        .into_iter()
        .map(|(name, quantity)| format!("• {} x{}", escape_html(name), quantity))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_order_item_rows(items: &[OrderItem]) -> String {
    format_order_items(items.iter().map(|item| (item.product_name.as_str(), item.quantity)))
}

fn callback(text: String, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

pub fn render_prompt(prompt: &Prompt, language_code: Option<&str>) -> String {
    let join_ids = |ids: &[i64]| ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");

    match prompt {
        Prompt::ProductName => t_lang("prompt-product-name", language_code),
        Prompt::ProductDescription => t_lang("prompt-product-description", language_code),
        Prompt::ProductPrice => t_lang("prompt-product-price", language_code),
        Prompt::ProductCategory { category_ids } => {
            t_args_lang("prompt-product-category", &[("ids", &join_ids(category_ids))], language_code)
        }
        Prompt::ProductImage => t_lang("prompt-product-image", language_code),
        Prompt::NewsTitle => t_lang("prompt-news-title", language_code),
        Prompt::NewsContent => t_lang("prompt-news-content", language_code),
        Prompt::NewsImage => t_lang("prompt-news-image", language_code),
        Prompt::PromocodeCode => t_lang("prompt-promocode-code", language_code),
        Prompt::PromocodeDiscount => t_lang("prompt-promocode-discount", language_code),
        Prompt::PromocodeMaxUses => t_lang("prompt-promocode-max-uses", language_code),
        Prompt::ChannelId => t_lang("prompt-channel", language_code),
        Prompt::BroadcastMessage => t_lang("prompt-broadcast-message", language_code),
        Prompt::BroadcastConfirm => t_lang("prompt-broadcast-confirm", language_code),
        Prompt::TextRequired => t_lang("error-text-required", language_code),
        Prompt::InvalidPrice => t_lang("error-price", language_code),
        Prompt::InvalidCategory { category_ids } => {
            t_args_lang("error-category", &[("ids", &join_ids(category_ids))], language_code)
        }
        Prompt::ImageOrSkip => t_lang("error-image", language_code),
        Prompt::CodeTooShort => t_args_lang(
            "error-code-short",
            &[("min", &crate::dialogue::MIN_CODE_LEN.to_string())],
            language_code,
        ),
        Prompt::InvalidDiscount => t_lang("error-discount", language_code),
        Prompt::InvalidMaxUses => t_lang("error-max-uses", language_code),
        Prompt::InvalidChannel => t_lang("error-channel", language_code),
        Prompt::BroadcastEmpty => t_lang("error-broadcast-empty", language_code),
        Prompt::ConfirmYesOrNo => t_lang("error-confirm", language_code),
        Prompt::DuplicateCode { code } => {
            t_args_lang("error-duplicate-code", &[("code", &escape_html(code))], language_code)
        }
    }
}

/// Text reported to the operator once a form finished
pub fn render_outcome(outcome: &FormOutcome, language_code: Option<&str>) -> String {
    match outcome {
        FormOutcome::Prompt(prompt) => render_prompt(prompt, language_code),
        FormOutcome::Cancelled => t_lang("form-cancelled", language_code),
        FormOutcome::ProductCreated { name, price, .. } => t_args_lang(
            "product-created",
            &[("name", &escape_html(name)), ("price", &format_price(*price))],
            language_code,
        ),
        FormOutcome::NewsCreated { title, .. } => {
            t_args_lang("news-created", &[("title", &escape_html(title))], language_code)
        }
        FormOutcome::PromocodeCreated { code, discount, max_uses } => t_args_lang(
            "promocode-created",
            &[
                ("code", &escape_html(code)),
                ("discount", &discount.to_string()),
                ("max", &format_max_uses(*max_uses)),
            ],
            language_code,
        ),
        FormOutcome::ChannelSet(channel) => {
            t_args_lang("channel-set", &[("channel", &escape_html(channel))], language_code)
        }
        FormOutcome::BroadcastFinished(BroadcastReport { sent, failed }) => t_args_lang(
            "broadcast-done",
            &[("sent", &sent.to_string()), ("failed", &failed.to_string())],
            language_code,
        ),
        FormOutcome::BroadcastDiscarded => t_lang("broadcast-discarded", language_code),
        FormOutcome::SaveFailed => t_lang("error-save-failed", language_code),
    }
}

fn format_max_uses(max_uses: Option<i64>) -> String {
    max_uses.map_or_else(|| "∞".to_string(), |max| max.to_string())
}

/// Reply keyboard shown while a form is waiting for an answer
pub fn form_keyboard(prompt: &Prompt, language_code: Option<&str>) -> KeyboardMarkup {
    let mut row = Vec::new();
    if prompt.offers_skip() {
        row.push(KeyboardButton::new(t_lang("skip-button", language_code)));
    }
    row.push(KeyboardButton::new(t_lang("cancel-button", language_code)));

    KeyboardMarkup::new(vec![row]).resize_keyboard()
}

/// Inline yes/no question for the broadcast confirmation step
pub fn confirm_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        callback(t_lang("yes-button", language_code), CallbackAction::BroadcastConfirm(true)),
        callback(t_lang("no-button", language_code), CallbackAction::BroadcastConfirm(false)),
    ]])
}

pub fn main_menu_keyboard(language_code: Option<&str>) -> KeyboardMarkup {
    let button = |action: MenuAction| KeyboardButton::new(t_lang(action.message_key(), language_code));

    KeyboardMarkup::new(vec![
        vec![button(MenuAction::MyOrders), button(MenuAction::Profile)],
        vec![button(MenuAction::Support)],
    ])
    .resize_keyboard()
}

pub fn shop_keyboard(web_app_url: &Url, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
        t_lang("open-shop-button", language_code),
        WebAppInfo {
            url: web_app_url.clone(),
        },
    )]])
}

pub fn subscribe_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![callback(
        t_lang("subscribe-check-button", language_code),
        CallbackAction::CheckSubscription,
    )]])
}

pub fn admin_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let button = |key: &str, action: CallbackAction| callback(t_lang(key, language_code), action);

    InlineKeyboardMarkup::new(vec![
        vec![
            button("admin-stats-button", CallbackAction::Stats),
            button("admin-orders-button", CallbackAction::Orders),
        ],
        vec![
            button("admin-products-button", CallbackAction::Products),
            button("admin-add-product-button", CallbackAction::AddProduct),
        ],
        vec![
            button("admin-news-button", CallbackAction::News),
            button("admin-add-news-button", CallbackAction::AddNews),
        ],
        vec![
            button("admin-promocodes-button", CallbackAction::Promocodes),
            button("admin-add-promocode-button", CallbackAction::AddPromocode),
        ],
        vec![
            button("admin-users-button", CallbackAction::Users),
            button("admin-settings-button", CallbackAction::Settings),
        ],
    ])
}

/// Single "back to admin menu" button
pub fn back_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![callback(
        t_lang("back-button", language_code),
        CallbackAction::AdminMenu,
    )]])
}

/// Buttons offered once a form committed
pub fn outcome_keyboard(outcome: &FormOutcome, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let to_menu = callback(t_lang("to-menu-button", language_code), CallbackAction::AdminMenu);

    match outcome {
        FormOutcome::ProductCreated { .. } => InlineKeyboardMarkup::new(vec![
            vec![callback(t_lang("add-more-button", language_code), CallbackAction::AddProduct)],
            vec![to_menu],
        ]),
        FormOutcome::NewsCreated { .. } => InlineKeyboardMarkup::new(vec![
            vec![callback(t_lang("add-more-button", language_code), CallbackAction::AddNews)],
            vec![to_menu],
        ]),
        FormOutcome::PromocodeCreated { .. } => InlineKeyboardMarkup::new(vec![
            vec![callback(t_lang("add-more-button", language_code), CallbackAction::AddPromocode)],
            vec![to_menu],
        ]),
        _ => InlineKeyboardMarkup::new(vec![vec![to_menu]]),
    }
}

/// Buttons for the next allowed status moves of an order
pub fn order_status_keyboard(order_id: i64, status: OrderStatus, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let move_to = |key: &str, status: OrderStatus| {
        callback(
            t_lang(key, language_code),
            CallbackAction::SetOrderStatus { order_id, status },
        )
    };

    let mut rows = Vec::new();
    match status {
        OrderStatus::Pending => rows.push(vec![
            move_to("order-confirm-button", OrderStatus::Confirmed),
            move_to("order-cancel-button", OrderStatus::Cancelled),
        ]),
        OrderStatus::Confirmed => rows.push(vec![move_to("order-ship-button", OrderStatus::Shipping)]),
        OrderStatus::Shipping => rows.push(vec![move_to("order-complete-button", OrderStatus::Completed)]),
        OrderStatus::Completed | OrderStatus::Cancelled => {}
    }

    if status.is_final() {
        rows.push(vec![callback(
            t_lang("order-archive-button", language_code),
            CallbackAction::ArchiveOrder,
        )]);
    } else {
        rows.push(vec![callback(t_lang("back-button", language_code), CallbackAction::Orders)]);
    }

    InlineKeyboardMarkup::new(rows)
}

/// Operator view of one order
pub fn format_order_card(
    order_ref: &str,
    customer: Option<&str>,
    telegram_id: i64,
    total: i64,
    status: OrderStatus,
    items: &[OrderItem],
    language_code: Option<&str>,
) -> String {
    let customer = customer
        .map(str::to_string)
        .unwrap_or_else(|| t_lang("no-name", language_code));

    t_args_lang(
        "order-card",
        &[
            ("order_ref", order_ref),
            ("customer", &escape_html(&customer)),
            ("telegram_id", &telegram_id.to_string()),
            ("total", &format_price(total)),
            ("status", &status_label(status, language_code)),
            ("items", &format_order_item_rows(items)),
        ],
        language_code,
    )
}

pub fn format_stats(stats: &ShopStats, language_code: Option<&str>) -> String {
    t_args_lang(
        "stats",
        &[
            ("users", &stats.users.to_string()),
            ("products", &stats.active_products.to_string()),
            ("orders", &stats.orders.to_string()),
            ("revenue", &format_price(stats.revenue)),
        ],
        language_code,
    )
}

pub fn on_off_label(enabled: bool, language_code: Option<&str>) -> String {
    if enabled {
        t_lang("settings-on", language_code)
    } else {
        t_lang("settings-off", language_code)
    }
}

pub fn format_settings(channel: Option<&str>, check_enabled: bool, language_code: Option<&str>) -> String {
    let channel = channel
        .map(escape_html)
        .unwrap_or_else(|| t_lang("settings-channel-none", language_code));

    t_args_lang(
        "settings",
        &[("channel", &channel), ("check", &on_off_label(check_enabled, language_code))],
        language_code,
    )
}

pub fn format_product_card(product: &Product, language_code: Option<&str>) -> String {
    let visibility = if product.is_active {
        t_lang("product-visible", language_code)
    } else {
        t_lang("product-hidden", language_code)
    };
    let category = product
        .category_id
        .map_or_else(|| "—".to_string(), |id| id.to_string());

    t_args_lang(
        "product-card",
        &[
            ("name", &escape_html(&product.name)),
            ("price", &format_price(product.price)),
            ("category", &category),
            ("stock", &product.stock.to_string()),
            ("visibility", &visibility),
        ],
        language_code,
    )
}

pub fn product_admin_keyboard(product: &Product, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let toggle_key = if product.is_active {
        "product-hide-button"
    } else {
        "product-show-button"
    };

    InlineKeyboardMarkup::new(vec![vec![
        callback(t_lang(toggle_key, language_code), CallbackAction::ToggleProduct(product.id)),
        callback(t_lang("delete-button", language_code), CallbackAction::DeleteProduct(product.id)),
    ]])
}

pub fn format_news_card(news: &News, language_code: Option<&str>) -> String {
    t_args_lang(
        "news-card",
        &[
            ("title", &escape_html(&news.title)),
            ("content", &escape_html(&news.content)),
            ("date", &news.created_at.format("%d.%m.%Y %H:%M").to_string()),
        ],
        language_code,
    )
}

pub fn delete_keyboard(action: CallbackAction, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![callback(t_lang("delete-button", language_code), action)]])
}

pub fn format_promocode_line(promocode: &Promocode, language_code: Option<&str>) -> String {
    t_args_lang(
        "promocode-line",
        &[
            ("code", &escape_html(&promocode.code)),
            ("discount", &promocode.discount.to_string()),
            ("uses", &promocode.uses_count.to_string()),
            ("max", &format_max_uses(promocode.max_uses)),
        ],
        language_code,
    )
}

/// One delete button per promocode plus the way back
pub fn promocodes_keyboard(promocodes: &[Promocode], language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = promocodes
        .iter()
        .map(|promocode| {
            vec![callback(
                format!("🗑️ {}", promocode.code),
                CallbackAction::DeletePromocode(promocode.id),
            )]
        })
        .collect();
    rows.push(vec![callback(t_lang("back-button", language_code), CallbackAction::AdminMenu)]);

    InlineKeyboardMarkup::new(rows)
}

pub fn format_user_line(index: usize, user: &User, language_code: Option<&str>) -> String {
    let name = user
        .display_name()
        .unwrap_or_else(|| t_lang("no-name", language_code));
    let admin = if user.is_admin { " 🔑" } else { "" };

    t_args_lang(
        "user-line",
        &[
            ("index", &(index + 1).to_string()),
            ("name", &escape_html(&name)),
            ("telegram_id", &user.telegram_id.to_string()),
            ("admin", admin),
        ],
        language_code,
    )
}

pub fn settings_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let button = |key: &str, action: CallbackAction| callback(t_lang(key, language_code), action);

    InlineKeyboardMarkup::new(vec![
        vec![button("settings-set-channel-button", CallbackAction::SetChannel)],
        vec![button("settings-toggle-check-button", CallbackAction::ToggleSubscriptionCheck)],
        vec![button("settings-broadcast-button", CallbackAction::Broadcast)],
        vec![button("back-button", CallbackAction::AdminMenu)],
    ])
}
