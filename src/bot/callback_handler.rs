//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{self, news, orders, products, promocodes, settings, users};
use crate::dialogue::{AdminDialogue, FormKind};
use crate::localization::{t_args_lang, t_lang};
use crate::models::{Order, OrderStatus};
use crate::notifier::Notifier;

use super::access;
use super::actions::CallbackAction;
use super::dialogue_manager::{confirm_broadcast, start_form};
use super::message_handler::{send_outcome, send_prompt, send_start};
use super::ui_builder::{
    admin_menu_keyboard, back_keyboard, delete_keyboard, format_news_card, format_order_card, format_product_card,
    format_promocode_line, format_settings, format_stats, format_user_line, on_off_label, order_status_keyboard,
    product_admin_keyboard, promocodes_keyboard, settings_keyboard, status_label,
};

const ORDERS_PAGE: i64 = 10;
const PRODUCTS_PAGE: i64 = 20;
const USERS_PAGE: i64 = 20;

/// Where the pressed button lives
struct Origin {
    chat_id: ChatId,
    message_id: Option<MessageId>,
}

impl Origin {
    fn of(q: &CallbackQuery) -> Self {
        match &q.message {
            Some(message) => Origin {
                chat_id: message.chat().id,
                message_id: Some(message.id()),
            },
            None => Origin {
                chat_id: ChatId::from(q.from.id),
                message_id: None,
            },
        }
    }
}

/// Change an order's status and tell its owner.
///
/// Returns the updated order, or `None` when it does not exist.
pub async fn change_order_status(
    pool: &SqlitePool,
    notifier: &dyn Notifier,
    order_id: i64,
    status: OrderStatus,
) -> Result<Option<Order>> {
    if !orders::update_order_status(pool, order_id, status).await? {
        return Ok(None);
    }
    let Some(order) = orders::read_order(pool, order_id).await? else {
        return Ok(None);
    };
    info!(order_id, status = %status, "Order status changed");

    match users::get_user_by_id(pool, order.user_id).await? {
        Some(owner) => {
            let text = t_args_lang(
                &format!("notify-order-{}", status.as_str()),
                &[("order_ref", order.short_ref())],
                None,
            );
            notifier.send_text(ChatId(owner.telegram_id), &text).await;
        }
        None => warn!(order_id, user_id = order.user_id, "Order owner not found, nobody notified"),
    }

    Ok(Some(order))
}

/// Edit the message in place when possible, otherwise send a new one
async fn show(bot: &Bot, origin: &Origin, text: String, keyboard: InlineKeyboardMarkup) -> Result<()> {
    if let Some(message_id) = origin.message_id {
        match bot
            .edit_message_text(origin.chat_id, message_id, text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => debug!(user_id = %origin.chat_id, error = %e, "Edit failed, sending a new message"),
        }
    }

    bot.send_message(origin.chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn send_html(bot: &Bot, chat_id: ChatId, text: String, keyboard: InlineKeyboardMarkup) -> Result<()> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn show_orders(bot: &Bot, pool: &SqlitePool, origin: &Origin, language_code: Option<&str>) -> Result<()> {
    let recent = orders::list_recent_orders(pool, ORDERS_PAGE).await?;
    if recent.is_empty() {
        return show(bot, origin, t_lang("orders-empty", language_code), back_keyboard(language_code)).await;
    }

    for summary in recent {
        let items = orders::list_order_items(pool, summary.id).await?;
        let card = format_order_card(
            crate::models::short_ref(&summary.order_uuid),
            summary.first_name.as_deref(),
            summary.telegram_id,
            summary.total_amount,
            summary.status,
            &items,
            language_code,
        );
        send_html(bot, origin.chat_id, card, order_status_keyboard(summary.id, summary.status, language_code)).await?;
    }
    Ok(())
}

async fn show_products(bot: &Bot, pool: &SqlitePool, origin: &Origin, language_code: Option<&str>) -> Result<()> {
    let listed = products::list_products(pool, PRODUCTS_PAGE).await?;
    if listed.is_empty() {
        return show(bot, origin, t_lang("products-empty", language_code), back_keyboard(language_code)).await;
    }

    show(bot, origin, t_lang("products-title", language_code), back_keyboard(language_code)).await?;
    for product in &listed {
        send_html(
            bot,
            origin.chat_id,
            format_product_card(product, language_code),
            product_admin_keyboard(product, language_code),
        )
        .await?;
    }
    Ok(())
}

async fn show_news(bot: &Bot, pool: &SqlitePool, origin: &Origin, language_code: Option<&str>) -> Result<()> {
    let feed = news::list_news(pool, news::NEWS_FEED_LIMIT).await?;
    if feed.is_empty() {
        return show(bot, origin, t_lang("news-empty", language_code), back_keyboard(language_code)).await;
    }

    show(bot, origin, t_lang("news-title", language_code), back_keyboard(language_code)).await?;
    for entry in &feed {
        send_html(
            bot,
            origin.chat_id,
            format_news_card(entry, language_code),
            delete_keyboard(CallbackAction::DeleteNews(entry.id), language_code),
        )
        .await?;
    }
    Ok(())
}

async fn show_promocodes(bot: &Bot, pool: &SqlitePool, origin: &Origin, language_code: Option<&str>) -> Result<()> {
    let codes = promocodes::list_promocodes(pool).await?;
    if codes.is_empty() {
        return show(bot, origin, t_lang("promocodes-empty", language_code), back_keyboard(language_code)).await;
    }

    let mut lines = vec![t_lang("promocodes-title", language_code)];
    lines.extend(codes.iter().map(|code| format_promocode_line(code, language_code)));
    show(bot, origin, lines.join("\n"), promocodes_keyboard(&codes, language_code)).await
}

async fn show_users(bot: &Bot, pool: &SqlitePool, origin: &Origin, language_code: Option<&str>) -> Result<()> {
    let listed = users::list_users(pool, USERS_PAGE).await?;
    if listed.is_empty() {
        return show(bot, origin, t_lang("users-empty", language_code), back_keyboard(language_code)).await;
    }

    let mut lines = vec![t_lang("users-title", language_code)];
    lines.extend(
        listed
            .iter()
            .enumerate()
            .map(|(index, user)| format_user_line(index, user, language_code)),
    );
    show(bot, origin, lines.join("\n"), back_keyboard(language_code)).await
}

async fn show_settings(
    bot: &Bot,
    pool: &SqlitePool,
    config: &Config,
    origin: &Origin,
    language_code: Option<&str>,
) -> Result<()> {
    let channel = access::configured_channel(pool, config).await?;
    let check = access::subscription_check_enabled(pool, config).await?;
    show(
        bot,
        origin,
        format_settings(channel.as_deref(), check, language_code),
        settings_keyboard(language_code),
    )
    .await
}

async fn begin_form(
    bot: &Bot,
    dialogue: &AdminDialogue,
    origin: &Origin,
    kind: FormKind,
    language_code: Option<&str>,
) -> Result<()> {
    let prompt = start_form(dialogue, kind).await?;
    send_prompt(bot, origin.chat_id, &prompt, language_code).await
}

async fn remove_keyboard(bot: &Bot, origin: &Origin) {
    if let Some(message_id) = origin.message_id {
        if let Err(e) = bot.edit_message_reply_markup(origin.chat_id, message_id).await {
            debug!(user_id = %origin.chat_id, error = %e, "Could not remove inline keyboard");
        }
    }
}

async fn delete_origin(bot: &Bot, origin: &Origin) {
    if let Some(message_id) = origin.message_id {
        if let Err(e) = bot.delete_message(origin.chat_id, message_id).await {
            debug!(user_id = %origin.chat_id, error = %e, "Could not delete message");
        }
    }
}

fn deleted_or_missing(found: bool, language_code: Option<&str>) -> String {
    if found {
        t_lang("deleted", language_code)
    } else {
        t_lang("not-found", language_code)
    }
}

/// Run one admin action; returns the toast shown on the button press, if any
async fn run_action(
    bot: &Bot,
    action: CallbackAction,
    origin: &Origin,
    pool: &SqlitePool,
    config: &Config,
    dialogue: &AdminDialogue,
    language_code: Option<&str>,
) -> Result<Option<String>> {
    match action {
        CallbackAction::AdminMenu => {
            show(bot, origin, t_lang("admin-panel", language_code), admin_menu_keyboard(language_code)).await?;
        }
        CallbackAction::Stats => {
            let stats = db::shop_stats(pool).await?;
            show(bot, origin, format_stats(&stats, language_code), back_keyboard(language_code)).await?;
        }
        CallbackAction::Orders => show_orders(bot, pool, origin, language_code).await?,
        CallbackAction::Products => show_products(bot, pool, origin, language_code).await?,
        CallbackAction::News => show_news(bot, pool, origin, language_code).await?,
        CallbackAction::Promocodes => show_promocodes(bot, pool, origin, language_code).await?,
        CallbackAction::Users => show_users(bot, pool, origin, language_code).await?,
        CallbackAction::Settings => show_settings(bot, pool, config, origin, language_code).await?,
        CallbackAction::AddProduct => begin_form(bot, dialogue, origin, FormKind::Product, language_code).await?,
        CallbackAction::AddNews => begin_form(bot, dialogue, origin, FormKind::News, language_code).await?,
        CallbackAction::AddPromocode => begin_form(bot, dialogue, origin, FormKind::Promocode, language_code).await?,
        CallbackAction::SetChannel => begin_form(bot, dialogue, origin, FormKind::Channel, language_code).await?,
        CallbackAction::Broadcast => begin_form(bot, dialogue, origin, FormKind::Broadcast, language_code).await?,
        CallbackAction::BroadcastConfirm(confirmed) => {
            remove_keyboard(bot, origin).await;
            match confirm_broadcast(pool, dialogue, bot, confirmed).await? {
                Some(outcome) => send_outcome(bot, origin.chat_id, &outcome, language_code).await?,
                None => return Ok(Some(t_lang("not-found", language_code))),
            }
        }
        CallbackAction::ToggleSubscriptionCheck => {
            let enabled = !access::subscription_check_enabled(pool, config).await?;
            settings::set_flag(pool, settings::SUBSCRIPTION_CHECK, enabled).await?;
            info!(enabled, "Subscription check toggled");
            show_settings(bot, pool, config, origin, language_code).await?;
            return Ok(Some(t_args_lang(
                "settings-check-changed",
                &[("check", &on_off_label(enabled, language_code))],
                language_code,
            )));
        }
        CallbackAction::SetOrderStatus { order_id, status } => {
            let Some(order) = change_order_status(pool, bot, order_id, status).await? else {
                return Ok(Some(t_lang("not-found", language_code)));
            };

            let owner = users::get_user_by_id(pool, order.user_id).await?;
            let items = orders::list_order_items(pool, order.id).await?;
            let card = format_order_card(
                order.short_ref(),
                owner.as_ref().and_then(|user| user.first_name.as_deref()),
                owner.as_ref().map_or(0, |user| user.telegram_id),
                order.total_amount,
                order.status,
                &items,
                language_code,
            );
            show(bot, origin, card, order_status_keyboard(order.id, order.status, language_code)).await?;

            return Ok(Some(t_args_lang(
                "order-status-changed",
                &[
                    ("order_ref", order.short_ref()),
                    ("status", &status_label(order.status, language_code)),
                ],
                language_code,
            )));
        }
        CallbackAction::ArchiveOrder => {
            remove_keyboard(bot, origin).await;
            return Ok(Some(t_lang("order-archived", language_code)));
        }
        CallbackAction::ToggleProduct(product_id) => {
            let Some(product) = products::read_product(pool, product_id).await? else {
                return Ok(Some(t_lang("not-found", language_code)));
            };
            products::set_product_active(pool, product_id, !product.is_active).await?;

            if let Some(updated) = products::read_product(pool, product_id).await? {
                show(
                    bot,
                    origin,
                    format_product_card(&updated, language_code),
                    product_admin_keyboard(&updated, language_code),
                )
                .await?;
            }
        }
        CallbackAction::DeleteProduct(product_id) => {
            let found = products::delete_product(pool, product_id).await?;
            if found {
                delete_origin(bot, origin).await;
            }
            return Ok(Some(deleted_or_missing(found, language_code)));
        }
        CallbackAction::DeleteNews(news_id) => {
            let found = news::delete_news(pool, news_id).await?;
            if found {
                delete_origin(bot, origin).await;
            }
            return Ok(Some(deleted_or_missing(found, language_code)));
        }
        CallbackAction::DeletePromocode(promocode_id) => {
            let found = promocodes::delete_promocode(pool, promocode_id).await?;
            show_promocodes(bot, pool, origin, language_code).await?;
            return Ok(Some(deleted_or_missing(found, language_code)));
        }
        CallbackAction::CheckSubscription => {}
    }

    Ok(None)
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    pool: SqlitePool,
    config: Arc<Config>,
    dialogue: AdminDialogue,
) -> Result<()> {
    let language_code = q.from.language_code.as_deref();
    let sender_id = i64::try_from(q.from.id.0).unwrap_or_default();
    let data = q.data.as_deref().unwrap_or_default();
    let origin = Origin::of(&q);
    debug!(user_id = sender_id, data, "Received callback query from user");

    let action = match data.parse::<CallbackAction>() {
        Ok(action) => action,
        Err(e) => {
            debug!(user_id = sender_id, error = %e, "Ignoring callback");
            bot.answer_callback_query(q.id.clone()).await?;
            return Ok(());
        }
    };

    if action.is_admin_only() && !access::is_operator(&pool, &config, sender_id).await? {
        info!(user_id = sender_id, data, "Admin callback refused");
        bot.answer_callback_query(q.id.clone())
            .text(t_lang("access-denied", language_code))
            .show_alert(true)
            .await?;
        return Ok(());
    }

    if action == CallbackAction::CheckSubscription {
        let subscribed = match access::gating_channel(&pool, &config).await? {
            Some(channel) => access::is_subscribed(&bot, &channel, sender_id).await,
            None => true,
        };

        if subscribed {
            bot.answer_callback_query(q.id.clone()).await?;
            delete_origin(&bot, &origin).await;
            send_start(&bot, &pool, &config, origin.chat_id, &q.from).await?;
        } else {
            bot.answer_callback_query(q.id.clone())
                .text(t_lang("subscribe-still-missing", language_code))
                .show_alert(true)
                .await?;
        }
        return Ok(());
    }

    let toast = run_action(&bot, action, &origin, &pool, &config, &dialogue, language_code).await?;
    match toast {
        Some(text) => bot.answer_callback_query(q.id.clone()).text(text).await?,
        None => bot.answer_callback_query(q.id.clone()).await?,
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::NewOrder;
    use crate::notifier::RecordingNotifier;

    #[tokio::test]
    async fn test_status_change_notifies_owner_by_telegram_id() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        // Spread database ids and Telegram ids apart
        users::get_or_create_user(&pool, 111).await?;
        let buyer = users::get_or_create_user(&pool, 555_000).await?;
        let (order_id, uuid) = orders::create_order(
            &pool,
            &NewOrder {
                user_id: buyer.id,
                total_amount: 900,
                delivery_address: None,
                contact_info: None,
                comment: None,
                promocode: None,
            },
        )
        .await?;
        let notifier = RecordingNotifier::new();

        let order = change_order_status(&pool, &notifier, order_id, OrderStatus::Shipping).await?;

        assert_eq!(order.map(|order| order.status), Some(OrderStatus::Shipping));
        let sent = notifier.sent_to(ChatId(555_000)).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains(&uuid[..8]));
        assert!(notifier.sent_to(ChatId(buyer.id)).await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_status_change_of_missing_order() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        let notifier = RecordingNotifier::new();

        let order = change_order_status(&pool, &notifier, 404, OrderStatus::Confirmed).await?;

        assert!(order.is_none());
        assert!(notifier.sent().await.is_empty());
        Ok(())
    }
}
