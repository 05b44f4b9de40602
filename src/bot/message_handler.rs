//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use teloxide::types::{KeyboardRemove, ParseMode, User as TelegramUser};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::orders;
use crate::db::users::{self, UserProfile};
use crate::dialogue::{is_cancel, AdminDialogue, FormInput, Prompt};
use crate::localization::{t_args_lang, t_lang};
use crate::models::User;

use super::access;
use super::actions::{Command, MenuAction};
use super::dialogue_manager::{cancel_form, handle_form_input, FormOutcome};
use super::ui_builder::{
    admin_menu_keyboard, confirm_keyboard, escape_html, form_keyboard, format_price, main_menu_keyboard,
    outcome_keyboard, render_outcome, render_prompt, shop_keyboard, status_label, subscribe_keyboard,
};

pub(crate) fn telegram_id(user: &TelegramUser) -> i64 {
    i64::try_from(user.id.0).unwrap_or_default()
}

/// Store or refresh the sender's profile
pub(crate) async fn register_sender(pool: &SqlitePool, user: &TelegramUser) -> Result<User> {
    let profile = UserProfile {
        username: user.username.as_deref(),
        first_name: Some(user.first_name.as_str()),
        last_name: user.last_name.as_deref(),
    };
    Ok(users::register_user(pool, telegram_id(user), &profile).await?)
}

/// Ask the next form question, with the matching keyboard
pub(crate) async fn send_prompt(bot: &Bot, chat_id: ChatId, prompt: &Prompt, language_code: Option<&str>) -> Result<()> {
    let text = render_prompt(prompt, language_code);

    if prompt.asks_confirmation() {
        bot.send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(confirm_keyboard(language_code))
            .await?;
    } else {
        bot.send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(form_keyboard(prompt, language_code))
            .await?;
    }
    Ok(())
}

/// Report the result of a form answer
pub(crate) async fn send_outcome(
    bot: &Bot,
    chat_id: ChatId,
    outcome: &FormOutcome,
    language_code: Option<&str>,
) -> Result<()> {
    let text = render_outcome(outcome, language_code);

    match outcome {
        FormOutcome::Prompt(prompt) => send_prompt(bot, chat_id, prompt, language_code).await?,
        FormOutcome::ProductCreated { .. } | FormOutcome::NewsCreated { .. } | FormOutcome::PromocodeCreated { .. } => {
            // Drop the form keyboard first, the inline buttons need their own message
            bot.send_message(chat_id, t_lang("menu-hint", language_code))
                .reply_markup(main_menu_keyboard(language_code))
                .await?;
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(outcome_keyboard(outcome, language_code))
                .await?;
        }
        FormOutcome::SaveFailed => {
            bot.send_message(chat_id, text)
                .reply_markup(KeyboardRemove::new())
                .await?;
        }
        FormOutcome::Cancelled
        | FormOutcome::ChannelSet(_)
        | FormOutcome::BroadcastFinished(_)
        | FormOutcome::BroadcastDiscarded => {
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(main_menu_keyboard(language_code))
                .await?;
        }
    }
    Ok(())
}

/// Welcome screen, or the subscription wall when the gate applies
pub(crate) async fn send_start(
    bot: &Bot,
    pool: &SqlitePool,
    config: &Config,
    chat_id: ChatId,
    user: &TelegramUser,
) -> Result<()> {
    let language_code = user.language_code.as_deref();
    let sender_id = telegram_id(user);
    let is_operator = access::is_operator(pool, config, sender_id).await?;

    if !is_operator {
        if let Some(channel) = access::gating_channel(pool, config).await? {
            if !access::is_subscribed(bot, &channel, sender_id).await {
                info!(user_id = sender_id, channel = %channel, "User must subscribe first");
                bot.send_message(
                    chat_id,
                    t_args_lang("subscribe-required", &[("channel", &escape_html(&channel))], language_code),
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(subscribe_keyboard(language_code))
                .await?;
                return Ok(());
            }
        }
    }

    let mut welcome = t_args_lang("welcome", &[("name", &escape_html(&user.first_name))], language_code);
    if is_operator {
        welcome.push_str("\n\n");
        welcome.push_str(&t_lang("welcome-admin-hint", language_code));
    }

    bot.send_message(chat_id, welcome)
        .parse_mode(ParseMode::Html)
        .reply_markup(shop_keyboard(&config.web_app_url, language_code))
        .await?;
    bot.send_message(chat_id, t_lang("menu-hint", language_code))
        .reply_markup(main_menu_keyboard(language_code))
        .await?;
    Ok(())
}

async fn send_profile(bot: &Bot, pool: &SqlitePool, chat_id: ChatId, user: &User, language_code: Option<&str>) -> Result<()> {
    let (order_count, spent) = orders::user_order_totals(pool, user.id).await?;
    let name = user
        .display_name()
        .unwrap_or_else(|| t_lang("no-name", language_code));

    let text = t_args_lang(
        "profile",
        &[
            ("telegram_id", &user.telegram_id.to_string()),
            ("name", &escape_html(&name)),
            ("orders", &order_count.to_string()),
            ("spent", &format_price(spent)),
        ],
        language_code,
    );
    bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

async fn send_my_orders(
    bot: &Bot,
    pool: &SqlitePool,
    chat_id: ChatId,
    telegram_id: i64,
    language_code: Option<&str>,
) -> Result<()> {
    let orders = orders::list_orders_for_telegram_user(pool, telegram_id).await?;
    if orders.is_empty() {
        bot.send_message(chat_id, t_lang("my-orders-empty", language_code)).await?;
        return Ok(());
    }

    let mut lines = vec![t_lang("my-orders-title", language_code)];
    lines.extend(orders.iter().map(|entry| {
        t_args_lang(
            "my-order-line",
            &[
                ("order_ref", entry.order.short_ref()),
                ("status", &status_label(entry.order.status, language_code)),
                ("total", &format_price(entry.order.total_amount)),
            ],
            language_code,
        )
    }));

    bot.send_message(chat_id, lines.join("\n"))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Slash commands parsed by the dispatcher
pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    pool: SqlitePool,
    config: Arc<Config>,
    dialogue: AdminDialogue,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let language_code = user.language_code.as_deref();
    let chat_id = msg.chat.id;
    let stored = register_sender(&pool, user).await?;
    debug!(user_id = %chat_id, command = ?cmd, "Received command");

    match cmd {
        Command::Start(_) => send_start(&bot, &pool, &config, chat_id, user).await?,
        Command::Help => {
            bot.send_message(chat_id, t_lang("help-text", language_code))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Admin => {
            if access::is_operator(&pool, &config, stored.telegram_id).await? {
                bot.send_message(chat_id, t_lang("admin-panel", language_code))
                    .parse_mode(ParseMode::Html)
                    .reply_markup(admin_menu_keyboard(language_code))
                    .await?;
            } else {
                info!(user_id = stored.telegram_id, "Admin panel refused");
                bot.send_message(chat_id, t_lang("access-denied", language_code)).await?;
            }
        }
        Command::Cancel => {
            if cancel_form(&dialogue).await? {
                send_outcome(&bot, chat_id, &FormOutcome::Cancelled, language_code).await?;
            } else {
                bot.send_message(chat_id, t_lang("nothing-to-cancel", language_code)).await?;
            }
        }
        Command::Orders => send_my_orders(&bot, &pool, chat_id, stored.telegram_id, language_code).await?,
        Command::Profile => send_profile(&bot, &pool, chat_id, &stored, language_code).await?,
    }

    Ok(())
}

fn form_input(msg: &Message) -> FormInput {
    match msg.photo().and_then(|sizes| sizes.last()) {
        Some(largest) => FormInput::photo(largest.file.id.0.clone(), msg.caption().map(str::to_string)),
        None => FormInput {
            text: msg.text().map(str::to_string),
            ..FormInput::default()
        },
    }
}

/// Everything that is not a command: form answers, menu buttons, chatter
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    pool: SqlitePool,
    dialogue: AdminDialogue,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let language_code = user.language_code.as_deref();
    let chat_id = msg.chat.id;
    let stored = register_sender(&pool, user).await?;

    if let Some(outcome) = handle_form_input(&pool, &dialogue, &bot, &form_input(&msg)).await? {
        return send_outcome(&bot, chat_id, &outcome, language_code).await;
    }

    let text = msg.text().unwrap_or_default();
    debug!(user_id = %chat_id, message_length = text.len(), "Received message outside a form");

    match MenuAction::from_text(text) {
        Some(MenuAction::Profile) => send_profile(&bot, &pool, chat_id, &stored, language_code).await?,
        Some(MenuAction::MyOrders) => {
            send_my_orders(&bot, &pool, chat_id, stored.telegram_id, language_code).await?
        }
        Some(MenuAction::Support) => {
            bot.send_message(chat_id, t_lang("support-text", language_code)).await?;
        }
        None if is_cancel(text) => {
            bot.send_message(chat_id, t_lang("nothing-to-cancel", language_code))
                .reply_markup(main_menu_keyboard(language_code))
                .await?;
        }
        None => {
            bot.send_message(chat_id, t_lang("unknown-message", language_code))
                .reply_markup(main_menu_keyboard(language_code))
                .await?;
        }
    }

    Ok(())
}
