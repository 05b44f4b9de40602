//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `actions`: Commands, reply-keyboard buttons and callback data
//! - `access`: Operator checks and the channel subscription gate
//! - `message_handler`: Commands, form answers and menu buttons
//! - `callback_handler`: Inline keyboard callback queries (admin panel)
//! - `ui_builder`: Creates keyboards and formats messages
//! - `dialogue_manager`: Drives the admin forms and writes their results

pub mod access;
pub mod actions;
pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;

use crate::dialogue::AdminDialogueState;

pub use actions::Command;
pub use callback_handler::callback_handler;
pub use message_handler::{command_handler, message_handler};

/// Handler tree of the bot.
///
/// Expects `InMemStorage<AdminDialogueState>`, `SqlitePool` and `Arc<Config>`
/// among the dispatcher dependencies.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    let messages = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<AdminDialogueState>, AdminDialogueState>()
        .branch(dptree::entry().filter_command::<Command>().endpoint(command_handler))
        .branch(dptree::endpoint(message_handler));

    let callbacks = Update::filter_callback_query()
        .enter_dialogue::<CallbackQuery, InMemStorage<AdminDialogueState>, AdminDialogueState>()
        .endpoint(callback_handler);

    dptree::entry().branch(messages).branch(callbacks)
}
