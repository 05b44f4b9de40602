//! # Outbound notifications
//!
//! Messages the shop pushes on its own initiative: order alerts to operators,
//! status updates to buyers, broadcasts. Delivery is best effort. A failed
//! send is logged at `warn` and reported as `false`, never as an error, so
//! callers can tally results without aborting their own work.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardMarkup, InputFile, ParseMode};
use tokio::sync::Mutex;
use tracing::warn;

use crate::dialogue::BroadcastPayload;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send an HTML formatted message
    async fn send_text(&self, chat_id: ChatId, text: &str) -> bool;

    /// Send an HTML formatted message with an inline keyboard
    async fn send_with_keyboard(&self, chat_id: ChatId, text: &str, keyboard: InlineKeyboardMarkup) -> bool;

    /// Forward a broadcast payload exactly as the operator wrote it
    async fn send_payload(&self, chat_id: ChatId, payload: &BroadcastPayload) -> bool;
}

#[async_trait]
impl Notifier for Bot {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> bool {
        match self.send_message(chat_id, text).parse_mode(ParseMode::Html).await {
            Ok(_) => true,
            Err(e) => {
                warn!(user_id = %chat_id, error = %e, "Failed to deliver notification");
                false
            }
        }
    }

    async fn send_with_keyboard(&self, chat_id: ChatId, text: &str, keyboard: InlineKeyboardMarkup) -> bool {
        match self
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(user_id = %chat_id, error = %e, "Failed to deliver notification");
                false
            }
        }
    }

    async fn send_payload(&self, chat_id: ChatId, payload: &BroadcastPayload) -> bool {
        let result = match payload {
            BroadcastPayload::Text(text) => self.send_message(chat_id, text).await.map(|_| ()),
            BroadcastPayload::Photo { file_id, caption } => {
                let request = self.send_photo(chat_id, InputFile::file_id(FileId(file_id.clone())));
                match caption {
                    Some(caption) => request.caption(caption).await.map(|_| ()),
                    None => request.await.map(|_| ()),
                }
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %chat_id, error = %e, "Failed to deliver broadcast");
                false
            }
        }
    }
}

/// A message captured by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

/// Notifier that stores every message instead of sending it.
///
/// Chats listed as unreachable fail delivery the way a blocked bot would.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    unreachable: Vec<ChatId>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unreachable(unreachable: Vec<ChatId>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            unreachable,
        }
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, chat_id: ChatId) -> Vec<SentMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|message| message.chat_id == chat_id)
            .cloned()
            .collect()
    }

    async fn record(&self, chat_id: ChatId, text: String, keyboard: Option<InlineKeyboardMarkup>) -> bool {
        if self.unreachable.contains(&chat_id) {
            return false;
        }
        self.sent.lock().await.push(SentMessage { chat_id, text, keyboard });
        true
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> bool {
        self.record(chat_id, text.to_string(), None).await
    }

    async fn send_with_keyboard(&self, chat_id: ChatId, text: &str, keyboard: InlineKeyboardMarkup) -> bool {
        self.record(chat_id, text.to_string(), Some(keyboard)).await
    }

    async fn send_payload(&self, chat_id: ChatId, payload: &BroadcastPayload) -> bool {
        let text = match payload {
            BroadcastPayload::Text(text) => text.clone(),
            BroadcastPayload::Photo { caption, .. } => caption.clone().unwrap_or_default(),
        };
        self.record(chat_id, text, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_notifier_drops_unreachable() {
        let notifier = RecordingNotifier::with_unreachable(vec![ChatId(2)]);

        assert!(notifier.send_text(ChatId(1), "hi").await);
        assert!(!notifier.send_text(ChatId(2), "hi").await);
        assert!(
            notifier
                .send_payload(
                    ChatId(3),
                    &BroadcastPayload::Photo {
                        file_id: "f".to_string(),
                        caption: Some("sale".to_string()),
                    },
                )
                .await
        );

        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].text, "sale");
        assert!(notifier.sent_to(ChatId(2)).await.is_empty());
    }
}
