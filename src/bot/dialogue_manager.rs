//! Dialogue Manager module for running the admin forms
//!
//! Owns the lifecycle of the per-chat form state: starting a form overwrites
//! whatever was stored for the chat, a commit or cancel removes it. Nothing in
//! here talks to Telegram directly, so the whole flow can run against an
//! in-memory storage and a recording notifier.

use anyhow::Result;
use sqlx::SqlitePool;
use teloxide::types::ChatId;
use tracing::{debug, error, info};

use crate::db::{categories, news, products, promocodes, settings, users};
use crate::dialogue::{
    AdminDialogue, AdminDialogueState, Commit, FormContext, FormInput, FormKind, FormState, Prompt, Transition,
};
use crate::errors::StoreError;
use crate::notifier::Notifier;

/// Delivery tally of a broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

/// What the operator should be told after one form answer
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    /// The form continues (or re-asks); the state is already stored
    Prompt(Prompt),
    Cancelled,
    ProductCreated { product_id: i64, name: String, price: i64 },
    NewsCreated { news_id: i64, title: String },
    PromocodeCreated { code: String, discount: i64, max_uses: Option<i64> },
    ChannelSet(String),
    BroadcastFinished(BroadcastReport),
    BroadcastDiscarded,
    /// The write failed; the form was dropped
    SaveFailed,
}

const BROADCAST_CONFIRM_STEP: usize = 1;

async fn form_context(pool: &SqlitePool, kind: FormKind) -> Result<FormContext> {
    let category_ids = match kind {
        FormKind::Product => categories::list_category_ids(pool).await?,
        _ => Vec::new(),
    };
    Ok(FormContext { category_ids })
}

/// Begin a form for this chat, replacing any form left over
pub async fn start_form(dialogue: &AdminDialogue, kind: FormKind) -> Result<Prompt> {
    debug!(user_id = %dialogue.chat_id(), ?kind, "Starting admin form");
    dialogue.update(AdminDialogueState::Form(FormState::new(kind))).await?;
    Ok(FormState::first_prompt(kind))
}

/// Drop the chat's form; returns false when there was none
pub async fn cancel_form(dialogue: &AdminDialogue) -> Result<bool> {
    let active = matches!(dialogue.get().await?, Some(AdminDialogueState::Form(_)));
    if active {
        dialogue.exit().await?;
    }
    Ok(active)
}

/// Feed one inbound message into the chat's form.
///
/// Returns `None` when the chat has no form in progress.
pub async fn handle_form_input(
    pool: &SqlitePool,
    dialogue: &AdminDialogue,
    notifier: &dyn Notifier,
    input: &FormInput,
) -> Result<Option<FormOutcome>> {
    let state = match dialogue.get().await? {
        Some(AdminDialogueState::Form(state)) => state,
        Some(AdminDialogueState::Idle) | None => return Ok(None),
    };

    let ctx = match form_context(pool, state.kind).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(user_id = %dialogue.chat_id(), kind = ?state.kind, error = %e, "Failed to load form data");
            dialogue.exit().await?;
            return Ok(Some(FormOutcome::SaveFailed));
        }
    };
    let transition = state.advance(input, &ctx);
    debug!(user_id = %dialogue.chat_id(), kind = ?state.kind, step = state.step, ?transition, "Form transition");

    let outcome = match transition {
        Transition::Reprompt(prompt) => FormOutcome::Prompt(prompt),
        Transition::Advance(next, prompt) => {
            dialogue.update(AdminDialogueState::Form(next)).await?;
            FormOutcome::Prompt(prompt)
        }
        Transition::Cancelled => {
            dialogue.exit().await?;
            FormOutcome::Cancelled
        }
        Transition::Discard => {
            dialogue.exit().await?;
            match state.kind {
                FormKind::Broadcast => FormOutcome::BroadcastDiscarded,
                _ => FormOutcome::Cancelled,
            }
        }
        Transition::Commit(commit) => commit_form(pool, dialogue, notifier, commit).await?,
    };

    Ok(Some(outcome))
}

/// Answer the broadcast confirmation buttons.
///
/// Returns `None` unless the chat is waiting for exactly that answer, so a
/// button left on an old message cannot feed another form.
pub async fn confirm_broadcast(
    pool: &SqlitePool,
    dialogue: &AdminDialogue,
    notifier: &dyn Notifier,
    confirmed: bool,
) -> Result<Option<FormOutcome>> {
    let awaiting = matches!(
        dialogue.get().await?,
        Some(AdminDialogueState::Form(FormState {
            kind: FormKind::Broadcast,
            step: BROADCAST_CONFIRM_STEP,
            ..
        }))
    );
    if !awaiting {
        debug!(user_id = %dialogue.chat_id(), "Stale broadcast confirmation ignored");
        return Ok(None);
    }

    let answer = FormInput::text(if confirmed { "yes" } else { "no" });
    handle_form_input(pool, dialogue, notifier, &answer).await
}

async fn commit_form(
    pool: &SqlitePool,
    dialogue: &AdminDialogue,
    notifier: &dyn Notifier,
    commit: Commit,
) -> Result<FormOutcome> {
    let chat_id = dialogue.chat_id();

    match apply_commit(pool, notifier, commit).await {
        Ok(outcome) => {
            dialogue.exit().await?;
            Ok(outcome)
        }
        Err(StoreError::Duplicate { value, .. }) => {
            info!(user_id = %chat_id, code = %value, "Duplicate promocode, asking again");
            dialogue
                .update(AdminDialogueState::Form(FormState::new(FormKind::Promocode)))
                .await?;
            Ok(FormOutcome::Prompt(Prompt::DuplicateCode { code: value }))
        }
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to save admin form");
            dialogue.exit().await?;
            Ok(FormOutcome::SaveFailed)
        }
    }
}

/// Perform the write a finished form asks for
pub async fn apply_commit(
    pool: &SqlitePool,
    notifier: &dyn Notifier,
    commit: Commit,
) -> Result<FormOutcome, StoreError> {
    let outcome = match commit {
        Commit::Product(product) => {
            let product_id = products::create_product(pool, &product).await?;
            FormOutcome::ProductCreated {
                product_id,
                name: product.name,
                price: product.price,
            }
        }
        Commit::News {
            title,
            content,
            image_ref,
        } => {
            let news_id = news::create_news(pool, &title, &content, image_ref.as_deref()).await?;
            FormOutcome::NewsCreated { news_id, title }
        }
        Commit::Promocode {
            code,
            discount,
            max_uses,
        } => {
            promocodes::create_promocode(pool, &code, discount, max_uses).await?;
            FormOutcome::PromocodeCreated {
                code,
                discount,
                max_uses,
            }
        }
        Commit::Channel(channel) => {
            settings::set_setting(pool, settings::CHANNEL_ID, &channel).await?;
            FormOutcome::ChannelSet(channel)
        }
        Commit::Broadcast(payload) => {
            let mut report = BroadcastReport::default();
            for telegram_id in users::list_telegram_ids(pool).await? {
                if notifier.send_payload(ChatId(telegram_id), &payload).await {
                    report.sent += 1;
                } else {
                    report.failed += 1;
                }
            }
            info!(sent = report.sent, failed = report.failed, "Broadcast finished");
            FormOutcome::BroadcastFinished(report)
        }
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::dialogue::BroadcastPayload;
    use crate::notifier::RecordingNotifier;
    use teloxide::dispatching::dialogue::InMemStorage;

    #[tokio::test]
    async fn test_no_form_means_no_outcome() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        let dialogue = AdminDialogue::new(InMemStorage::new(), ChatId(1));
        let notifier = RecordingNotifier::new();

        let outcome = handle_form_input(&pool, &dialogue, &notifier, &FormInput::text("hello")).await?;
        assert_eq!(outcome, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_starting_a_form_replaces_the_old_one() -> anyhow::Result<()> {
        let dialogue = AdminDialogue::new(InMemStorage::new(), ChatId(1));

        start_form(&dialogue, FormKind::News).await?;
        let prompt = start_form(&dialogue, FormKind::Channel).await?;

        assert_eq!(prompt, Prompt::ChannelId);
        assert_eq!(
            dialogue.get().await?,
            Some(AdminDialogueState::Form(FormState::new(FormKind::Channel)))
        );
        assert!(cancel_form(&dialogue).await?);
        assert!(!cancel_form(&dialogue).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_without_form() -> anyhow::Result<()> {
        let dialogue = AdminDialogue::new(InMemStorage::new(), ChatId(1));
        assert!(!cancel_form(&dialogue).await?);
        assert_eq!(dialogue.get().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_confirm_button_ignored_outside_broadcast() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        let dialogue = AdminDialogue::new(InMemStorage::new(), ChatId(1));
        let notifier = RecordingNotifier::new();

        assert_eq!(confirm_broadcast(&pool, &dialogue, &notifier, true).await?, None);

        start_form(&dialogue, FormKind::Product).await?;
        assert_eq!(confirm_broadcast(&pool, &dialogue, &notifier, true).await?, None);
        assert_eq!(
            dialogue.get().await?,
            Some(AdminDialogueState::Form(FormState::new(FormKind::Product)))
        );

        start_form(&dialogue, FormKind::Broadcast).await?;
        assert_eq!(confirm_broadcast(&pool, &dialogue, &notifier, false).await?, None);
        assert_eq!(
            dialogue.get().await?,
            Some(AdminDialogueState::Form(FormState::new(FormKind::Broadcast)))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_failure_drops_the_form() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        let dialogue = AdminDialogue::new(InMemStorage::new(), ChatId(1));
        let notifier = RecordingNotifier::new();

        start_form(&dialogue, FormKind::Product).await?;
        pool.close().await;

        let outcome = handle_form_input(&pool, &dialogue, &notifier, &FormInput::text("Tea")).await?;
        assert_eq!(outcome, Some(FormOutcome::SaveFailed));
        assert_eq!(dialogue.get().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_broadcast_tallies_failures() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        for telegram_id in [10, 20, 30] {
            users::get_or_create_user(&pool, telegram_id).await?;
        }
        let notifier = RecordingNotifier::with_unreachable(vec![ChatId(20)]);

        let outcome = apply_commit(
            &pool,
            &notifier,
            Commit::Broadcast(BroadcastPayload::Text("Sale!".to_string())),
        )
        .await?;

        assert_eq!(outcome, FormOutcome::BroadcastFinished(BroadcastReport { sent: 2, failed: 1 }));
        assert_eq!(notifier.sent().await.len(), 2);
        Ok(())
    }
}
