//! # Admin Dialogue
//!
//! Multi-step admin forms (product, news, promocode, channel, broadcast) as a
//! pure state machine. [`FormState::advance`] looks at one inbound message and
//! decides what happens next; it never touches the database or Telegram. The
//! bot's dialogue manager stores the state per chat and executes the
//! [`Commit`] payload when a form is complete.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::config::is_valid_channel_id;
use crate::db::products::DEFAULT_STOCK;
use crate::db::promocodes::normalize_code;
use crate::models::NewProduct;

/// Shortest promocode accepted after normalization
pub const MIN_CODE_LEN: usize = 3;
pub const MIN_DISCOUNT: i64 = 1;
pub const MAX_DISCOUNT: i64 = 100;

/// Per-chat conversation state kept in the dispatcher storage
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum AdminDialogueState {
    #[default]
    Idle,
    Form(FormState),
}

pub type AdminDialogue = Dialogue<AdminDialogueState, InMemStorage<AdminDialogueState>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Product,
    News,
    Promocode,
    Channel,
    Broadcast,
}

impl FormKind {
    /// Number of answers the form collects
    pub fn step_count(self) -> usize {
        match self {
            FormKind::Product => 5,
            FormKind::News => 3,
            FormKind::Promocode => 3,
            FormKind::Channel => 1,
            FormKind::Broadcast => 2,
        }
    }
}

/// What a broadcast sends to every user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BroadcastPayload {
    Text(String),
    Photo { file_id: String, caption: Option<String> },
}

/// Answers collected so far; which fields are used depends on the form kind
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub code: Option<String>,
    pub discount: Option<i64>,
    pub payload: Option<BroadcastPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    pub kind: FormKind,
    pub step: usize,
    pub fields: FormFields,
}

/// One inbound message reduced to what the forms can use
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormInput {
    pub text: Option<String>,
    /// File id of the largest photo size
    pub photo: Option<String>,
    pub caption: Option<String>,
}

impl FormInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn photo(file_id: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            photo: Some(file_id.into()),
            caption,
            ..Self::default()
        }
    }

    fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|text| !text.is_empty())
    }
}

/// Facts from outside the conversation needed to validate answers
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormContext {
    pub category_ids: Vec<i64>,
}

/// Message the bot sends next; rendered by the UI layer
#[derive(Clone, Debug, PartialEq)]
pub enum Prompt {
    ProductName,
    ProductDescription,
    ProductPrice,
    ProductCategory { category_ids: Vec<i64> },
    ProductImage,
    NewsTitle,
    NewsContent,
    NewsImage,
    PromocodeCode,
    PromocodeDiscount,
    PromocodeMaxUses,
    ChannelId,
    BroadcastMessage,
    BroadcastConfirm,
    TextRequired,
    InvalidPrice,
    InvalidCategory { category_ids: Vec<i64> },
    ImageOrSkip,
    CodeTooShort,
    InvalidDiscount,
    InvalidMaxUses,
    InvalidChannel,
    BroadcastEmpty,
    ConfirmYesOrNo,
    DuplicateCode { code: String },
}

impl Prompt {
    /// Whether the reply keyboard should offer the skip button
    pub fn offers_skip(&self) -> bool {
        matches!(self, Prompt::ProductImage | Prompt::NewsImage | Prompt::ImageOrSkip)
    }

    pub fn asks_confirmation(&self) -> bool {
        matches!(self, Prompt::BroadcastConfirm | Prompt::ConfirmYesOrNo)
    }
}

/// A completed form, ready to be written
#[derive(Clone, Debug, PartialEq)]
pub enum Commit {
    Product(NewProduct),
    News {
        title: String,
        content: String,
        image_ref: Option<String>,
    },
    Promocode {
        code: String,
        discount: i64,
        max_uses: Option<i64>,
    },
    Channel(String),
    Broadcast(BroadcastPayload),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// Input rejected, the step stays where it was
    Reprompt(Prompt),
    /// Answer stored, move on to the next step
    Advance(FormState, Prompt),
    /// Last answer accepted
    Commit(Commit),
    /// Form ended without anything to write
    Discard,
    Cancelled,
}

fn sentinel(text: &str) -> String {
    text.trim()
        .trim_start_matches(|c: char| !c.is_alphanumeric() && c != '/')
        .trim()
        .to_lowercase()
}

pub fn is_cancel(text: &str) -> bool {
    matches!(sentinel(text).as_str(), "cancel" | "/cancel" | "отмена" | "отменить")
}

pub fn is_skip(text: &str) -> bool {
    matches!(sentinel(text).as_str(), "skip" | "/skip" | "пропустить")
}

/// `Some(true)` for yes, `Some(false)` for no, `None` for anything else
pub fn parse_confirmation(text: &str) -> Option<bool> {
    match sentinel(text).as_str() {
        "yes" | "y" | "да" | "/yes" => Some(true),
        "no" | "n" | "нет" | "/no" => Some(false),
        _ => None,
    }
}

fn parse_positive(text: &str) -> Option<i64> {
    text.parse::<i64>().ok().filter(|value| *value > 0)
}

impl FormState {
    pub fn new(kind: FormKind) -> Self {
        Self {
            kind,
            step: 0,
            fields: FormFields::default(),
        }
    }

    /// Question asked when the form starts
    pub fn first_prompt(kind: FormKind) -> Prompt {
        match kind {
            FormKind::Product => Prompt::ProductName,
            FormKind::News => Prompt::NewsTitle,
            FormKind::Promocode => Prompt::PromocodeCode,
            FormKind::Channel => Prompt::ChannelId,
            FormKind::Broadcast => Prompt::BroadcastMessage,
        }
    }

    fn next(&self, fields: FormFields) -> FormState {
        FormState {
            kind: self.kind,
            step: self.step + 1,
            fields,
        }
    }

    pub fn advance(&self, input: &FormInput, ctx: &FormContext) -> Transition {
        if input.text.as_deref().is_some_and(is_cancel) {
            return Transition::Cancelled;
        }

        match self.kind {
            FormKind::Product => self.advance_product(input, ctx),
            FormKind::News => self.advance_news(input),
            FormKind::Promocode => self.advance_promocode(input),
            FormKind::Channel => self.advance_channel(input),
            FormKind::Broadcast => self.advance_broadcast(input),
        }
    }

    fn advance_product(&self, input: &FormInput, ctx: &FormContext) -> Transition {
        let mut fields = self.fields.clone();

        match self.step {
            0 => match input.trimmed_text() {
                Some(name) => {
                    fields.name = Some(name.to_string());
                    Transition::Advance(self.next(fields), Prompt::ProductDescription)
                }
                None => Transition::Reprompt(Prompt::ProductName),
            },
            1 => match input.trimmed_text() {
                Some(description) => {
                    fields.description = Some(description.to_string());
                    Transition::Advance(self.next(fields), Prompt::ProductPrice)
                }
                None => Transition::Reprompt(Prompt::ProductDescription),
            },
            2 => match input.trimmed_text().and_then(parse_positive) {
                Some(price) => {
                    fields.price = Some(price);
                    Transition::Advance(
                        self.next(fields),
                        Prompt::ProductCategory {
                            category_ids: ctx.category_ids.clone(),
                        },
                    )
                }
                None => Transition::Reprompt(Prompt::InvalidPrice),
            },
            3 => match input
                .trimmed_text()
                .and_then(|text| text.parse::<i64>().ok())
                .filter(|id| ctx.category_ids.contains(id))
            {
                Some(category_id) => {
                    fields.category_id = Some(category_id);
                    Transition::Advance(self.next(fields), Prompt::ProductImage)
                }
                None => Transition::Reprompt(Prompt::InvalidCategory {
                    category_ids: ctx.category_ids.clone(),
                }),
            },
            _ => {
                let image_ref = match image_answer(input) {
                    Some(image_ref) => image_ref,
                    None => return Transition::Reprompt(Prompt::ImageOrSkip),
                };

                match (fields.name, fields.description, fields.price, fields.category_id) {
                    (Some(name), Some(description), Some(price), Some(category_id)) => {
                        Transition::Commit(Commit::Product(NewProduct {
                            category_id,
                            name,
                            description,
                            price,
                            image_ref,
                            stock: DEFAULT_STOCK,
                        }))
                    }
                    _ => Transition::Discard,
                }
            }
        }
    }

    fn advance_news(&self, input: &FormInput) -> Transition {
        let mut fields = self.fields.clone();

        match self.step {
            0 => match input.trimmed_text() {
                Some(title) => {
                    fields.title = Some(title.to_string());
                    Transition::Advance(self.next(fields), Prompt::NewsContent)
                }
                None => Transition::Reprompt(Prompt::NewsTitle),
            },
            1 => match input.trimmed_text() {
                Some(content) => {
                    fields.content = Some(content.to_string());
                    Transition::Advance(self.next(fields), Prompt::NewsImage)
                }
                None => Transition::Reprompt(Prompt::NewsContent),
            },
            _ => {
                let image_ref = match image_answer(input) {
                    Some(image_ref) => image_ref,
                    None => return Transition::Reprompt(Prompt::ImageOrSkip),
                };

                match (fields.title, fields.content) {
                    (Some(title), Some(content)) => Transition::Commit(Commit::News {
                        title,
                        content,
                        image_ref,
                    }),
                    _ => Transition::Discard,
                }
            }
        }
    }

    fn advance_promocode(&self, input: &FormInput) -> Transition {
        let mut fields = self.fields.clone();

        match self.step {
            0 => {
                let code = input.trimmed_text().map(normalize_code).unwrap_or_default();
                if code.chars().count() < MIN_CODE_LEN {
                    return Transition::Reprompt(Prompt::CodeTooShort);
                }
                fields.code = Some(code);
                Transition::Advance(self.next(fields), Prompt::PromocodeDiscount)
            }
            1 => match input
                .trimmed_text()
                .and_then(|text| text.parse::<i64>().ok())
                .filter(|discount| (MIN_DISCOUNT..=MAX_DISCOUNT).contains(discount))
            {
                Some(discount) => {
                    fields.discount = Some(discount);
                    Transition::Advance(self.next(fields), Prompt::PromocodeMaxUses)
                }
                None => Transition::Reprompt(Prompt::InvalidDiscount),
            },
            _ => {
                let max_uses = match input
                    .trimmed_text()
                    .and_then(|text| text.parse::<i64>().ok())
                    .filter(|max| *max >= 0)
                {
                    Some(0) => None,
                    Some(max) => Some(max),
                    None => return Transition::Reprompt(Prompt::InvalidMaxUses),
                };

                match (fields.code, fields.discount) {
                    (Some(code), Some(discount)) => Transition::Commit(Commit::Promocode {
                        code,
                        discount,
                        max_uses,
                    }),
                    _ => Transition::Discard,
                }
            }
        }
    }

    fn advance_channel(&self, input: &FormInput) -> Transition {
        match input.trimmed_text() {
            Some(channel) if is_valid_channel_id(channel) => Transition::Commit(Commit::Channel(channel.to_string())),
            _ => Transition::Reprompt(Prompt::InvalidChannel),
        }
    }

    fn advance_broadcast(&self, input: &FormInput) -> Transition {
        let mut fields = self.fields.clone();

        match self.step {
            0 => {
                let payload = match (&input.photo, input.trimmed_text()) {
                    (Some(file_id), _) => BroadcastPayload::Photo {
                        file_id: file_id.clone(),
                        caption: input
                            .caption
                            .as_deref()
                            .map(str::trim)
                            .filter(|caption| !caption.is_empty())
                            .map(str::to_string),
                    },
                    (None, Some(text)) => BroadcastPayload::Text(text.to_string()),
                    (None, None) => return Transition::Reprompt(Prompt::BroadcastEmpty),
                };
                fields.payload = Some(payload);
                Transition::Advance(self.next(fields), Prompt::BroadcastConfirm)
            }
            _ => match input.text.as_deref().and_then(parse_confirmation) {
                Some(true) => match fields.payload {
                    Some(payload) => Transition::Commit(Commit::Broadcast(payload)),
                    None => Transition::Discard,
                },
                Some(false) => Transition::Discard,
                None => Transition::Reprompt(Prompt::ConfirmYesOrNo),
            },
        }
    }
}

/// `Some(Some(file_id))` for a photo, `Some(None)` for skip, `None` otherwise
fn image_answer(input: &FormInput) -> Option<Option<String>> {
    if let Some(file_id) = &input.photo {
        return Some(Some(file_id.clone()));
    }
    match input.text.as_deref() {
        Some(text) if is_skip(text) => Some(None),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FormContext {
        FormContext {
            category_ids: vec![1, 2, 3, 4],
        }
    }

    /// Feed answers one by one, returning the last transition
    fn run(kind: FormKind, answers: &[FormInput]) -> (FormState, Transition) {
        let mut state = FormState::new(kind);
        let mut last = Transition::Discard;
        for answer in answers {
            last = state.advance(answer, &ctx());
            if let Transition::Advance(next, _) = &last {
                state = next.clone();
            }
        }
        (state, last)
    }

    #[test]
    fn test_product_form_happy_path() {
        let (_, last) = run(
            FormKind::Product,
            &[
                FormInput::text("Test Product"),
                FormInput::text("desc"),
                FormInput::text("500"),
                FormInput::text("1"),
                FormInput::text("skip"),
            ],
        );

        assert_eq!(
            last,
            Transition::Commit(Commit::Product(NewProduct {
                category_id: 1,
                name: "Test Product".to_string(),
                description: "desc".to_string(),
                price: 500,
                image_ref: None,
                stock: DEFAULT_STOCK,
            }))
        );
    }

    #[test]
    fn test_product_photo_becomes_image_ref() {
        let (_, last) = run(
            FormKind::Product,
            &[
                FormInput::text("Pod"),
                FormInput::text("Nice pod"),
                FormInput::text("2500"),
                FormInput::text("2"),
                FormInput::photo("AgACAgIAAx", None),
            ],
        );

        match last {
            Transition::Commit(Commit::Product(product)) => {
                assert_eq!(product.image_ref.as_deref(), Some("AgACAgIAAx"));
                assert_eq!(product.category_id, 2);
            }
            other => panic!("Unexpected transition: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_price_keeps_step() {
        let (state, _) = run(FormKind::Product, &[FormInput::text("Pod"), FormInput::text("Nice pod")]);
        assert_eq!(state.step, 2);

        for bad in ["abc", "0", "-5", "12.5", ""] {
            assert_eq!(
                state.advance(&FormInput::text(bad), &ctx()),
                Transition::Reprompt(Prompt::InvalidPrice),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_category_lists_valid_ids() {
        let (state, _) = run(
            FormKind::Product,
            &[FormInput::text("Pod"), FormInput::text("Nice pod"), FormInput::text("100")],
        );

        assert_eq!(
            state.advance(&FormInput::text("9"), &ctx()),
            Transition::Reprompt(Prompt::InvalidCategory {
                category_ids: vec![1, 2, 3, 4]
            })
        );
    }

    #[test]
    fn test_image_step_rejects_plain_text() {
        let (state, _) = run(FormKind::News, &[FormInput::text("Title"), FormInput::text("Body")]);
        assert_eq!(
            state.advance(&FormInput::text("later"), &ctx()),
            Transition::Reprompt(Prompt::ImageOrSkip)
        );
        assert!(matches!(
            state.advance(&FormInput::text("Пропустить"), &ctx()),
            Transition::Commit(Commit::News { image_ref: None, .. })
        ));
    }

    #[test]
    fn test_empty_text_reprompts_same_question() {
        let state = FormState::new(FormKind::Product);
        assert_eq!(
            state.advance(&FormInput::photo("x", None), &ctx()),
            Transition::Reprompt(Prompt::ProductName)
        );
        assert_eq!(
            state.advance(&FormInput::text("   "), &ctx()),
            Transition::Reprompt(Prompt::ProductName)
        );
    }

    #[test]
    fn test_cancel_from_every_step() {
        let kinds = [
            FormKind::Product,
            FormKind::News,
            FormKind::Promocode,
            FormKind::Channel,
            FormKind::Broadcast,
        ];
        for kind in kinds {
            for step in 0..kind.step_count() {
                let state = FormState {
                    kind,
                    step,
                    fields: FormFields::default(),
                };
                for word in ["cancel", "/cancel", "❌ Отмена", "❌ Cancel", "ОТМЕНА"] {
                    assert_eq!(state.advance(&FormInput::text(word), &ctx()), Transition::Cancelled);
                }
            }
        }
    }

    #[test]
    fn test_promocode_form() {
        let (state, last) = run(
            FormKind::Promocode,
            &[FormInput::text("sale-10"), FormInput::text("10"), FormInput::text("0")],
        );

        assert_eq!(state.fields.code.as_deref(), Some("SALE10"));
        assert_eq!(
            last,
            Transition::Commit(Commit::Promocode {
                code: "SALE10".to_string(),
                discount: 10,
                max_uses: None,
            })
        );

        let (_, limited) = run(
            FormKind::Promocode,
            &[FormInput::text("VIP"), FormInput::text("100"), FormInput::text("5")],
        );
        assert!(matches!(limited, Transition::Commit(Commit::Promocode { max_uses: Some(5), .. })));
    }

    #[test]
    fn test_promocode_validation() {
        let start = FormState::new(FormKind::Promocode);
        assert_eq!(start.advance(&FormInput::text("a-b"), &ctx()), Transition::Reprompt(Prompt::CodeTooShort));
        assert_eq!(start.advance(&FormInput::text("ёж"), &ctx()), Transition::Reprompt(Prompt::CodeTooShort));

        let (discount_step, _) = run(FormKind::Promocode, &[FormInput::text("SALE")]);
        for bad in ["0", "101", "ten"] {
            assert_eq!(
                discount_step.advance(&FormInput::text(bad), &ctx()),
                Transition::Reprompt(Prompt::InvalidDiscount)
            );
        }

        let (uses_step, _) = run(FormKind::Promocode, &[FormInput::text("SALE"), FormInput::text("5")]);
        assert_eq!(
            uses_step.advance(&FormInput::text("-1"), &ctx()),
            Transition::Reprompt(Prompt::InvalidMaxUses)
        );
    }

    #[test]
    fn test_channel_form() {
        let state = FormState::new(FormKind::Channel);
        assert_eq!(
            state.advance(&FormInput::text("@vape_shop"), &ctx()),
            Transition::Commit(Commit::Channel("@vape_shop".to_string()))
        );
        assert_eq!(
            state.advance(&FormInput::text("-1001234567"), &ctx()),
            Transition::Commit(Commit::Channel("-1001234567".to_string()))
        );
        assert_eq!(
            state.advance(&FormInput::text("vape_shop"), &ctx()),
            Transition::Reprompt(Prompt::InvalidChannel)
        );
    }

    #[test]
    fn test_broadcast_confirmation() {
        let (state, _) = run(FormKind::Broadcast, &[FormInput::photo("file", Some(" Sale! ".to_string()))]);
        assert_eq!(
            state.fields.payload,
            Some(BroadcastPayload::Photo {
                file_id: "file".to_string(),
                caption: Some("Sale!".to_string()),
            })
        );

        assert!(matches!(
            state.advance(&FormInput::text("✅ Да"), &ctx()),
            Transition::Commit(Commit::Broadcast(_))
        ));
        assert_eq!(state.advance(&FormInput::text("no"), &ctx()), Transition::Discard);
        assert_eq!(
            state.advance(&FormInput::text("maybe"), &ctx()),
            Transition::Reprompt(Prompt::ConfirmYesOrNo)
        );
    }

    #[test]
    fn test_sentinels() {
        assert!(is_skip("/skip"));
        assert!(is_skip("⏭ Skip"));
        assert!(!is_skip("skipping"));
        assert!(is_cancel(" Cancel "));
        assert!(!is_cancel("cancel order"));
        assert_eq!(parse_confirmation("YES"), Some(true));
        assert_eq!(parse_confirmation("❌ Нет"), Some(false));
        assert_eq!(parse_confirmation("ok"), None);
    }

    #[test]
    fn test_state_default_is_idle() {
        assert_eq!(AdminDialogueState::default(), AdminDialogueState::Idle);
    }
}
