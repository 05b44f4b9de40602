//! # Localization Tests
//!
//! Message lookup and argument formatting through the public helpers.

use shopbot::localization::{t_args_lang, t_lang, LocalizationManager};
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("admin-panel", "en", None);
        assert!(message.contains("Admin panel"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_unsupported_language_falls_back_to_english() {
        let manager = setup_localization();

        let fallback = manager.get_message_in_language("access-denied", "unsupported", None);
        let english = manager.get_message_in_language("access-denied", "en", None);
        assert_eq!(fallback, english);
    }

    #[test]
    fn test_arguments_are_inserted() {
        let manager = setup_localization();
        let mut args = HashMap::new();
        args.insert("order_ref", "a1b2c3d4");

        let message = manager.get_message_in_language("order-accepted", "en", Some(&args));
        assert!(message.contains("#a1b2c3d4"));
        // No bidi isolation marks around arguments
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_russian_messages() {
        assert_eq!(t_lang("cancel-button", Some("ru")), "❌ Отмена");
        assert_eq!(t_lang("cancel-button", Some("en-US")), "❌ Cancel");
    }

    #[test]
    fn test_helpers_with_arguments() {
        let text = t_args_lang("broadcast-done", &[("sent", "5"), ("failed", "2")], Some("en"));
        assert!(text.contains('5'));
        assert!(text.contains('2'));
    }
}
