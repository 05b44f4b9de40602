//! Who may use what: operator checks and the channel subscription gate.

use anyhow::Result;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use teloxide::types::Recipient;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::{settings, users};

/// Operators come from `ADMIN_IDS` or carry the admin flag in the database
pub async fn is_operator(pool: &SqlitePool, config: &Config, telegram_id: i64) -> Result<bool> {
    if config.is_operator(telegram_id) {
        return Ok(true);
    }

    let user = users::get_user_by_telegram_id(pool, telegram_id).await?;
    Ok(user.is_some_and(|user| user.is_admin))
}

/// Channel to enforce, given the stored override and the configured defaults.
///
/// The stored flag wins over `SUBSCRIPTION_CHECK`; the stored channel wins over
/// `CHANNEL_ID`. No channel means no gate.
pub fn resolve_gate(
    stored_flag: Option<bool>,
    default_flag: bool,
    stored_channel: Option<String>,
    default_channel: Option<&str>,
) -> Option<String> {
    if !stored_flag.unwrap_or(default_flag) {
        return None;
    }
    stored_channel.or_else(|| default_channel.map(str::to_string))
}

/// Whether the subscription check is on right now
pub async fn subscription_check_enabled(pool: &SqlitePool, config: &Config) -> Result<bool> {
    Ok(settings::get_flag(pool, settings::SUBSCRIPTION_CHECK)
        .await?
        .unwrap_or(config.subscription_check))
}

/// Channel new users must join, if the gate is active
pub async fn gating_channel(pool: &SqlitePool, config: &Config) -> Result<Option<String>> {
    let stored_flag = settings::get_flag(pool, settings::SUBSCRIPTION_CHECK).await?;
    let stored_channel = configured_channel(pool, config).await?;

    Ok(resolve_gate(stored_flag, config.subscription_check, stored_channel, None))
}

/// Channel from settings, else from the environment
pub async fn configured_channel(pool: &SqlitePool, config: &Config) -> Result<Option<String>> {
    Ok(settings::get_setting(pool, settings::CHANNEL_ID)
        .await?
        .or_else(|| config.channel_id.clone()))
}

pub fn channel_recipient(channel: &str) -> Recipient {
    match channel.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(channel.to_string()),
    }
}

/// Ask Telegram whether the user is in the channel; any failure counts as "no"
pub async fn is_subscribed(bot: &Bot, channel: &str, telegram_id: i64) -> bool {
    let Ok(user_id) = u64::try_from(telegram_id) else {
        return false;
    };

    match bot.get_chat_member(channel_recipient(channel), UserId(user_id)).await {
        Ok(member) => {
            debug!(user_id = telegram_id, channel, present = member.is_present(), "Checked subscription");
            member.is_present()
        }
        Err(e) => {
            warn!(user_id = telegram_id, channel, error = %e, "Subscription check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "BOT_TOKEN" => Some("t".to_string()),
            "ADMIN_IDS" => Some("100".to_string()),
            "CHANNEL_ID" => Some("@env_channel".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_gate() {
        assert_eq!(resolve_gate(None, false, Some("@a".into()), None), None);
        assert_eq!(resolve_gate(None, true, None, Some("@b")), Some("@b".to_string()));
        assert_eq!(resolve_gate(Some(false), true, Some("@a".into()), Some("@b")), None);
        assert_eq!(resolve_gate(Some(true), false, Some("@a".into()), Some("@b")), Some("@a".to_string()));
        assert_eq!(resolve_gate(Some(true), false, None, None), None);
    }

    #[tokio::test]
    async fn test_stored_flag_overrides_config() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        let config = config();

        assert_eq!(gating_channel(&pool, &config).await?, None);

        settings::set_flag(&pool, settings::SUBSCRIPTION_CHECK, true).await?;
        assert_eq!(gating_channel(&pool, &config).await?.as_deref(), Some("@env_channel"));

        settings::set_setting(&pool, settings::CHANNEL_ID, "@stored").await?;
        assert_eq!(gating_channel(&pool, &config).await?.as_deref(), Some("@stored"));
        Ok(())
    }

    #[tokio::test]
    async fn test_operators() -> anyhow::Result<()> {
        let pool = connect_in_memory().await?;
        let config = config();

        assert!(is_operator(&pool, &config, 100).await?);
        assert!(!is_operator(&pool, &config, 200).await?);

        users::get_or_create_user(&pool, 200).await?;
        users::set_admin(&pool, 200, true).await?;
        assert!(is_operator(&pool, &config, 200).await?);
        Ok(())
    }

    #[test]
    fn test_channel_recipient() {
        assert_eq!(channel_recipient("-1001234"), Recipient::Id(ChatId(-1001234)));
        assert_eq!(
            channel_recipient("@shop"),
            Recipient::ChannelUsername("@shop".to_string())
        );
    }
}
