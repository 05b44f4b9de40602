//! # Configuration
//!
//! Runtime settings read from the process environment (after `.env` has been
//! loaded by `main`). Parsing goes through [`Config::from_lookup`] so it can be
//! exercised without touching real environment variables.

use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use url::Url;

pub const DEFAULT_WEB_APP_URL: &str = "http://localhost:8080";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://shop.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bot_token: String,
    /// Telegram ids of the operators allowed into the admin panel
    pub admin_ids: Vec<i64>,
    /// Channel whose membership gates `/start`, as `@name` or `-100...`
    pub channel_id: Option<String>,
    /// Storefront page opened by the "Open shop" button
    pub web_app_url: Url,
    pub port: u16,
    pub database_url: String,
    /// Default subscription policy when no setting overrides it
    pub subscription_check: bool,
    /// Directory with the storefront static files, served at `/`
    pub webapp_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = non_empty("BOT_TOKEN").context("BOT_TOKEN must be set")?;

        let admin_ids = match non_empty("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => Vec::new(),
        };

        let channel_id = non_empty("CHANNEL_ID");
        if let Some(channel) = &channel_id {
            if !is_valid_channel_id(channel) {
                bail!("CHANNEL_ID must start with @ or -100, got {channel}");
            }
        }

        let port = match non_empty("PORT") {
            Some(raw) => raw.parse::<u16>().with_context(|| format!("Invalid PORT: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let web_app_url = non_empty("WEB_APP_URL").unwrap_or_else(|| DEFAULT_WEB_APP_URL.to_string());
        let web_app_url = Url::parse(&web_app_url).with_context(|| format!("Invalid WEB_APP_URL: {web_app_url}"))?;

        let subscription_check = match non_empty("SUBSCRIPTION_CHECK") {
            Some(raw) => parse_bool(&raw).with_context(|| format!("Invalid SUBSCRIPTION_CHECK: {raw}"))?,
            None => false,
        };

        Ok(Self {
            bot_token,
            admin_ids,
            channel_id,
            web_app_url,
            port,
            database_url: non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            subscription_check,
            webapp_dir: non_empty("WEBAPP_DIR"),
        })
    }

    pub fn is_operator(&self, telegram_id: i64) -> bool {
        self.admin_ids.contains(&telegram_id)
    }
}

/// Comma separated list of Telegram ids; blanks are skipped
pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .with_context(|| format!("Invalid admin id: {part}"))
        })
        .collect()
}

const CHANNEL_PATTERN: &str = r"^(@[A-Za-z0-9_]+|-100[0-9]+)$";

static CHANNEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CHANNEL_PATTERN).expect("Channel pattern should be valid"));

/// A channel reference Telegram accepts: a public `@username` or a `-100...` id
pub fn is_valid_channel_id(value: &str) -> bool {
    CHANNEL_REGEX.is_match(value)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "123:abc")])).unwrap();

        assert_eq!(config.bot_token, "123:abc");
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.channel_id, None);
        assert_eq!(config.web_app_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(!config.subscription_check);
        assert_eq!(config.webapp_dir, None);
    }

    #[test]
    fn test_full_configuration() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_IDS", "111, 222,,333"),
            ("CHANNEL_ID", "@vape_shop"),
            ("PORT", "3000"),
            ("DATABASE_URL", "sqlite://data/shop.db"),
            ("SUBSCRIPTION_CHECK", "true"),
            ("WEBAPP_DIR", "./webapp"),
        ]))
        .unwrap();

        assert_eq!(config.admin_ids, vec![111, 222, 333]);
        assert!(config.is_operator(222));
        assert!(!config.is_operator(444));
        assert_eq!(config.channel_id.as_deref(), Some("@vape_shop"));
        assert_eq!(config.port, 3000);
        assert!(config.subscription_check);
        assert_eq!(config.webapp_dir.as_deref(), Some("./webapp"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_lookup(lookup_from(&[])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("BOT_TOKEN", "  ")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "12,abc")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("CHANNEL_ID", "shop")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("PORT", "99999")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("WEB_APP_URL", "not a url")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("SUBSCRIPTION_CHECK", "maybe")])).is_err());
    }

    #[test]
    fn test_channel_id_forms() {
        assert!(is_valid_channel_id("@shop"));
        assert!(is_valid_channel_id("-1001234567890"));
        assert!(!is_valid_channel_id("-42"));
        assert!(!is_valid_channel_id("shop"));
        assert!(!is_valid_channel_id("@my shop"));
        assert!(!is_valid_channel_id("-100abc"));
    }
}
