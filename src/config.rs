use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::notify::telegram::DEFAULT_TELEGRAM_API_URL;
use crate::session::browserless::DEFAULT_BROWSERLESS_URL;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Accounts to watch, in the order they are checked each round
    pub targets: Vec<String>,
    pub interval: Duration,
    pub days_limit: i64,
    pub max_items: usize,
    pub max_scroll_attempts: usize,
    /// Pause after each scroll so lazily loaded entries can render
    pub scroll_settle: Duration,
    /// Minimum gap between two notifications
    pub send_delay: Duration,
    pub seen_path: PathBuf,
    pub capture_dir: PathBuf,
    /// Site the targets live on; `{feed_url}/{target}` is a target's page
    pub feed_url: String,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub telegram_api_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the targets and Telegram credentials,
    /// which are checked by the commands that need them.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            targets: get("FEEDWATCH_TARGETS")
                .map(|raw| parse_targets(&raw))
                .unwrap_or_default(),
            interval: Duration::from_secs(number(&get, "FEEDWATCH_INTERVAL_SECS", 600)?),
            days_limit: days_limit(&get)?,
            max_items: number(&get, "FEEDWATCH_MAX_ITEMS", 50)?,
            max_scroll_attempts: number(&get, "FEEDWATCH_MAX_SCROLLS", 5)?,
            scroll_settle: Duration::from_millis(number(&get, "FEEDWATCH_SCROLL_SETTLE_MS", 3000)?),
            send_delay: Duration::from_millis(number(&get, "FEEDWATCH_SEND_DELAY_MS", 1000)?),
            seen_path: PathBuf::from(text("FEEDWATCH_SEEN_PATH", "data/seen_items.json")),
            capture_dir: PathBuf::from(text("FEEDWATCH_CAPTURE_DIR", "data/captures")),
            feed_url: text("FEEDWATCH_FEED_URL", "https://x.com"),
            browserless_url: text("BROWSERLESS_URL", DEFAULT_BROWSERLESS_URL),
            browserless_token: get("BROWSERLESS_TOKEN"),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            telegram_chat_id: get("TELEGRAM_CHAT_ID").unwrap_or_default(),
            telegram_api_url: text("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL),
        })
    }

    /// Check that at least one target is configured.
    pub fn require_targets(&self) -> Result<()> {
        if self.targets.is_empty() {
            anyhow::bail!(
                "FEEDWATCH_TARGETS not set. Add a comma-separated list of accounts to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the Telegram bot token is configured.
    pub fn require_bot_token(&self) -> Result<()> {
        if self.telegram_bot_token.is_empty() {
            anyhow::bail!(
                "TELEGRAM_BOT_TOKEN not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that both Telegram credentials are configured.
    pub fn require_telegram(&self) -> Result<()> {
        self.require_bot_token()?;
        if self.telegram_chat_id.is_empty() {
            anyhow::bail!(
                "TELEGRAM_CHAT_ID not set. Run `feedwatch chat-ids` after messaging your bot\n\
                 to find it, then add it to your .env file."
            );
        }
        Ok(())
    }

    pub fn telegram_configured(&self) -> bool {
        !self.telegram_bot_token.is_empty() && !self.telegram_chat_id.is_empty()
    }
}

/// Split a comma or whitespace separated target list, dropping a leading `@`
/// and duplicates.
pub fn parse_targets(raw: &str) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for target in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let target = target.trim().trim_start_matches('@');
        if !target.is_empty() && !targets.iter().any(|t| t == target) {
            targets.push(target.to_string());
        }
    }
    targets
}

/// Upper bound on the window, about a century.
const MAX_DAYS_LIMIT: i64 = 36_500;

fn days_limit<G>(get: &G) -> Result<i64>
where
    G: Fn(&str) -> Option<String>,
{
    let days: i64 = number(get, "FEEDWATCH_DAYS_LIMIT", 3)?;
    if !(0..=MAX_DAYS_LIMIT).contains(&days) {
        anyhow::bail!("FEEDWATCH_DAYS_LIMIT must be between 0 and {MAX_DAYS_LIMIT}, got {days}");
    }
    Ok(days)
}

fn number<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a number, got `{raw}`")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = config(&[]).unwrap();
        assert!(c.targets.is_empty());
        assert_eq!(c.interval, Duration::from_secs(600));
        assert_eq!(c.days_limit, 3);
        assert_eq!(c.max_items, 50);
        assert_eq!(c.max_scroll_attempts, 5);
        assert_eq!(c.send_delay, Duration::from_millis(1000));
        assert_eq!(c.seen_path, PathBuf::from("data/seen_items.json"));
        assert_eq!(c.browserless_url, DEFAULT_BROWSERLESS_URL);
        assert!(c.browserless_token.is_none());
        assert!(!c.telegram_configured());
        assert!(c.require_targets().is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let c = config(&[
            ("FEEDWATCH_TARGETS", "@alice, bob,alice"),
            ("FEEDWATCH_INTERVAL_SECS", "60"),
            ("FEEDWATCH_DAYS_LIMIT", "1"),
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", "42"),
        ])
        .unwrap();
        assert_eq!(c.targets, vec!["alice", "bob"]);
        assert_eq!(c.interval, Duration::from_secs(60));
        assert_eq!(c.days_limit, 1);
        assert!(c.require_telegram().is_ok());
    }

    #[test]
    fn malformed_number_is_an_error() {
        let err = config(&[("FEEDWATCH_MAX_ITEMS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("FEEDWATCH_MAX_ITEMS"));
    }

    #[test]
    fn days_limit_out_of_range_is_an_error() {
        for raw in ["-1", "36501", "1000000000"] {
            let err = config(&[("FEEDWATCH_DAYS_LIMIT", raw)]).unwrap_err();
            assert!(err.to_string().contains("FEEDWATCH_DAYS_LIMIT"), "{raw}");
        }
        assert_eq!(config(&[("FEEDWATCH_DAYS_LIMIT", "0")]).unwrap().days_limit, 0);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let c = config(&[("FEEDWATCH_FEED_URL", "  "), ("TELEGRAM_CHAT_ID", "")]).unwrap();
        assert_eq!(c.feed_url, "https://x.com");
        assert!(c.require_telegram().is_err());
    }
}
