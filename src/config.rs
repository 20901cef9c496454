//! Configuration module for environment variable parsing.
//!
//! All configuration is read from environment variables once at startup.
//! Per-adapter overrides (category id, payment mode id, payer, payed-for)
//! are resolved adapter-specific first, then fall back to the global
//! default; missing required settings fail startup before the loop runs.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// IMAP server hostname
    pub imap_host: String,

    /// IMAP login user
    pub imap_user: String,

    /// IMAP login password
    pub imap_password: String,

    /// Mailbox folder to search (default "Inbox")
    pub imap_inbox: String,

    /// IMAP TLS port (default 993)
    pub imap_port: u16,

    /// Cospend project URL (share link or API url)
    pub cospend_project_url: String,

    /// Optional project password; "no-pass" auth segment when absent
    pub cospend_project_password: Option<String>,

    /// Default payed-for group (comma-separated member ids)
    pub cospend_payed_for: String,

    /// Default payer member id
    pub cospend_payer: String,

    /// Default category id for new bills
    pub cospend_categoryid_default: i64,

    /// Default payment mode id for new bills
    pub cospend_paymentmodeid_default: i64,

    /// Polling interval in seconds; also seeds the retry backoff
    pub interval: u64,

    /// Lower bound for mailbox searches: "today" or an ISO date
    pub since: String,

    /// Path of the newline-delimited published-id file
    pub published_ids_file: PathBuf,

    /// Snapshot of `COSPEND_*` / `ADAPTER_*` variables taken at load time,
    /// used to resolve per-adapter overrides.
    pub adapter_env: HashMap<String, String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing required settings and unparseable values are startup errors.
    pub fn from_env() -> Result<Self> {
        let config = Config {
            imap_host: require("IMAP_HOST")?,
            imap_user: require("IMAP_USER")?,
            imap_password: require("IMAP_PASSWORD")?,
            imap_inbox: env::var("IMAP_INBOX").unwrap_or_else(|_| "Inbox".to_string()),
            imap_port: parse_or("IMAP_PORT", 993)?,
            cospend_project_url: require("COSPEND_PROJECT_URL")?,
            cospend_project_password: env::var("COSPEND_PROJECT_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
            cospend_payed_for: env::var("COSPEND_PAYED_FOR")
                .unwrap_or_else(|_| "1".to_string()),
            cospend_payer: env::var("COSPEND_PAYER").unwrap_or_else(|_| "1".to_string()),
            cospend_categoryid_default: parse_or("COSPEND_CATEGORYID_DEFAULT", 1)?,
            cospend_paymentmodeid_default: parse_or("COSPEND_PAYMENTMODEID_DEFAULT", 1)?,
            interval: parse_or("INTERVAL", 60)?,
            since: env::var("SINCE").unwrap_or_else(|_| "today".to_string()),
            published_ids_file: env::var("PUBLISHED_IDS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/published_ids.txt")),
            adapter_env: env::vars()
                .filter(|(k, _)| k.starts_with("COSPEND_") || k.starts_with("ADAPTER_"))
                .collect(),
        };

        // Validate the since cutoff up front so a bad value fails loudly at
        // startup instead of on the first search.
        if config.since != "today" {
            NaiveDate::parse_from_str(&config.since, "%Y-%m-%d")
                .with_context(|| format!("invalid SINCE date: {}", config.since))?;
        }

        Ok(config)
    }

    /// Lower-bound date for mailbox searches.
    pub fn since_date(&self) -> NaiveDate {
        if self.since == "today" {
            Local::now().date_naive()
        } else {
            // Validated in from_env; a hand-built config with a bad value
            // falls back to today.
            NaiveDate::parse_from_str(&self.since, "%Y-%m-%d")
                .unwrap_or_else(|_| Local::now().date_naive())
        }
    }

    /// Polling interval as a `Duration`.
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Whether an adapter is enabled (`ADAPTER_<NAME>_ENABLED`, default true).
    pub fn is_adapter_enabled(&self, adapter: &str) -> bool {
        let key = format!("ADAPTER_{}_ENABLED", adapter_key(adapter));
        match self.adapter_env.get(&key) {
            Some(value) => matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
            None => true,
        }
    }

    /// Category id for an adapter: `COSPEND_CATEGORYID_<NAME>` or the default.
    pub fn categoryid_for(&self, adapter: &str) -> i64 {
        self.override_for("COSPEND_CATEGORYID", adapter)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.cospend_categoryid_default)
    }

    /// Payment mode id for an adapter: `COSPEND_PAYMENTMODEID_<NAME>` or the default.
    pub fn paymentmodeid_for(&self, adapter: &str) -> i64 {
        self.override_for("COSPEND_PAYMENTMODEID", adapter)
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.cospend_paymentmodeid_default)
    }

    /// Payer member id for an adapter: `COSPEND_PAYER_<NAME>` or the default.
    pub fn payer_for(&self, adapter: &str) -> String {
        self.override_for("COSPEND_PAYER", adapter)
            .cloned()
            .unwrap_or_else(|| self.cospend_payer.clone())
    }

    /// Payed-for group for an adapter: `COSPEND_PAYED_FOR_<NAME>` or the default.
    pub fn payed_for_for(&self, adapter: &str) -> String {
        self.override_for("COSPEND_PAYED_FOR", adapter)
            .cloned()
            .unwrap_or_else(|| self.cospend_payed_for.clone())
    }

    fn override_for(&self, prefix: &str, adapter: &str) -> Option<&String> {
        self.adapter_env
            .get(&format!("{}_{}", prefix, adapter_key(adapter)))
    }
}

/// Derive the environment key fragment for an adapter name:
/// uppercased, with every non-alphanumeric run collapsed to `_`
/// (e.g. "Picnic eBon" → "PICNIC_EBON").
pub fn adapter_key(adapter: &str) -> String {
    let mut key = String::with_capacity(adapter.len());
    let mut last_sep = false;
    for ch in adapter.chars() {
        if ch.is_ascii_alphanumeric() {
            key.push(ch.to_ascii_uppercase());
            last_sep = false;
        } else if !last_sep && !key.is_empty() {
            key.push('_');
            last_sep = true;
        }
    }
    if key.ends_with('_') {
        key.pop();
    }
    key
}

fn require(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => bail!("required environment variable {} is not set", name),
    }
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
