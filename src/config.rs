//! Process configuration read from the environment.
//!
//! Operator-level settings (webhook URLs, gateway keys, kitchen name) live
//! in the settings table, not here.

use std::path::PathBuf;
use std::time::Duration;

use crate::outbox::DEFAULT_BATCH_SIZE;
use crate::status::TransitionPolicy;
use crate::webhook::DEFAULT_TIMEOUT;

const APP_DIR: &str = "cloud-kitchen";
const DEFAULT_OUTBOX_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_json: bool,
    pub outbox_interval: Duration,
    pub outbox_batch: usize,
    pub webhook_timeout: Duration,
    pub transition_policy: TransitionPolicy,
}

fn default_base_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                .join(".local")
                .join("share")
        })
        .join(APP_DIR)
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(
        raw.as_deref().map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

fn parse_positive<T: std::str::FromStr + PartialOrd + Default>(
    raw: Option<String>,
    default: T,
) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unset or unparsable values
    /// fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("KITCHEN_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_base_dir);
        let log_dir = lookup("KITCHEN_LOG_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("logs"));

        Self {
            log_json: parse_flag(lookup("KITCHEN_LOG_JSON")),
            outbox_interval: Duration::from_secs(parse_positive(
                lookup("KITCHEN_OUTBOX_INTERVAL_SECS"),
                DEFAULT_OUTBOX_INTERVAL_SECS,
            )),
            outbox_batch: parse_positive(lookup("KITCHEN_OUTBOX_BATCH"), DEFAULT_BATCH_SIZE),
            webhook_timeout: Duration::from_secs(parse_positive(
                lookup("KITCHEN_WEBHOOK_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT.as_secs(),
            )),
            transition_policy: if parse_flag(lookup("KITCHEN_STRICT_STATUS")) {
                TransitionPolicy::Strict
            } else {
                TransitionPolicy::Unrestricted
            },
            data_dir,
            log_dir,
        }
    }
}
