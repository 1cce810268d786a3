//! Operator settings: key/value pairs upserted by key.
//!
//! Holds the kitchen profile, automation webhook URLs and payment gateway
//! credentials. Secret values are masked when listed and handed out as
//! [`Zeroizing`] strings.

use reqwest::Url;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

use crate::db::{self, DbState};
use crate::error::{KitchenError, KitchenResult};
use crate::events::{Change, ChangeEvent, ChangeFeed, ChangeKind};
use crate::models::Setting;

pub const KEY_KITCHEN_NAME: &str = "kitchen_name";
pub const KEY_PAYMENT_KEY_ID: &str = "payment_key_id";
pub const KEY_PAYMENT_KEY_SECRET: &str = "payment_key_secret";

pub const DEFAULT_KITCHEN_NAME: &str = "Cloud Kitchen";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookTarget {
    /// Catch-all URL used when a topic has no dedicated hook.
    Main,
    Order,
    Payment,
    Menu,
}

impl WebhookTarget {
    pub const ALL: [WebhookTarget; 4] = [
        WebhookTarget::Main,
        WebhookTarget::Order,
        WebhookTarget::Payment,
        WebhookTarget::Menu,
    ];

    pub fn setting_key(self) -> &'static str {
        match self {
            WebhookTarget::Main => "webhook_main_url",
            WebhookTarget::Order => "webhook_order_url",
            WebhookTarget::Payment => "webhook_payment_url",
            WebhookTarget::Menu => "webhook_menu_url",
        }
    }

    pub fn parse(raw: &str) -> KitchenResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "main" | "n8n" => Ok(WebhookTarget::Main),
            "order" | "orders" => Ok(WebhookTarget::Order),
            "payment" | "payments" => Ok(WebhookTarget::Payment),
            "menu" => Ok(WebhookTarget::Menu),
            other => Err(KitchenError::validation(format!(
                "Unknown webhook type: {other}"
            ))),
        }
    }
}

/// Whether a setting holds a credential that must never be echoed back.
pub fn is_sensitive_setting(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.ends_with("_secret")
        || lower.contains("password")
        || lower.contains("token")
        || lower.contains("api_key")
}

pub fn mask_secret(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() <= 4 {
        return "****".to_string();
    }
    let suffix: String = trimmed
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<char>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{suffix}")
}

pub fn validate_webhook_url(url: &str) -> KitchenResult<()> {
    let invalid = || KitchenError::validation("Please enter a valid webhook URL.");
    let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "https" && scheme != "http" {
        return Err(invalid());
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Kitchen display name used in outbound payloads.
pub fn kitchen_name(conn: &Connection) -> KitchenResult<String> {
    Ok(db::get_setting(conn, KEY_KITCHEN_NAME)?
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_KITCHEN_NAME.to_string()))
}

/// Configured URL for `target`, falling back to the main hook.
pub fn webhook_url_for(conn: &Connection, target: WebhookTarget) -> KitchenResult<Option<String>> {
    let read = |t: WebhookTarget| -> KitchenResult<Option<String>> {
        Ok(db::get_setting(conn, t.setting_key())?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    };
    match read(target)? {
        Some(url) => Ok(Some(url)),
        None if target != WebhookTarget::Main => read(WebhookTarget::Main),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub main_url: Option<String>,
    pub order_url: Option<String>,
    pub payment_url: Option<String>,
    pub menu_url: Option<String>,
}

pub struct SettingsStore {
    db: Arc<DbState>,
    feed: ChangeFeed,
}

impl SettingsStore {
    pub fn new(db: Arc<DbState>, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    pub fn get(&self, key: &str) -> KitchenResult<Option<String>> {
        self.db.read(|conn| db::get_setting(conn, key))
    }

    /// Upsert `key`. Webhook URL keys are validated; an empty value clears them.
    pub fn set(&self, key: &str, value: &str) -> KitchenResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(KitchenError::validation("Setting key is required"));
        }
        let is_webhook = WebhookTarget::ALL.iter().any(|t| t.setting_key() == key);
        if is_webhook && value.trim().is_empty() {
            self.delete(key)?;
            return Ok(());
        }
        if is_webhook {
            validate_webhook_url(value)?;
        }

        self.db.write(|tx| db::set_setting(tx, key, value.trim()))?;
        if is_sensitive_setting(key) {
            info!(key = %key, "Sensitive setting updated");
        } else {
            info!(key = %key, value = %value.trim(), "Setting updated");
        }
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Update,
            Change::Setting { key: key.to_string() },
        ));
        Ok(())
    }

    pub fn delete(&self, key: &str) -> KitchenResult<bool> {
        let removed = self.db.write(|tx| db::delete_setting(tx, key))?;
        if removed {
            info!(key = %key, "Setting removed");
            self.feed.publish(ChangeEvent::new(
                ChangeKind::Delete,
                Change::Setting { key: key.to_string() },
            ));
        }
        Ok(removed)
    }

    /// All settings with sensitive values masked.
    pub fn list(&self) -> KitchenResult<Vec<Setting>> {
        let rows = self.db.read(db::get_all_settings)?;
        Ok(rows
            .into_iter()
            .map(|(key, value)| {
                let value = if is_sensitive_setting(&key) {
                    mask_secret(&value)
                } else {
                    value
                };
                Setting { key, value }
            })
            .collect())
    }

    pub fn get_secret(&self, key: &str) -> KitchenResult<Option<Zeroizing<String>>> {
        Ok(self.get(key)?.map(Zeroizing::new))
    }

    pub fn kitchen_name(&self) -> KitchenResult<String> {
        self.db.read(kitchen_name)
    }

    pub fn set_webhook_url(&self, target: WebhookTarget, url: &str) -> KitchenResult<()> {
        self.set(target.setting_key(), url)
    }

    pub fn webhook_url_for(&self, target: WebhookTarget) -> KitchenResult<Option<String>> {
        self.db.read(|conn| webhook_url_for(conn, target))
    }

    pub fn webhook_config(&self) -> KitchenResult<WebhookConfig> {
        self.db.read(|conn| {
            let get = |t: WebhookTarget| -> KitchenResult<Option<String>> {
                db::get_setting(conn, t.setting_key())
            };
            Ok(WebhookConfig {
                main_url: get(WebhookTarget::Main)?,
                order_url: get(WebhookTarget::Order)?,
                payment_url: get(WebhookTarget::Payment)?,
                menu_url: get(WebhookTarget::Menu)?,
            })
        })
    }

    /// Store the payment gateway key pair. Both halves are required.
    pub fn set_payment_credentials(&self, key_id: &str, key_secret: &str) -> KitchenResult<()> {
        if key_id.trim().is_empty() || key_secret.trim().is_empty() {
            return Err(KitchenError::validation(
                "Both the key id and the key secret are required",
            ));
        }
        self.set(KEY_PAYMENT_KEY_ID, key_id)?;
        self.set(KEY_PAYMENT_KEY_SECRET, key_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SettingsStore {
        SettingsStore::new(Arc::new(db::open_in_memory().unwrap()), ChangeFeed::default())
    }

    #[test]
    fn upsert_keeps_one_row_per_key() {
        let store = store();
        store.set("kitchen_name", "Tandoor Hub").unwrap();
        store.set("kitchen_name", "Tandoor Hub Koramangala").unwrap();
        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, "Tandoor Hub Koramangala");
        assert_eq!(store.kitchen_name().unwrap(), "Tandoor Hub Koramangala");
    }

    #[test]
    fn unparseable_webhook_urls_are_rejected() {
        for url in ["https://%%%", "http://[::", "https://:/", "http://exa\0mple", "n8n.example/hook"] {
            assert!(validate_webhook_url(url).is_err(), "accepted {url:?}");
        }
        assert!(validate_webhook_url(" https://n8n.example/webhook/orders ").is_ok());
        assert!(validate_webhook_url("http://192.168.1.20:5678/webhook").is_ok());
    }

    #[test]
    fn kitchen_name_defaults_when_unset() {
        assert_eq!(store().kitchen_name().unwrap(), DEFAULT_KITCHEN_NAME);
    }

    #[test]
    fn webhook_urls_are_validated_and_fall_back_to_main() {
        let store = store();
        let err = store
            .set_webhook_url(WebhookTarget::Order, "ftp://hooks.example")
            .unwrap_err();
        assert!(matches!(err, KitchenError::Validation(_)));
        assert!(store.set_webhook_url(WebhookTarget::Main, "https://").is_err());

        store
            .set_webhook_url(WebhookTarget::Main, "https://n8n.example/webhook/main")
            .unwrap();
        assert_eq!(
            store.webhook_url_for(WebhookTarget::Menu).unwrap().as_deref(),
            Some("https://n8n.example/webhook/main")
        );

        store
            .set_webhook_url(WebhookTarget::Menu, "http://localhost:5678/webhook/menu")
            .unwrap();
        assert_eq!(
            store.webhook_url_for(WebhookTarget::Menu).unwrap().as_deref(),
            Some("http://localhost:5678/webhook/menu")
        );

        // Clearing the dedicated hook restores the fallback.
        store.set_webhook_url(WebhookTarget::Menu, "  ").unwrap();
        assert_eq!(store.webhook_config().unwrap().menu_url, None);
        assert_eq!(
            store.webhook_url_for(WebhookTarget::Menu).unwrap().as_deref(),
            Some("https://n8n.example/webhook/main")
        );
    }

    #[test]
    fn secrets_are_masked_in_listing() {
        let store = store();
        store
            .set_payment_credentials("rzp_test_key", "s3cr3t-value-9876")
            .unwrap();
        let listed = store.list().unwrap();
        let secret = listed
            .iter()
            .find(|s| s.key == KEY_PAYMENT_KEY_SECRET)
            .unwrap();
        assert_eq!(secret.value, "***9876");
        let key_id = listed.iter().find(|s| s.key == KEY_PAYMENT_KEY_ID).unwrap();
        assert_eq!(key_id.value, "rzp_test_key");

        let raw = store.get_secret(KEY_PAYMENT_KEY_SECRET).unwrap().unwrap();
        assert_eq!(raw.as_str(), "s3cr3t-value-9876");
    }

    #[test]
    fn payment_credentials_require_both_halves() {
        let err = store().set_payment_credentials("rzp_live", " ").unwrap_err();
        assert!(matches!(err, KitchenError::Validation(_)));
    }

    #[test]
    fn set_publishes_key_only_change() {
        let feed = ChangeFeed::default();
        let store = SettingsStore::new(Arc::new(db::open_in_memory().unwrap()), feed.clone());
        let mut rx = feed.subscribe();
        store.set(KEY_PAYMENT_KEY_SECRET, "hidden").unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(
            event.change,
            Change::Setting {
                key: KEY_PAYMENT_KEY_SECRET.into()
            }
        );
    }

    #[test]
    fn mask_secret_handles_short_values() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("abcdefgh"), "***efgh");
        assert!(is_sensitive_setting("payment_key_secret"));
        assert!(!is_sensitive_setting("kitchen_name"));
    }
}
