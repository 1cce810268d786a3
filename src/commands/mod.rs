//! Frontend-facing command handlers.
//!
//! Each handler takes the shared [`Kitchen`] plus a loosely typed JSON
//! payload, parses it into a typed DTO and returns a response envelope.
//! Handlers never fail: errors become `{success: false, ...}` with an
//! error toast.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::customers::CustomerRepository;
use crate::db::DbState;
use crate::diagnostics;
use crate::events::ChangeFeed;
use crate::menu::MenuRepository;
use crate::notify::{self, Notification};
use crate::orders::OrderRepository;
use crate::settings::SettingsStore;
use crate::webhook::WebhookTransport;

pub mod checkout;
pub mod customers;
pub mod dashboard;
pub mod menu;
pub mod orders;
pub mod outbox;
pub mod settings;

/// Everything a command needs, built once at start-up.
pub struct Kitchen {
    pub db: Arc<DbState>,
    pub feed: ChangeFeed,
    pub orders: OrderRepository,
    pub menu: MenuRepository,
    pub customers: CustomerRepository,
    pub settings: SettingsStore,
}

impl Kitchen {
    pub fn new(db: Arc<DbState>, config: &Config) -> Self {
        let feed = ChangeFeed::default();
        Self {
            orders: OrderRepository::new(db.clone(), feed.clone(), config.transition_policy),
            menu: MenuRepository::new(db.clone(), feed.clone()),
            customers: CustomerRepository::new(db.clone()),
            settings: SettingsStore::new(db.clone(), feed.clone()),
            feed,
            db,
        }
    }
}

/// Route a command by name. Checkout here takes its lines in the payload
/// since the caller holds no cart.
pub async fn dispatch<T: WebhookTransport>(
    kitchen: &Kitchen,
    transport: &T,
    command: &str,
    arg0: Option<Value>,
) -> Value {
    match command {
        "order_create" => orders::order_create(kitchen, arg0),
        "order_get_all" => orders::order_get_all(kitchen, arg0),
        "order_get_by_id" => orders::order_get_by_id(kitchen, arg0),
        "order_update_status" => orders::order_update_status(kitchen, arg0),
        "order_confirm_payment" => orders::order_confirm_payment(kitchen, arg0),
        "order_payment_failed" => orders::order_payment_failed(kitchen, arg0),
        "order_delete" => orders::order_delete(kitchen, arg0),
        "menu_get_categories" => menu::menu_get_categories(kitchen),
        "menu_get_items" => menu::menu_get_items(kitchen, arg0),
        "menu_create_category" => menu::menu_create_category(kitchen, arg0),
        "menu_rename_category" => menu::menu_rename_category(kitchen, arg0),
        "menu_delete_category" => menu::menu_delete_category(kitchen, arg0),
        "menu_save_item" => menu::menu_save_item(kitchen, arg0),
        "menu_delete_item" => menu::menu_delete_item(kitchen, arg0),
        "menu_toggle_availability" => menu::menu_toggle_availability(kitchen, arg0),
        "menu_reorder" => menu::menu_reorder(kitchen, arg0),
        "settings_get_all" => settings::settings_get_all(kitchen),
        "settings_set" => settings::settings_set(kitchen, arg0),
        "settings_save_webhooks" => settings::settings_save_webhooks(kitchen, arg0),
        "settings_test_webhook" => {
            settings::settings_test_webhook(kitchen, transport, arg0).await
        }
        "customer_save_profile" => customers::customer_save_profile(kitchen, arg0),
        "customer_get_profile" => customers::customer_get_profile(kitchen, arg0),
        "dashboard_get_summary" => dashboard::dashboard_get_summary(kitchen, arg0),
        "outbox_get_status" => outbox::outbox_get_status(kitchen),
        "outbox_retry_failed" => outbox::outbox_retry_failed(kitchen),
        "checkout_place_order" => checkout::checkout_from_payload(kitchen, arg0),
        "diagnostics_get_about" => notify::ok(
            diagnostics::get_about_info(),
            Notification::success("About", ""),
        ),
        other => notify::failure_message("Error", format!("Unknown command: {other}")),
    }
}

/// Accept either an object payload or a bare string standing for `key`.
pub(crate) fn normalize_payload(arg0: Option<Value>, key: &str) -> Value {
    match arg0 {
        Some(Value::String(s)) => serde_json::json!({ key: s }),
        Some(v) => v,
        None => serde_json::json!({}),
    }
}

pub(crate) fn parse_payload<T: DeserializeOwned>(payload: Value, what: &str) -> Result<T, String> {
    serde_json::from_value(payload).map_err(|e| format!("Invalid {what} payload: {e}"))
}

/// Trimmed, non-empty string field.
pub(crate) fn required(value: String, name: &str) -> Result<String, String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(format!("Missing {name}"));
    }
    Ok(value)
}
