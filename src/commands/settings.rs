use serde::Deserialize;
use serde_json::{json, Value};

use super::{normalize_payload, parse_payload, required, Kitchen};
use crate::error::KitchenError;
use crate::notify::{self, Notification};
use crate::settings::{validate_webhook_url, WebhookTarget};
use crate::webhook::{self, WebhookTransport};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingPayload {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WebhooksPayload {
    #[serde(default, alias = "main_url", alias = "n8nWebhookUrl", alias = "webhook_url")]
    main_url: Option<String>,
    #[serde(default, alias = "order_url", alias = "orderWebhookUrl")]
    order_url: Option<String>,
    #[serde(default, alias = "payment_url", alias = "paymentWebhookUrl")]
    payment_url: Option<String>,
    #[serde(default, alias = "menu_url", alias = "menuWebhookUrl")]
    menu_url: Option<String>,
}

impl WebhooksPayload {
    /// Fields that were present in the payload, paired with their target.
    fn entries(self) -> Vec<(WebhookTarget, String)> {
        [
            (WebhookTarget::Main, self.main_url),
            (WebhookTarget::Order, self.order_url),
            (WebhookTarget::Payment, self.payment_url),
            (WebhookTarget::Menu, self.menu_url),
        ]
        .into_iter()
        .filter_map(|(target, url)| url.map(|u| (target, u.trim().to_string())))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestWebhookPayload {
    #[serde(alias = "type", alias = "topic")]
    target: String,
}

pub fn settings_get_all(kitchen: &Kitchen) -> Value {
    let settings = match kitchen.settings.list() {
        Ok(s) => s,
        Err(e) => return notify::failure("Failed to load settings", &e),
    };
    let webhooks = match kitchen.settings.webhook_config() {
        Ok(w) => w,
        Err(e) => return notify::failure("Failed to load settings", &e),
    };
    notify::ok(
        json!({ "settings": settings, "webhooks": webhooks }),
        Notification::success("Settings loaded", ""),
    )
}

pub fn settings_set(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: SettingPayload = match parse_payload(arg0.unwrap_or(Value::Null), "setting") {
        Ok(p) => p,
        Err(e) => return notify::failure_message("Error", e),
    };
    let key = match required(parsed.key, "key") {
        Ok(k) => k,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.settings.set(&key, &parsed.value) {
        Ok(()) => notify::ok(
            json!({ "key": key }),
            Notification::success("Success", "Settings saved successfully"),
        ),
        Err(e) => notify::failure("Failed to save settings", &e),
    }
}

/// Save any subset of the webhook URLs. Every URL is validated before
/// anything is written.
pub fn settings_save_webhooks(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: WebhooksPayload = match parse_payload(arg0.unwrap_or(Value::Null), "webhook") {
        Ok(p) => p,
        Err(e) => return notify::failure_message("Error", e),
    };
    let entries = parsed.entries();
    if let Some(err) = entries
        .iter()
        .filter(|(_, url)| !url.is_empty())
        .find_map(|(_, url)| validate_webhook_url(url).err())
    {
        return notify::failure("Invalid URL", &err);
    }
    for (target, url) in &entries {
        if let Err(e) = kitchen.settings.set_webhook_url(*target, url) {
            return notify::failure("Failed to save webhook settings", &e);
        }
    }
    match kitchen.settings.webhook_config() {
        Ok(config) => notify::ok(
            config,
            Notification::success("Success", "Webhook settings saved successfully"),
        ),
        Err(e) => notify::failure("Failed to save webhook settings", &e),
    }
}

pub async fn settings_test_webhook<T: WebhookTransport>(
    kitchen: &Kitchen,
    transport: &T,
    arg0: Option<Value>,
) -> Value {
    let parsed: TestWebhookPayload =
        match parse_payload(normalize_payload(arg0, "target"), "test webhook") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        };
    let target = match WebhookTarget::parse(&parsed.target) {
        Ok(t) => t,
        Err(e) => return notify::failure("Error", &e),
    };
    let (url, kitchen_name) = match kitchen
        .settings
        .webhook_url_for(target)
        .and_then(|url| Ok((url, kitchen.settings.kitchen_name()?)))
    {
        Ok(pair) => pair,
        Err(e) => return notify::failure("Error", &e),
    };
    let Some(url) = url else {
        return notify::failure_message("Error", "Please configure the webhook URL first");
    };

    match webhook::send_test_webhook(transport, &url, target, &kitchen_name).await {
        Ok(status) => notify::ok(
            json!({ "target": target, "status": status }),
            Notification::success("Success", "Test webhook sent successfully"),
        ),
        Err(e) => notify::failure(
            "Failed to send test webhook",
            &KitchenError::Webhook(e.to_string()),
        ),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::kitchen;
    use crate::outbox::tests::FakeTransport;
    use crate::webhook::DeliveryError;

    #[test]
    fn invalid_url_blocks_the_whole_save() {
        let kitchen = kitchen();
        let result = settings_save_webhooks(
            &kitchen,
            Some(json!({"mainUrl": "https://n8n.example/main", "orderUrl": "not a url"})),
        );
        assert_eq!(result["success"], false);
        assert_eq!(result["notification"]["title"], "Invalid URL");
        assert_eq!(kitchen.settings.webhook_config().unwrap().main_url, None);
    }

    #[test]
    fn settings_listing_masks_secrets() {
        let kitchen = kitchen();
        settings_set(
            &kitchen,
            Some(json!({"key": "payment_key_secret", "value": "sk_live_abcdef1234"})),
        );
        settings_set(&kitchen, Some(json!({"key": "kitchen_name", "value": "Spice Route"})));
        let listed = settings_get_all(&kitchen);
        let settings = listed["data"]["settings"].as_array().unwrap();
        let secret = settings
            .iter()
            .find(|s| s["key"] == "payment_key_secret")
            .unwrap();
        assert_eq!(secret["value"], "***1234");
    }

    #[tokio::test]
    async fn test_webhook_uses_fallback_url() {
        let kitchen = kitchen();
        let transport = FakeTransport::default();

        let missing = settings_test_webhook(&kitchen, &transport, Some(json!("order"))).await;
        assert_eq!(missing["success"], false);

        settings_save_webhooks(&kitchen, Some(json!({"mainUrl": "https://n8n.example/main"})));
        let sent = settings_test_webhook(&kitchen, &transport, Some(json!({"type": "order"}))).await;
        assert_eq!(sent["success"], true, "{sent}");
        let requests = transport.sent.lock().unwrap().clone();
        assert_eq!(requests[0].0, "https://n8n.example/main");
        assert_eq!(requests[0].1["test"], true);
        assert_eq!(requests[0].1["type"], "order");
    }

    #[tokio::test]
    async fn test_webhook_reports_rejection() {
        let kitchen = kitchen();
        kitchen
            .settings
            .set_webhook_url(WebhookTarget::Menu, "https://hooks.example/menu")
            .unwrap();
        let transport = FakeTransport::with_script(vec![Err(DeliveryError::Status {
            status: 500,
            retry_after_secs: None,
            body: "boom".into(),
        })]);
        let result = settings_test_webhook(&kitchen, &transport, Some(json!("menu"))).await;
        assert_eq!(result["success"], false);
        assert_eq!(result["code"], "webhook_error");
    }
}
