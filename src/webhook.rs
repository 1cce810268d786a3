//! Automation webhook client and payload builders.
//!
//! Payloads are built inside the mutation's transaction and stored in the
//! outbox; the transport here is only used by the outbox worker and the
//! operator's "send test" button.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::timestamp_now;
use crate::models::{Customer, Order};
use crate::settings::WebhookTarget;

/// Default timeout for webhook requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap on how much of an error response body is kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeliveryError {
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        retry_after_secs: Option<u64>,
        body: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DeliveryError::Status { status, .. } => Some(*status),
            DeliveryError::Transport(_) => None,
        }
    }

    /// The receiver asked us to slow down.
    pub fn is_backpressure(&self) -> bool {
        self.http_status() == Some(429)
    }

    /// The receiver rejected the request itself; retrying won't help.
    pub fn is_permanent(&self) -> bool {
        matches!(self.http_status(), Some(s) if (400..500).contains(&s) && s != 408 && s != 429)
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            DeliveryError::Status {
                retry_after_secs, ..
            } => *retry_after_secs,
            DeliveryError::Transport(_) => None,
        }
    }
}

/// Something that can POST a JSON payload to a URL.
pub trait WebhookTransport: Send + Sync {
    /// Returns the HTTP status on 2xx.
    fn post(
        &self,
        url: &str,
        payload: &Value,
    ) -> impl Future<Output = Result<u16, DeliveryError>> + Send;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpWebhookClient {
    client: Client,
}

impl HttpWebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cloud-kitchen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Transport(format!("build http client: {e}")))?;
        Ok(Self { client })
    }
}

impl WebhookTransport for HttpWebhookClient {
    async fn post(&self, url: &str, payload: &Value) -> Result<u16, DeliveryError> {
        let started = Instant::now();
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Transport(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    DeliveryError::Transport(format!("cannot reach {url}: {e}"))
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.is_success() {
            debug!(url = %url, status = status.as_u16(), elapsed_ms, "Webhook delivered");
            return Ok(status.as_u16());
        }

        let retry_after_secs = if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        } else {
            None
        };
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        warn!(url = %url, status = status.as_u16(), elapsed_ms, "Webhook rejected");
        Err(DeliveryError::Status {
            status: status.as_u16(),
            retry_after_secs,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Payload builders
// ---------------------------------------------------------------------------

/// Payment state reported to automations, derived from the order record.
fn payment_state(order: &Order) -> &'static str {
    if order.transaction_id.is_some() {
        "success"
    } else {
        "pending"
    }
}

/// Order event payload: `{order_id, customer_name, phone, address, order,
/// payment_status, transaction_id, status, timestamp, ...}`.
pub fn order_payload(
    event: &str,
    order: &Order,
    customer: Option<&Customer>,
    kitchen_name: &str,
) -> Value {
    json!({
        "event": event,
        "kitchen_name": kitchen_name,
        "order_id": order.id,
        "customer_id": order.customer_id,
        "customer_name": customer.map(|c| c.name.as_str()),
        "phone": customer.and_then(|c| c.phone.as_deref()),
        "address": customer.and_then(|c| c.address.as_deref()),
        "order": order.order_summary.line_descriptions(),
        "total": order.order_summary.total,
        "payment_method": order.payment_method,
        "payment_status": payment_state(order),
        "transaction_id": order.transaction_id,
        "status": order.payment_status,
        "timestamp": timestamp_now(),
    })
}

/// Payment failure payload. The order itself stays `pending`.
pub fn payment_failure_payload(
    order: &Order,
    customer: Option<&Customer>,
    reason: &str,
    kitchen_name: &str,
) -> Value {
    let mut payload = order_payload("payment_failed", order, customer, kitchen_name);
    if let Value::Object(obj) = &mut payload {
        obj.insert("payment_status".into(), json!("failed"));
        obj.insert("failure_reason".into(), json!(reason));
    }
    payload
}

/// Menu event payload: `{action, entity, kitchen_name, timestamp}` plus the
/// affected record under `item`.
pub fn menu_payload(action: &str, entity: &str, item: Value, kitchen_name: &str) -> Value {
    json!({
        "action": action,
        "entity": entity,
        "item": item,
        "kitchen_name": kitchen_name,
        "timestamp": timestamp_now(),
    })
}

/// Payload sent by the settings screen's "test" button.
pub fn test_payload(target: WebhookTarget, kitchen_name: &str) -> Value {
    json!({
        "test": true,
        "type": target,
        "timestamp": timestamp_now(),
        "kitchen_name": kitchen_name,
    })
}

/// Post the test payload straight to `url`, bypassing the outbox.
pub async fn send_test_webhook<T: WebhookTransport>(
    transport: &T,
    url: &str,
    target: WebhookTarget,
    kitchen_name: &str,
) -> Result<u16, DeliveryError> {
    let payload = test_payload(target, kitchen_name);
    let status = transport.post(url, &payload).await?;
    debug!(url = %url, target = ?target, status, "Test webhook delivered");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderLine, OrderSummary};
    use crate::status::OrderStatus;
    use chrono::Utc;

    fn order(transaction_id: Option<&str>) -> Order {
        Order {
            id: "ord_001".into(),
            customer_id: "c-1".into(),
            order_summary: OrderSummary::from_lines(vec![
                OrderLine {
                    id: "i1".into(),
                    name: "Butter Chicken".into(),
                    price: 320.0,
                    quantity: 2,
                },
                OrderLine {
                    id: "i2".into(),
                    name: "Naan".into(),
                    price: 40.0,
                    quantity: 4,
                },
            ]),
            payment_status: OrderStatus::Confirmed,
            payment_method: "upi".into(),
            transaction_id: transaction_id.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn customer() -> Customer {
        Customer {
            id: "c-1".into(),
            name: "John Doe".into(),
            email: Some("john@example.com".into()),
            phone: Some("+91-98765-43210".into()),
            address: Some("123 MG Road, Bangalore".into()),
        }
    }

    #[test]
    fn order_payload_mirrors_order() {
        let payload = order_payload(
            "status_updated",
            &order(Some("pay_123456")),
            Some(&customer()),
            "CloudKitchen Demo",
        );
        assert_eq!(payload["order_id"], "ord_001");
        assert_eq!(payload["customer_name"], "John Doe");
        assert_eq!(payload["phone"], "+91-98765-43210");
        assert_eq!(payload["order"], json!(["2x Butter Chicken", "4x Naan"]));
        assert_eq!(payload["payment_status"], "success");
        assert_eq!(payload["transaction_id"], "pay_123456");
        assert_eq!(payload["status"], "confirmed");
        assert_eq!(payload["total"], 880.0);
        assert!(payload["timestamp"].as_str().is_some());
    }

    #[test]
    fn order_payload_without_customer_profile() {
        let payload = order_payload("order_created", &order(None), None, "Kitchen");
        assert!(payload["customer_name"].is_null());
        assert_eq!(payload["payment_status"], "pending");
    }

    #[test]
    fn payment_failure_overrides_payment_status() {
        let payload = payment_failure_payload(&order(None), None, "card declined", "Kitchen");
        assert_eq!(payload["payment_status"], "failed");
        assert_eq!(payload["failure_reason"], "card declined");
        assert_eq!(payload["event"], "payment_failed");
    }

    #[test]
    fn menu_and_test_payload_shapes() {
        let payload = menu_payload(
            "delete",
            "menu_item",
            json!({"id": "i1", "name": "Naan"}),
            "Kitchen",
        );
        assert_eq!(payload["action"], "delete");
        assert_eq!(payload["entity"], "menu_item");
        assert_eq!(payload["item"]["name"], "Naan");

        let payload = test_payload(WebhookTarget::Order, "Kitchen");
        assert_eq!(payload["test"], true);
        assert_eq!(payload["type"], "order");
    }

    #[test]
    fn delivery_error_classification() {
        let status = |s: u16| DeliveryError::Status {
            status: s,
            retry_after_secs: None,
            body: String::new(),
        };
        assert!(status(429).is_backpressure());
        assert!(!status(429).is_permanent());
        assert!(status(404).is_permanent());
        assert!(!status(408).is_permanent());
        assert!(!status(503).is_permanent());
        assert!(!DeliveryError::Transport("reset".into()).is_permanent());
    }
}
