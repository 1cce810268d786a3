//! Toast notifications attached to every command response.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::KitchenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// `{success: true, data, notification}`
pub fn ok<T: Serialize>(data: T, notification: Notification) -> Value {
    match serde_json::to_value(data) {
        Ok(data) => json!({
            "success": true,
            "data": data,
            "notification": notification,
        }),
        Err(e) => failure_message("Error", format!("Failed to encode response: {e}")),
    }
}

/// `{success: false, error, code, notification}` for a repository error.
/// Store failures are logged at error level, user errors at warn.
pub fn failure(title: &str, err: &KitchenError) -> Value {
    if err.is_user_error() {
        warn!(code = err.code(), "{title}: {err}");
    } else {
        error!(code = err.code(), "{title}: {err}");
    }
    json!({
        "success": false,
        "error": err.to_string(),
        "code": err.code(),
        "notification": Notification::error(title, err.to_string()),
    })
}

/// Failure for problems caught before reaching a repository, such as a
/// payload that does not parse.
pub fn failure_message(title: &str, message: impl Into<String>) -> Value {
    let message = message.into();
    warn!("{title}: {message}");
    json!({
        "success": false,
        "error": message,
        "code": "validation_error",
        "notification": Notification::error(title, message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let value = ok(
            json!({"id": "o-1"}),
            Notification::success("Order placed", "We have received your order."),
        );
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["id"], "o-1");
        assert_eq!(value["notification"]["level"], "success");
    }

    #[test]
    fn failure_envelope_carries_code_and_toast() {
        let value = failure("Error", &KitchenError::validation("Your cart is empty"));
        assert_eq!(value["success"], false);
        assert_eq!(value["code"], "validation_error");
        assert_eq!(value["notification"]["level"], "error");
        assert_eq!(value["notification"]["description"], "Your cart is empty");
    }
}
