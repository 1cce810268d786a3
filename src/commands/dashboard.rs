use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{normalize_payload, parse_payload, Kitchen};
use crate::notify::{self, Notification};
use crate::orders::OrderFilter;
use crate::stats::{dashboard_summary, payment_summary};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DashboardPayload {
    #[serde(default)]
    date: Option<NaiveDate>,
}

pub fn dashboard_get_summary(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: DashboardPayload = match arg0 {
        None | Some(Value::Null) => DashboardPayload::default(),
        Some(v) => match parse_payload(normalize_payload(Some(v), "date"), "dashboard") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        },
    };
    let day = parsed.date.unwrap_or_else(|| Utc::now().date_naive());

    let orders = match kitchen.orders.list_orders(&OrderFilter::default()) {
        Ok(o) => o,
        Err(e) => return notify::failure("Failed to load dashboard", &e),
    };
    notify::ok(
        json!({
            "summary": dashboard_summary(&orders, day),
            "payments": payment_summary(&orders),
        }),
        Notification::success("Dashboard loaded", ""),
    )
}
