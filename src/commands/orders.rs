use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{normalize_payload, parse_payload, required, Kitchen};
use crate::models::OrderSummary;
use crate::notify::{self, Notification};
use crate::orders::OrderFilter;
use crate::status::OrderStatus;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreatePayload {
    #[serde(alias = "customer_id", alias = "userId", alias = "user_id")]
    customer_id: String,
    #[serde(alias = "order_summary")]
    order_summary: OrderSummary,
    #[serde(alias = "payment_method")]
    payment_method: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderIdPayload {
    #[serde(alias = "order_id", alias = "id")]
    order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderUpdateStatusPayload {
    #[serde(alias = "order_id", alias = "id")]
    order_id: String,
    #[serde(alias = "payment_status", alias = "paymentStatus")]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderConfirmPaymentPayload {
    #[serde(alias = "order_id", alias = "id")]
    order_id: String,
    #[serde(alias = "transaction_id", alias = "paymentId", alias = "payment_id")]
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderPaymentFailedPayload {
    #[serde(alias = "order_id", alias = "id")]
    order_id: String,
    #[serde(default, alias = "error", alias = "description")]
    reason: Option<String>,
}

fn parse_order_id(arg0: Option<Value>) -> Result<String, String> {
    let parsed: OrderIdPayload = parse_payload(normalize_payload(arg0, "orderId"), "order")?;
    required(parsed.order_id, "orderId")
}

fn parse_update_status_payload(arg0: Option<Value>) -> Result<(String, OrderStatus), String> {
    let parsed: OrderUpdateStatusPayload =
        parse_payload(normalize_payload(arg0, "orderId"), "order status")?;
    let order_id = required(parsed.order_id, "orderId")?;
    let status = required(parsed.status, "status")?
        .parse::<OrderStatus>()
        .map_err(|e| e.to_string())?;
    Ok((order_id, status))
}

pub fn order_create(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: OrderCreatePayload = match parse_payload(arg0.unwrap_or(Value::Null), "order") {
        Ok(p) => p,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.orders.create_order(
        &parsed.customer_id,
        parsed.order_summary,
        &parsed.payment_method,
    ) {
        Ok(order) => notify::ok(
            order,
            Notification::success("Order placed", "Your order has been placed successfully."),
        ),
        Err(e) => notify::failure("Error", &e),
    }
}

pub fn order_get_all(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let filter: OrderFilter = match arg0 {
        None | Some(Value::Null) => OrderFilter::default(),
        Some(v) => match parse_payload(v, "order filter") {
            Ok(f) => f,
            Err(e) => return notify::failure_message("Error", e),
        },
    };
    match kitchen.orders.list_orders(&filter) {
        Ok(orders) => {
            debug!(count = orders.len(), filtered = !filter.is_empty(), "Orders listed");
            notify::ok(orders, Notification::success("Orders loaded", ""))
        }
        Err(e) => notify::failure("Failed to fetch orders", &e),
    }
}

pub fn order_get_by_id(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let order_id = match parse_order_id(arg0) {
        Ok(id) => id,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.orders.get_order(&order_id) {
        Ok(order) => notify::ok(order, Notification::success("Order loaded", "")),
        Err(e) => notify::failure("Failed to fetch order", &e),
    }
}

pub fn order_update_status(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let (order_id, status) = match parse_update_status_payload(arg0) {
        Ok(p) => p,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.orders.update_status(&order_id, status) {
        Ok(order) => notify::ok(
            order,
            Notification::success(
                "Success",
                format!("Order status updated to {}", status.label()),
            ),
        ),
        Err(e) => notify::failure("Failed to update order status", &e),
    }
}

pub fn order_confirm_payment(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: OrderConfirmPaymentPayload =
        match parse_payload(normalize_payload(arg0, "orderId"), "payment") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        };
    match kitchen
        .orders
        .confirm_payment(parsed.order_id.trim(), &parsed.transaction_id)
    {
        Ok(order) => notify::ok(
            order,
            Notification::success("Payment successful", "Your order has been confirmed."),
        ),
        Err(e) => notify::failure("Payment error", &e),
    }
}

pub fn order_payment_failed(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: OrderPaymentFailedPayload =
        match parse_payload(normalize_payload(arg0, "orderId"), "payment") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        };
    let reason = parsed.reason.unwrap_or_default();
    match kitchen
        .orders
        .record_payment_failure(parsed.order_id.trim(), &reason)
    {
        // The command itself succeeded; the toast reports the failed payment.
        Ok(order) => notify::ok(
            order,
            Notification::error(
                "Payment failed",
                if reason.trim().is_empty() {
                    "Your payment could not be completed.".to_string()
                } else {
                    reason
                },
            ),
        ),
        Err(e) => notify::failure("Payment error", &e),
    }
}

pub fn order_delete(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let order_id = match parse_order_id(arg0) {
        Ok(id) => id,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.orders.delete_order(&order_id) {
        Ok(()) => notify::ok(
            serde_json::json!({ "orderId": order_id }),
            Notification::success("Order deleted", ""),
        ),
        Err(e) => notify::failure("Failed to delete order", &e),
    }
}
