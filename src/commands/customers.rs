use serde::Deserialize;
use serde_json::Value;

use super::{normalize_payload, parse_payload, required, Kitchen};
use crate::models::Customer;
use crate::notify::{self, Notification};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerProfilePayload {
    #[serde(alias = "customer_id", alias = "userId", alias = "user_id", alias = "id")]
    customer_id: String,
    #[serde(default, alias = "full_name", alias = "fullName")]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerIdPayload {
    #[serde(alias = "customer_id", alias = "userId", alias = "user_id", alias = "id")]
    customer_id: String,
}

pub fn customer_save_profile(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: CustomerProfilePayload =
        match parse_payload(arg0.unwrap_or(Value::Null), "profile") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        };
    let profile = Customer {
        id: parsed.customer_id,
        name: parsed.name,
        email: parsed.email,
        phone: parsed.phone,
        address: parsed.address,
    };
    match kitchen.customers.upsert_customer(profile) {
        Ok(customer) => notify::ok(
            customer,
            Notification::success("Success", "Profile updated successfully"),
        ),
        Err(e) => notify::failure("Failed to update profile", &e),
    }
}

pub fn customer_get_profile(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let customer_id = match parse_payload::<CustomerIdPayload>(
        normalize_payload(arg0, "customerId"),
        "profile",
    )
    .and_then(|p| required(p.customer_id, "customerId"))
    {
        Ok(id) => id,
        Err(e) => return notify::failure_message("Error", e),
    };
    match kitchen.customers.get_customer(&customer_id) {
        Ok(customer) => notify::ok(customer, Notification::success("Profile loaded", "")),
        Err(e) => notify::failure("Failed to load profile", &e),
    }
}
