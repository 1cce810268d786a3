use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{normalize_payload, parse_payload, Kitchen};
use crate::cart::Cart;
use crate::error::{KitchenError, KitchenResult};
use crate::models::Order;
use crate::notify::{self, Notification};

/// The signed-in storefront user, as reported by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub customer_id: Option<String>,
}

impl Session {
    pub fn signed_in(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: Some(customer_id.into()),
        }
    }

    fn customer_id(&self) -> KitchenResult<&str> {
        self.customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| KitchenError::validation("Please log in to place an order"))
    }
}

/// Freeze the cart and create the order. The cart is emptied only once the
/// order has been stored.
pub fn place_order(
    kitchen: &Kitchen,
    cart: &mut Cart,
    session: &Session,
    payment_method: &str,
) -> KitchenResult<Order> {
    let customer_id = session.customer_id()?;
    let summary = cart.checkout()?;
    let order = kitchen
        .orders
        .create_order(customer_id, summary, payment_method)?;
    cart.clear();
    info!(order_id = %order.id, "Checkout complete");
    Ok(order)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutPayload {
    #[serde(alias = "payment_method", alias = "method")]
    payment_method: String,
}

pub fn checkout_place_order(
    kitchen: &Kitchen,
    cart: &mut Cart,
    session: &Session,
    arg0: Option<Value>,
) -> Value {
    let parsed: CheckoutPayload =
        match parse_payload(normalize_payload(arg0, "paymentMethod"), "checkout") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        };
    match place_order(kitchen, cart, session, &parsed.payment_method) {
        Ok(order) => notify::ok(
            order,
            Notification::success("Order placed", "Your order has been placed successfully."),
        ),
        Err(e) => notify::failure("Error", &e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLinePayload {
    #[serde(alias = "item_id", alias = "id")]
    item_id: String,
    #[serde(default = "one")]
    quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatelessCheckoutPayload {
    #[serde(alias = "customer_id", alias = "userId", alias = "user_id")]
    customer_id: String,
    #[serde(alias = "payment_method", alias = "method")]
    payment_method: String,
    #[serde(default)]
    items: Vec<CartLinePayload>,
}

/// Checkout for callers that hold no cart: the lines are looked up in the
/// current menu and priced from it.
pub fn checkout_from_payload(kitchen: &Kitchen, arg0: Option<Value>) -> Value {
    let parsed: StatelessCheckoutPayload =
        match parse_payload(arg0.unwrap_or(Value::Null), "checkout") {
            Ok(p) => p,
            Err(e) => return notify::failure_message("Error", e),
        };
    let mut cart = Cart::new();
    for line in &parsed.items {
        let item_id = line.item_id.trim();
        // Repeated ids accumulate into one line.
        let already = cart
            .lines()
            .iter()
            .find(|l| l.item_id == item_id)
            .map_or(0, |l| l.quantity);
        let added = kitchen
            .menu
            .get_item(item_id)
            .and_then(|item| cart.add_item(&item))
            .and_then(|()| cart.set_quantity(item_id, already + line.quantity));
        if let Err(e) = added {
            return notify::failure("Error", &e);
        }
    }
    let session = Session::signed_in(parsed.customer_id);
    match place_order(kitchen, &mut cart, &session, &parsed.payment_method) {
        Ok(order) => notify::ok(
            order,
            Notification::success("Order placed", "Your order has been placed successfully."),
        ),
        Err(e) => notify::failure("Error", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::kitchen;
    use crate::menu::MenuItemDraft;
    use crate::models::MenuItem;
    use crate::status::OrderStatus;
    use serde_json::json;

    fn dish(kitchen: &Kitchen, price: f64) -> MenuItem {
        let category = kitchen.menu.create_category("Mains").unwrap();
        kitchen
            .menu
            .upsert_item(MenuItemDraft {
                id: None,
                name: "Chicken Biryani".into(),
                description: "Dum cooked".into(),
                price,
                image: None,
                category_id: category.id,
                available: true,
                is_veg: false,
            })
            .unwrap()
    }

    #[test]
    fn checkout_creates_pending_order_and_clears_cart() {
        let kitchen = kitchen();
        let item = dish(&kitchen, 100.0);
        let mut cart = Cart::new();
        cart.add_item(&item).unwrap();
        cart.add_item(&item).unwrap();

        let order = place_order(&kitchen, &mut cart, &Session::signed_in("user-1"), "upi").unwrap();
        assert_eq!(order.order_summary.total, 220.0);
        assert_eq!(order.payment_status, OrderStatus::Pending);
        assert!(cart.is_empty());
    }

    #[test]
    fn anonymous_checkout_is_rejected_and_cart_kept() {
        let kitchen = kitchen();
        let item = dish(&kitchen, 80.0);
        let mut cart = Cart::new();
        cart.add_item(&item).unwrap();

        let result = checkout_place_order(
            &kitchen,
            &mut cart,
            &Session::default(),
            Some(json!({"paymentMethod": "upi"})),
        );
        assert_eq!(result["success"], false);
        assert_eq!(
            result["notification"]["description"],
            "Please log in to place an order"
        );
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn empty_cart_and_store_failure_keep_cart() {
        let kitchen = kitchen();
        let mut cart = Cart::new();
        let err = place_order(&kitchen, &mut cart, &Session::signed_in("user-1"), "upi")
            .unwrap_err();
        assert!(matches!(err, KitchenError::Validation(_)));

        let item = dish(&kitchen, 60.0);
        cart.add_item(&item).unwrap();
        // No profile row for this user, so the insert is refused.
        let err = place_order(&kitchen, &mut cart, &Session::signed_in("ghost"), "upi")
            .unwrap_err();
        assert!(matches!(err, KitchenError::NotFound { .. }));
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn stateless_checkout_prices_from_menu() {
        let kitchen = kitchen();
        let item = dish(&kitchen, 120.0);
        let result = checkout_from_payload(
            &kitchen,
            Some(json!({
                "customerId": "user-1",
                "paymentMethod": "upi",
                "items": [{"itemId": item.id, "quantity": 3}]
            })),
        );
        assert_eq!(result["success"], true, "{result}");
        assert_eq!(result["data"]["order_summary"]["total"], 396.0);

        kitchen.menu.toggle_availability(&item.id).unwrap();
        let result = checkout_from_payload(
            &kitchen,
            Some(json!({"customerId": "user-1", "paymentMethod": "upi", "items": [{"id": item.id}]})),
        );
        assert_eq!(result["success"], false);
    }

    #[test]
    fn stateless_checkout_sums_repeated_items() {
        let kitchen = kitchen();
        let item = dish(&kitchen, 100.0);
        let result = checkout_from_payload(
            &kitchen,
            Some(json!({
                "customerId": "user-1",
                "paymentMethod": "upi",
                "items": [
                    {"itemId": item.id, "quantity": 2},
                    {"itemId": item.id, "quantity": 3}
                ]
            })),
        );
        assert_eq!(result["success"], true, "{result}");
        let items = result["data"]["order_summary"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["quantity"], 5);
        assert_eq!(result["data"]["order_summary"]["total"], 550.0);
    }

    #[test]
    fn command_accepts_bare_payment_method() {
        let kitchen = kitchen();
        let item = dish(&kitchen, 45.0);
        let mut cart = Cart::new();
        cart.add_item(&item).unwrap();
        let result = checkout_place_order(
            &kitchen,
            &mut cart,
            &Session::signed_in("user-1"),
            Some(json!("cod")),
        );
        assert_eq!(result["success"], true, "{result}");
        assert_eq!(result["data"]["payment_method"], "cod");
    }
}
