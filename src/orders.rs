//! Order repository.
//!
//! Orders are created at checkout with a frozen summary, then moved through
//! the status workflow by the kitchen. Every mutation records its webhook
//! notification in the outbox within the same transaction and publishes a
//! change event once committed.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::customers::load_customer;
use crate::db::{format_timestamp, now_millis, DbState};
use crate::error::{KitchenError, KitchenResult};
use crate::events::{Change, ChangeEvent, ChangeFeed, ChangeKind};
use crate::models::{Order, OrderRow, OrderSummary, ORDER_COLUMNS};
use crate::outbox::{self, Topic};
use crate::settings;
use crate::status::{OrderStatus, TransitionPolicy};
use crate::webhook;

/// Query-side filter for order lists. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Case-insensitive substring of the customer's name.
    #[serde(default, alias = "customer_name", alias = "search")]
    pub customer_name: Option<String>,
    /// Calendar day of `created_at`, UTC.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, alias = "customer_id")]
    pub customer_id: Option<String>,
}

impl OrderFilter {
    pub fn is_empty(&self) -> bool {
        self == &OrderFilter::default()
    }

    /// `customer_name` is the name joined from the order's customer row.
    pub fn matches(&self, order: &Order, customer_name: Option<&str>) -> bool {
        if let Some(status) = self.status {
            if order.payment_status != status {
                return false;
            }
        }
        if let Some(customer_id) = &self.customer_id {
            if &order.customer_id != customer_id {
                return false;
            }
        }
        if let Some(date) = self.date {
            if order.created_at.date_naive() != date {
                return false;
            }
        }
        if let Some(needle) = self.customer_name.as_deref().map(str::trim) {
            if !needle.is_empty() {
                let needle = needle.to_lowercase();
                match customer_name {
                    Some(name) if name.to_lowercase().contains(&needle) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

fn fetch_order(conn: &Connection, id: &str) -> KitchenResult<Order> {
    let row = conn
        .query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
            params![id],
            OrderRow::from_row,
        )
        .optional()?
        .ok_or_else(|| KitchenError::not_found("order", id))?;
    Order::try_from(row)
}

/// Build the order webhook payload and queue it on `conn`'s transaction.
fn enqueue_order_event(
    conn: &Connection,
    topic: Topic,
    action: &str,
    order: &Order,
) -> KitchenResult<()> {
    let customer = load_customer(conn, &order.customer_id)?;
    let kitchen_name = settings::kitchen_name(conn)?;
    let payload = webhook::order_payload(action, order, customer.as_ref(), &kitchen_name);
    outbox::enqueue(conn, topic, &order.id, action, &payload)?;
    Ok(())
}

fn validate_new_order(
    customer_id: &str,
    summary: &OrderSummary,
    payment_method: &str,
) -> KitchenResult<()> {
    if customer_id.trim().is_empty() {
        return Err(KitchenError::validation("Please log in to place an order"));
    }
    if payment_method.trim().is_empty() {
        return Err(KitchenError::validation("Payment method is required"));
    }
    summary.validate().map_err(KitchenError::Validation)?;
    let expected = OrderSummary::total_for(&summary.items);
    if (summary.total - expected).abs() > 0.005 {
        return Err(KitchenError::validation(format!(
            "Order total {:.2} does not match items ({expected:.2})",
            summary.total
        )));
    }
    Ok(())
}

pub struct OrderRepository {
    db: Arc<DbState>,
    feed: ChangeFeed,
    policy: TransitionPolicy,
}

impl OrderRepository {
    pub fn new(db: Arc<DbState>, feed: ChangeFeed, policy: TransitionPolicy) -> Self {
        Self { db, feed, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn create_order(
        &self,
        customer_id: &str,
        order_summary: OrderSummary,
        payment_method: &str,
    ) -> KitchenResult<Order> {
        validate_new_order(customer_id, &order_summary, payment_method)?;

        let now = now_millis();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.trim().to_string(),
            order_summary,
            payment_status: OrderStatus::Pending,
            payment_method: payment_method.trim().to_string(),
            transaction_id: None,
            created_at: now,
            updated_at: now,
        };

        self.db.write(|tx| {
            if load_customer(tx, &order.customer_id)?.is_none() {
                return Err(KitchenError::not_found("customer", order.customer_id.clone()));
            }
            let ts = format_timestamp(&now);
            tx.execute(
                "INSERT INTO orders (
                    id, customer_id, order_summary, payment_status, payment_method,
                    transaction_id, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6)",
                params![
                    order.id,
                    order.customer_id,
                    serde_json::to_string(&order.order_summary)?,
                    order.payment_status.as_str(),
                    order.payment_method,
                    ts
                ],
            )?;
            enqueue_order_event(tx, Topic::Order, "order_created", &order)
        })?;

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total = order.order_summary.total,
            items = order.order_summary.item_count(),
            "Order created"
        );
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Insert,
            Change::Order(order.clone()),
        ));
        Ok(order)
    }

    pub fn get_order(&self, id: &str) -> KitchenResult<Order> {
        self.db.read(|conn| fetch_order(conn, id))
    }

    /// Newest first. Rows are fetched once and filtered here.
    pub fn list_orders(&self, filter: &OrderFilter) -> KitchenResult<Vec<Order>> {
        let rows = self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT o.id, o.customer_id, o.order_summary, o.payment_status,
                        o.payment_method, o.transaction_id, o.created_at, o.updated_at,
                        c.name
                 FROM orders o
                 LEFT JOIN customers c ON c.id = o.customer_id
                 ORDER BY o.created_at DESC, o.rowid DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((OrderRow::from_row(row)?, row.get::<_, Option<String>>(8)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut orders = Vec::with_capacity(rows.len());
        for (row, customer_name) in rows {
            let order = Order::try_from(row)?;
            if filter.matches(&order, customer_name.as_deref()) {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    /// Write `status` to the order. Under the default policy the last write
    /// wins; no version check is made.
    pub fn update_status(&self, id: &str, status: OrderStatus) -> KitchenResult<Order> {
        let policy = self.policy;
        let (previous, order) = self.db.write(|tx| {
            let current = fetch_order(tx, id)?;
            policy.check(current.payment_status, status)?;
            let now = now_millis();
            tx.execute(
                "UPDATE orders SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), format_timestamp(&now), id],
            )?;
            let previous = current.payment_status;
            let order = Order {
                payment_status: status,
                updated_at: now,
                ..current
            };
            enqueue_order_event(tx, Topic::Order, "status_updated", &order)?;
            Ok((previous, order))
        })?;

        info!(order_id = %id, from = %previous, to = %status, "Order status updated");
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Update,
            Change::Order(order.clone()),
        ));
        Ok(order)
    }

    /// Record a successful gateway payment. A pending order becomes
    /// confirmed; later statuses are kept.
    pub fn confirm_payment(&self, id: &str, transaction_id: &str) -> KitchenResult<Order> {
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(KitchenError::validation("Transaction id is required"));
        }
        let policy = self.policy;
        let order = self.db.write(|tx| {
            let current = fetch_order(tx, id)?;
            if current.transaction_id.as_deref() == Some(transaction_id) {
                return Ok(None);
            }
            let status = if current.payment_status == OrderStatus::Pending {
                OrderStatus::Confirmed
            } else {
                current.payment_status
            };
            policy.check(current.payment_status, status)?;
            let now = now_millis();
            tx.execute(
                "UPDATE orders
                 SET payment_status = ?1, transaction_id = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![status.as_str(), transaction_id, format_timestamp(&now), id],
            )?;
            let order = Order {
                payment_status: status,
                transaction_id: Some(transaction_id.to_string()),
                updated_at: now,
                ..current
            };
            enqueue_order_event(tx, Topic::Payment, "payment_success", &order)?;
            Ok(Some(order))
        })?;

        match order {
            Some(order) => {
                info!(order_id = %id, transaction_id = %transaction_id, "Payment confirmed");
                self.feed.publish(ChangeEvent::new(
                    ChangeKind::Update,
                    Change::Order(order.clone()),
                ));
                Ok(order)
            }
            None => {
                info!(order_id = %id, "Payment already recorded");
                self.get_order(id)
            }
        }
    }

    /// Notify automations of a failed payment. The order stays as it is.
    pub fn record_payment_failure(&self, id: &str, reason: &str) -> KitchenResult<Order> {
        let reason = match reason.trim() {
            "" => "Payment failed",
            r => r,
        };
        let order = self.db.write(|tx| {
            let order = fetch_order(tx, id)?;
            let customer = load_customer(tx, &order.customer_id)?;
            let kitchen_name = settings::kitchen_name(tx)?;
            let payload =
                webhook::payment_failure_payload(&order, customer.as_ref(), reason, &kitchen_name);
            outbox::enqueue(tx, Topic::Payment, &order.id, "payment_failed", &payload)?;
            Ok(order)
        })?;
        warn!(order_id = %id, reason = %reason, "Payment failed");
        Ok(order)
    }

    pub fn delete_order(&self, id: &str) -> KitchenResult<()> {
        self.db.write(|tx| {
            let order = fetch_order(tx, id)?;
            enqueue_order_event(tx, Topic::Order, "order_deleted", &order)?;
            tx.execute("DELETE FROM orders WHERE id = ?1", params![id])?;
            Ok(())
        })?;
        info!(order_id = %id, "Order deleted");
        self.feed.publish(ChangeEvent::new(
            ChangeKind::Delete,
            Change::OrderRemoved { id: id.to_string() },
        ));
        Ok(())
    }

    pub fn subscribe_to_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customers::CustomerRepository;
    use crate::db;
    use crate::models::{Customer, OrderLine};
    use std::thread;

    fn setup(policy: TransitionPolicy) -> (Arc<DbState>, OrderRepository) {
        let db = Arc::new(db::open_in_memory().unwrap());
        let customers = CustomerRepository::new(db.clone());
        for (id, name) in [("c-1", "John Doe"), ("c-2", "Priya Nair")] {
            customers
                .upsert_customer(Customer {
                    id: id.into(),
                    name: name.into(),
                    email: None,
                    phone: Some("+91-98765-43210".into()),
                    address: None,
                })
                .unwrap();
        }
        let repo = OrderRepository::new(db.clone(), ChangeFeed::new(64), policy);
        (db, repo)
    }

    fn summary(price: f64, quantity: u32) -> OrderSummary {
        OrderSummary::from_lines(vec![OrderLine {
            id: "i-1".into(),
            name: "Paneer Butter Masala".into(),
            price,
            quantity,
        }])
    }

    fn outbox_actions(db: &DbState) -> Vec<(String, String)> {
        db.read(|conn| {
            let mut stmt = conn.prepare("SELECT topic, action FROM outbox ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .unwrap()
    }

    #[test]
    fn create_order_starts_pending_and_queues_webhook() {
        let (db, repo) = setup(TransitionPolicy::Unrestricted);
        let mut rx = repo.subscribe_to_changes();

        let order = repo.create_order("c-1", summary(100.0, 2), "upi").unwrap();
        assert_eq!(order.payment_status, OrderStatus::Pending);
        assert_eq!(order.order_summary.total, 220.0);
        assert_eq!(repo.get_order(&order.id).unwrap(), order);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.change, Change::Order(order.clone()));
        assert_eq!(
            outbox_actions(&db),
            vec![("order".to_string(), "order_created".to_string())]
        );
    }

    #[test]
    fn create_order_validates_input() {
        let (db, repo) = setup(TransitionPolicy::Unrestricted);
        let empty = OrderSummary {
            items: vec![],
            total: 0.0,
        };
        assert!(matches!(
            repo.create_order("c-1", empty, "upi"),
            Err(KitchenError::Validation(_))
        ));
        assert!(repo.create_order("", summary(10.0, 1), "upi").is_err());
        assert!(repo.create_order("c-1", summary(10.0, 1), " ").is_err());

        let mut tampered = summary(100.0, 2);
        tampered.total = 200.0;
        assert!(matches!(
            repo.create_order("c-1", tampered, "upi"),
            Err(KitchenError::Validation(_))
        ));
        assert!(matches!(
            repo.create_order("nobody", summary(10.0, 1), "upi"),
            Err(KitchenError::NotFound { entity: "customer", .. })
        ));

        // Nothing was written by the rejected calls.
        assert!(repo.list_orders(&OrderFilter::default()).unwrap().is_empty());
        assert!(outbox_actions(&db).is_empty());
    }

    #[test]
    fn every_status_reads_back() {
        let (_db, repo) = setup(TransitionPolicy::Unrestricted);
        let order = repo.create_order("c-1", summary(50.0, 1), "card").unwrap();
        for status in OrderStatus::ALL {
            repo.update_status(&order.id, status).unwrap();
            assert_eq!(repo.get_order(&order.id).unwrap().payment_status, status);
        }
        // Unrestricted accepts backwards moves too.
        repo.update_status(&order.id, OrderStatus::Pending).unwrap();
    }

    #[test]
    fn strict_policy_rejects_skipping_stages() {
        let (_db, repo) = setup(TransitionPolicy::Strict);
        let order = repo.create_order("c-1", summary(50.0, 1), "card").unwrap();
        let err = repo
            .update_status(&order.id, OrderStatus::Delivered)
            .unwrap_err();
        assert!(matches!(
            err,
            KitchenError::IllegalTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered
            }
        ));
        assert_eq!(
            repo.get_order(&order.id).unwrap().payment_status,
            OrderStatus::Pending
        );
        repo.update_status(&order.id, OrderStatus::Confirmed).unwrap();
    }

    #[test]
    fn update_status_of_missing_order_is_not_found() {
        let (_db, repo) = setup(TransitionPolicy::Unrestricted);
        assert!(matches!(
            repo.update_status("missing", OrderStatus::Confirmed),
            Err(KitchenError::NotFound { entity: "order", .. })
        ));
    }

    #[test]
    fn list_orders_is_newest_first_and_filters_in_memory() {
        let (_db, repo) = setup(TransitionPolicy::Unrestricted);
        let first = repo.create_order("c-1", summary(10.0, 1), "upi").unwrap();
        let second = repo.create_order("c-2", summary(20.0, 1), "upi").unwrap();
        let third = repo.create_order("c-1", summary(30.0, 1), "cod").unwrap();
        repo.update_status(&second.id, OrderStatus::Delivered).unwrap();

        let all = repo.list_orders(&OrderFilter::default()).unwrap();
        let ids: Vec<_> = all.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);

        let by_name = repo
            .list_orders(&OrderFilter {
                customer_name: Some("PRIYA".into()),
                ..OrderFilter::default()
            })
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, second.id);

        let delivered = repo
            .list_orders(&OrderFilter {
                status: Some(OrderStatus::Delivered),
                ..OrderFilter::default()
            })
            .unwrap();
        assert_eq!(delivered.len(), 1);

        let today = first.created_at.date_naive();
        let mine_today = repo
            .list_orders(&OrderFilter {
                customer_id: Some("c-1".into()),
                date: Some(today),
                ..OrderFilter::default()
            })
            .unwrap();
        assert_eq!(mine_today.len(), 2);

        let other_day = repo
            .list_orders(&OrderFilter {
                date: today.pred_opt(),
                ..OrderFilter::default()
            })
            .unwrap();
        assert!(other_day.is_empty());
    }

    #[test]
    fn malformed_row_fails_closed() {
        let (db, repo) = setup(TransitionPolicy::Unrestricted);
        let order = repo.create_order("c-1", summary(10.0, 1), "upi").unwrap();
        db.read(|conn| {
            conn.execute(
                "UPDATE orders SET order_summary = '{\"items\": 3}' WHERE id = ?1",
                params![order.id],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            repo.get_order(&order.id),
            Err(KitchenError::Deserialization { .. })
        ));
        assert!(repo.list_orders(&OrderFilter::default()).is_err());
    }

    #[test]
    fn payment_confirmation_and_failure() {
        let (db, repo) = setup(TransitionPolicy::Strict);
        let order = repo.create_order("c-2", summary(99.0, 1), "card").unwrap();

        let failed = repo.record_payment_failure(&order.id, "card declined").unwrap();
        assert_eq!(failed.payment_status, OrderStatus::Pending);

        let paid = repo.confirm_payment(&order.id, "pay_123456").unwrap();
        assert_eq!(paid.payment_status, OrderStatus::Confirmed);
        assert_eq!(paid.transaction_id.as_deref(), Some("pay_123456"));

        // A repeated gateway callback changes nothing.
        let again = repo.confirm_payment(&order.id, "pay_123456").unwrap();
        assert_eq!(again, paid);

        let actions: Vec<_> = outbox_actions(&db).into_iter().map(|(_, a)| a).collect();
        assert_eq!(actions, vec!["order_created", "payment_failed", "payment_success"]);
    }

    #[test]
    fn delete_order_removes_row_and_publishes() {
        let (_db, repo) = setup(TransitionPolicy::Unrestricted);
        let order = repo.create_order("c-1", summary(10.0, 1), "upi").unwrap();
        let mut rx = repo.subscribe_to_changes();
        repo.delete_order(&order.id).unwrap();
        assert_eq!(
            rx.try_recv().unwrap().change,
            Change::OrderRemoved { id: order.id.clone() }
        );
        assert!(repo.get_order(&order.id).is_err());
        assert!(repo.delete_order(&order.id).is_err());
    }

    #[test]
    fn concurrent_status_writes_last_one_wins() {
        let (_db, repo) = setup(TransitionPolicy::Unrestricted);
        let repo = Arc::new(repo);
        let order = repo.create_order("c-1", summary(10.0, 1), "upi").unwrap();
        let mut rx = repo.subscribe_to_changes();

        let handles: Vec<_> = [OrderStatus::Confirmed, OrderStatus::OutForDelivery]
            .into_iter()
            .map(|status| {
                let repo = repo.clone();
                let id = order.id.clone();
                thread::spawn(move || repo.update_status(&id, status).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Change::Order(o) = event.change {
                seen.push(o.payment_status);
            }
        }
        // Both writes were accepted; whichever committed last is stored.
        assert_eq!(seen.len(), 2);
        let stored = repo.get_order(&order.id).unwrap().payment_status;
        assert!(seen.contains(&stored));
    }

    #[test]
    fn filter_deserializes_with_aliases() {
        let filter: OrderFilter = serde_json::from_value(serde_json::json!({
            "status": "out_for_delivery",
            "customer_name": "john",
            "date": "2026-03-01"
        }))
        .unwrap();
        assert_eq!(filter.status, Some(OrderStatus::OutForDelivery));
        assert_eq!(filter.customer_name.as_deref(), Some("john"));
        assert!(!filter.is_empty());
    }
}
