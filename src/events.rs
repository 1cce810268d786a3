//! Realtime change feed.
//!
//! Every committed mutation publishes a typed [`ChangeEvent`] carrying the
//! new record, so views can patch their local state instead of re-reading
//! the whole table. A view that falls behind the channel gets
//! `RecvError::Lagged` and re-fetches.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, trace};

use crate::error::KitchenResult;
use crate::menu::ReorderScope;
use crate::models::{MenuCategory, MenuItem, Order};
use crate::orders::{OrderFilter, OrderRepository};
use crate::status::{group_by_stage, OrderStatus};

const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", content = "record", rename_all = "snake_case")]
pub enum Change {
    Order(Order),
    OrderRemoved { id: String },
    MenuItem(MenuItem),
    MenuItemRemoved { id: String },
    Category(MenuCategory),
    CategoryRemoved { id: String },
    Reordered { scope: ReorderScope, ids: Vec<String> },
    Setting { key: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub change: Change,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, change: Change) -> Self {
        Self { kind, change }
    }

    pub fn is_order_event(&self) -> bool {
        matches!(self.change, Change::Order(_) | Change::OrderRemoved { .. })
    }
}

/// Broadcast channel shared by the repositories and every subscribed view.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish after commit. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(receivers, "Change event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Outcome of applying one event to a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardUpdate {
    Patched,
    Ignored,
    /// The event cannot be applied locally; the board must re-fetch.
    NeedsRefresh,
}

/// A locally held, live-updated order list (operator console or a
/// customer's own order history).
pub struct OrderBoard {
    orders: Vec<Order>,
    filter: OrderFilter,
}

impl OrderBoard {
    pub fn load(repo: &OrderRepository, filter: OrderFilter) -> KitchenResult<Self> {
        let orders = repo.list_orders(&filter)?;
        Ok(Self { orders, filter })
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn refresh(&mut self, repo: &OrderRepository) -> KitchenResult<()> {
        self.orders = repo.list_orders(&self.filter)?;
        debug!(count = self.orders.len(), "Order board refreshed");
        Ok(())
    }

    /// Patch local state from one event.
    pub fn apply(&mut self, event: &ChangeEvent) -> BoardUpdate {
        match &event.change {
            Change::Order(order) => {
                // Name matching needs the customer row, which events don't carry.
                if self.filter.customer_name.is_some() {
                    return BoardUpdate::NeedsRefresh;
                }
                let existing = self.orders.iter().position(|o| o.id == order.id);
                let keep = self.filter.matches(order, None);
                match (existing, keep) {
                    (Some(idx), true) => {
                        self.orders[idx] = order.clone();
                        BoardUpdate::Patched
                    }
                    (Some(idx), false) => {
                        self.orders.remove(idx);
                        BoardUpdate::Patched
                    }
                    (None, true) => {
                        let idx = self
                            .orders
                            .iter()
                            .position(|o| o.created_at <= order.created_at)
                            .unwrap_or(self.orders.len());
                        self.orders.insert(idx, order.clone());
                        BoardUpdate::Patched
                    }
                    (None, false) => BoardUpdate::Ignored,
                }
            }
            Change::OrderRemoved { id } => {
                let before = self.orders.len();
                self.orders.retain(|o| &o.id != id);
                if self.orders.len() == before {
                    BoardUpdate::Ignored
                } else {
                    BoardUpdate::Patched
                }
            }
            _ => BoardUpdate::Ignored,
        }
    }

    /// Drain every event queued on `rx`, patching or re-fetching as needed.
    /// Returns how many events changed the board.
    pub fn catch_up(
        &mut self,
        rx: &mut broadcast::Receiver<ChangeEvent>,
        repo: &OrderRepository,
    ) -> KitchenResult<usize> {
        let mut changed = 0;
        let mut refresh = false;
        loop {
            match rx.try_recv() {
                Ok(event) => match self.apply(&event) {
                    BoardUpdate::Patched => changed += 1,
                    BoardUpdate::NeedsRefresh => refresh = true,
                    BoardUpdate::Ignored => {}
                },
                Err(TryRecvError::Lagged(missed)) => {
                    debug!(missed, "Order board lagged behind change feed");
                    refresh = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if refresh {
            self.refresh(repo)?;
            changed += 1;
        }
        Ok(changed)
    }

    pub fn grouped(&self) -> (Vec<&Order>, Vec<&Order>) {
        group_by_stage(self.orders.iter().collect(), |o: &&Order| o.payment_status)
    }

    pub fn count_with_status(&self, status: OrderStatus) -> usize {
        self.orders
            .iter()
            .filter(|o| o.payment_status == status)
            .count()
    }
}
