//! Order status workflow.
//!
//! The four statuses progress `pending -> confirmed -> out_for_delivery ->
//! delivered`. By default any status may be selected from any other (the
//! operator console is a plain dropdown); [`TransitionPolicy::Strict`]
//! enforces the progression through an explicit transition table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{KitchenError, KitchenResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    OutForDelivery,
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// Position in the delivery progression, starting at 0.
    pub fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::OutForDelivery => 2,
            OrderStatus::Delivered => 3,
        }
    }

    /// The status that follows this one, if any.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::OutForDelivery),
            OrderStatus::OutForDelivery => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }

    /// Orders the kitchen still has to act on.
    pub fn is_upcoming(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Orders that have left the kitchen.
    pub fn is_past(self) -> bool {
        !self.is_upcoming()
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::OutForDelivery => "Out for delivery",
            OrderStatus::Delivered => "Delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = KitchenError;

    /// Accepts the storage tags plus the display labels the console used
    /// ("Out for delivery", "out-for-delivery").
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-'], "_");
        match normalized.as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            _ => Err(KitchenError::validation(format!(
                "Unknown order status: {raw}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any status is reachable from any other.
    #[default]
    Unrestricted,
    /// Only the next status in the progression (or the current one) is allowed.
    Strict,
}

impl TransitionPolicy {
    pub fn allows(self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            TransitionPolicy::Unrestricted => true,
            TransitionPolicy::Strict => from == to || from.next() == Some(to),
        }
    }

    pub fn check(self, from: OrderStatus, to: OrderStatus) -> KitchenResult<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(KitchenError::IllegalTransition { from, to })
        }
    }
}

/// Split orders into the console's upcoming and past columns, preserving
/// the input order within each group.
pub fn group_by_stage<T, F>(orders: Vec<T>, status_of: F) -> (Vec<T>, Vec<T>)
where
    F: Fn(&T) -> OrderStatus,
{
    orders
        .into_iter()
        .partition(|order| status_of(order).is_upcoming())
}
