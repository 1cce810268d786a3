//! Dashboard figures computed from an order list.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{round2, Order};
use crate::status::OrderStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: usize,
    pub confirmed: usize,
    pub out_for_delivery: usize,
    pub delivered: usize,
}

impl StatusCounts {
    fn bump(&mut self, status: OrderStatus) {
        match status {
            OrderStatus::Pending => self.pending += 1,
            OrderStatus::Confirmed => self.confirmed += 1,
            OrderStatus::OutForDelivery => self.out_for_delivery += 1,
            OrderStatus::Delivered => self.delivered += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub day: Option<NaiveDate>,
    pub orders_today: usize,
    /// Sum of totals for orders placed on `day` that left `pending`.
    pub revenue_today: f64,
    pub average_order_value: f64,
    pub upcoming: usize,
    pub status_counts: StatusCounts,
}

/// Summarise `orders` for `day` (UTC). Status counts cover every order.
pub fn dashboard_summary(orders: &[Order], day: NaiveDate) -> DashboardSummary {
    let mut summary = DashboardSummary {
        day: Some(day),
        ..DashboardSummary::default()
    };
    let mut paid_count = 0usize;
    let mut paid_total = 0.0;

    for order in orders {
        summary.status_counts.bump(order.payment_status);
        if order.payment_status.is_upcoming() {
            summary.upcoming += 1;
        }
        if order.payment_status != OrderStatus::Pending {
            paid_count += 1;
            paid_total += order.order_summary.total;
        }
        if order.created_at.date_naive() == day {
            summary.orders_today += 1;
            if order.payment_status != OrderStatus::Pending {
                summary.revenue_today += order.order_summary.total;
            }
        }
    }

    summary.revenue_today = round2(summary.revenue_today);
    if paid_count > 0 {
        summary.average_order_value = round2(paid_total / paid_count as f64);
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodTotal {
    pub method: String,
    pub count: usize,
    pub amount: f64,
}

/// Per payment method totals over orders that are confirmed or later,
/// largest amount first.
pub fn payment_summary(orders: &[Order]) -> Vec<PaymentMethodTotal> {
    let mut by_method: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for order in orders
        .iter()
        .filter(|o| o.payment_status.rank() >= OrderStatus::Confirmed.rank())
    {
        let method = order.payment_method.trim().to_lowercase();
        let entry = by_method.entry(method).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += order.order_summary.total;
    }

    let mut totals: Vec<PaymentMethodTotal> = by_method
        .into_iter()
        .map(|(method, (count, amount))| PaymentMethodTotal {
            method,
            count,
            amount: round2(amount),
        })
        .collect();
    totals.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    totals
}
