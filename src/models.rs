//! Typed records and the parse-and-validate boundary for rows read back
//! from the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KitchenError, KitchenResult};
use crate::status::OrderStatus;

/// Flat surcharge applied to the subtotal at checkout.
pub const TAX_RATE: f64 = 0.10;

/// Round a currency amount to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuCategory {
    pub id: String,
    pub name: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image: String,
    pub category_id: String,
    pub available: bool,
    pub is_veg: bool,
    pub position: i64,
}

/// One purchased line inside a frozen order summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

impl OrderLine {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }

    /// "2x Butter Chicken"
    pub fn describe(&self) -> String {
        format!("{}x {}", self.quantity, self.name)
    }
}

/// Snapshot of what was bought, frozen at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub items: Vec<OrderLine>,
    pub total: f64,
}

impl OrderSummary {
    /// Price the lines with the checkout surcharge.
    pub fn from_lines(items: Vec<OrderLine>) -> Self {
        let total = Self::total_for(&items);
        Self { items, total }
    }

    pub fn subtotal(&self) -> f64 {
        round2(self.items.iter().map(OrderLine::line_total).sum())
    }

    pub fn total_for(items: &[OrderLine]) -> f64 {
        let subtotal: f64 = items.iter().map(OrderLine::line_total).sum();
        round2(subtotal * (1.0 + TAX_RATE))
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    pub fn line_descriptions(&self) -> Vec<String> {
        self.items.iter().map(OrderLine::describe).collect()
    }

    /// Checks shared by checkout input and rows read back from storage.
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("order summary has no items".into());
        }
        for line in &self.items {
            if line.id.trim().is_empty() {
                return Err("order line is missing an item id".into());
            }
            if line.quantity == 0 {
                return Err(format!("item {} has quantity 0", line.id));
            }
            if !line.price.is_finite() || line.price <= 0.0 {
                return Err(format!("item {} has invalid price {}", line.id, line.price));
            }
        }
        if !self.total.is_finite() || self.total < 0.0 {
            return Err(format!("invalid total {}", self.total));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub order_summary: OrderSummary,
    pub payment_status: OrderStatus,
    pub payment_method: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// Order columns exactly as stored, before validation.
#[derive(Debug)]
pub(crate) struct OrderRow {
    pub id: String,
    pub customer_id: String,
    pub order_summary: String,
    pub payment_status: String,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const ORDER_COLUMNS: &str = "id, customer_id, order_summary, payment_status, \
     payment_method, transaction_id, created_at, updated_at";

impl OrderRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            customer_id: row.get(1)?,
            order_summary: row.get(2)?,
            payment_status: row.get(3)?,
            payment_method: row.get(4)?,
            transaction_id: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

fn parse_timestamp(entity: &'static str, field: &str, raw: &str) -> KitchenResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| KitchenError::malformed(entity, format!("{field} '{raw}': {e}")))
}

impl TryFrom<OrderRow> for Order {
    type Error = KitchenError;

    fn try_from(row: OrderRow) -> KitchenResult<Self> {
        let order_summary: OrderSummary = serde_json::from_str(&row.order_summary)
            .map_err(|e| KitchenError::malformed("order", format!("order_summary: {e}")))?;
        order_summary
            .validate()
            .map_err(|reason| KitchenError::malformed("order", reason))?;
        let payment_status = row
            .payment_status
            .parse::<OrderStatus>()
            .map_err(|_| {
                KitchenError::malformed(
                    "order",
                    format!("unknown payment_status '{}'", row.payment_status),
                )
            })?;
        if row.customer_id.trim().is_empty() {
            return Err(KitchenError::malformed("order", "empty customer_id"));
        }

        Ok(Order {
            created_at: parse_timestamp("order", "created_at", &row.created_at)?,
            updated_at: parse_timestamp("order", "updated_at", &row.updated_at)?,
            id: row.id,
            customer_id: row.customer_id,
            order_summary,
            payment_status,
            payment_method: row.payment_method,
            transaction_id: row.transaction_id.filter(|t| !t.trim().is_empty()),
        })
    }
}

#[derive(Debug)]
pub(crate) struct MenuItemRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image: String,
    pub category_id: String,
    pub available: i64,
    pub is_veg: i64,
    pub position: i64,
}

pub(crate) const MENU_ITEM_COLUMNS: &str =
    "id, name, description, price, image, category_id, available, is_veg, position";

impl MenuItemRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            price: row.get(3)?,
            image: row.get(4)?,
            category_id: row.get(5)?,
            available: row.get(6)?,
            is_veg: row.get(7)?,
            position: row.get(8)?,
        })
    }
}

fn parse_flag(entity: &'static str, field: &str, raw: i64) -> KitchenResult<bool> {
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(KitchenError::malformed(
            entity,
            format!("{field} must be 0 or 1, got {other}"),
        )),
    }
}

impl TryFrom<MenuItemRow> for MenuItem {
    type Error = KitchenError;

    fn try_from(row: MenuItemRow) -> KitchenResult<Self> {
        if row.name.trim().is_empty() {
            return Err(KitchenError::malformed("menu item", format!("{} has no name", row.id)));
        }
        if !row.price.is_finite() || row.price <= 0.0 {
            return Err(KitchenError::malformed(
                "menu item",
                format!("{} has invalid price {}", row.id, row.price),
            ));
        }
        if row.position < 1 {
            return Err(KitchenError::malformed(
                "menu item",
                format!("{} has invalid position {}", row.id, row.position),
            ));
        }
        Ok(MenuItem {
            available: parse_flag("menu item", "available", row.available)?,
            is_veg: parse_flag("menu item", "is_veg", row.is_veg)?,
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            image: row.image,
            category_id: row.category_id,
            position: row.position,
        })
    }
}

pub(crate) fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

impl TryFrom<(String, String, i64)> for MenuCategory {
    type Error = KitchenError;

    fn try_from((id, name, position): (String, String, i64)) -> KitchenResult<Self> {
        if position < 1 {
            return Err(KitchenError::malformed(
                "menu category",
                format!("{id} has invalid position {position}"),
            ));
        }
        Ok(MenuCategory { id, name, position })
    }
}
