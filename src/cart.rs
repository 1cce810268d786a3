//! Shopping cart held for the duration of a storefront session.

use serde::Serialize;

use crate::error::{KitchenError, KitchenResult};
use crate::models::{round2, MenuItem, OrderLine, OrderSummary, TAX_RATE};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub item_id: String,
    pub name: String,
    /// Price when the item was added.
    pub price: f64,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add one unit of `item`, merging with an existing line.
    pub fn add_item(&mut self, item: &MenuItem) -> KitchenResult<()> {
        if !item.available {
            return Err(KitchenError::validation(format!(
                "{} is currently unavailable",
                item.name
            )));
        }
        match self.lines.iter_mut().find(|l| l.item_id == item.id) {
            Some(line) => line.quantity += 1,
            None => self.lines.push(CartLine {
                item_id: item.id.clone(),
                name: item.name.clone(),
                price: item.price,
                quantity: 1,
            }),
        }
        Ok(())
    }

    /// Set the quantity of a line. Zero removes it.
    pub fn set_quantity(&mut self, item_id: &str, quantity: u32) -> KitchenResult<()> {
        if quantity == 0 {
            self.remove_item(item_id);
            return Ok(());
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.item_id == item_id)
            .ok_or_else(|| KitchenError::not_found("cart line", item_id))?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.item_id != item_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn subtotal(&self) -> f64 {
        round2(self.lines.iter().map(CartLine::line_total).sum())
    }

    pub fn tax(&self) -> f64 {
        round2(self.total() - self.subtotal())
    }

    pub fn total(&self) -> f64 {
        let subtotal: f64 = self.lines.iter().map(CartLine::line_total).sum();
        round2(subtotal * (1.0 + TAX_RATE))
    }

    /// Units across all lines.
    pub fn line_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Freeze the cart into an order summary.
    pub fn checkout(&self) -> KitchenResult<OrderSummary> {
        if self.lines.is_empty() {
            return Err(KitchenError::validation("Your cart is empty"));
        }
        Ok(OrderSummary::from_lines(
            self.lines
                .iter()
                .map(|l| OrderLine {
                    id: l.item_id.clone(),
                    name: l.name.clone(),
                    price: l.price,
                    quantity: l.quantity,
                })
                .collect(),
        ))
    }
}
