//! Customer profiles keyed by the identity provider's user id.

use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use tracing::info;

use crate::db::{timestamp_now, DbState};
use crate::error::{KitchenError, KitchenResult};
use crate::models::Customer;

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn load_customer(
    conn: &rusqlite::Connection,
    id: &str,
) -> KitchenResult<Option<Customer>> {
    let customer = conn
        .query_row(
            "SELECT id, name, email, phone, address FROM customers WHERE id = ?1",
            params![id],
            |row| {
                Ok(Customer {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    phone: row.get(3)?,
                    address: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(customer)
}

pub struct CustomerRepository {
    db: Arc<DbState>,
}

impl CustomerRepository {
    pub fn new(db: Arc<DbState>) -> Self {
        Self { db }
    }

    /// Create or update the profile for `customer.id`.
    pub fn upsert_customer(&self, customer: Customer) -> KitchenResult<Customer> {
        let id = customer.id.trim().to_string();
        if id.is_empty() {
            return Err(KitchenError::validation("Customer id is required"));
        }
        let name = customer.name.trim().to_string();
        if name.is_empty() {
            return Err(KitchenError::validation("Name is required"));
        }
        let email = clean(customer.email);
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(KitchenError::validation("Please enter a valid email address"));
            }
        }
        let customer = Customer {
            id,
            name,
            email,
            phone: clean(customer.phone),
            address: clean(customer.address),
        };

        let now = timestamp_now();
        self.db.write(|tx| {
            tx.execute(
                "INSERT INTO customers (id, name, email, phone, address, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    email = excluded.email,
                    phone = excluded.phone,
                    address = excluded.address,
                    updated_at = excluded.updated_at",
                params![
                    customer.id,
                    customer.name,
                    customer.email,
                    customer.phone,
                    customer.address,
                    now
                ],
            )?;
            Ok(())
        })?;
        info!(customer_id = %customer.id, "Customer profile saved");
        Ok(customer)
    }

    pub fn get_customer(&self, id: &str) -> KitchenResult<Customer> {
        self.db
            .read(|conn| load_customer(conn, id))?
            .ok_or_else(|| KitchenError::not_found("customer", id))
    }
}
