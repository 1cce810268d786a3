//! Error taxonomy shared by every repository and command.

use thiserror::Error;

use crate::status::OrderStatus;

pub type KitchenResult<T> = Result<T, KitchenError>;

#[derive(Debug, Error)]
pub enum KitchenError {
    /// Missing or malformed input; blocks the action before anything is written.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored row did not match the expected record shape.
    #[error("Malformed {entity} record: {reason}")]
    Deserialization {
        entity: &'static str,
        reason: String,
    },

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Category {id} still has {items} menu item(s)")]
    CategoryNotEmpty { id: String, items: i64 },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database lock poisoned: {0}")]
    Lock(String),

    #[error("Webhook delivery failed: {0}")]
    Webhook(String),
}

impl KitchenError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn malformed(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::Deserialization {
            entity,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for command envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::Deserialization { .. } => "deserialization_error",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::CategoryNotEmpty { .. } => "category_not_empty",
            Self::Storage(_) => "storage_error",
            Self::Serialization(_) => "serialization_error",
            Self::Lock(_) => "storage_busy",
            Self::Webhook(_) => "webhook_error",
        }
    }

    /// Validation problems are the caller's to fix; everything else is a
    /// store or transport failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound { .. }
                | Self::IllegalTransition { .. }
                | Self::CategoryNotEmpty { .. }
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for KitchenError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            KitchenError::validation("Cart is empty").code(),
            "validation_error"
        );
        assert_eq!(KitchenError::not_found("order", "o-1").code(), "not_found");
        assert_eq!(
            KitchenError::malformed("order", "bad summary").code(),
            "deserialization_error"
        );
    }

    #[test]
    fn display_includes_context() {
        let err = KitchenError::IllegalTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            "Illegal status transition: delivered -> pending"
        );
        assert!(err.is_user_error());

        let err = KitchenError::CategoryNotEmpty {
            id: "cat-1".into(),
            items: 3,
        };
        assert_eq!(err.to_string(), "Category cat-1 still has 3 menu item(s)");
    }
}
