//! Domain error model.

use thiserror::Error;

use crate::value_object::Quantity;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, shortages). Store failures belong to the infra error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Stock on hand does not cover a requested quantity.
    #[error("insufficient quantity for '{product}': requested {requested}, available {available}")]
    InsufficientQuantity {
        product: String,
        requested: Quantity,
        available: Quantity,
    },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn insufficient(product: impl Into<String>, requested: Quantity, available: Quantity) -> Self {
        Self::InsufficientQuantity {
            product: product.into(),
            requested,
            available,
        }
    }
}
