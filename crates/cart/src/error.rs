//! Error taxonomy for the cart subsystem.
//!
//! `Validation` and `Conflict` are raised synchronously at submit time and
//! never reach the network. `Backend` is raised after the fact, once a
//! mutation call has failed, and rolls back the optimistic effect.

use naked_pineapple_core::CartLineId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::ActionHandle;

/// Malformed action payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The action carries no lines or codes to act on.
    #[error("action has nothing to apply")]
    EmptyPayload,

    /// An added line asks for fewer than one unit.
    #[error("quantity for {variant_id} must be at least 1 (got {quantity})")]
    NonPositiveQuantity {
        /// Variant being added.
        variant_id: String,
        /// Requested quantity.
        quantity: i64,
    },

    /// A line update asks for a negative quantity.
    #[error("quantity for line {line_id} cannot be negative (got {quantity})")]
    NegativeQuantity {
        /// Line being updated.
        line_id: CartLineId,
        /// Requested quantity.
        quantity: i64,
    },

    /// A quantity exceeds what the cart can hold.
    #[error("quantity {quantity} exceeds the maximum of {max}")]
    QuantityTooLarge {
        /// Requested quantity.
        quantity: i64,
        /// Allowed maximum.
        max: u32,
    },

    /// The same line appears twice in one action.
    #[error("line {0} appears more than once")]
    DuplicateLine(CartLineId),

    /// A discount or gift card code is blank.
    #[error("{0} code cannot be blank")]
    BlankCode(&'static str),

    /// A buyer identity update sets no fields.
    #[error("buyer identity update sets no fields")]
    EmptyBuyerIdentity,
}

/// The action targets a line that already has an incompatible action in flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_id} already has a pending change ({pending})")]
pub struct ConflictError {
    /// The contended line.
    pub line_id: CartLineId,
    /// Handle of the action already in flight for that line.
    pub pending: ActionHandle,
}

/// User error returned by a cart mutation (e.g. invalid discount code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartUserError {
    /// Error code.
    pub code: Option<String>,
    /// Field path that caused the error.
    pub field: Option<Vec<String>>,
    /// Human-readable error message.
    pub message: String,
}

/// Warning returned alongside a successful cart mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartWarning {
    /// Warning code.
    pub code: String,
    /// Human-readable warning message.
    pub message: String,
}

/// The backend mutation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Network or HTTP-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend did not answer in time.
    #[error("request timed out")]
    Timeout,

    /// Rate limited by the backend.
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds the backend asked us to wait.
        retry_after_secs: u64,
    },

    /// The mutation was rejected with user errors.
    #[error("cart mutation rejected: {}", format_user_errors(.0))]
    UserErrors(Vec<CartUserError>),

    /// The cart no longer exists.
    #[error("cart not found: {0}")]
    NotFound(String),

    /// The backend answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

fn format_user_errors(errors: &[CartUserError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Any error surfaced by the cart subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Rejected before submission.
    #[error("invalid cart action: {0}")]
    Validation(#[from] ValidationError),

    /// Rejected at enqueue time.
    #[error("conflicting cart action: {0}")]
    Conflict(#[from] ConflictError),

    /// The backend call failed.
    #[error("cart backend error: {0}")]
    Backend(#[from] BackendError),

    /// No pending action has this handle.
    #[error("unknown cart action: {0}")]
    UnknownAction(ActionHandle),

    /// Submitted outside a Tokio runtime, so the mutation could not be sent.
    #[error("no async runtime available to send cart mutations")]
    NoRuntime,
}

impl CartError {
    /// Whether the error was raised locally, before any network call.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Conflict(_) | Self::NoRuntime
        )
    }
}

/// Result type alias for [`CartError`].
pub type Result<T> = std::result::Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_display() {
        let err = BackendError::UserErrors(vec![
            CartUserError {
                code: Some("INVALID".to_string()),
                field: None,
                message: "Discount code is invalid".to_string(),
            },
            CartUserError {
                code: None,
                field: Some(vec!["lines".to_string()]),
                message: "Out of stock".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "cart mutation rejected: Discount code is invalid; Out of stock"
        );
    }

    #[test]
    fn test_empty_user_errors_display() {
        let err = BackendError::UserErrors(vec![]);
        assert_eq!(
            err.to_string(),
            "cart mutation rejected: (no error details provided)"
        );
    }

    #[test]
    fn test_local_errors() {
        assert!(CartError::from(ValidationError::EmptyPayload).is_local());
        assert!(CartError::NoRuntime.is_local());
        assert!(!CartError::from(BackendError::Timeout).is_local());
    }
}
