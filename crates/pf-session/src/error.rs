use pf_schemas::{LineKey, SessionStatus};
use thiserror::Error;
use uuid::Uuid;

use crate::lock::TakeoverRequest;
use crate::state_machine::TransitionError;

/// Input rejected at the point of entry. Never reaches the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("quantity is not a number: {0:?}")]
    NotNumeric(String),
    #[error("quantity cannot be negative: {0}")]
    Negative(i64),
    #[error("{sku}: requested {requested}, only {available} available; quantity set to {available}")]
    OverStock {
        sku: String,
        requested: i64,
        available: i64,
    },
    #[error("{sku}: quantity raised to the minimum of 1")]
    BelowMinimum { sku: String },
    #[error("{sku}: no stock left to add")]
    Unavailable { sku: String },
    #[error("{0}: no longer exists in inventory")]
    MissingInventory(LineKey),
    #[error("stock conflict on {key}: need {requested}, only {available} available")]
    InsufficientStock {
        key: LineKey,
        requested: u32,
        available: i64,
    },
    #[error("{0}: not in the cart")]
    NotInCart(LineKey),
    #[error("cart is empty")]
    EmptyCart,
    #[error("correction note is empty")]
    EmptyNote,
    #[error("order number is empty")]
    EmptyOrderNumber,
    #[error("cart cannot be edited while {0}")]
    NotEditable(SessionStatus),
    #[error("{0} entries cannot be undone")]
    NotReversible(&'static str),
    #[error("checklist belongs to session {found}, expected {expected}")]
    ChecklistMismatch { expected: Uuid, found: Uuid },
}

#[derive(Debug, Error)]
pub enum PickingError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Someone else holds what the caller asked for. Resolve with
    /// `SessionEngine::confirm_takeover`, or drop the request to decline.
    #[error("conflict: {0}")]
    Conflict(TakeoverRequest),

    #[error("storage unreachable during {operation}")]
    Offline { operation: &'static str },

    /// Deduction stopped after some lines were applied. Requires manual
    /// reconciliation; never retried automatically.
    #[error(
        "deduction of session {session_id} stopped after {} applied line(s); failed at {}: {reason}",
        .applied.len(),
        failed_step(.failed)
    )]
    BatchPartialFailure {
        session_id: Uuid,
        applied: Vec<LineKey>,
        failed: Option<LineKey>,
        reason: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("{user} does not hold session {session_id} (holder: {})", .holder.as_deref().unwrap_or("nobody"))]
    NotHolder {
        session_id: Uuid,
        user: String,
        holder: Option<String>,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("progress cache error: {reason:#}")]
    Cache { reason: anyhow::Error },
}

fn failed_step(failed: &Option<LineKey>) -> String {
    match failed {
        Some(key) => key.to_string(),
        None => "status update".to_string(),
    }
}

impl PickingError {
    /// Conflict and offline errors offer the caller a way forward.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PickingError::Conflict(_) | PickingError::Offline { .. } | PickingError::Validation(_)
        )
    }

    pub fn takeover_request(&self) -> Option<&TakeoverRequest> {
        match self {
            PickingError::Conflict(req) => Some(req),
            _ => None,
        }
    }
}
