//! Lock/Takeover Manager
//!
//! At most one checker per session, and one non-terminal owner per order
//! number. A conflicting request is never resolved silently: it becomes a
//! [`TakeoverRequest`] that the caller must confirm before anything changes.
//!
//! Locking is advisory. The holder field is compared again at confirmation
//! time, but there is no version column, so two confirmations racing at the
//! storage layer resolve as last-write-wins.

use pf_schemas::{PickingSession, SessionStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeoverKind {
    /// Another user is double-checking the session.
    Checker,
    /// Another user's non-terminal session already uses the order number.
    OrderNumber,
}

/// A pending confirmation. Dropping it declines the takeover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeoverRequest {
    pub kind: TakeoverKind,
    /// The session whose checker/owner would change.
    pub session_id: Uuid,
    pub current_holder: String,
    pub requested_by: String,
    pub order_number: Option<String>,
}

impl std::fmt::Display for TakeoverRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TakeoverKind::Checker => write!(
                f,
                "session {} is being checked by {}; {} must confirm takeover",
                self.session_id, self.current_holder, self.requested_by
            ),
            TakeoverKind::OrderNumber => write!(
                f,
                "order {} belongs to {} (session {}); {} must confirm takeover",
                self.order_number.as_deref().unwrap_or("?"),
                self.current_holder,
                self.session_id,
                self.requested_by
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockDecision {
    /// Nobody holds the check; the caller may lock.
    Free,
    /// The caller already holds it.
    HeldByCaller,
    Conflict(TakeoverRequest),
}

/// Decide what `lockForCheck(session, user)` may do without a prompt.
pub fn evaluate_checker_lock(session: &PickingSession, user: &str) -> LockDecision {
    match session.checker_id.as_deref() {
        None => LockDecision::Free,
        Some(holder) if holder == user => LockDecision::HeldByCaller,
        Some(holder) => LockDecision::Conflict(TakeoverRequest {
            kind: TakeoverKind::Checker,
            session_id: session.id,
            current_holder: holder.to_string(),
            requested_by: user.to_string(),
            order_number: session.order_number.clone(),
        }),
    }
}

/// Order numbers compare trimmed and case-insensitively.
pub fn same_order_number(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// The first non-terminal session of a different user that already uses
/// `order_number`. `exclude` skips the caller's own session.
pub fn find_order_number_conflict(
    sessions: &[PickingSession],
    order_number: &str,
    user: &str,
    exclude: Option<Uuid>,
) -> Option<TakeoverRequest> {
    sessions
        .iter()
        .filter(|s| Some(s.id) != exclude)
        .filter(|s| !s.status.is_terminal() && s.status != SessionStatus::Building)
        .filter(|s| s.owner_id != user)
        .find(|s| {
            s.order_number
                .as_deref()
                .map(|n| same_order_number(n, order_number))
                .unwrap_or(false)
        })
        .map(|s| TakeoverRequest {
            kind: TakeoverKind::OrderNumber,
            session_id: s.id,
            current_holder: s.owner_id.clone(),
            requested_by: user.to_string(),
            order_number: s.order_number.clone(),
        })
}
