//! Collaborator interfaces consumed by the session engine.
//!
//! Storage is external; these traits are the narrow contracts the engine
//! needs from it. Implementations are synchronous and take `&self`. Backends
//! with interior state use `RefCell`/`Mutex`.

use chrono::{DateTime, Utc};
use pf_schemas::{ActivityLogEntry, CorrectionNote, InventoryRecord, LineKey, PickingSession};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Network unreachable. The call had no effect.
    #[error("offline")]
    Offline,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub trait SessionStore {
    fn get(&self, id: Uuid) -> Result<Option<PickingSession>, StoreError>;

    /// Every persisted session. Callers filter.
    fn list(&self) -> Result<Vec<PickingSession>, StoreError>;

    /// Insert or overwrite.
    fn save(&self, session: &PickingSession) -> Result<(), StoreError>;

    /// Drop the row entirely (only used when a session returns to building).
    fn remove(&self, id: Uuid) -> Result<(), StoreError>;

    /// Save `session` and insert `note` as one unit: both or neither.
    fn save_with_note(&self, session: &PickingSession, note: &CorrectionNote)
        -> Result<(), StoreError>;

    /// Notes of one session in any order.
    fn notes(&self, session_id: Uuid) -> Result<Vec<CorrectionNote>, StoreError>;
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Quantities before and after a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaApplied {
    pub prev_quantity: i64,
    pub new_quantity: i64,
}

pub trait InventoryProvider {
    fn get(&self, key: &LineKey) -> Result<Option<InventoryRecord>, StoreError>;

    /// Apply a signed delta. A repeated `idempotency_key` must not apply
    /// twice; it returns the quantities of the first application. A
    /// positive delta on a missing row creates it.
    fn apply_delta(
        &self,
        key: &LineKey,
        delta: i64,
        idempotency_key: &str,
    ) -> Result<DeltaApplied, StoreError>;

    /// Delete the row, returning its last quantity. A repeated
    /// `idempotency_key` returns the first result even though the row is
    /// gone.
    fn remove(&self, key: &LineKey, idempotency_key: &str) -> Result<i64, StoreError>;

    /// Change the SKU of a row in place. A repeated `idempotency_key` is a
    /// successful no-op.
    fn rename_sku(&self, key: &LineKey, new_sku: &str, idempotency_key: &str)
        -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

pub trait ActivityLog {
    /// Appending an id that already exists is a no-op.
    fn append(&self, entry: &ActivityLogEntry) -> Result<(), StoreError>;
    fn get(&self, id: Uuid) -> Result<Option<ActivityLogEntry>, StoreError>;
    fn mark_reversed(&self, id: Uuid) -> Result<(), StoreError>;
    fn list(&self) -> Result<Vec<ActivityLogEntry>, StoreError>;
}

// ---------------------------------------------------------------------------
// Identity and time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

pub trait IdentityProvider {
    fn current(&self) -> Identity;
}

/// A fixed identity, for single-user tools.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Identity);

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self(Identity {
            user_id: user_id.into(),
            display_name: display_name.into(),
        })
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Identity {
        self.0.clone()
    }
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
