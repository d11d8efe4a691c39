//! In-memory storage collaborators with fault injection.
//!
//! Each backend can be switched offline (every call fails with
//! `StoreError::Offline` and has no effect). The inventory can also fail
//! the N-th new delta to exercise partially applied batches.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use pf_schemas::{
    ActionType, ActivityLogEntry, CorrectionNote, InventoryRecord, LineKey, PickingSession,
};
use pf_session::{ActivityLog, Clock, DeltaApplied, InventoryProvider, SessionStore, StoreError};
use uuid::Uuid;

fn gate(offline: &Cell<bool>) -> Result<(), StoreError> {
    if offline.get() {
        return Err(StoreError::Offline);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sessions + notes
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    rows: RefCell<BTreeMap<Uuid, PickingSession>>,
    notes: RefCell<Vec<CorrectionNote>>,
    offline: Cell<bool>,
    fail_note_insert: Cell<bool>,
    fail_next_save: Cell<bool>,
    writes: Cell<usize>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Make `save_with_note` fail as if the note insert were rejected.
    pub fn fail_note_insert(&self, fail: bool) {
        self.fail_note_insert.set(fail);
    }

    /// Reject the next `save` with a backend error.
    pub fn fail_next_save(&self) {
        self.fail_next_save.set(true);
    }

    /// Seed a row directly, bypassing the engine.
    pub fn put(&self, session: PickingSession) {
        self.rows.borrow_mut().insert(session.id, session);
    }

    pub fn row(&self, id: Uuid) -> Option<PickingSession> {
        self.rows.borrow().get(&id).cloned()
    }

    pub fn rows(&self) -> Vec<PickingSession> {
        self.rows.borrow().values().cloned().collect()
    }

    pub fn all_notes(&self) -> Vec<CorrectionNote> {
        self.notes.borrow().clone()
    }

    /// Successful session writes so far.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: Uuid) -> Result<Option<PickingSession>, StoreError> {
        gate(&self.offline)?;
        Ok(self.row(id))
    }

    fn list(&self) -> Result<Vec<PickingSession>, StoreError> {
        gate(&self.offline)?;
        Ok(self.rows())
    }

    fn save(&self, session: &PickingSession) -> Result<(), StoreError> {
        gate(&self.offline)?;
        if self.fail_next_save.replace(false) {
            return Err(StoreError::Backend("write rejected".to_string()));
        }
        self.put(session.clone());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        gate(&self.offline)?;
        self.rows.borrow_mut().remove(&id);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn save_with_note(&self, session: &PickingSession, note: &CorrectionNote) -> Result<(), StoreError> {
        gate(&self.offline)?;
        if self.fail_note_insert.get() {
            return Err(StoreError::Backend("note insert rejected".to_string()));
        }
        self.notes.borrow_mut().push(note.clone());
        self.put(session.clone());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn notes(&self, session_id: Uuid) -> Result<Vec<CorrectionNote>, StoreError> {
        gate(&self.offline)?;
        Ok(self
            .notes
            .borrow()
            .iter()
            .filter(|n| n.session_id == session_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryInventory {
    rows: RefCell<BTreeMap<LineKey, i64>>,
    /// idempotency key -> first result, for deltas, removals and renames
    applied: RefCell<HashMap<String, DeltaApplied>>,
    offline: Cell<bool>,
    fail_on_delta: Cell<Option<usize>>,
    new_deltas: Cell<usize>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Fail the `n`-th (1-based) delta attempted from now on. Replays of an
    /// already applied key do not count.
    pub fn fail_on_delta(&self, n: usize) {
        self.new_deltas.set(0);
        self.fail_on_delta.set(Some(n));
    }

    pub fn clear_faults(&self) {
        self.fail_on_delta.set(None);
        self.offline.set(false);
    }

    pub fn stock(&self, sku: &str, warehouse: &str, location: &str, quantity: i64) {
        self.rows
            .borrow_mut()
            .insert(LineKey::new(sku, warehouse, location), quantity);
    }

    pub fn quantity(&self, key: &LineKey) -> Option<i64> {
        self.rows.borrow().get(key).copied()
    }

    /// Distinct keyed writes actually applied.
    pub fn applied_count(&self) -> usize {
        self.applied.borrow().len()
    }
}

impl InventoryProvider for MemoryInventory {
    fn get(&self, key: &LineKey) -> Result<Option<InventoryRecord>, StoreError> {
        gate(&self.offline)?;
        Ok(self.quantity(key).map(|q| {
            InventoryRecord::new(&key.sku, &key.warehouse, &key.location, q)
        }))
    }

    fn apply_delta(&self, key: &LineKey, delta: i64, idempotency_key: &str) -> Result<DeltaApplied, StoreError> {
        gate(&self.offline)?;
        if let Some(first) = self.applied.borrow().get(idempotency_key) {
            return Ok(*first);
        }

        let attempt = self.new_deltas.get() + 1;
        self.new_deltas.set(attempt);
        if self.fail_on_delta.get() == Some(attempt) {
            return Err(StoreError::Backend(format!("injected failure on delta {attempt}")));
        }

        let prev = match self.quantity(key) {
            Some(q) => q,
            None if delta > 0 => 0,
            None => return Err(StoreError::NotFound(format!("inventory {key}"))),
        };
        let result = DeltaApplied {
            prev_quantity: prev,
            new_quantity: prev + delta,
        };
        self.rows.borrow_mut().insert(key.clone(), result.new_quantity);
        self.applied
            .borrow_mut()
            .insert(idempotency_key.to_string(), result);
        Ok(result)
    }

    fn remove(&self, key: &LineKey, idempotency_key: &str) -> Result<i64, StoreError> {
        gate(&self.offline)?;
        if let Some(first) = self.applied.borrow().get(idempotency_key) {
            return Ok(first.prev_quantity);
        }
        let last = self
            .rows
            .borrow_mut()
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(format!("inventory {key}")))?;
        self.applied.borrow_mut().insert(
            idempotency_key.to_string(),
            DeltaApplied {
                prev_quantity: last,
                new_quantity: 0,
            },
        );
        Ok(last)
    }

    fn rename_sku(&self, key: &LineKey, new_sku: &str, idempotency_key: &str) -> Result<(), StoreError> {
        gate(&self.offline)?;
        if self.applied.borrow().contains_key(idempotency_key) {
            return Ok(());
        }
        let mut rows = self.rows.borrow_mut();
        let qty = rows
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(format!("inventory {key}")))?;
        *rows
            .entry(LineKey::new(new_sku, &key.warehouse, &key.location))
            .or_insert(0) += qty;
        self.applied.borrow_mut().insert(
            idempotency_key.to_string(),
            DeltaApplied {
                prev_quantity: qty,
                new_quantity: qty,
            },
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryActivityLog {
    entries: RefCell<Vec<ActivityLogEntry>>,
    offline: Cell<bool>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn seed(&self, entry: ActivityLogEntry) {
        self.entries.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<ActivityLogEntry> {
        self.entries.borrow().clone()
    }

    pub fn count(&self, action: ActionType) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.action_type == action)
            .count()
    }

    pub fn for_list(&self, list_id: Uuid) -> Vec<ActivityLogEntry> {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.list_id == Some(list_id))
            .cloned()
            .collect()
    }
}

impl ActivityLog for MemoryActivityLog {
    fn append(&self, entry: &ActivityLogEntry) -> Result<(), StoreError> {
        gate(&self.offline)?;
        let mut entries = self.entries.borrow_mut();
        if !entries.iter().any(|e| e.id == entry.id) {
            entries.push(entry.clone());
        }
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<ActivityLogEntry>, StoreError> {
        gate(&self.offline)?;
        Ok(self.entries.borrow().iter().find(|e| e.id == id).cloned())
    }

    fn mark_reversed(&self, id: Uuid) -> Result<(), StoreError> {
        gate(&self.offline)?;
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("log entry {id}")))?;
        entry.is_reversed = true;
        Ok(())
    }

    fn list(&self) -> Result<Vec<ActivityLogEntry>, StoreError> {
        gate(&self.offline)?;
        Ok(self.entries())
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Deterministic clock. Time moves only when a test moves it.
#[derive(Debug)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
