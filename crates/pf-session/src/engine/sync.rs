use std::collections::BTreeMap;

use chrono::Duration;
use pf_reconcile::{
    project, reconcile, FlushReport, MutationExecutor, MutationKind, PendingMutation,
    RejectedMutation, ReplayError,
};
use pf_schemas::{ActionType, ActivityLogEntry, LineKey, PickingSession, SessionStatus};
use uuid::Uuid;

use super::{store_err, SessionEngine};
use crate::error::{PickingError, ValidationError};
use crate::notify::ChangeEvent;
use crate::state_machine::{advance, SessionEvent, TransitionError};
use crate::store::{DeltaApplied, StoreError};
use crate::view::ViewMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Applied { entry: ActivityLogEntry },
    /// The target was already reversed; nothing written.
    AlreadyReversed,
    Queued { optimistic_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Applied { entries: Vec<ActivityLogEntry> },
    Queued { optimistic_id: String },
}

/// What a user lands on after login or reload.
#[derive(Debug, Clone, PartialEq)]
pub struct Resume {
    pub mode: ViewMode,
    pub session: Option<PickingSession>,
    /// Stale sessions released or cancelled on the way.
    pub abandoned: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationQueue {
    /// Newest first.
    pub sessions: Vec<PickingSession>,
    pub counts: BTreeMap<SessionStatus, usize>,
}

impl VerificationQueue {
    pub fn count(&self, status: SessionStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

fn location_of(warehouse: &Option<String>, location: &Option<String>, sku: &str) -> Option<LineKey> {
    match (warehouse, location) {
        (Some(w), Some(l)) => Some(LineKey::new(sku, w, l)),
        _ => None,
    }
}

impl<'a> SessionEngine<'a> {
    fn pending(&self, optimistic_id: &str, kind: MutationKind) -> PendingMutation {
        PendingMutation {
            optimistic_id: optimistic_id.to_string(),
            performed_by: self.user_id(),
            submitted_at: self.now(),
            kind,
        }
    }

    fn queue_mutation(&mut self, mutation: PendingMutation) -> String {
        let id = mutation.optimistic_id.clone();
        tracing::warn!(optimistic_id = %id, kind = mutation.kind.label(), "offline; mutation queued");
        self.queue.enqueue(mutation);
        id
    }

    // -----------------------------------------------------------------------
    // undo
    // -----------------------------------------------------------------------

    /// Reverse the log entry `log_id`. Undoing a reversed entry is a no-op;
    /// offline storage queues the undo.
    pub fn undo(&mut self, log_id: Uuid, optimistic_id: &str) -> Result<UndoOutcome, PickingError> {
        if self.queue.contains(optimistic_id) {
            return Ok(UndoOutcome::Queued {
                optimistic_id: optimistic_id.to_string(),
            });
        }
        let mutation = self.pending(optimistic_id, MutationKind::Undo { target_id: log_id });
        if !self.queue.is_empty() {
            return Ok(UndoOutcome::Queued {
                optimistic_id: self.queue_mutation(mutation),
            });
        }

        let target = match self.deps.activity.get(log_id) {
            Ok(Some(t)) => t,
            Ok(None) => return Err(PickingError::NotFound(format!("log entry {log_id}"))),
            Err(StoreError::Offline) => {
                return Ok(UndoOutcome::Queued {
                    optimistic_id: self.queue_mutation(mutation),
                })
            }
            Err(e) => return Err(store_err("undo", e)),
        };
        if target.is_reversed {
            return Ok(UndoOutcome::AlreadyReversed);
        }

        match self.apply_undo(&target, &mutation) {
            Ok(entry) => Ok(UndoOutcome::Applied { entry }),
            Err(PickingError::Offline { .. }) => Ok(UndoOutcome::Queued {
                optimistic_id: self.queue_mutation(mutation),
            }),
            Err(e) => Err(e),
        }
    }

    /// Inverse deltas, reversed flag, UNDO entry. Every step is keyed by
    /// the mutation's id, so a replay after a dropped connection is safe.
    fn apply_undo(
        &self,
        target: &ActivityLogEntry,
        mutation: &PendingMutation,
    ) -> Result<ActivityLogEntry, PickingError> {
        let opt = mutation.optimistic_id.as_str();
        let missing = || ValidationError::NotReversible("location-less");
        let inventory = self.deps.inventory;

        let applied: DeltaApplied = match target.action_type {
            ActionType::Add => {
                let key = location_of(&target.to_warehouse, &target.to_location, &target.sku)
                    .ok_or_else(missing)?;
                inventory
                    .apply_delta(&key, -target.quantity_change, &format!("{opt}:0"))
                    .map_err(|e| store_err("undo", e))?
            }
            ActionType::Deduct => {
                let key = location_of(&target.from_warehouse, &target.from_location, &target.sku)
                    .ok_or_else(missing)?;
                inventory
                    .apply_delta(&key, -target.quantity_change, &format!("{opt}:0"))
                    .map_err(|e| store_err("undo", e))?
            }
            ActionType::Move => {
                let from = location_of(&target.from_warehouse, &target.from_location, &target.sku)
                    .ok_or_else(missing)?;
                let to = location_of(&target.to_warehouse, &target.to_location, &target.sku)
                    .ok_or_else(missing)?;
                let qty = target.quantity_change.abs();
                inventory
                    .apply_delta(&to, -qty, &format!("{opt}:0"))
                    .map_err(|e| store_err("undo", e))?;
                inventory
                    .apply_delta(&from, qty, &format!("{opt}:1"))
                    .map_err(|e| store_err("undo", e))?
            }
            other => return Err(ValidationError::NotReversible(other.as_str()).into()),
        };

        self.deps
            .activity
            .mark_reversed(target.id)
            .map_err(|e| store_err("undo", e))?;

        let mut entry = project(mutation, std::slice::from_ref(target))
            .into_iter()
            .next()
            .ok_or_else(|| PickingError::NotFound(format!("log entry {}", target.id)))?;
        entry.is_optimistic = false;
        entry.created_at = self.now();
        entry.prev_quantity = Some(applied.prev_quantity);
        entry.new_quantity = Some(applied.new_quantity);
        self.deps
            .activity
            .append(&entry)
            .map_err(|e| store_err("undo", e))?;

        self.publish(ChangeEvent::ActivityChanged {
            list_id: target.list_id,
        });
        tracing::info!(entry_id = %target.id, action = target.action_type.as_str(), "entry reversed");
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // inventory mutations
    // -----------------------------------------------------------------------

    /// Apply an inventory mutation now, or queue it when offline.
    ///
    /// Queued mutations run strictly in order, so a new one goes to the
    /// back of a non-empty queue instead of overtaking it.
    pub fn submit(&mut self, kind: MutationKind, optimistic_id: &str) -> Result<SubmitOutcome, PickingError> {
        if self.queue.contains(optimistic_id) {
            return Ok(SubmitOutcome::Queued {
                optimistic_id: optimistic_id.to_string(),
            });
        }
        let mutation = self.pending(optimistic_id, kind);
        if !self.queue.is_empty() {
            return Ok(SubmitOutcome::Queued {
                optimistic_id: self.queue_mutation(mutation),
            });
        }
        match self.apply_mutation(&mutation) {
            Ok(entries) => Ok(SubmitOutcome::Applied { entries }),
            Err(PickingError::Offline { .. }) => Ok(SubmitOutcome::Queued {
                optimistic_id: self.queue_mutation(mutation),
            }),
            Err(e) => Err(e),
        }
    }

    fn delta(&self, key: &LineKey, delta: i64, opt: &str, idx: usize) -> Result<DeltaApplied, PickingError> {
        self.deps
            .inventory
            .apply_delta(key, delta, &format!("{opt}:{idx}"))
            .map_err(|e| store_err("apply mutation", e))
    }

    /// Apply one mutation against storage and write its log entries. Used
    /// both for direct submission and for queue replay.
    fn apply_mutation(&mut self, mutation: &PendingMutation) -> Result<Vec<ActivityLogEntry>, PickingError> {
        let opt = mutation.optimistic_id.as_str();
        let mut entries = project(mutation, &[]);

        match &mutation.kind {
            MutationKind::AdjustQuantity { key, delta, .. } => {
                let d = self.delta(key, *delta, opt, 0)?;
                fill_quantities(&mut entries, d);
            }
            MutationKind::Move {
                sku,
                from_warehouse,
                from_location,
                to_warehouse,
                to_location,
                quantity,
            } => {
                if *quantity < 0 {
                    return Err(ValidationError::Negative(*quantity).into());
                }
                let from = LineKey::new(sku, from_warehouse, from_location);
                let to = LineKey::new(sku, to_warehouse, to_location);
                let d = self.delta(&from, -quantity, opt, 0)?;
                self.delta(&to, *quantity, opt, 1)?;
                fill_quantities(&mut entries, d);
            }
            MutationKind::AddItem { key, quantity } => {
                if *quantity < 0 {
                    return Err(ValidationError::Negative(*quantity).into());
                }
                let d = self.delta(key, *quantity, opt, 0)?;
                fill_quantities(&mut entries, d);
            }
            MutationKind::DeleteItem { key, .. } => {
                let last = self
                    .deps
                    .inventory
                    .remove(key, &format!("{opt}:0"))
                    .map_err(|e| store_err("delete item", e))?;
                for e in entries.iter_mut() {
                    e.quantity_change = -last;
                    e.prev_quantity = Some(last);
                    e.new_quantity = Some(0);
                }
            }
            MutationKind::EditItem { key, new_sku } => {
                self.deps
                    .inventory
                    .rename_sku(key, new_sku, &format!("{opt}:0"))
                    .map_err(|e| store_err("edit item", e))?;
            }
            MutationKind::Undo { target_id } => {
                let target = self
                    .deps
                    .activity
                    .get(*target_id)
                    .map_err(|e| store_err("undo", e))?
                    .ok_or_else(|| PickingError::NotFound(format!("log entry {target_id}")))?;
                if target.is_reversed {
                    return Ok(Vec::new());
                }
                return self.apply_undo(&target, mutation).map(|e| vec![e]);
            }
            MutationKind::ProcessPickingList { list_id, .. } => {
                if self.applied.contains(opt) {
                    return Ok(Vec::new());
                }
                let session = self.persisted(*list_id, "replay deduction")?;
                if session.status != SessionStatus::DoubleChecking {
                    return Err(TransitionError {
                        from: Some(session.status),
                        event: "DeductFull".to_string(),
                    }
                    .into());
                }
                self.require_checker(&session, &mutation.performed_by)?;
                return self.commit_deduction(session, mutation);
            }
        }

        let now = self.now();
        for e in entries.iter_mut() {
            e.is_optimistic = false;
            e.created_at = now;
            self.deps
                .activity
                .append(e)
                .map_err(|err| store_err("write activity", err))?;
        }
        self.publish(ChangeEvent::ActivityChanged { list_id: None });
        tracing::info!(optimistic_id = opt, kind = mutation.kind.label(), "mutation applied");
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // queue
    // -----------------------------------------------------------------------

    /// Replay queued mutations in order (call when connectivity returns).
    pub fn flush_pending(&mut self) -> FlushReport {
        let mut queue = std::mem::take(&mut self.queue);
        let report = queue.flush(self);
        self.queue = queue;
        report
    }

    pub fn take_rejected(&mut self) -> Vec<RejectedMutation> {
        self.queue.take_rejected()
    }

    /// Confirmed log merged with the projections of queued mutations.
    pub fn activity_view(&self) -> Result<Vec<ActivityLogEntry>, PickingError> {
        let confirmed = self
            .deps
            .activity
            .list()
            .map_err(|e| store_err("load activity", e))?;
        let pending: Vec<PendingMutation> = self.queue.pending().cloned().collect();
        Ok(reconcile(&confirmed, &pending))
    }

    // -----------------------------------------------------------------------
    // resume / queue view
    // -----------------------------------------------------------------------

    /// Restore where this user left off: an open check first, then the
    /// most recent picking session, then the newest local draft.
    ///
    /// Sessions untouched for longer than `stale_after_hours` are not
    /// resumed. A stale check goes back to the queue; a stale picking
    /// session is cancelled.
    pub fn resume_for(&mut self) -> Result<Resume, PickingError> {
        let user = self.user_id();
        let now = self.now();
        let stale_after = Duration::hours(i64::from(self.config.stale_after_hours));
        let is_stale = |s: &PickingSession| now - s.updated_at > stale_after;

        let mut sessions = self.all_sessions("resume")?;
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let mut abandoned = Vec::new();

        let checking: Vec<PickingSession> = sessions
            .iter()
            .filter(|s| {
                s.status == SessionStatus::DoubleChecking && s.checker_id.as_deref() == Some(user.as_str())
            })
            .cloned()
            .collect();
        let mut resumed: Option<PickingSession> = None;
        for mut s in checking {
            if is_stale(&s) {
                advance(&mut s, &SessionEvent::Release)?;
                self.save(&mut s, "release stale check")?;
                self.clear_progress(s.id);
                tracing::warn!(session_id = %s.id, checker = %user, "stale check released");
                abandoned.push(s.id);
            } else if resumed.is_none() {
                resumed = Some(s);
            }
        }
        if let Some(session) = resumed {
            self.checking = Some(session.clone());
            tracing::info!(session_id = %session.id, "resuming double-check");
            return Ok(Resume {
                mode: ViewMode::DoubleChecking,
                session: Some(session),
                abandoned,
            });
        }

        let picking = sessions.into_iter().find(|s| {
            s.owner_id == user
                && matches!(s.status, SessionStatus::Active | SessionStatus::NeedsCorrection)
        });
        if let Some(mut s) = picking {
            if is_stale(&s) {
                advance(&mut s, &SessionEvent::Delete)?;
                self.save(&mut s, "cancel stale session")?;
                self.clear_progress(s.id);
                tracing::warn!(session_id = %s.id, owner = %user, "stale picking session cancelled");
                abandoned.push(s.id);
            } else {
                tracing::info!(session_id = %s.id, "resuming picking");
                return Ok(Resume {
                    mode: ViewMode::Picking,
                    session: Some(s),
                    abandoned,
                });
            }
        }

        let draft = self.drafts().into_iter().next();
        let mode = if draft.is_some() {
            ViewMode::Building
        } else {
            ViewMode::Idle
        };
        Ok(Resume {
            mode,
            session: draft,
            abandoned,
        })
    }

    /// Sessions waiting on (or in) verification, updated within the queue
    /// window, newest first.
    pub fn verification_queue(&self) -> Result<VerificationQueue, PickingError> {
        let cutoff = self.now() - Duration::hours(i64::from(self.config.queue_window_hours));
        let mut sessions: Vec<PickingSession> = self
            .all_sessions("load verification queue")?
            .into_iter()
            .filter(|s| {
                SessionStatus::QUEUED.contains(&s.status)
                    && !s.items.is_empty()
                    && s.updated_at >= cutoff
            })
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));

        let mut counts = BTreeMap::new();
        for s in &sessions {
            *counts.entry(s.status).or_insert(0) += 1;
        }
        Ok(VerificationQueue { sessions, counts })
    }
}

fn fill_quantities(entries: &mut [ActivityLogEntry], d: DeltaApplied) {
    if let Some(e) = entries.first_mut() {
        e.prev_quantity = Some(d.prev_quantity);
        e.new_quantity = Some(d.new_quantity);
    }
}

impl<'a> MutationExecutor for SessionEngine<'a> {
    fn execute(&mut self, mutation: &PendingMutation) -> Result<(), ReplayError> {
        match self.apply_mutation(mutation) {
            Ok(_) => Ok(()),
            Err(PickingError::Offline { .. }) => Err(ReplayError::Offline),
            Err(e) => Err(ReplayError::Rejected(e.to_string())),
        }
    }
}
