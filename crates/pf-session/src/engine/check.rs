use pf_reconcile::{project, DeductLine, MutationKind, PendingMutation};
use pf_schemas::{ActivityLogEntry, CorrectionNote, LineKey, PickingSession, SessionStatus};
use uuid::Uuid;

use super::{store_err, SessionEngine};
use crate::checklist::VerificationChecklist;
use crate::error::{PickingError, ValidationError};
use crate::lock::{evaluate_checker_lock, LockDecision, TakeoverKind, TakeoverRequest};
use crate::notes::normalize_message;
use crate::notify::ChangeEvent;
use crate::state_machine::{advance, next_status, SessionEvent};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeductOutcome {
    /// Every line deducted; the session is completed.
    Completed { entries: Vec<ActivityLogEntry> },
    /// Checklist incomplete: back to the queue, inventory untouched.
    Released,
    /// Storage offline before any line applied; replayed on the next flush.
    Queued { optimistic_id: String },
    /// This idempotency key already completed.
    AlreadyApplied,
}

/// Lines a verified session deducts, in cart order. Zero lines are skipped.
pub(super) fn deduct_lines(session: &PickingSession) -> Vec<DeductLine> {
    session
        .items
        .iter()
        .filter(|i| i.picking_qty > 0)
        .map(|i| DeductLine {
            sku: i.sku.clone(),
            warehouse: i.warehouse.clone(),
            location: i.location.clone(),
            quantity: i.picking_qty,
        })
        .collect()
}

impl<'a> SessionEngine<'a> {
    // -----------------------------------------------------------------------
    // lock / takeover
    // -----------------------------------------------------------------------

    /// ready_to_double_check -> double_checking for this user.
    ///
    /// If another user is checking, nothing changes and `Conflict` carries
    /// the takeover request to confirm.
    pub fn lock_for_check(&mut self, id: Uuid) -> Result<PickingSession, PickingError> {
        let user = self.user_id();
        let mut session = self.persisted(id, "lock for check")?;
        if session.status != SessionStatus::DoubleChecking {
            next_status(
                Some(session.status),
                &SessionEvent::LockForCheck {
                    checker: user.clone(),
                },
            )?;
        }

        match evaluate_checker_lock(&session, &user) {
            LockDecision::HeldByCaller if session.status == SessionStatus::DoubleChecking => {
                self.checking = Some(session.clone());
                return Ok(session);
            }
            LockDecision::Conflict(req) => {
                tracing::warn!(
                    session_id = %id,
                    holder = %req.current_holder,
                    requested_by = %user,
                    "session already being checked"
                );
                return Err(PickingError::Conflict(req));
            }
            LockDecision::Free | LockDecision::HeldByCaller => {}
        }

        self.release_other_checks(&user, id)?;
        let event = if session.status == SessionStatus::DoubleChecking {
            SessionEvent::TakeOverCheck { checker: user.clone() }
        } else {
            SessionEvent::LockForCheck { checker: user.clone() }
        };
        advance(&mut session, &event)?;
        self.save(&mut session, "lock for check")?;
        self.checking = Some(session.clone());
        tracing::info!(session_id = %id, checker = %user, "locked for check");
        Ok(session)
    }

    /// Apply a takeover the user confirmed. The session is read again
    /// first: if it vanished or finished meanwhile, this is `NotFound` and
    /// nothing changes.
    pub fn confirm_takeover(&mut self, req: &TakeoverRequest) -> Result<PickingSession, PickingError> {
        let user = self.user_id();
        if req.requested_by != user {
            return Err(PickingError::NotHolder {
                session_id: req.session_id,
                user,
                holder: Some(req.requested_by.clone()),
            });
        }

        let mut session = match self.deps.sessions.get(req.session_id) {
            Ok(Some(s)) => s,
            Ok(None) => {
                tracing::warn!(session_id = %req.session_id, "takeover target vanished");
                return Err(PickingError::NotFound(format!("session {}", req.session_id)));
            }
            Err(e) => return Err(store_err("confirm takeover", e)),
        };
        if session.status.is_terminal() {
            return Err(PickingError::NotFound(format!(
                "session {} is {}",
                session.id, session.status
            )));
        }

        match req.kind {
            TakeoverKind::Checker => {
                // A third user got in between: ask again.
                if let Some(holder) = session.checker_id.as_deref() {
                    if holder != req.current_holder && holder != user {
                        return Err(PickingError::Conflict(TakeoverRequest {
                            current_holder: holder.to_string(),
                            ..req.clone()
                        }));
                    }
                }
                let event = match session.status {
                    SessionStatus::DoubleChecking => SessionEvent::TakeOverCheck { checker: user.clone() },
                    _ => SessionEvent::LockForCheck { checker: user.clone() },
                };
                next_status(Some(session.status), &event)?;
                self.release_other_checks(&user, session.id)?;
                advance(&mut session, &event)?;
                self.save(&mut session, "confirm takeover")?;
                self.checking = Some(session.clone());
                tracing::warn!(
                    session_id = %session.id,
                    previous = %req.current_holder,
                    checker = %user,
                    "checker takeover confirmed"
                );
            }
            TakeoverKind::OrderNumber => {
                if session.owner_id != req.current_holder && session.owner_id != user {
                    return Err(PickingError::Conflict(TakeoverRequest {
                        current_holder: session.owner_id.clone(),
                        ..req.clone()
                    }));
                }
                session.owner_id = user.clone();
                self.save(&mut session, "confirm takeover")?;
                tracing::warn!(
                    session_id = %session.id,
                    previous = %req.current_holder,
                    owner = %user,
                    "order takeover confirmed"
                );
            }
        }
        Ok(session)
    }

    /// A user checks one session at a time: hand back every other session
    /// this user is checking.
    fn release_other_checks(&self, user: &str, keep: Uuid) -> Result<(), PickingError> {
        let sessions = self.all_sessions("release other checks")?;
        for mut other in sessions.into_iter().filter(|s| {
            s.id != keep
                && s.status == SessionStatus::DoubleChecking
                && s.checker_id.as_deref() == Some(user)
        }) {
            advance(&mut other, &SessionEvent::Release)?;
            self.save(&mut other, "release other checks")?;
            tracing::info!(session_id = %other.id, checker = user, "previous check released");
        }
        Ok(())
    }

    /// double_checking -> ready_to_double_check without a verdict.
    pub fn release_check(&mut self, id: Uuid) -> Result<PickingSession, PickingError> {
        let user = self.user_id();
        let mut session = self.persisted(id, "release check")?;
        next_status(Some(session.status), &SessionEvent::Release)?;
        self.require_checker(&session, &user)?;

        advance(&mut session, &SessionEvent::Release)?;
        self.save(&mut session, "release check")?;
        self.checking = None;
        self.clear_progress(id);
        tracing::info!(session_id = %id, checker = %user, "check released");
        Ok(session)
    }

    /// double_checking -> needs_correction with a note. The note and the
    /// transition are written together or not at all.
    pub fn return_to_picker(&mut self, id: Uuid, message: &str) -> Result<CorrectionNote, PickingError> {
        let user = self.user_id();
        let message = normalize_message(message)?;
        let mut session = self.persisted(id, "return to picker")?;
        next_status(Some(session.status), &SessionEvent::ReturnToPicker)?;
        self.require_checker(&session, &user)?;

        let now = self.now();
        let note = CorrectionNote {
            id: Uuid::new_v4(),
            session_id: id,
            author: user.clone(),
            message: message.clone(),
            created_at: now,
        };
        advance(&mut session, &SessionEvent::ReturnToPicker)?;
        session.correction_notes = Some(message);
        session.updated_at = now;

        self.deps
            .sessions
            .save_with_note(&session, &note)
            .map_err(|e| store_err("return to picker", e))?;

        self.publish(ChangeEvent::SessionChanged { session_id: id });
        self.publish(ChangeEvent::NotesChanged { session_id: id });
        self.checking = None;
        self.clear_progress(id);
        tracing::info!(session_id = %id, checker = %user, "returned to picker");
        Ok(note)
    }

    // -----------------------------------------------------------------------
    // checklist
    // -----------------------------------------------------------------------

    /// Checklist of a session, with progress restored from the local cache.
    pub fn checklist(&self, id: Uuid) -> Result<VerificationChecklist, PickingError> {
        let session = self.persisted(id, "load checklist")?;
        VerificationChecklist::restore(id, &session.pallets, self.deps.progress)
            .map_err(|reason| PickingError::Cache { reason })
    }

    /// Flip one checkbox and persist progress. `None` for an unknown key.
    pub fn toggle_check(
        &self,
        checklist: &mut VerificationChecklist,
        key: &str,
    ) -> Result<Option<bool>, PickingError> {
        let state = checklist.toggle(key);
        if state.is_some() {
            checklist
                .persist(self.deps.progress)
                .map_err(|reason| PickingError::Cache { reason })?;
        }
        Ok(state)
    }

    // -----------------------------------------------------------------------
    // deduction
    // -----------------------------------------------------------------------

    /// Finish a double-check.
    ///
    /// All-or-nothing: with any checkbox unticked the session goes back to
    /// the queue and inventory is not touched. With every box ticked, one
    /// delta per cart line is applied and the session completes.
    ///
    /// The deltas are independent writes. If one fails after others were
    /// applied the result is `BatchPartialFailure` and nothing is retried.
    ///
    /// With the session store unreachable, a complete checklist is queued
    /// against the row this engine locked; replay re-reads the row first.
    pub fn deduct(
        &mut self,
        id: Uuid,
        checklist: &VerificationChecklist,
        idempotency_key: &str,
    ) -> Result<DeductOutcome, PickingError> {
        if self.applied.contains(idempotency_key) {
            return Ok(DeductOutcome::AlreadyApplied);
        }
        if self.queue.contains(idempotency_key) {
            return Ok(DeductOutcome::Queued {
                optimistic_id: idempotency_key.to_string(),
            });
        }

        let user = self.user_id();
        let (mut session, store_online) = match self.deps.sessions.get(id) {
            Ok(Some(s)) => (s, true),
            Ok(None) => return Err(PickingError::NotFound(format!("session {id}"))),
            Err(StoreError::Offline) => match self.checking.as_ref().filter(|c| c.id == id) {
                Some(locked) => (locked.clone(), false),
                None => return Err(PickingError::Offline { operation: "deduct" }),
            },
            Err(e) => return Err(store_err("deduct", e)),
        };
        next_status(Some(session.status), &SessionEvent::DeductFull)?;
        self.require_checker(&session, &user)?;
        if checklist.session_id() != id {
            return Err(ValidationError::ChecklistMismatch {
                expected: id,
                found: checklist.session_id(),
            }
            .into());
        }

        if !checklist.is_complete() {
            advance(&mut session, &SessionEvent::DeductPartial)?;
            self.save(&mut session, "release partial check")?;
            self.checking = None;
            self.clear_progress(id);
            tracing::info!(
                session_id = %id,
                checked = checklist.checked_count(),
                total = checklist.total_checkboxes(),
                "verification incomplete; released without deduction"
            );
            return Ok(DeductOutcome::Released);
        }

        let mutation = PendingMutation {
            optimistic_id: idempotency_key.to_string(),
            performed_by: user,
            submitted_at: self.now(),
            kind: MutationKind::ProcessPickingList {
                list_id: id,
                order_number: session.order_number.clone(),
                lines: deduct_lines(&session),
            },
        };

        if !store_online {
            tracing::warn!(session_id = %id, optimistic_id = idempotency_key, "session store offline; deduction queued");
            self.queue.enqueue(mutation);
            return Ok(DeductOutcome::Queued {
                optimistic_id: idempotency_key.to_string(),
            });
        }

        match self.commit_deduction(session, &mutation) {
            Ok(entries) => Ok(DeductOutcome::Completed { entries }),
            Err(PickingError::Offline { .. }) => {
                tracing::warn!(session_id = %id, optimistic_id = idempotency_key, "offline; deduction queued");
                self.queue.enqueue(mutation);
                Ok(DeductOutcome::Queued {
                    optimistic_id: idempotency_key.to_string(),
                })
            }
            Err(e) => {
                if let PickingError::BatchPartialFailure { applied, .. } = &e {
                    tracing::error!(
                        session_id = %id,
                        applied = applied.len(),
                        error = %e,
                        "deduction partially applied; manual reconciliation required"
                    );
                }
                Err(e)
            }
        }
    }

    /// Apply the deltas of a `ProcessPickingList` mutation to `session`,
    /// write one DEDUCT entry per line and complete the session.
    ///
    /// `Offline` is returned only when nothing was applied.
    pub(super) fn commit_deduction(
        &mut self,
        mut session: PickingSession,
        mutation: &PendingMutation,
    ) -> Result<Vec<ActivityLogEntry>, PickingError> {
        let MutationKind::ProcessPickingList { lines, .. } = &mutation.kind else {
            return Err(PickingError::Storage(format!(
                "{} is not a deduction",
                mutation.kind.label()
            )));
        };
        let key = mutation.optimistic_id.as_str();
        let now = self.now();

        // Same ids the optimistic projection used.
        let mut templates = project(mutation, &[]);
        let mut applied = Vec::with_capacity(lines.len());
        let mut entries = Vec::with_capacity(lines.len());

        for (idx, (line, entry)) in lines.iter().zip(templates.iter_mut()).enumerate() {
            let line_key = line.line_key();
            let partial = |applied: &Vec<LineKey>, reason: String| PickingError::BatchPartialFailure {
                session_id: session.id,
                applied: applied.clone(),
                failed: Some(line_key.clone()),
                reason,
            };

            let delta = match self.deps.inventory.apply_delta(
                &line_key,
                -i64::from(line.quantity),
                &format!("{key}:{idx}"),
            ) {
                Ok(d) => d,
                Err(e) if applied.is_empty() => return Err(store_err("deduct", e)),
                Err(e) => return Err(partial(&applied, e.to_string())),
            };
            applied.push(line_key.clone());

            entry.is_optimistic = false;
            entry.created_at = now;
            entry.prev_quantity = Some(delta.prev_quantity);
            entry.new_quantity = Some(delta.new_quantity);
            if let Err(e) = self.deps.activity.append(entry) {
                return Err(partial(&applied, format!("activity log: {e}")));
            }
            entries.push(entry.clone());
        }

        advance(&mut session, &SessionEvent::DeductFull)?;
        if let Err(e) = self.save(&mut session, "complete session") {
            return Err(PickingError::BatchPartialFailure {
                session_id: session.id,
                applied,
                failed: None,
                reason: e.to_string(),
            });
        }

        self.applied.insert(key.to_string());
        if self.checking.as_ref().is_some_and(|c| c.id == session.id) {
            self.checking = None;
        }
        self.clear_progress(session.id);
        self.publish(ChangeEvent::ActivityChanged {
            list_id: Some(session.id),
        });
        tracing::info!(
            session_id = %session.id,
            lines = entries.len(),
            "session completed"
        );
        Ok(entries)
    }
}
