//! Session engine
//!
//! The single state container for one client. Every mutation of a session
//! goes through a named operation here; nothing assigns session fields from
//! outside. One engine acts as one user (from the identity provider);
//! several engines share the same stores to model several terminals.
//!
//! Operations are grouped by phase:
//! - `build`: cart editing, path generation, mark ready
//! - `check`: lock/takeover, checklist, return to picker, deduction
//! - `sync`:  undo, queued mutations, resume, verification queue

mod build;
mod check;
mod sync;

pub use check::DeductOutcome;
pub use sync::{Resume, SubmitOutcome, UndoOutcome, VerificationQueue};

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use pf_config::PickingConfig;
use pf_path::{LocationDirectory, PalletPacker};
use pf_reconcile::MutationQueue;
use pf_schemas::{PickingSession, SessionStatus};
use uuid::Uuid;

use crate::cart::{verify_reservations, ReservationBook};
use crate::draft_cache::DraftCache;
use crate::error::{PickingError, ValidationError};
use crate::notes::NotesTimeline;
use crate::notify::{ChangeEvent, ChangeFeed};
use crate::progress_cache::ProgressCache;
use crate::store::{
    ActivityLog, Clock, IdentityProvider, InventoryProvider, SessionStore, StoreError,
};

/// Everything the engine talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub sessions: &'a dyn SessionStore,
    pub inventory: &'a dyn InventoryProvider,
    pub activity: &'a dyn ActivityLog,
    pub directory: &'a dyn LocationDirectory,
    pub identity: &'a dyn IdentityProvider,
    pub clock: &'a dyn Clock,
    pub progress: &'a dyn ProgressCache,
    pub drafts: &'a dyn DraftCache,
    pub feed: Option<&'a ChangeFeed>,
}

pub struct SessionEngine<'a> {
    deps: Collaborators<'a>,
    config: PickingConfig,
    packer: PalletPacker,
    /// Sessions in `building`. Mirrored to the draft cache, never to the
    /// session store.
    drafts: HashMap<Uuid, PickingSession>,
    /// Row of the session this user holds for check, as last read or
    /// written. Lets a deduction be queued while the session store is down.
    checking: Option<PickingSession>,
    /// Idempotency keys of deductions this engine completed.
    applied: HashSet<String>,
    queue: MutationQueue,
}

impl<'a> SessionEngine<'a> {
    /// Restores this user's drafts from the draft cache. An unreadable
    /// cache is logged and the engine starts without drafts.
    pub fn new(deps: Collaborators<'a>, config: PickingConfig) -> Self {
        let packer = PalletPacker::new(config.pallet_capacity);
        let me = deps.identity.current().user_id;
        let drafts: HashMap<Uuid, PickingSession> = match deps.drafts.load_all() {
            Ok(all) => all
                .into_iter()
                .filter(|d| d.owner_id == me && d.status == SessionStatus::Building)
                .map(|d| (d.id, d))
                .collect(),
            Err(e) => {
                tracing::warn!(user = %me, error = %format!("{e:#}"), "failed to restore drafts");
                HashMap::new()
            }
        };
        if !drafts.is_empty() {
            tracing::info!(user = %me, drafts = drafts.len(), "drafts restored");
        }
        Self {
            deps,
            config,
            packer,
            drafts,
            checking: None,
            applied: HashSet::new(),
            queue: MutationQueue::new(),
        }
    }

    /// Resume with a queue restored from durable storage.
    pub fn with_queue(mut self, queue: MutationQueue) -> Self {
        self.queue = queue;
        self
    }

    pub fn config(&self) -> &PickingConfig {
        &self.config
    }

    pub fn user_id(&self) -> String {
        self.deps.identity.current().user_id
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut MutationQueue {
        &mut self.queue
    }

    /// The session as this client sees it: local draft first, then storage.
    pub fn session(&self, id: Uuid) -> Result<PickingSession, PickingError> {
        if let Some(draft) = self.drafts.get(&id) {
            return Ok(draft.clone());
        }
        self.persisted(id, "load session")
    }

    /// Local drafts of the current user, newest first.
    pub fn drafts(&self) -> Vec<PickingSession> {
        let me = self.user_id();
        let mut out: Vec<PickingSession> = self
            .drafts
            .values()
            .filter(|d| d.owner_id == me)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out
    }

    pub fn notes(&self, id: Uuid) -> Result<NotesTimeline, PickingError> {
        let rows = self
            .deps
            .sessions
            .notes(id)
            .map_err(|e| store_err("load notes", e))?;
        Ok(NotesTimeline::from_notes(id, rows))
    }

    // -----------------------------------------------------------------------
    // internals shared by the phase modules
    // -----------------------------------------------------------------------

    fn now(&self) -> DateTime<Utc> {
        self.deps.clock.now()
    }

    fn persisted(&self, id: Uuid, op: &'static str) -> Result<PickingSession, PickingError> {
        self.deps
            .sessions
            .get(id)
            .map_err(|e| store_err(op, e))?
            .ok_or_else(|| PickingError::NotFound(format!("session {id}")))
    }

    fn all_sessions(&self, op: &'static str) -> Result<Vec<PickingSession>, PickingError> {
        self.deps.sessions.list().map_err(|e| store_err(op, e))
    }

    /// Stamp `updated_at`, write, announce.
    fn save(&self, session: &mut PickingSession, op: &'static str) -> Result<(), PickingError> {
        session.updated_at = self.now();
        self.deps
            .sessions
            .save(session)
            .map_err(|e| store_err(op, e))?;
        self.publish(ChangeEvent::SessionChanged {
            session_id: session.id,
        });
        Ok(())
    }

    /// Drafts go to the draft cache; everything else is saved.
    fn commit(&mut self, mut session: PickingSession, op: &'static str) -> Result<(), PickingError> {
        if session.status == SessionStatus::Building {
            session.updated_at = self.now();
            self.stash_draft(session);
            return Ok(());
        }
        self.save(&mut session, op)
    }

    fn stash_draft(&mut self, draft: PickingSession) {
        if let Err(e) = self.deps.drafts.store(&draft) {
            tracing::warn!(session_id = %draft.id, error = %format!("{e:#}"), "failed to cache draft");
        }
        self.drafts.insert(draft.id, draft);
    }

    fn drop_draft(&mut self, id: Uuid) -> Option<PickingSession> {
        let draft = self.drafts.remove(&id)?;
        if let Err(e) = self.deps.drafts.clear(id) {
            tracing::warn!(session_id = %id, error = %format!("{e:#}"), "failed to clear cached draft");
        }
        Some(draft)
    }

    fn publish(&self, event: ChangeEvent) {
        if let Some(feed) = self.deps.feed {
            feed.publish(event);
        }
    }

    fn require_owner(&self, session: &PickingSession, user: &str) -> Result<(), PickingError> {
        if session.owner_id != user {
            return Err(PickingError::NotHolder {
                session_id: session.id,
                user: user.to_string(),
                holder: Some(session.owner_id.clone()),
            });
        }
        Ok(())
    }

    fn require_checker(&self, session: &PickingSession, user: &str) -> Result<(), PickingError> {
        if session.checker_id.as_deref() != Some(user) {
            return Err(PickingError::NotHolder {
                session_id: session.id,
                user: user.to_string(),
                holder: session.checker_id.clone(),
            });
        }
        Ok(())
    }

    /// The owner, or the user currently checking the session.
    fn require_owner_or_checker(&self, session: &PickingSession, user: &str) -> Result<(), PickingError> {
        let checking = session.status == SessionStatus::DoubleChecking
            && session.checker_id.as_deref() == Some(user);
        if session.owner_id == user || checking {
            return Ok(());
        }
        Err(PickingError::NotHolder {
            session_id: session.id,
            user: user.to_string(),
            holder: Some(session.owner_id.clone()),
        })
    }

    /// `stock - reserved_by_others >= pickingQty` for every line.
    fn check_reservations(
        &self,
        session: &PickingSession,
        op: &'static str,
    ) -> Result<(), PickingError> {
        if session.items.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let sessions = self.all_sessions(op)?;
        let book = ReservationBook::from_sessions(&sessions, Some(session.id));

        let mut lookup_err: Option<StoreError> = None;
        let verdict = verify_reservations(&session.items, &book, |key| {
            match self.deps.inventory.get(key) {
                Ok(rec) => rec,
                Err(e) => {
                    if lookup_err.is_none() {
                        lookup_err = Some(e);
                    }
                    None
                }
            }
        });
        if let Some(e) = lookup_err {
            return Err(store_err(op, e));
        }
        verdict.map_err(|e| {
            tracing::warn!(session_id = %session.id, error = %e, "reservation check failed");
            PickingError::from(e)
        })
    }

    fn clear_progress(&self, session_id: Uuid) {
        if let Err(e) = self.deps.progress.clear(session_id) {
            tracing::warn!(%session_id, error = %format!("{e:#}"), "failed to clear double-check progress");
        }
    }
}

pub(crate) fn store_err(operation: &'static str, e: StoreError) -> PickingError {
    match e {
        StoreError::Offline => PickingError::Offline { operation },
        StoreError::NotFound(what) => PickingError::NotFound(what),
        StoreError::Backend(msg) => PickingError::Storage(format!("{operation}: {msg}")),
    }
}
