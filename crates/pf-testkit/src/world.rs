//! A shared warehouse that several users' engines run against.

use chrono::{DateTime, Utc};
use pf_config::PickingConfig;
use pf_path::StaticDirectory;
use pf_schemas::{LineKey, Location, PickingSession};
use pf_session::{
    ChangeFeed, Collaborators, DraftCache, MemoryDraftCache, MemoryProgressCache, PickingError,
    ProgressCache, SessionEngine, StaticIdentity,
};

use crate::stores::{FixedClock, MemoryActivityLog, MemoryInventory, MemorySessionStore};

/// Monday 2026-01-05 08:00:00 UTC.
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_600_000, 0).unwrap_or_default()
}

pub fn user(id: &str) -> StaticIdentity {
    StaticIdentity::new(id, id.to_uppercase())
}

pub struct World {
    pub sessions: MemorySessionStore,
    pub inventory: MemoryInventory,
    pub activity: MemoryActivityLog,
    pub directory: StaticDirectory,
    pub clock: FixedClock,
    pub progress: MemoryProgressCache,
    pub drafts: MemoryDraftCache,
    pub feed: ChangeFeed,
    pub config: PickingConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl World {
    pub fn new(locations: &[Location]) -> Self {
        Self {
            sessions: MemorySessionStore::new(),
            inventory: MemoryInventory::new(),
            activity: MemoryActivityLog::new(),
            directory: StaticDirectory::new(locations),
            clock: FixedClock::at(t0()),
            progress: MemoryProgressCache::new(),
            drafts: MemoryDraftCache::new(),
            feed: ChangeFeed::new(),
            config: PickingConfig::default(),
        }
    }

    /// One terminal, acting as `identity`.
    pub fn engine<'a>(&'a self, identity: &'a StaticIdentity) -> SessionEngine<'a> {
        self.engine_with_cache(identity, &self.progress)
    }

    /// Same, with a different progress cache (e.g. file-backed).
    pub fn engine_with_cache<'a>(
        &'a self,
        identity: &'a StaticIdentity,
        progress: &'a dyn ProgressCache,
    ) -> SessionEngine<'a> {
        self.engine_with_caches(identity, progress, &self.drafts)
    }

    /// Same, with both local caches supplied by the caller.
    pub fn engine_with_caches<'a>(
        &'a self,
        identity: &'a StaticIdentity,
        progress: &'a dyn ProgressCache,
        drafts: &'a dyn DraftCache,
    ) -> SessionEngine<'a> {
        let deps = Collaborators {
            sessions: &self.sessions,
            inventory: &self.inventory,
            activity: &self.activity,
            directory: &self.directory,
            identity,
            clock: &self.clock,
            progress,
            drafts,
            feed: Some(&self.feed),
        };
        SessionEngine::new(deps, self.config.clone())
    }

    pub fn session(&self, id: uuid::Uuid) -> Option<PickingSession> {
        self.sessions.row(id)
    }
}

/// Start a session, add `lines` as `(key, qty)` and generate its path.
/// Stock must already exist for every key.
pub fn active_session(
    engine: &mut SessionEngine<'_>,
    order_number: Option<&str>,
    lines: &[(LineKey, u32)],
) -> Result<PickingSession, PickingError> {
    let session = engine.start_session(order_number, None)?;
    for (key, qty) in lines {
        engine.add_to_cart(session.id, key)?;
        engine.set_cart_qty(session.id, key, &qty.to_string())?;
    }
    engine.generate_path(session.id)?;
    engine.session(session.id)
}

/// [`active_session`] followed by `mark_ready`.
pub fn ready_session(
    engine: &mut SessionEngine<'_>,
    order_number: Option<&str>,
    lines: &[(LineKey, u32)],
) -> Result<PickingSession, PickingError> {
    let session = active_session(engine, order_number, lines)?;
    engine.mark_ready(session.id)
}
