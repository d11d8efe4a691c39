//! `pickflow cache`: what the local caches under `cache.dir` hold.

use std::path::Path;

use anyhow::{Context, Result};
use pf_schemas::PickingSession;
use pf_session::{DraftCache, FileDraftCache, FileProgressCache, ProgressCache};
use uuid::Uuid;

/// Cached building drafts of every user, newest first.
pub fn drafts(dir: &Path) -> Result<Vec<PickingSession>> {
    let cache = FileDraftCache::new(dir)?;
    let mut drafts = cache.load_all()?;
    drafts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
    tracing::info!(dir = %dir.display(), drafts = drafts.len(), "drafts loaded");
    Ok(drafts)
}

/// Checked item keys saved for one session, `None` when nothing is saved.
pub fn progress(dir: &Path, session: &str) -> Result<Option<Vec<String>>> {
    let id = Uuid::parse_str(session.trim()).with_context(|| format!("not a session id: {session:?}"))?;
    let cache = FileProgressCache::new(dir)?;
    let checked = cache.load(id)?;
    tracing::info!(
        session_id = %id,
        checked = checked.as_ref().map_or(0, |c| c.len()),
        "progress loaded"
    );
    Ok(checked.map(|keys| keys.into_iter().collect()))
}
