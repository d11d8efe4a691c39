//! Durable local cache of sessions still in `building`.
//!
//! A draft is the whole session row (cart lines, order number, customer).
//! The file backend writes one JSON document per draft to
//! `picking_draft_<id>.json`, replacing it atomically on every edit.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pf_schemas::PickingSession;
use uuid::Uuid;

const PREFIX: &str = "picking_draft_";

pub trait DraftCache {
    /// Every cached draft, of every user, in no particular order.
    fn load_all(&self) -> Result<Vec<PickingSession>>;
    fn store(&self, draft: &PickingSession) -> Result<()>;
    /// Removing a missing entry is not an error.
    fn clear(&self, session_id: Uuid) -> Result<()>;
}

/// Process-local backend.
#[derive(Debug, Default)]
pub struct MemoryDraftCache {
    drafts: RefCell<HashMap<Uuid, PickingSession>>,
}

impl MemoryDraftCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftCache for MemoryDraftCache {
    fn load_all(&self) -> Result<Vec<PickingSession>> {
        Ok(self.drafts.borrow().values().cloned().collect())
    }

    fn store(&self, draft: &PickingSession) -> Result<()> {
        self.drafts.borrow_mut().insert(draft.id, draft.clone());
        Ok(())
    }

    fn clear(&self, session_id: Uuid) -> Result<()> {
        self.drafts.borrow_mut().remove(&session_id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileDraftCache {
    dir: PathBuf,
}

impl FileDraftCache {
    /// Creates `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("create_dir_all {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{PREFIX}{session_id}.json"))
    }
}

impl DraftCache for FileDraftCache {
    fn load_all(&self) -> Result<Vec<PickingSession>> {
        let entries =
            fs::read_dir(&self.dir).with_context(|| format!("read_dir {}", self.dir.display()))?;
        let mut out = Vec::new();
        for entry in entries {
            let path = entry.with_context(|| format!("read_dir {}", self.dir.display()))?.path();
            let is_draft = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PREFIX) && n.ends_with(".json"));
            if !is_draft {
                continue;
            }
            let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
            let draft: PickingSession =
                serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
            out.push(draft);
        }
        Ok(out)
    }

    fn store(&self, draft: &PickingSession) -> Result<()> {
        let path = self.path_for(draft.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(draft).context("serialize draft")?;
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("rename into {}", path.display()))?;
        Ok(())
    }

    fn clear(&self, session_id: Uuid) -> Result<()> {
        let path = self.path_for(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}
