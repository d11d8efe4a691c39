//! Durable local cache of double-check progress, keyed by session id.
//!
//! The stored value is the set of checked item keys. The file backend
//! writes one JSON array per session to `double_check_progress_<id>.json`.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

pub trait ProgressCache {
    fn load(&self, session_id: Uuid) -> Result<Option<BTreeSet<String>>>;
    fn store(&self, session_id: Uuid, checked: &BTreeSet<String>) -> Result<()>;
    /// Removing a missing entry is not an error.
    fn clear(&self, session_id: Uuid) -> Result<()>;
}

/// Process-local backend. Survives view changes, not restarts.
#[derive(Debug, Default)]
pub struct MemoryProgressCache {
    entries: RefCell<HashMap<Uuid, BTreeSet<String>>>,
}

impl MemoryProgressCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCache for MemoryProgressCache {
    fn load(&self, session_id: Uuid) -> Result<Option<BTreeSet<String>>> {
        Ok(self.entries.borrow().get(&session_id).cloned())
    }

    fn store(&self, session_id: Uuid, checked: &BTreeSet<String>) -> Result<()> {
        self.entries.borrow_mut().insert(session_id, checked.clone());
        Ok(())
    }

    fn clear(&self, session_id: Uuid) -> Result<()> {
        self.entries.borrow_mut().remove(&session_id);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileProgressCache {
    dir: PathBuf,
}

impl FileProgressCache {
    /// Creates `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("create_dir_all {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.dir
            .join(format!("double_check_progress_{session_id}.json"))
    }
}

impl ProgressCache for FileProgressCache {
    fn load(&self, session_id: Uuid) -> Result<Option<BTreeSet<String>>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let keys: Vec<String> =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        Ok(Some(keys.into_iter().collect()))
    }

    fn store(&self, session_id: Uuid, checked: &BTreeSet<String>) -> Result<()> {
        let path = self.path_for(session_id);
        let tmp = path.with_extension("json.tmp");
        let keys: Vec<&String> = checked.iter().collect();
        let json = serde_json::to_vec(&keys).context("serialize progress")?;
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
