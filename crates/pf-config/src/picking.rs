use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::LoadedConfig;

const DEFAULT_PALLET_CAPACITY: u32 = 12;
const DEFAULT_STALE_AFTER_HOURS: u32 = 5;
const DEFAULT_QUEUE_WINDOW_HOURS: u32 = 4;
const DEFAULT_CACHE_DIR: &str = ".pickflow/cache";

/// Typed view over the effective config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickingConfig {
    /// Units per pallet.
    pub pallet_capacity: u32,
    /// A resumable session untouched for longer than this is abandoned.
    pub stale_after_hours: u32,
    /// Verification queue only lists sessions updated within this window.
    pub queue_window_hours: u32,
    /// Directory of the local caches: double-check progress and building
    /// drafts.
    pub cache_dir: PathBuf,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self {
            pallet_capacity: DEFAULT_PALLET_CAPACITY,
            stale_after_hours: DEFAULT_STALE_AFTER_HOURS,
            queue_window_hours: DEFAULT_QUEUE_WINDOW_HOURS,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl PickingConfig {
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        Self::from_json(&loaded.config_json)
    }

    pub fn from_json(v: &Value) -> Result<Self> {
        let d = Self::default();
        let cfg = Self {
            pallet_capacity: read_positive(v, "/packing/pallet_capacity", d.pallet_capacity)?,
            stale_after_hours: read_positive(v, "/sessions/stale_after_hours", d.stale_after_hours)?,
            queue_window_hours: read_positive(v, "/queue/window_hours", d.queue_window_hours)?,
            cache_dir: match v.pointer("/cache/dir") {
                None | Some(Value::Null) => d.cache_dir,
                Some(Value::String(s)) if !s.trim().is_empty() => PathBuf::from(s.trim()),
                Some(other) => bail!("CONFIG_INVALID /cache/dir must be a non-empty string, got {other}"),
            },
        };
        Ok(cfg)
    }
}

fn read_positive(v: &Value, ptr: &str, default: u32) -> Result<u32> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(default),
        Some(val) => match val.as_u64() {
            Some(n) if n >= 1 && n <= u64::from(u32::MAX) => Ok(n as u32),
            _ => bail!("CONFIG_INVALID {ptr} must be an integer >= 1, got {val}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_layered_yaml_from_strings;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let loaded = LoadedConfig::empty().unwrap();
        let cfg = PickingConfig::from_loaded(&loaded).unwrap();
        assert_eq!(cfg, PickingConfig::default());
        assert_eq!(cfg.pallet_capacity, 12);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let loaded = load_layered_yaml_from_strings(&["packing:\n  pallet_capacity: 0\n"]).unwrap();
        let err = PickingConfig::from_loaded(&loaded).unwrap_err();
        assert!(format!("{err}").contains("/packing/pallet_capacity"));
    }

    #[test]
    fn negative_and_text_hours_are_rejected() {
        for doc in ["sessions:\n  stale_after_hours: -2\n", "queue:\n  window_hours: soon\n"] {
            let loaded = load_layered_yaml_from_strings(&[doc]).unwrap();
            assert!(PickingConfig::from_loaded(&loaded).is_err(), "{doc}");
        }
    }
}
