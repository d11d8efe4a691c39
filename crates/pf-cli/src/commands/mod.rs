//! Command handler modules for pickflow.
//!
//! Shared file helpers live here; each subcommand has its own module.

pub mod activity;
pub mod cache;
pub mod plan;

use anyhow::{Context, Result};
use pf_config::{LoadedConfig, PickingConfig, UnusedKeyPolicy};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Read a UTF-8 JSON file (a leading BOM is ignored).
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {what} failed: {}", path.display()))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).with_context(|| format!("{what} must be UTF-8 text"))?;
    serde_json::from_str(raw.trim()).with_context(|| format!("{what} is not valid JSON: {}", path.display()))
}

/// Load layered config (or defaults when no path is given) and its typed
/// view. Unused keys are logged, or refused with `strict`.
pub fn load_config(paths: &[String], strict: bool) -> Result<(LoadedConfig, PickingConfig)> {
    let loaded = if paths.is_empty() {
        LoadedConfig::empty()?
    } else {
        pf_config::load_layered_yaml(paths)?
    };

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = pf_config::report_unused_keys(&loaded.config_json, policy)?;
    for ptr in &report.unused_leaf_pointers {
        tracing::warn!(pointer = %ptr, "config key is not read by anything");
    }

    let picking = PickingConfig::from_loaded(&loaded)?;
    Ok((loaded, picking))
}
