//! Scenario: pickflow CLI reads the local cache named by `cache.dir`
//!
//! # Invariant under test
//! Drafts and double-check progress written by a terminal into the
//! configured cache directory are what `pickflow cache` reports. Nothing
//! is read from the default directory when `cache.dir` points elsewhere.

use assert_cmd::Command;
use chrono::Utc;
use pf_schemas::{CartItem, PickingSession};
use pf_session::{DraftCache, FileDraftCache, FileProgressCache, ProgressCache};
use predicates::prelude::*;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use uuid::Uuid;

#[allow(deprecated)]
fn pickflow() -> Command {
    Command::cargo_bin("pickflow").unwrap()
}

#[test]
fn cache_lists_drafts_and_progress_from_configured_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("site.yaml"), "cache:\n  dir: terminal-7\n").unwrap();
    let cache_dir = dir.path().join("terminal-7");

    let mut draft = PickingSession::new("amy", Some("1001".into()), None, Utc::now());
    draft.items.push(CartItem::new("A1", "LUDLOW", "R1", 3, 10));
    FileDraftCache::new(&cache_dir).unwrap().store(&draft).unwrap();

    let checked_id = Uuid::new_v4();
    let keys: BTreeSet<String> = ["1-A1-R1".to_string()].into();
    FileProgressCache::new(&cache_dir).unwrap().store(checked_id, &keys).unwrap();

    let out = pickflow()
        .current_dir(dir.path())
        .args(["cache", "--config", "site.yaml"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let drafts: Vec<PickingSession> = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(drafts, vec![draft]);

    let out = pickflow()
        .current_dir(dir.path())
        .args(["cache", "--config", "site.yaml", "--session", &checked_id.to_string()])
        .output()
        .unwrap();
    assert!(out.status.success());
    let progress: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(progress, serde_json::json!(["1-A1-R1"]));

    // Default directory holds nothing.
    let out = pickflow().current_dir(dir.path()).arg("cache").output().unwrap();
    assert!(out.status.success());
    let drafts: Vec<PickingSession> = serde_json::from_slice(&out.stdout).unwrap();
    assert!(drafts.is_empty());
}

#[test]
fn unknown_session_id_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    pickflow()
        .current_dir(dir.path())
        .args(["cache", "--session", "order-1001"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a session id"));
}
