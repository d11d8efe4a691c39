//! Pending mutation queue.
//!
//! Mutations are replayed strictly in submission order. Replay stops at the
//! first offline result so that later mutations never overtake an earlier
//! one. Mutations the backend refuses for any other reason are moved to the
//! rejected list and are not retried.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pf_schemas::LineKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One cart line of a queued deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductLine {
    pub sku: String,
    pub warehouse: String,
    pub location: String,
    pub quantity: u32,
}

impl DeductLine {
    pub fn line_key(&self) -> LineKey {
        LineKey::new(&self.sku, &self.warehouse, &self.location)
    }
}

/// What a pending mutation does. Each variant projects to zero or more
/// activity log entries (see [`crate::project`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationKind {
    /// Signed quantity change on one stock row.
    AdjustQuantity {
        key: LineKey,
        delta: i64,
        prev_quantity: Option<i64>,
    },
    Move {
        sku: String,
        from_warehouse: String,
        from_location: String,
        to_warehouse: String,
        to_location: String,
        quantity: i64,
    },
    AddItem { key: LineKey, quantity: i64 },
    DeleteItem { key: LineKey, quantity: i64 },
    EditItem { key: LineKey, new_sku: String },
    /// Reverse the log entry `target_id`.
    Undo { target_id: Uuid },
    /// Final deduction of a verified picking session.
    ProcessPickingList {
        list_id: Uuid,
        order_number: Option<String>,
        lines: Vec<DeductLine>,
    },
}

impl MutationKind {
    pub fn label(&self) -> &'static str {
        match self {
            MutationKind::AdjustQuantity { .. } => "adjust_quantity",
            MutationKind::Move { .. } => "move",
            MutationKind::AddItem { .. } => "add_item",
            MutationKind::DeleteItem { .. } => "delete_item",
            MutationKind::EditItem { .. } => "edit_item",
            MutationKind::Undo { .. } => "undo",
            MutationKind::ProcessPickingList { .. } => "process_picking_list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMutation {
    /// Caller-generated idempotency key.
    pub optimistic_id: String,
    pub performed_by: String,
    pub submitted_at: DateTime<Utc>,
    pub kind: MutationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedMutation {
    pub mutation: PendingMutation,
    pub reason: String,
}

/// Why a replayed mutation did not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Backend unreachable; keep the mutation and stop replaying.
    Offline,
    /// Backend refused the mutation; it will never apply.
    Rejected(String),
}

/// Applies one pending mutation against the real backend.
pub trait MutationExecutor {
    fn execute(&mut self, mutation: &PendingMutation) -> Result<(), ReplayError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// `optimistic_id`s confirmed during this flush, in order.
    pub applied: Vec<String>,
    /// `optimistic_id`s rejected during this flush.
    pub rejected: Vec<String>,
    /// Mutations still queued afterwards.
    pub remaining: usize,
    /// `true` if replay stopped because the backend was offline.
    pub stopped_offline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationQueue {
    pending: VecDeque<PendingMutation>,
    #[serde(default)]
    rejected: Vec<RejectedMutation>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `mutation`. Returns `false` (and changes nothing) when a
    /// mutation with the same `optimistic_id` is already queued.
    pub fn enqueue(&mut self, mutation: PendingMutation) -> bool {
        if self.contains(&mutation.optimistic_id) {
            tracing::debug!(optimistic_id = %mutation.optimistic_id, "duplicate mutation ignored");
            return false;
        }
        tracing::info!(
            optimistic_id = %mutation.optimistic_id,
            kind = mutation.kind.label(),
            "mutation queued"
        );
        self.pending.push_back(mutation);
        true
    }

    pub fn contains(&self, optimistic_id: &str) -> bool {
        self.pending.iter().any(|m| m.optimistic_id == optimistic_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending mutations in submission order.
    pub fn pending(&self) -> impl Iterator<Item = &PendingMutation> {
        self.pending.iter()
    }

    pub fn rejected(&self) -> &[RejectedMutation] {
        &self.rejected
    }

    /// Hand the rejected list to the caller and forget it.
    pub fn take_rejected(&mut self) -> Vec<RejectedMutation> {
        std::mem::take(&mut self.rejected)
    }

    /// Replay queued mutations in order.
    pub fn flush(&mut self, executor: &mut dyn MutationExecutor) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some(mutation) = self.pending.front() {
            match executor.execute(mutation) {
                Ok(()) => {
                    report.applied.push(mutation.optimistic_id.clone());
                    self.pending.pop_front();
                }
                Err(ReplayError::Offline) => {
                    report.stopped_offline = true;
                    break;
                }
                Err(ReplayError::Rejected(reason)) => {
                    tracing::warn!(
                        optimistic_id = %mutation.optimistic_id,
                        kind = mutation.kind.label(),
                        %reason,
                        "queued mutation rejected"
                    );
                    report.rejected.push(mutation.optimistic_id.clone());
                    if let Some(m) = self.pending.pop_front() {
                        self.rejected.push(RejectedMutation {
                            mutation: m,
                            reason,
                        });
                    }
                }
            }
        }

        report.remaining = self.pending.len();
        tracing::info!(
            applied = report.applied.len(),
            rejected = report.rejected.len(),
            remaining = report.remaining,
            stopped_offline = report.stopped_offline,
            "mutation queue flushed"
        );
        report
    }

    /// Load a queue snapshot. A missing file is an empty queue.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read mutation queue {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse mutation queue {}", path.display()))
    }

    /// Write a snapshot next to `path` and rename it into place.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(self).context("serialize mutation queue")?;
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
        Ok(())
    }
}
