//! `pickflow activity`: merged view of confirmed history and a queue
//! snapshot.

use anyhow::Result;
use pf_reconcile::{reconcile, MutationQueue, PendingMutation};
use pf_schemas::ActivityLogEntry;
use std::path::Path;

use super::read_json;

pub fn run(confirmed: &Path, pending: Option<&Path>) -> Result<Vec<ActivityLogEntry>> {
    let confirmed: Vec<ActivityLogEntry> = read_json(confirmed, "confirmed log")?;
    let queue = match pending {
        Some(p) => MutationQueue::load(p)?,
        None => MutationQueue::new(),
    };
    let pending: Vec<PendingMutation> = queue.pending().cloned().collect();

    let view = reconcile(&confirmed, &pending);
    tracing::info!(
        confirmed = confirmed.len(),
        pending = pending.len(),
        rejected = queue.rejected().len(),
        entries = view.len(),
        "activity merged"
    );
    Ok(view)
}
