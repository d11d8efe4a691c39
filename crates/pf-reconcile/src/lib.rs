//! pf-reconcile
//!
//! Optimistic-mutation reconciliation:
//! - `MutationQueue`: FIFO of not-yet-confirmed mutations, durable as JSON
//! - `reconcile`: pure merge of confirmed history and pending projections
//!
//! `reconcile` is deterministic and performs no IO. It is meant to be
//! recomputed whenever either input changes.

mod merge;
mod pending;

pub use merge::{project, reconcile};
pub use pending::{
    DeductLine, FlushReport, MutationExecutor, MutationKind, MutationQueue, PendingMutation,
    RejectedMutation, ReplayError,
};
