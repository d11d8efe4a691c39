//! Session State Machine
//!
//! Every lifecycle change of a [`PickingSession`] goes through [`advance`],
//! which enforces the transition table below. Anything not listed returns
//! [`TransitionError`]; `completed` and `cancelled` admit no event at all.
//!
//! ```text
//!  idle ──Start──► building ──GeneratePath──► active ──MarkReady──► ready_to_double_check
//!                     ▲                         │  ▲                   │        ▲
//!                     └────ReturnToBuilding─────┘  │              LockForCheck  │ Release /
//!                                                  │                   ▼        │ DeductPartial
//!                                   ResumePicking  │             double_checking┘
//!                                                  │                   │   │
//!                               needs_correction ◄─┴──ReturnToPicker───┘   └──DeductFull──► completed
//!
//!  any non-terminal ──Delete──► cancelled
//! ```
//!
//! `TakeOverCheck` is the confirmed-takeover self-loop on `double_checking`.

use pf_schemas::{PickingSession, SessionStatus};

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// First cart action; creates the session in `building`.
    Start,
    /// Optimizer + packer ran; the pick sequence is frozen.
    GeneratePath,
    /// Discard the frozen sequence, keep the cart.
    ReturnToBuilding,
    MarkReady,
    LockForCheck { checker: String },
    /// Confirmed transfer of the checker role.
    TakeOverCheck { checker: String },
    /// Checker abandons without a verdict.
    Release,
    ReturnToPicker,
    ResumePicking,
    /// Checklist 100% complete; inventory deltas applied.
    DeductFull,
    /// Checklist incomplete; released with no inventory change.
    DeductPartial,
    Delete,
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// An event that is not legal from the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    /// `None` when the session did not exist yet.
    pub from: Option<SessionStatus>,
    pub event: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let from = self.from.map(|s| s.as_str()).unwrap_or("idle");
        write!(f, "illegal session transition: {} + {}", from, self.event)
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Target status of `event` applied in `from` (`None` = idle).
pub fn next_status(
    from: Option<SessionStatus>,
    event: &SessionEvent,
) -> Result<SessionStatus, TransitionError> {
    use SessionEvent as E;
    use SessionStatus::*;

    let to = match (from, event) {
        (None, E::Start) => Building,

        (Some(Building), E::GeneratePath) => Active,
        (Some(Active), E::ReturnToBuilding) => Building,
        (Some(Active), E::MarkReady) => ReadyToDoubleCheck,

        (Some(ReadyToDoubleCheck), E::LockForCheck { .. }) => DoubleChecking,
        (Some(DoubleChecking), E::TakeOverCheck { .. }) => DoubleChecking,
        (Some(DoubleChecking), E::Release) => ReadyToDoubleCheck,
        (Some(DoubleChecking), E::ReturnToPicker) => NeedsCorrection,
        (Some(DoubleChecking), E::DeductFull) => Completed,
        (Some(DoubleChecking), E::DeductPartial) => ReadyToDoubleCheck,

        (Some(NeedsCorrection), E::ResumePicking) => Active,

        (Some(st), E::Delete) if !st.is_terminal() => Cancelled,

        (from, event) => {
            return Err(TransitionError {
                from,
                event: format!("{event:?}"),
            })
        }
    };
    Ok(to)
}

/// Apply `event` to `session`: move its status and apply the field effects
/// that belong to the transition itself.
///
/// Idle has no session record, so `Start` is rejected here; build the
/// record with `PickingSession::new` instead.
pub fn advance(session: &mut PickingSession, event: &SessionEvent) -> Result<(), TransitionError> {
    let to = next_status(Some(session.status), event)?;

    match event {
        SessionEvent::ReturnToBuilding => {
            session.pallets.clear();
            session.pallets_qty = None;
            session.total_units = None;
        }
        SessionEvent::LockForCheck { checker } | SessionEvent::TakeOverCheck { checker } => {
            session.checker_id = Some(checker.clone());
        }
        SessionEvent::Release | SessionEvent::ReturnToPicker | SessionEvent::DeductPartial => {
            session.checker_id = None;
        }
        _ => {}
    }

    session.status = to;
    Ok(())
}
