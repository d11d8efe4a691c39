//! A user's local view of the session they are working on, kept in step
//! with rows pushed by other clients.

use pf_schemas::{PickingSession, SessionStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Idle,
    Building,
    Picking,
    DoubleChecking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// The row is for another session.
    Ignored,
    /// Fields refreshed; mode unchanged.
    Refreshed,
    /// A double-check ended with the session back with its owner, who is
    /// this viewer.
    SwitchedToPicking,
    /// Someone else now owns or checks the session. The view was reset.
    TakenOver { by: String },
    /// The session finished, was cancelled or was released. The view was
    /// reset.
    Closed,
}

#[derive(Debug, Clone)]
pub struct LocalSessionView {
    pub user_id: String,
    pub mode: ViewMode,
    pub session: Option<PickingSession>,
}

impl LocalSessionView {
    pub fn idle(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            mode: ViewMode::Idle,
            session: None,
        }
    }

    pub fn open(user_id: impl Into<String>, mode: ViewMode, session: PickingSession) -> Self {
        Self {
            user_id: user_id.into(),
            mode,
            session: Some(session),
        }
    }

    pub fn reset(&mut self) {
        self.mode = ViewMode::Idle;
        self.session = None;
    }

    /// Apply a pushed session row.
    pub fn observe(&mut self, remote: &PickingSession) -> ObserveOutcome {
        let Some(local) = self.session.as_ref() else {
            return ObserveOutcome::Ignored;
        };
        if local.id != remote.id {
            return ObserveOutcome::Ignored;
        }

        if remote.status.is_terminal() {
            self.reset();
            return ObserveOutcome::Closed;
        }

        match self.mode {
            ViewMode::Picking | ViewMode::Building => {
                if remote.owner_id != self.user_id {
                    let by = remote.owner_id.clone();
                    tracing::warn!(session_id = %remote.id, %by, "picking session taken over");
                    self.reset();
                    return ObserveOutcome::TakenOver { by };
                }
            }
            ViewMode::DoubleChecking => match remote.checker_id.as_deref() {
                Some(checker) if checker != self.user_id => {
                    let by = checker.to_string();
                    tracing::warn!(session_id = %remote.id, %by, "double-check taken over");
                    self.reset();
                    return ObserveOutcome::TakenOver { by };
                }
                Some(_) => {}
                None => {
                    let back_with_owner = matches!(
                        remote.status,
                        SessionStatus::Active | SessionStatus::NeedsCorrection
                    ) && remote.owner_id == self.user_id;
                    if back_with_owner {
                        self.mode = ViewMode::Picking;
                        self.session = Some(remote.clone());
                        return ObserveOutcome::SwitchedToPicking;
                    }
                    self.reset();
                    return ObserveOutcome::Closed;
                }
            },
            ViewMode::Idle => return ObserveOutcome::Ignored,
        }

        self.session = Some(remote.clone());
        ObserveOutcome::Refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(owner: &str, status: SessionStatus, checker: Option<&str>) -> PickingSession {
        let mut s = PickingSession::new(owner, Some("1001".into()), None, Utc::now());
        s.status = status;
        s.checker_id = checker.map(str::to_string);
        s
    }

    #[test]
    fn owner_change_while_picking_is_a_takeover() {
        let s = row("amy", SessionStatus::Active, None);
        let mut view = LocalSessionView::open("amy", ViewMode::Picking, s.clone());

        let mut remote = s;
        remote.owner_id = "ben".into();
        assert_eq!(view.observe(&remote), ObserveOutcome::TakenOver { by: "ben".into() });
        assert_eq!(view.mode, ViewMode::Idle);
        assert!(view.session.is_none());
    }

    #[test]
    fn checker_change_while_checking_is_a_takeover() {
        let s = row("amy", SessionStatus::DoubleChecking, Some("ben"));
        let mut view = LocalSessionView::open("ben", ViewMode::DoubleChecking, s.clone());

        let mut remote = s;
        remote.checker_id = Some("cat".into());
        assert_eq!(view.observe(&remote), ObserveOutcome::TakenOver { by: "cat".into() });
    }

    #[test]
    fn owner_checking_own_order_switches_to_picking_on_correction() {
        let s = row("amy", SessionStatus::DoubleChecking, Some("amy"));
        let mut view = LocalSessionView::open("amy", ViewMode::DoubleChecking, s.clone());

        let mut remote = s;
        remote.status = SessionStatus::NeedsCorrection;
        remote.checker_id = None;
        assert_eq!(view.observe(&remote), ObserveOutcome::SwitchedToPicking);
        assert_eq!(view.mode, ViewMode::Picking);
    }

    #[test]
    fn unrelated_rows_and_field_refreshes() {
        let s = row("amy", SessionStatus::Active, None);
        let mut view = LocalSessionView::open("amy", ViewMode::Picking, s.clone());

        let other = row("amy", SessionStatus::Active, None);
        assert_eq!(view.observe(&other), ObserveOutcome::Ignored);

        let mut remote = s;
        remote.load_number = Some("L-7".into());
        assert_eq!(view.observe(&remote), ObserveOutcome::Refreshed);
        assert_eq!(view.session.as_ref().unwrap().load_number.as_deref(), Some("L-7"));

        remote.status = SessionStatus::Cancelled;
        assert_eq!(view.observe(&remote), ObserveOutcome::Closed);
    }
}
