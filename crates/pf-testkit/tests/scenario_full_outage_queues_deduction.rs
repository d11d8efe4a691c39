//! Scenario: Deduction During A Full Outage Is Queued
//!
//! # Invariant under test
//! With sessions, inventory and the activity log all unreachable, a
//! verified deduction is queued against the row the checker locked instead
//! of failing. Nothing is written while offline. Once storage is back the
//! replay deducts every line once and completes the session.

use pf_schemas::{ActionType, LineKey, SessionStatus};
use pf_session::{DeductOutcome, PickingError};
use pf_testkit::{key, loc, ready_session, user, World, WH};

fn world() -> World {
    let w = World::new(&[loc("R1", 1), loc("R2", 2)]);
    w.inventory.stock("A1", WH, "R1", 20);
    w.inventory.stock("A2", WH, "R2", 20);
    w
}

fn lines() -> Vec<(LineKey, u32)> {
    vec![(key("A1", "R1"), 4), (key("A2", "R2"), 6)]
}

fn all_offline(w: &World, offline: bool) {
    w.sessions.set_offline(offline);
    w.inventory.set_offline(offline);
    w.activity.set_offline(offline);
}

#[test]
fn verified_deduction_is_queued_and_replayed() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let mut checker = w.engine(&ben);
    let s = ready_session(&mut picker, Some("1001"), &lines()).unwrap();

    checker.lock_for_check(s.id).unwrap();
    let mut cl = checker.checklist(s.id).unwrap();
    cl.check_all();
    let writes = w.sessions.writes();

    all_offline(&w, true);
    assert_eq!(
        checker.deduct(s.id, &cl, "d-1").unwrap(),
        DeductOutcome::Queued {
            optimistic_id: "d-1".into()
        }
    );
    assert_eq!(checker.queue().len(), 1);
    assert_eq!(w.sessions.writes(), writes);
    assert_eq!(w.inventory.applied_count(), 0);
    assert_eq!(w.inventory.quantity(&key("A1", "R1")), Some(20));
    assert_eq!(w.session(s.id).unwrap().status, SessionStatus::DoubleChecking);

    // Offline replay attempt leaves it queued.
    let report = checker.flush_pending();
    assert!(report.stopped_offline);
    assert_eq!(checker.queue().len(), 1);

    all_offline(&w, false);
    let report = checker.flush_pending();
    assert_eq!(report.applied, vec!["d-1".to_string()]);
    assert!(checker.queue().is_empty());
    assert_eq!(w.session(s.id).unwrap().status, SessionStatus::Completed);
    assert_eq!(w.inventory.quantity(&key("A1", "R1")), Some(16));
    assert_eq!(w.inventory.quantity(&key("A2", "R2")), Some(14));
    assert_eq!(w.activity.count(ActionType::Deduct), 2);
    assert_eq!(
        checker.deduct(s.id, &cl, "d-1").unwrap(),
        DeductOutcome::AlreadyApplied
    );
}

#[test]
fn terminal_that_never_held_the_lock_reports_offline() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let s = ready_session(&mut picker, None, &lines()).unwrap();

    {
        let mut locker = w.engine(&ben);
        locker.lock_for_check(s.id).unwrap();
    }
    // Same checker, but a terminal that never loaded the row.
    let mut cold = w.engine(&ben);
    let mut cl = cold.checklist(s.id).unwrap();
    cl.check_all();

    all_offline(&w, true);
    assert!(matches!(
        cold.deduct(s.id, &cl, "d-2").unwrap_err(),
        PickingError::Offline { operation: "deduct" }
    ));
    assert!(cold.queue().is_empty());
}

#[test]
fn incomplete_checklist_still_needs_the_store() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let mut checker = w.engine(&ben);
    let s = ready_session(&mut picker, None, &lines()).unwrap();

    checker.lock_for_check(s.id).unwrap();
    let cl = checker.checklist(s.id).unwrap();

    all_offline(&w, true);
    assert!(matches!(
        checker.deduct(s.id, &cl, "d-3").unwrap_err(),
        PickingError::Offline { .. }
    ));
    assert!(checker.queue().is_empty());

    all_offline(&w, false);
    assert_eq!(w.session(s.id).unwrap().status, SessionStatus::DoubleChecking);
}
