//! Scenario: Batch Partial Failure Is Reported, Not Retried
//!
//! # Invariant under test
//! Deduction applies one independent delta per cart line. When a delta
//! fails after earlier lines were applied, the caller gets
//! `BatchPartialFailure` naming the applied and failed lines, the session
//! stays in its last persisted state and nothing is queued for retry.

use pf_schemas::{ActionType, LineKey, SessionStatus};
use pf_session::{DeductOutcome, PickingError};
use pf_testkit::{key, loc, ready_session, user, World, WH};

fn world() -> World {
    let w = World::new(&[loc("R1", 1), loc("R2", 2), loc("R3", 3), loc("R4", 4)]);
    for (sku, l) in [("A1", "R1"), ("A2", "R2"), ("A3", "R3"), ("A4", "R4")] {
        w.inventory.stock(sku, WH, l, 10);
    }
    w
}

fn lines() -> Vec<(LineKey, u32)> {
    vec![
        (key("A1", "R1"), 1),
        (key("A2", "R2"), 1),
        (key("A3", "R3"), 1),
        (key("A4", "R4"), 1),
    ]
}

#[test]
fn failure_on_third_line_reports_two_applied() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let mut checker = w.engine(&ben);
    let s = ready_session(&mut picker, Some("1001"), &lines()).unwrap();

    checker.lock_for_check(s.id).unwrap();
    let mut cl = checker.checklist(s.id).unwrap();
    cl.check_all();

    w.inventory.fail_on_delta(3);
    let err = checker.deduct(s.id, &cl, "deduct-1001").unwrap_err();
    match &err {
        PickingError::BatchPartialFailure {
            session_id,
            applied,
            failed,
            ..
        } => {
            assert_eq!(*session_id, s.id);
            assert_eq!(applied, &vec![key("A1", "R1"), key("A2", "R2")]);
            assert_eq!(failed.as_ref(), Some(&key("A3", "R3")));
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    assert!(!err.is_recoverable());
    assert!(err.to_string().contains("2 applied line(s)"));

    assert_eq!(w.activity.count(ActionType::Deduct), 2);
    assert_eq!(w.inventory.quantity(&key("A1", "R1")), Some(9));
    assert_eq!(w.inventory.quantity(&key("A3", "R3")), Some(10));
    assert_eq!(w.inventory.quantity(&key("A4", "R4")), Some(10));

    let row = w.session(s.id).unwrap();
    assert_eq!(row.status, SessionStatus::DoubleChecking);
    assert_eq!(row.checker_id.as_deref(), Some("ben"));
    assert!(checker.queue().is_empty());
}

#[test]
fn failure_on_first_line_is_a_plain_storage_error() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let mut checker = w.engine(&ben);
    let s = ready_session(&mut picker, None, &lines()).unwrap();

    checker.lock_for_check(s.id).unwrap();
    let mut cl = checker.checklist(s.id).unwrap();
    cl.check_all();

    w.inventory.fail_on_delta(1);
    let err = checker.deduct(s.id, &cl, "deduct-a").unwrap_err();
    assert!(matches!(err, PickingError::Storage(_)));
    assert_eq!(w.inventory.applied_count(), 0);

    // Nothing applied, so a fresh attempt is safe.
    w.inventory.clear_faults();
    assert!(matches!(
        checker.deduct(s.id, &cl, "deduct-b").unwrap(),
        DeductOutcome::Completed { .. }
    ));
}

#[test]
fn failed_completion_write_is_still_a_partial_failure() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let mut checker = w.engine(&ben);
    let s = ready_session(&mut picker, None, &lines()[..2]).unwrap();

    checker.lock_for_check(s.id).unwrap();
    let mut cl = checker.checklist(s.id).unwrap();
    cl.check_all();

    // Every delta lands; the final status write does not.
    w.sessions.fail_next_save();
    let err = checker.deduct(s.id, &cl, "deduct-c").unwrap_err();
    match err {
        PickingError::BatchPartialFailure { applied, failed, .. } => {
            assert_eq!(applied.len(), 2);
            assert_eq!(failed, None);
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
    assert_eq!(w.activity.count(ActionType::Deduct), 2);
    assert_eq!(w.session(s.id).unwrap().status, SessionStatus::DoubleChecking);
}
