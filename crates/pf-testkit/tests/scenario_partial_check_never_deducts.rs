//! Scenario: Partial Verification Never Deducts
//!
//! # Invariant under test
//! All-or-nothing: when `checkedCount < totalCheckboxes`, deduct writes zero
//! inventory-affecting log entries, leaves every stock row untouched and
//! returns the session to `ready_to_double_check` with no checker.

use pf_schemas::{ActionType, SessionStatus};
use pf_session::{DeductOutcome, PickingError, ProgressCache};
use pf_testkit::{key, loc, ready_session, user, World, WH};

fn world() -> World {
    let w = World::new(&[loc("R1", 1), loc("R2", 2), loc("R3", 3), loc("R4", 4)]);
    for (sku, l) in [("A1", "R1"), ("A2", "R2"), ("A3", "R3"), ("A4", "R4")] {
        w.inventory.stock(sku, WH, l, 10);
    }
    w
}

fn four_lines() -> Vec<(pf_schemas::LineKey, u32)> {
    vec![
        (key("A1", "R1"), 1),
        (key("A2", "R2"), 1),
        (key("A3", "R3"), 1),
        (key("A4", "R4"), 1),
    ]
}

#[test]
fn three_of_four_checked_releases_without_deduction() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let mut checker = w.engine(&ben);
    let s = ready_session(&mut picker, None, &four_lines()).unwrap();

    checker.lock_for_check(s.id).unwrap();
    let mut cl = checker.checklist(s.id).unwrap();
    let keys: Vec<String> = cl.keys().map(str::to_string).collect();
    for k in keys.iter().take(3) {
        checker.toggle_check(&mut cl, k).unwrap();
    }
    assert_eq!((cl.checked_count(), cl.total_checkboxes()), (3, 4));

    let outcome = checker.deduct(s.id, &cl, "deduct-partial").unwrap();
    assert_eq!(outcome, DeductOutcome::Released);

    assert_eq!(w.activity.entries().len(), 0);
    assert_eq!(w.inventory.applied_count(), 0);
    for (k, _) in four_lines() {
        assert_eq!(w.inventory.quantity(&k), Some(10));
    }

    let row = w.session(s.id).unwrap();
    assert_eq!(row.status, SessionStatus::ReadyToDoubleCheck);
    assert_eq!(row.checker_id, None);
    assert_eq!(w.progress.load(s.id).unwrap(), None);
}

#[test]
fn released_session_can_be_fully_checked_later() {
    let w = world();
    let (amy, ben, cat) = (user("amy"), user("ben"), user("cat"));
    let mut picker = w.engine(&amy);
    let mut first = w.engine(&ben);
    let mut second = w.engine(&cat);
    let s = ready_session(&mut picker, None, &four_lines()).unwrap();

    first.lock_for_check(s.id).unwrap();
    let cl = first.checklist(s.id).unwrap();
    assert_eq!(first.deduct(s.id, &cl, "k-1").unwrap(), DeductOutcome::Released);

    // Nobody holds it now, so no takeover prompt.
    second.lock_for_check(s.id).unwrap();
    let mut cl = second.checklist(s.id).unwrap();
    cl.check_all();
    assert!(matches!(
        second.deduct(s.id, &cl, "k-2").unwrap(),
        DeductOutcome::Completed { .. }
    ));
    assert_eq!(w.activity.count(ActionType::Deduct), 4);
}

#[test]
fn only_the_checker_may_deduct() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let mut checker = w.engine(&ben);
    let s = ready_session(&mut picker, None, &four_lines()).unwrap();
    checker.lock_for_check(s.id).unwrap();

    let mut cl = picker.checklist(s.id).unwrap();
    cl.check_all();
    let err = picker.deduct(s.id, &cl, "k").unwrap_err();
    assert!(matches!(err, PickingError::NotHolder { ref holder, .. } if holder.as_deref() == Some("ben")));
    assert_eq!(w.activity.entries().len(), 0);
}

#[test]
fn checklist_of_another_session_is_refused() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut picker = w.engine(&amy);
    let mut checker = w.engine(&ben);
    let s1 = ready_session(&mut picker, Some("A-1"), &four_lines()[..2]).unwrap();
    let s2 = ready_session(&mut picker, Some("A-2"), &four_lines()[2..]).unwrap();

    checker.lock_for_check(s2.id).unwrap();
    let mut cl = checker.checklist(s2.id).unwrap();
    cl.check_all();
    checker.lock_for_check(s1.id).unwrap();

    let err = checker.deduct(s1.id, &cl, "k").unwrap_err();
    assert!(matches!(err, PickingError::Validation(_)));
    assert_eq!(w.inventory.applied_count(), 0);
}
