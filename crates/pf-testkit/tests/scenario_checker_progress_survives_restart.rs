//! Scenario: Checker Progress Survives A Restart
//!
//! # Invariant under test
//! Ticked checkboxes are written to the local progress cache on every
//! toggle, so a new engine on the same terminal restores them. Progress is
//! dropped when the check ends (release, return to picker, completion).

use pf_session::FileProgressCache;
use pf_testkit::{key, loc, ready_session, user, World, WH};

#[test]
fn ticks_come_back_after_restart_and_go_on_release() {
    let dir = tempfile::tempdir().unwrap();
    let w = World::new(&[loc("R1", 1), loc("R2", 2)]);
    w.inventory.stock("A1", WH, "R1", 10);
    w.inventory.stock("A2", WH, "R2", 10);
    let (amy, ben) = (user("amy"), user("ben"));
    let cache = FileProgressCache::new(dir.path()).unwrap();

    let mut picker = w.engine(&amy);
    let s = ready_session(
        &mut picker,
        Some("1001"),
        &[(key("A1", "R1"), 2), (key("A2", "R2"), 3)],
    )
    .unwrap();

    let first = {
        let mut checker = w.engine_with_cache(&ben, &cache);
        checker.lock_for_check(s.id).unwrap();
        let mut cl = checker.checklist(s.id).unwrap();
        let first = cl.keys().next().unwrap().to_string();
        checker.toggle_check(&mut cl, &first).unwrap();
        assert_eq!(checker.toggle_check(&mut cl, "9-NOPE-X").unwrap(), None);
        first
    };
    assert!(cache.path_for(s.id).exists());

    // Fresh engine, same cache directory.
    let reopened = FileProgressCache::new(dir.path()).unwrap();
    let mut checker = w.engine_with_cache(&ben, &reopened);
    let cl = checker.checklist(s.id).unwrap();
    assert!(cl.is_checked(&first));
    assert_eq!(cl.checked_count(), 1);
    assert_eq!(cl.total_checkboxes(), 2);

    checker.release_check(s.id).unwrap();
    assert!(!reopened.path_for(s.id).exists());
}

#[test]
fn progress_is_cleared_when_the_session_completes() {
    let dir = tempfile::tempdir().unwrap();
    let w = World::new(&[loc("R1", 1)]);
    w.inventory.stock("A1", WH, "R1", 10);
    let (amy, ben) = (user("amy"), user("ben"));
    let cache = FileProgressCache::new(dir.path()).unwrap();

    let mut picker = w.engine(&amy);
    let s = ready_session(&mut picker, None, &[(key("A1", "R1"), 2)]).unwrap();

    let mut checker = w.engine_with_cache(&ben, &cache);
    checker.lock_for_check(s.id).unwrap();
    let mut cl = checker.checklist(s.id).unwrap();
    let k = cl.keys().next().unwrap().to_string();
    checker.toggle_check(&mut cl, &k).unwrap();
    assert!(cache.path_for(s.id).exists());

    checker.deduct(s.id, &cl, "done-1").unwrap();
    assert!(!cache.path_for(s.id).exists());
}
