use chrono::{TimeZone, Utc};
use pf_reconcile::{reconcile, MutationKind, PendingMutation};
use pf_schemas::{derive_entry_id, ActionType, ActivityLogEntry};
use uuid::Uuid;

/// A pending undo marks its target reversed and optimistic before the server
/// confirms it, and projects the UNDO entry itself.

#[test]
fn pending_undo_marks_target_and_projects_undo_entry() {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
    let mut target = ActivityLogEntry::new(Uuid::new_v4(), "A1", ActionType::Deduct, -4, "amy", t0);
    target.from_warehouse = Some("LUDLOW".into());
    target.from_location = Some("R1".into());

    let undo = PendingMutation {
        optimistic_id: "undo-1".into(),
        performed_by: "amy".into(),
        submitted_at: t0 + chrono::Duration::minutes(3),
        kind: MutationKind::Undo {
            target_id: target.id,
        },
    };

    let view = reconcile(&[target.clone()], &[undo]);
    assert_eq!(view.len(), 2);

    let marked = view.iter().find(|e| e.id == target.id).unwrap();
    assert!(marked.is_reversed);
    assert!(marked.is_optimistic);

    let projected = &view[0];
    assert_eq!(projected.id, derive_entry_id("undo-1", 0));
    assert_eq!(projected.action_type, ActionType::Undo);
    assert_eq!(projected.quantity_change, 4);
    assert_eq!(projected.to_location.as_deref(), Some("R1"));
}

#[test]
fn already_reversed_target_is_left_alone() {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
    let mut target = ActivityLogEntry::new(Uuid::new_v4(), "A1", ActionType::Add, 2, "amy", t0);
    target.is_reversed = true;

    let undo = PendingMutation {
        optimistic_id: "undo-2".into(),
        performed_by: "amy".into(),
        submitted_at: t0,
        kind: MutationKind::Undo {
            target_id: target.id,
        },
    };

    let view = reconcile(&[target.clone()], &[undo]);
    let marked = view.iter().find(|e| e.id == target.id).unwrap();
    assert!(marked.is_reversed);
    assert!(!marked.is_optimistic, "confirmed reversal stays confirmed");
}
