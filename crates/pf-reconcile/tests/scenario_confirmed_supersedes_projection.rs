use chrono::{Duration, TimeZone, Utc};
use pf_reconcile::{reconcile, DeductLine, MutationKind, PendingMutation};
use pf_schemas::{derive_entry_id, ActionType, ActivityLogEntry};
use uuid::Uuid;

/// Confirmed entries win: once the server returns an entry whose id equals a
/// projection's id, the view holds exactly one copy, the confirmed one.

fn at(min: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(min)
}

fn picking_list(opt: &str, list_id: Uuid) -> PendingMutation {
    PendingMutation {
        optimistic_id: opt.to_string(),
        performed_by: "ben".to_string(),
        submitted_at: at(10),
        kind: MutationKind::ProcessPickingList {
            list_id,
            order_number: Some("1001".to_string()),
            lines: vec![
                DeductLine {
                    sku: "A1".into(),
                    warehouse: "LUDLOW".into(),
                    location: "R1".into(),
                    quantity: 5,
                },
                DeductLine {
                    sku: "A2".into(),
                    warehouse: "LUDLOW".into(),
                    location: "R2".into(),
                    quantity: 10,
                },
            ],
        },
    }
}

#[test]
fn projections_are_tagged_optimistic_until_confirmed() {
    let list_id = Uuid::new_v4();
    let pending = vec![picking_list("deduct-1", list_id)];

    let view = reconcile(&[], &pending);
    assert_eq!(view.len(), 2);
    assert!(view.iter().all(|e| e.is_optimistic));
    assert!(view.iter().all(|e| e.action_type == ActionType::Deduct));
    assert!(view.iter().all(|e| e.list_id == Some(list_id)));
}

#[test]
fn partially_confirmed_batch_keeps_one_copy_per_line() {
    let list_id = Uuid::new_v4();
    let pending = vec![picking_list("deduct-1", list_id)];

    // Server confirmed line 0 only, with a later timestamp.
    let mut confirmed = ActivityLogEntry::new(
        derive_entry_id("deduct-1", 0),
        "A1",
        ActionType::Deduct,
        -5,
        "ben",
        at(11),
    );
    confirmed.list_id = Some(list_id);
    confirmed.prev_quantity = Some(20);
    confirmed.new_quantity = Some(15);

    let view = reconcile(&[confirmed.clone()], &pending);
    assert_eq!(view.len(), 2);

    let a1 = view.iter().find(|e| e.sku == "A1").unwrap();
    assert!(!a1.is_optimistic, "confirmed copy must win");
    assert_eq!(a1.new_quantity, Some(15));

    let a2 = view.iter().find(|e| e.sku == "A2").unwrap();
    assert!(a2.is_optimistic);

    // Newest first.
    assert_eq!(view[0].id, confirmed.id);
}

#[test]
fn fully_confirmed_mutation_vanishes_from_projection() {
    let list_id = Uuid::new_v4();
    let pending = vec![picking_list("deduct-1", list_id)];
    let confirmed: Vec<ActivityLogEntry> = (0..2)
        .map(|i| {
            ActivityLogEntry::new(
                derive_entry_id("deduct-1", i),
                if i == 0 { "A1" } else { "A2" },
                ActionType::Deduct,
                -1,
                "ben",
                at(12),
            )
        })
        .collect();

    let view = reconcile(&confirmed, &pending);
    assert_eq!(view.len(), 2);
    assert!(view.iter().all(|e| !e.is_optimistic));
}

#[test]
fn duplicate_confirmed_rows_collapse() {
    let e = ActivityLogEntry::new(Uuid::new_v4(), "A1", ActionType::Add, 2, "amy", at(0));
    let view = reconcile(&[e.clone(), e], &[]);
    assert_eq!(view.len(), 1);
}
