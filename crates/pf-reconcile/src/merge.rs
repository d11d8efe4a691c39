//! Merge of confirmed activity history with pending projections.
//!
//! # Algorithm
//!
//! 1. Project every pending mutation into synthetic entries tagged
//!    `is_optimistic`. Ids are derived from the `optimistic_id`, the same
//!    way the writer derives them.
//! 2. Concatenate confirmed entries first, then projections; keep the first
//!    occurrence of every id. A confirmed entry therefore always wins.
//! 3. For each pending undo, mark its target `is_reversed` + `is_optimistic`
//!    unless the target is already reversed.
//! 4. Sort by `created_at` descending, ties by id ascending.

use std::collections::HashSet;

use pf_schemas::{derive_entry_id, ActionType, ActivityLogEntry};
use uuid::Uuid;

use crate::{MutationKind, PendingMutation};

/// Synthetic log entries for one pending mutation.
///
/// `confirmed` is consulted only for undo, whose projection mirrors the
/// entry it reverses. An undo whose target is unknown projects nothing.
pub fn project(mutation: &PendingMutation, confirmed: &[ActivityLogEntry]) -> Vec<ActivityLogEntry> {
    let opt = mutation.optimistic_id.as_str();
    let base = |index: usize, sku: &str, action: ActionType, change: i64| {
        let mut e = ActivityLogEntry::new(
            derive_entry_id(opt, index),
            sku,
            action,
            change,
            &mutation.performed_by,
            mutation.submitted_at,
        );
        e.is_optimistic = true;
        e
    };

    match &mutation.kind {
        MutationKind::AdjustQuantity {
            key,
            delta,
            prev_quantity,
        } => {
            let action = if *delta >= 0 {
                ActionType::Add
            } else {
                ActionType::Deduct
            };
            let mut e = base(0, &key.sku, action, *delta);
            if *delta >= 0 {
                e.to_warehouse = Some(key.warehouse.clone());
                e.to_location = Some(key.location.clone());
            } else {
                e.from_warehouse = Some(key.warehouse.clone());
                e.from_location = Some(key.location.clone());
            }
            e.prev_quantity = *prev_quantity;
            e.new_quantity = prev_quantity.map(|p| p + delta);
            vec![e]
        }
        MutationKind::Move {
            sku,
            from_warehouse,
            from_location,
            to_warehouse,
            to_location,
            quantity,
        } => {
            let mut e = base(0, sku, ActionType::Move, *quantity);
            e.from_warehouse = Some(from_warehouse.clone());
            e.from_location = Some(from_location.clone());
            e.to_warehouse = Some(to_warehouse.clone());
            e.to_location = Some(to_location.clone());
            vec![e]
        }
        MutationKind::AddItem { key, quantity } => {
            let mut e = base(0, &key.sku, ActionType::Add, *quantity);
            e.to_warehouse = Some(key.warehouse.clone());
            e.to_location = Some(key.location.clone());
            e.new_quantity = Some(*quantity);
            vec![e]
        }
        MutationKind::DeleteItem { key, quantity } => {
            let mut e = base(0, &key.sku, ActionType::Delete, -quantity);
            e.from_warehouse = Some(key.warehouse.clone());
            e.from_location = Some(key.location.clone());
            e.prev_quantity = Some(*quantity);
            e.new_quantity = Some(0);
            vec![e]
        }
        MutationKind::EditItem { key, new_sku } => {
            let mut e = base(0, new_sku, ActionType::Edit, 0);
            e.previous_sku = Some(key.sku.clone());
            e.from_warehouse = Some(key.warehouse.clone());
            e.from_location = Some(key.location.clone());
            vec![e]
        }
        MutationKind::Undo { target_id } => match confirmed.iter().find(|c| c.id == *target_id) {
            Some(target) => {
                let mut e = base(0, &target.sku, ActionType::Undo, -target.quantity_change);
                e.from_warehouse = target.to_warehouse.clone();
                e.from_location = target.to_location.clone();
                e.to_warehouse = target.from_warehouse.clone();
                e.to_location = target.from_location.clone();
                e.list_id = target.list_id;
                vec![e]
            }
            None => Vec::new(),
        },
        MutationKind::ProcessPickingList {
            list_id,
            order_number,
            lines,
        } => lines
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let mut e = base(idx, &line.sku, ActionType::Deduct, -i64::from(line.quantity));
                e.from_warehouse = Some(line.warehouse.clone());
                e.from_location = Some(line.location.clone());
                e.list_id = Some(*list_id);
                e.order_number = order_number.clone();
                e
            })
            .collect(),
    }
}

/// Merged, de-duplicated activity view, newest first.
pub fn reconcile(
    confirmed: &[ActivityLogEntry],
    pending: &[PendingMutation],
) -> Vec<ActivityLogEntry> {
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(confirmed.len());
    let mut view: Vec<ActivityLogEntry> = Vec::with_capacity(confirmed.len() + pending.len());

    for entry in confirmed {
        if seen.insert(entry.id) {
            let mut e = entry.clone();
            e.is_optimistic = false;
            view.push(e);
        }
    }

    for mutation in pending {
        for projected in project(mutation, confirmed) {
            if seen.insert(projected.id) {
                view.push(projected);
            }
        }
    }

    for mutation in pending {
        if let MutationKind::Undo { target_id } = &mutation.kind {
            if let Some(target) = view.iter_mut().find(|e| e.id == *target_id) {
                if !target.is_reversed {
                    target.is_reversed = true;
                    target.is_optimistic = true;
                }
            }
        }
    }

    view.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pf_schemas::LineKey;

    fn t(min: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(min)
    }

    fn pending(id: &str, at: i64, kind: MutationKind) -> PendingMutation {
        PendingMutation {
            optimistic_id: id.to_string(),
            performed_by: "amy".to_string(),
            submitted_at: t(at),
            kind,
        }
    }

    #[test]
    fn negative_adjustment_projects_as_deduct_from_location() {
        let m = pending(
            "k1",
            0,
            MutationKind::AdjustQuantity {
                key: LineKey::new("A1", "LUDLOW", "R1"),
                delta: -3,
                prev_quantity: Some(10),
            },
        );
        let e = &project(&m, &[])[0];
        assert_eq!(e.action_type, ActionType::Deduct);
        assert_eq!(e.from_location.as_deref(), Some("R1"));
        assert_eq!(e.new_quantity, Some(7));
        assert!(e.is_optimistic);
        assert_eq!(e.id, derive_entry_id("k1", 0));
    }

    #[test]
    fn undo_with_unknown_target_projects_nothing() {
        let m = pending("u1", 0, MutationKind::Undo { target_id: Uuid::nil() });
        assert!(project(&m, &[]).is_empty());
        assert!(reconcile(&[], &[m]).is_empty());
    }

    #[test]
    fn sorted_newest_first() {
        let a = pending(
            "a",
            1,
            MutationKind::AddItem {
                key: LineKey::new("A1", "LUDLOW", "R1"),
                quantity: 4,
            },
        );
        let b = pending(
            "b",
            5,
            MutationKind::AddItem {
                key: LineKey::new("B1", "LUDLOW", "R2"),
                quantity: 1,
            },
        );
        let view = reconcile(&[], &[a, b]);
        let skus: Vec<&str> = view.iter().map(|e| e.sku.as_str()).collect();
        assert_eq!(skus, vec!["B1", "A1"]);
    }
}
