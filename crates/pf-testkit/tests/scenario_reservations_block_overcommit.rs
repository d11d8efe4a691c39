//! Scenario: Reservations Block Over-Commitment
//!
//! # Invariant under test
//! A cart line may only take `stock - reserved_by_others`, where the
//! reservations are the `pickingQty` of every other session in a reserving
//! status. Edits beyond that are clamped with an inline correction, and path
//! generation / mark ready refuse a cart the stock no longer covers.
//! Returning a session to building drops its reservation.

use pf_schemas::SessionStatus;
use pf_session::{InventoryProvider, PickingError, ValidationError};
use pf_testkit::{active_session, key, loc, user, World, WH};

fn world() -> World {
    let w = World::new(&[loc("R1", 1)]);
    w.inventory.stock("A1", WH, "R1", 10);
    w
}

#[test]
fn edits_clamp_to_what_others_left() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut amy_e = w.engine(&amy);
    let mut ben_e = w.engine(&ben);
    active_session(&mut amy_e, None, &[(key("A1", "R1"), 7)]).unwrap();

    let draft = ben_e.start_session(None, None).unwrap();
    ben_e.add_to_cart(draft.id, &key("A1", "R1")).unwrap();
    let edit = ben_e.set_cart_qty(draft.id, &key("A1", "R1"), "5").unwrap();
    assert_eq!(edit.qty, 3);
    assert!(matches!(
        edit.correction,
        Some(ValidationError::OverStock { requested: 5, available: 3, .. })
    ));

    // At the ceiling, another unit is refused outright.
    assert!(matches!(
        ben_e.add_to_cart(draft.id, &key("A1", "R1")).unwrap_err(),
        PickingError::Validation(ValidationError::Unavailable { .. })
    ));
    ben_e.generate_path(draft.id).unwrap();
}

#[test]
fn typed_quantities_are_validated() {
    let w = world();
    let amy = user("amy");
    let mut e = w.engine(&amy);
    let s = e.start_session(None, None).unwrap();
    e.add_to_cart(s.id, &key("A1", "R1")).unwrap();

    assert!(matches!(
        e.set_cart_qty(s.id, &key("A1", "R1"), "abc").unwrap_err(),
        PickingError::Validation(ValidationError::NotNumeric(_))
    ));
    assert!(matches!(
        e.set_cart_qty(s.id, &key("A1", "R1"), "-2").unwrap_err(),
        PickingError::Validation(ValidationError::Negative(-2))
    ));
    assert!(matches!(
        e.set_cart_qty(s.id, &key("A1", "R1"), " ").unwrap_err(),
        PickingError::Validation(ValidationError::NotNumeric(_))
    ));
    assert_eq!(e.session(s.id).unwrap().items[0].picking_qty, 1);

    // Typing 0 takes the line out of the cart.
    let edit = e.set_cart_qty(s.id, &key("A1", "R1"), "0").unwrap();
    assert_eq!(edit.qty, 0);
    assert_eq!(edit.correction, None);
    assert!(e.session(s.id).unwrap().items.is_empty());
    assert!(matches!(
        e.set_cart_qty(s.id, &key("A1", "R1"), "2").unwrap_err(),
        PickingError::Validation(ValidationError::NotInCart(_))
    ));
}

#[test]
fn stock_shrinking_under_a_cart_blocks_mark_ready() {
    let w = world();
    let amy = user("amy");
    let mut e = w.engine(&amy);
    let s = active_session(&mut e, Some("1001"), &[(key("A1", "R1"), 6)]).unwrap();

    w.inventory.stock("A1", WH, "R1", 4);
    let err = e.mark_ready(s.id).unwrap_err();
    assert!(matches!(
        err,
        PickingError::Validation(ValidationError::InsufficientStock { requested: 6, available: 4, .. })
    ));
    assert_eq!(w.session(s.id).unwrap().status, SessionStatus::Active);
}

#[test]
fn vanished_inventory_row_blocks_path_generation() {
    let w = world();
    w.inventory.stock("B7", WH, "R1", 3);
    let amy = user("amy");
    let mut e = w.engine(&amy);
    let s = e.start_session(None, None).unwrap();
    e.add_to_cart(s.id, &key("B7", "R1")).unwrap();

    w.inventory.remove(&key("B7", "R1"), "wipe-b7").unwrap();

    assert!(matches!(
        e.generate_path(s.id).unwrap_err(),
        PickingError::Validation(ValidationError::MissingInventory(_))
    ));
    assert!(w.session(s.id).is_none());
}

#[test]
fn empty_cart_cannot_generate_a_path() {
    let w = world();
    let amy = user("amy");
    let mut e = w.engine(&amy);
    let s = e.start_session(None, None).unwrap();
    assert!(matches!(
        e.generate_path(s.id).unwrap_err(),
        PickingError::Validation(ValidationError::EmptyCart)
    ));
}

#[test]
fn return_to_building_releases_the_reservation() {
    let w = world();
    let (amy, ben) = (user("amy"), user("ben"));
    let mut amy_e = w.engine(&amy);
    let mut ben_e = w.engine(&ben);
    let s = active_session(&mut amy_e, None, &[(key("A1", "R1"), 10)]).unwrap();

    let draft = ben_e.start_session(None, None).unwrap();
    assert!(ben_e.add_to_cart(draft.id, &key("A1", "R1")).is_err());

    let back = amy_e.return_to_building(s.id).unwrap();
    assert_eq!(back.status, SessionStatus::Building);
    assert!(back.pallets.is_empty());
    assert_eq!(back.items.len(), 1);
    assert!(w.session(s.id).is_none());

    ben_e.add_to_cart(draft.id, &key("A1", "R1")).unwrap();
}

#[test]
fn carts_are_frozen_while_waiting_for_a_check() {
    let w = world();
    let amy = user("amy");
    let mut e = w.engine(&amy);
    let s = active_session(&mut e, None, &[(key("A1", "R1"), 2)]).unwrap();
    e.mark_ready(s.id).unwrap();

    assert!(matches!(
        e.set_cart_qty(s.id, &key("A1", "R1"), "3").unwrap_err(),
        PickingError::Validation(ValidationError::NotEditable(SessionStatus::ReadyToDoubleCheck))
    ));
}
