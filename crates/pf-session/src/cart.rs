//! Cart editing rules and stock reservations.
//!
//! Every line of a session in a reserving status holds its `pickingQty`
//! against the stock row it names. What a user may still take is
//! `stock - reserved_by_others`.

use std::collections::HashMap;

use pf_schemas::{CartItem, InventoryRecord, LineKey, PickingSession};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// ReservationBook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ReservationBook {
    reserved: HashMap<LineKey, u32>,
}

impl ReservationBook {
    /// Reservations held by every reserving session except `exclude`.
    pub fn from_sessions(sessions: &[PickingSession], exclude: Option<Uuid>) -> Self {
        let mut reserved: HashMap<LineKey, u32> = HashMap::new();
        for s in sessions {
            if Some(s.id) == exclude || !s.status.reserves_stock() {
                continue;
            }
            for item in &s.items {
                *reserved.entry(item.line_key()).or_insert(0) += item.picking_qty;
            }
        }
        Self { reserved }
    }

    pub fn reserved(&self, key: &LineKey) -> u32 {
        self.reserved.get(key).copied().unwrap_or(0)
    }

    pub fn available(&self, stock: &InventoryRecord) -> i64 {
        stock.quantity - i64::from(self.reserved(&stock.line_key()))
    }
}

/// Every cart line must fit in `stock - reserved_by_others`. `stock_of`
/// returns `None` when the inventory row no longer exists.
pub fn verify_reservations<F>(
    items: &[CartItem],
    book: &ReservationBook,
    mut stock_of: F,
) -> Result<(), ValidationError>
where
    F: FnMut(&LineKey) -> Option<InventoryRecord>,
{
    for item in items {
        let key = item.line_key();
        let record = stock_of(&key).ok_or_else(|| ValidationError::MissingInventory(key.clone()))?;
        let available = book.available(&record);
        if i64::from(item.picking_qty) > available {
            return Err(ValidationError::InsufficientStock {
                key,
                requested: item.picking_qty,
                available,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Quantity edits
// ---------------------------------------------------------------------------

/// Result of a cart edit. `correction` explains a clamp; it is shown inline
/// and the edit still applies with `qty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEdit {
    pub key: LineKey,
    pub qty: u32,
    pub correction: Option<ValidationError>,
}

/// Parse a typed quantity. Blank input is not a number.
pub fn parse_quantity(text: &str) -> Result<i64, ValidationError> {
    let n: i64 = text
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotNumeric(text.to_string()))?;
    if n < 0 {
        return Err(ValidationError::Negative(n));
    }
    Ok(n)
}

/// Clamp `requested` into `[1, available]`.
pub fn clamp_quantity(sku: &str, requested: i64, available: i64) -> (u32, Option<ValidationError>) {
    let ceiling = available.max(1);
    if requested > ceiling {
        let qty = u32::try_from(ceiling).unwrap_or(u32::MAX);
        return (
            qty,
            Some(ValidationError::OverStock {
                sku: sku.to_string(),
                requested,
                available: ceiling,
            }),
        );
    }
    if requested < 1 {
        return (
            1,
            Some(ValidationError::BelowMinimum {
                sku: sku.to_string(),
            }),
        );
    }
    (u32::try_from(requested).unwrap_or(u32::MAX), None)
}

/// Add one unit of `record` to the cart, or start a new line.
pub fn add_unit(
    items: &mut Vec<CartItem>,
    record: &InventoryRecord,
    available: i64,
) -> Result<CartEdit, ValidationError> {
    let key = record.line_key();
    let in_cart = items
        .iter()
        .find(|i| i.line_key() == key)
        .map(|i| i.picking_qty)
        .unwrap_or(0);

    if available <= i64::from(in_cart) {
        return Err(ValidationError::Unavailable {
            sku: record.sku.clone(),
        });
    }

    let qty = match items.iter_mut().find(|i| i.line_key() == key) {
        Some(line) => {
            line.picking_qty += 1;
            line.quantity = record.quantity;
            line.picking_qty
        }
        None => {
            items.push(CartItem::new(
                &record.sku,
                &record.warehouse,
                &record.location,
                1,
                record.quantity,
            ));
            1
        }
    };

    Ok(CartEdit {
        key,
        qty,
        correction: None,
    })
}

/// Set the quantity of an existing line, clamped to `[1, available]`.
/// Zero removes the line; the edit then reports `qty == 0`.
pub fn set_quantity(
    items: &mut Vec<CartItem>,
    key: &LineKey,
    requested: i64,
    available: i64,
) -> Result<CartEdit, ValidationError> {
    if requested == 0 {
        remove_line(items, key)?;
        return Ok(CartEdit {
            key: key.clone(),
            qty: 0,
            correction: None,
        });
    }

    let line = items
        .iter_mut()
        .find(|i| i.line_key() == *key)
        .ok_or_else(|| ValidationError::NotInCart(key.clone()))?;

    let (qty, correction) = clamp_quantity(&line.sku, requested, available);
    line.picking_qty = qty;

    Ok(CartEdit {
        key: key.clone(),
        qty,
        correction,
    })
}

pub fn remove_line(items: &mut Vec<CartItem>, key: &LineKey) -> Result<CartItem, ValidationError> {
    let idx = items
        .iter()
        .position(|i| i.line_key() == *key)
        .ok_or_else(|| ValidationError::NotInCart(key.clone()))?;
    Ok(items.remove(idx))
}
