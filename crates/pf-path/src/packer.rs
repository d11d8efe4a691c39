//! Pallet Packer.
//!
//! Greedy first-fit over the optimizer's sequence. A line that does not fit
//! the space left on the running pallet is split: the part that fits stays,
//! the remainder opens the next pallet. Remainders are never reordered
//! relative to the lines that follow them.
//!
//! Each pallet also carries a rough floor-area estimate: the base layer is
//! taken as 40% of its units (at most 5), each unit sized by the SKU of the
//! line loaded last.

use pf_schemas::{CartItem, Pallet, PalletLine, SkuDimensions, PALLET_CAPACITY};

/// Units that fit side by side on the bottom layer.
const MAX_BASE_UNITS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PalletPacker {
    capacity: u32,
}

impl Default for PalletPacker {
    fn default() -> Self {
        Self {
            capacity: PALLET_CAPACITY,
        }
    }
}

impl PalletPacker {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Pack `ordered` into pallets numbered from 1.
    ///
    /// Lines with `picking_qty == 0` are dropped. Units are conserved:
    /// the sum of `total_units` equals the sum of `picking_qty`.
    pub fn pack(&self, ordered: &[CartItem]) -> Vec<Pallet> {
        let mut pallets: Vec<Pallet> = Vec::new();
        let mut current = empty_pallet(1);

        for item in ordered {
            let mut remaining = item.picking_qty;
            while remaining > 0 {
                let space = self.capacity - current.total_units;
                let take = remaining.min(space);

                push_or_merge(&mut current, item, take);
                current.total_units += take;
                current.footprint_in2 =
                    footprint_in2(current.total_units, item.sku_metadata.unwrap_or_default());
                remaining -= take;

                if current.total_units == self.capacity {
                    let next_id = current.id + 1;
                    pallets.push(std::mem::replace(&mut current, empty_pallet(next_id)));
                }
            }
        }

        if !current.items.is_empty() {
            pallets.push(current);
        }
        pallets
    }
}

fn empty_pallet(id: u32) -> Pallet {
    Pallet {
        id,
        items: Vec::new(),
        total_units: 0,
        footprint_in2: 0,
    }
}

/// `length * width * base units`, with `base = min(5, ceil(0.4 * units))`.
pub fn footprint_in2(total_units: u32, dims: SkuDimensions) -> u32 {
    let base = ((total_units * 2).div_ceil(5)).min(MAX_BASE_UNITS);
    dims.length_ft * 12 * dims.width_in * base
}

fn push_or_merge(pallet: &mut Pallet, item: &CartItem, take: u32) {
    let existing = pallet.items.iter_mut().find(|l| {
        l.sku == item.sku && l.warehouse == item.warehouse && l.location == item.location
    });
    match existing {
        Some(line) => {
            line.picking_qty += take;
            line.original_qty += item.picking_qty;
            line.is_split = line.is_split || take < item.picking_qty;
        }
        None => pallet.items.push(PalletLine {
            sku: item.sku.clone(),
            warehouse: item.warehouse.clone(),
            location: item.location.clone(),
            picking_qty: take,
            original_qty: item.picking_qty,
            is_split: take < item.picking_qty,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sku: &str, loc: &str, qty: u32) -> CartItem {
        CartItem::new(sku, "W1", loc, qty, 100)
    }

    #[test]
    fn empty_cart_packs_to_no_pallets() {
        assert!(PalletPacker::default().pack(&[]).is_empty());
    }

    #[test]
    fn exact_fill_does_not_leave_an_empty_trailing_pallet() {
        let pallets = PalletPacker::default().pack(&[line("A", "R1", 12)]);
        assert_eq!(pallets.len(), 1);
        assert_eq!(pallets[0].total_units, 12);
        assert!(!pallets[0].items[0].is_split);
    }

    #[test]
    fn oversized_line_fills_consecutive_pallets() {
        let pallets = PalletPacker::default().pack(&[line("BIG", "R1", 30), line("S", "R2", 2)]);
        let totals: Vec<u32> = pallets.iter().map(|p| p.total_units).collect();
        assert_eq!(totals, vec![12, 12, 8]);
        assert_eq!(pallets[2].items.len(), 2);
        assert!(pallets[0].items[0].is_split);
        assert_eq!(pallets[0].items[0].original_qty, 30);
        let ids: Vec<u32> = pallets.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn zero_quantity_lines_are_skipped() {
        let pallets = PalletPacker::default().pack(&[line("A", "R1", 0), line("B", "R1", 3)]);
        assert_eq!(pallets.len(), 1);
        assert_eq!(pallets[0].items.len(), 1);
        assert_eq!(pallets[0].items[0].sku, "B");
    }

    #[test]
    fn duplicate_lines_merge_within_a_pallet() {
        let pallets = PalletPacker::default().pack(&[line("A", "R1", 2), line("A", "R1", 3)]);
        assert_eq!(pallets[0].items.len(), 1);
        assert_eq!(pallets[0].items[0].picking_qty, 5);
    }

    #[test]
    fn footprint_follows_the_base_layer() {
        let d = SkuDimensions::default();
        assert_eq!(footprint_in2(10, d), 60 * 6 * 4);
        assert_eq!(footprint_in2(12, d), 60 * 6 * 5);
        assert_eq!(footprint_in2(30, d), 60 * 6 * 5);
        assert_eq!(footprint_in2(3, d), 60 * 6 * 2);

        let mut wide = line("W", "R2", 5);
        wide.sku_metadata = Some(SkuDimensions {
            length_ft: 4,
            width_in: 10,
        });
        let pallets = PalletPacker::default().pack(&[line("A", "R1", 12), wide]);
        assert_eq!(pallets[0].footprint_in2, 1800);
        assert_eq!(pallets[1].footprint_in2, 48 * 10 * 2);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let packer = PalletPacker::new(0);
        assert_eq!(packer.capacity(), 1);
        assert_eq!(packer.pack(&[line("A", "R1", 3)]).len(), 3);
    }
}
