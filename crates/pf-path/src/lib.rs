//! pf-path
//!
//! Turns a flat cart into a frozen pick sequence:
//! - Location Directory lookup of each line's walking sequence
//! - Path Optimizer: sort by (warehouse, picking_order, location, sku)
//! - Pallet Packer: greedy first-fit into capacity-bounded pallets
//!
//! Pure deterministic logic. No IO.

mod directory;
mod optimizer;
mod packer;

pub use directory::{LocationDirectory, StaticDirectory, UNMAPPED_ORDER};
pub use optimizer::{compare_locations, optimize_path};
pub use packer::{footprint_in2, PalletPacker};

use pf_schemas::{CartItem, Pallet};
use serde::{Deserialize, Serialize};

/// The frozen result of path generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickPlan {
    /// Cart lines in walking order.
    pub ordered: Vec<CartItem>,
    pub pallets: Vec<Pallet>,
    pub total_units: u32,
}

impl PickPlan {
    pub fn pallets_qty(&self) -> u32 {
        self.pallets.len() as u32
    }
}

/// Optimize then pack `items`.
pub fn plan_pick_path(
    items: &[CartItem],
    directory: &dyn LocationDirectory,
    packer: &PalletPacker,
) -> PickPlan {
    let ordered = optimize_path(items, directory);
    let pallets = packer.pack(&ordered);
    let total_units = pallets.iter().map(|p| p.total_units).sum();
    tracing::debug!(
        lines = ordered.len(),
        pallets = pallets.len(),
        total_units,
        "pick path planned"
    );
    PickPlan {
        ordered,
        pallets,
        total_units,
    }
}
