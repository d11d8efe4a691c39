//! `pickflow plan`: run the path planner over a cart file.

use anyhow::{bail, Context, Result};
use pf_path::{plan_pick_path, PalletPacker, PickPlan, StaticDirectory};
use pf_schemas::{CartItem, Location};
use serde::Deserialize;
use std::path::Path;

/// One row of the location CSV. A blank `picking_order` is unmapped.
#[derive(Debug, Deserialize)]
struct LocationRow {
    warehouse: String,
    location: String,
    #[serde(default)]
    picking_order: String,
}

/// Columns: `warehouse,location,picking_order`.
pub fn load_locations(path: &Path) -> Result<Vec<Location>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("read locations failed: {}", path.display()))?;

    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<LocationRow>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let row = row.with_context(|| format!("{}:{line}: bad location row", path.display()))?;
        if row.warehouse.is_empty() || row.location.is_empty() {
            bail!("{}:{line}: warehouse and location are required", path.display());
        }
        let picking_order = if row.picking_order.is_empty() {
            None
        } else {
            Some(row.picking_order.parse::<i64>().with_context(|| {
                format!("{}:{line}: picking_order '{}' is not an integer", path.display(), row.picking_order)
            })?)
        };
        out.push(Location {
            warehouse: row.warehouse,
            location: row.location,
            picking_order,
        });
    }
    Ok(out)
}

pub fn run(cart: &[CartItem], locations: &[Location], pallet_capacity: u32) -> PickPlan {
    let directory = StaticDirectory::new(locations);
    let packer = PalletPacker::new(pallet_capacity);
    let plan = plan_pick_path(cart, &directory, &packer);
    tracing::info!(
        lines = plan.ordered.len(),
        pallets = plan.pallets_qty(),
        total_units = plan.total_units,
        "plan ready"
    );
    plan
}
