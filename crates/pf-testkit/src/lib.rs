//! pf-testkit
//!
//! In-memory collaborators and a shared [`World`] for multi-user scenario
//! tests. Nothing here touches a network or a database.

mod stores;
mod world;

pub use stores::{FixedClock, MemoryActivityLog, MemoryInventory, MemorySessionStore};
pub use world::{active_session, ready_session, t0, user, World};

use pf_schemas::{LineKey, Location};

/// Warehouse used by most scenarios.
pub const WH: &str = "LUDLOW";

pub fn key(sku: &str, location: &str) -> LineKey {
    LineKey::new(sku, WH, location)
}

pub fn loc(location: &str, picking_order: i64) -> Location {
    Location {
        warehouse: WH.to_string(),
        location: location.to_string(),
        picking_order: Some(picking_order),
    }
}
