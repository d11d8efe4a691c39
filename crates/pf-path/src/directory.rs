use pf_schemas::Location;
use std::collections::HashMap;

/// Walking sequence used for locations missing from the directory.
/// Sorts after every mapped location.
pub const UNMAPPED_ORDER: i64 = i64::MAX;

/// Read-only `(warehouse, location) -> picking_order` lookup.
pub trait LocationDirectory {
    fn picking_order(&self, warehouse: &str, location: &str) -> Option<i64>;
}

/// Snapshot of the directory held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    orders: HashMap<(String, String), i64>,
}

impl StaticDirectory {
    pub fn new(rows: &[Location]) -> Self {
        let mut orders = HashMap::with_capacity(rows.len());
        for row in rows {
            // Rows without a sequence stay unmapped.
            if let Some(order) = row.picking_order {
                orders.insert((row.warehouse.clone(), row.location.clone()), order);
            }
        }
        Self { orders }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl LocationDirectory for StaticDirectory {
    fn picking_order(&self, warehouse: &str, location: &str) -> Option<i64> {
        self.orders
            .get(&(warehouse.to_string(), location.to_string()))
            .copied()
    }
}
