//! Path Optimizer.
//!
//! Canonical walking order, all ascending:
//! `(warehouse, picking_order, location, sku)`.
//!
//! Unmapped locations take [`UNMAPPED_ORDER`] and therefore trail their
//! warehouse. Location codes compare naturally ("Row 2" before "Row 10").

use std::cmp::Ordering;

use lexical_sort::natural_lexical_cmp;
use pf_schemas::CartItem;

use crate::{LocationDirectory, UNMAPPED_ORDER};

/// Natural (numeric-aware) comparison of two location codes.
pub fn compare_locations(a: &str, b: &str) -> Ordering {
    natural_lexical_cmp(a, b).then_with(|| a.cmp(b))
}

/// Return `items` in walking order. The input is not modified.
pub fn optimize_path(items: &[CartItem], directory: &dyn LocationDirectory) -> Vec<CartItem> {
    let mut keyed: Vec<(i64, &CartItem)> = items
        .iter()
        .map(|item| {
            let order = directory
                .picking_order(&item.warehouse, &item.location)
                .unwrap_or(UNMAPPED_ORDER);
            (order, item)
        })
        .collect();

    keyed.sort_by(|(ao, a), (bo, b)| {
        a.warehouse
            .cmp(&b.warehouse)
            .then_with(|| ao.cmp(bo))
            .then_with(|| compare_locations(&a.location, &b.location))
            .then_with(|| a.sku.cmp(&b.sku))
    });

    keyed.into_iter().map(|(_, item)| item.clone()).collect()
}
