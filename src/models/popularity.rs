//! Catalog-wide popularity ranking

use crate::types::{Event, ObjectId, Product};
use std::collections::HashMap;

/// Product ids by total event weight, descending
///
/// Products that never received an event follow in catalog order, so every
/// catalog product appears exactly once. Events for products missing from the
/// catalog are ignored.
pub fn rank(products: &[Product], events: &[Event]) -> Vec<ObjectId> {
    let mut totals: HashMap<&ObjectId, f64> = HashMap::new();
    for event in events {
        *totals.entry(&event.product_id).or_insert(0.0) += event.weight;
    }

    let mut ranked: Vec<(usize, f64)> = products
        .iter()
        .enumerate()
        .map(|(i, p)| (i, totals.get(&p.id).copied().unwrap_or(0.0)))
        .collect();
    // Stable: equal totals keep catalog order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .map(|(i, _)| products[i].id.clone())
        .collect()
}
