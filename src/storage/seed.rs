//! Catalog seeding from JSON snapshots
//!
//! Accepts the document shape the storefront backend exports:
//! `{"users": [...], "products": [...], "events": [...]}` with camelCase keys.

use crate::config::EventWeights;
use crate::error::Result;
use crate::storage::CatalogStore;
use crate::types::{CatalogSnapshot, EventType, ObjectId, UserId};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Counts of documents written by a seed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub products: usize,
    pub events: usize,
    /// Products skipped because a product with the same title already exists
    pub skipped_products: usize,
    /// Events skipped for an unknown product or an identical stored event
    pub skipped_events: usize,
}

type EventKey = (UserId, ObjectId, EventType);

/// Read a snapshot file
pub fn read_snapshot(path: &Path) -> Result<CatalogSnapshot> {
    let raw = std::fs::read_to_string(path)?;
    let snapshot: CatalogSnapshot = serde_json::from_str(&raw)?;
    debug!(
        "Parsed snapshot {}: {} users, {} products, {} events",
        path.display(),
        snapshot.users.len(),
        snapshot.products.len(),
        snapshot.events.len()
    );
    Ok(snapshot)
}

/// Write a snapshot into a store
///
/// Products whose title already exists in the store are skipped, so seeding
/// the same file twice does not duplicate the catalog. Events are skipped when
/// their product is not in the store or when the store already holds an event
/// with the same user, product and type. Events without a weight get the
/// configured weight for their type.
pub async fn seed_catalog(
    store: &dyn CatalogStore,
    snapshot: CatalogSnapshot,
    weights: &EventWeights,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let stored = store.list_products().await?;
    let mut existing_titles: HashSet<String> =
        stored.iter().map(|p| p.title.to_lowercase()).collect();
    let mut known_products: HashSet<ObjectId> = stored.into_iter().map(|p| p.id).collect();

    for product in &snapshot.products {
        let title = product.title.to_lowercase();
        if existing_titles.contains(&title) {
            debug!("Skipped existing product: {}", product.title);
            report.skipped_products += 1;
            continue;
        }
        store.upsert_product(product).await?;
        existing_titles.insert(title);
        known_products.insert(product.id.clone());
        report.products += 1;
    }

    for user in &snapshot.users {
        store.upsert_user(user).await?;
        report.users += 1;
    }

    let mut seen: HashSet<EventKey> = store
        .list_events()
        .await?
        .into_iter()
        .map(|e| (e.user_id, e.product_id, e.event_type))
        .collect();

    for mut event in snapshot.events {
        if !known_products.contains(&event.product_id) {
            debug!("Skipped event for unknown product {}", event.product_id);
            report.skipped_events += 1;
            continue;
        }
        let key = (
            event.user_id.clone(),
            event.product_id.clone(),
            event.event_type,
        );
        if !seen.insert(key) {
            report.skipped_events += 1;
            continue;
        }
        if event.weight <= 0.0 {
            event.weight = weights.weight_for(event.event_type);
        }
        store.insert_event(&event).await?;
        report.events += 1;
    }

    info!(
        "Seeded catalog: {} users, {} products ({} skipped), {} events ({} skipped)",
        report.users,
        report.products,
        report.skipped_products,
        report.events,
        report.skipped_events
    );
    Ok(report)
}
