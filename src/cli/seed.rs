//! Catalog seeding command

use basketrec_core::{
    error::Result,
    storage::seed::{read_snapshot, seed_catalog},
    ServiceConfig,
};
use std::path::Path;
use tracing::debug;

use super::helpers::open_catalog;

/// Handle seed command
pub async fn handle(file: &Path, db_path: &Path, config: ServiceConfig) -> Result<()> {
    debug!("Seeding {} from {}", db_path.display(), file.display());
    let snapshot = read_snapshot(file)?;
    let catalog = open_catalog(db_path, &config).await?;
    let report = seed_catalog(&catalog, snapshot, &config.events).await?;

    println!(
        "Seeded {}: {} users, {} products ({} skipped as duplicates), {} events ({} skipped)",
        db_path.display(),
        report.users,
        report.products,
        report.skipped_products,
        report.events,
        report.skipped_events
    );
    Ok(())
}
