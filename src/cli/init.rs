//! Database initialization command

use basketrec_core::{error::Result, ServiceConfig};
use std::path::Path;
use tracing::debug;

use super::helpers::open_catalog;

/// Handle database initialization command
pub async fn handle(db_path: &Path, config: &ServiceConfig) -> Result<()> {
    debug!("Initializing database...");

    // Opening applies the schema
    open_catalog(db_path, config).await?;

    println!("Database initialized: {}", db_path.display());
    Ok(())
}
