//! Content model retrain command

use basketrec_core::{error::Result, ServiceConfig};
use std::path::Path;
use std::sync::Arc;

use super::helpers::open_recommender;

/// Handle retrain command
pub async fn handle(force: bool, db_path: &Path, config: ServiceConfig) -> Result<()> {
    let recommender = open_recommender(db_path, Arc::new(config)).await?;
    let outcome = recommender.retrain(force).await?;

    if outcome.retrained {
        println!(
            "Content model retrained: {} products -> {}",
            outcome.products,
            recommender.content().artifact_path().display()
        );
    } else {
        println!(
            "Content model already up to date ({} products)",
            outcome.products
        );
    }
    Ok(())
}
