//! KNN hold-out evaluation command

use basketrec_core::{error::Result, ServiceConfig};
use std::path::Path;
use std::sync::Arc;

use super::helpers::open_recommender;

/// Handle evaluate command
pub async fn handle(json: bool, db_path: &Path, config: ServiceConfig) -> Result<()> {
    let holdout = config.models.knn.holdout_fraction;
    let recommender = open_recommender(db_path, Arc::new(config)).await?;
    let models = recommender.signals().await?;

    let Some(accuracy) = models.knn.evaluate() else {
        println!("Not enough ratings to hold out a test set");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&accuracy)?);
    } else {
        println!(
            "KNN hold-out ({:.0}% of ratings across {} users)",
            holdout * 100.0,
            models.matrix.users().len()
        );
        println!("  samples: {}", accuracy.samples);
        println!("  RMSE:    {:.4}", accuracy.rmse);
        println!("  MAE:     {:.4}", accuracy.mae);
    }
    Ok(())
}
