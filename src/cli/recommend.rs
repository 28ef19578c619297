//! Hybrid recommendation command

use basketrec_core::{error::Result, ServiceConfig, UserId};
use chrono::{Datelike, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::helpers::open_recommender;

/// Handle recommend command
pub async fn handle(
    user_id: String,
    limit: Option<usize>,
    format: String,
    db_path: &Path,
    config: ServiceConfig,
) -> Result<()> {
    let user = UserId::parse(&user_id)?;
    let n = limit.unwrap_or(config.models.limits.hybrid);
    let recommender = open_recommender(db_path, Arc::new(config)).await?;
    recommender.retrain(false).await?;

    debug!("Computing {} recommendations for {}", n, user);
    let mut breakdown = recommender
        .hybrid_breakdown(&user, n, Utc::now().month())
        .await?;
    breakdown.fused.truncate(n);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    if breakdown.fused.is_empty() {
        println!("No recommendations for {}", user);
        return Ok(());
    }

    let ids: Vec<_> = breakdown.fused.iter().map(|f| f.product_id.clone()).collect();
    let products = recommender.product_details(&ids).await?;

    println!("Recommendations for {}{}:", user, if breakdown.cold_start { " (cold start)" } else { "" });
    println!();
    for (i, item) in breakdown.fused.iter().enumerate() {
        let title = products
            .iter()
            .find(|p| p.id == item.product_id)
            .map(|p| p.title.as_str())
            .unwrap_or("<unknown>");
        println!(
            "{:>3}. {} {} (score {:.4}, via {})",
            i + 1,
            item.product_id,
            title,
            item.score,
            item.sources.join(", ")
        );
    }
    Ok(())
}
