//! Health diagnostics command

use basketrec_core::{
    error::Result,
    health::{print_health_summary, run_health_checks},
    ServiceConfig,
};
use std::path::Path;
use tracing::debug;

use super::helpers::get_artifact_dir;

/// Handle doctor command
pub async fn handle(verbose: bool, json: bool, db_path: &Path, config: ServiceConfig) -> Result<()> {
    debug!("Running health checks...");

    let artifact_dir = get_artifact_dir(db_path, &config);
    let summary = run_health_checks(db_path, &artifact_dir, &config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_health_summary(&summary, verbose);
    }

    std::process::exit(summary.status.exit_code());
}
