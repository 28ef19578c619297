//! HTTP API server command

use basketrec_core::{
    api::{ApiServer, ApiServerConfig},
    error::Result,
    CatalogStore, MemoryCatalog, ServiceConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::helpers::{build_recommender, get_artifact_dir, open_catalog};

/// Handle serve command
pub async fn handle(
    addr: Option<String>,
    retrain_interval: Option<u64>,
    in_memory: bool,
    db_path: &Path,
    config: ServiceConfig,
) -> Result<()> {
    debug!("Starting HTTP API server...");

    let addr = addr.unwrap_or_else(|| config.server.addr.clone());
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", addr, e))?;
    let server_config = ApiServerConfig {
        addr: socket_addr,
        cors_origins: config.server.cors_origins.clone(),
        retrain_interval: retrain_interval
            .map(Duration::from_secs)
            .unwrap_or(config.server.retrain_interval),
    };

    let artifact_dir = get_artifact_dir(db_path, &config);
    let store: Arc<dyn CatalogStore> = if in_memory {
        info!("Using in-memory catalog; nothing will be persisted");
        Arc::new(MemoryCatalog::new())
    } else {
        Arc::new(open_catalog(db_path, &config).await?)
    };

    let recommender = build_recommender(store, &artifact_dir, Arc::new(config)).await?;
    let server = ApiServer::new(server_config, recommender);
    info!("Instance {}", server.instance_id());
    server.serve().await?;
    Ok(())
}
