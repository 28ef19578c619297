//! Shared helper functions for CLI commands
//!
//! Database path resolution, config loading and recommender assembly.

use basketrec_core::{
    error::Result, CatalogStore, ContentModelStore, Recommender, ServiceConfig, SqliteCatalog,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Directory name under the platform data dir
const DATA_DIR: &str = "basketrec";

/// Get the default database path using XDG_DATA_HOME standard
pub fn get_default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR)
        .join("catalog.db")
}

/// Get the database path from CLI arg, env var, config file, or default
pub fn get_db_path(cli_path: Option<String>, config: &ServiceConfig) -> PathBuf {
    cli_path
        .or_else(|| std::env::var("BASKETREC_DB_PATH").ok())
        .filter(|p| !p.is_empty())
        .or_else(|| config.storage.db_path.clone())
        .map(PathBuf::from)
        .unwrap_or_else(get_default_db_path)
}

/// Content artifact directory: configured, or `models/` next to the database
pub fn get_artifact_dir(db_path: &Path, config: &ServiceConfig) -> PathBuf {
    match &config.models.artifact_dir {
        Some(dir) => PathBuf::from(dir),
        None => db_path
            .parent()
            .map(|p| p.join("models"))
            .unwrap_or_else(|| PathBuf::from("models")),
    }
}

/// Load the layered configuration
pub fn load_config(path: Option<&str>) -> Result<ServiceConfig> {
    let config = ServiceConfig::load(path.map(Path::new))?;
    config.validate()?;
    Ok(config)
}

/// Open (creating if needed) the SQLite catalog
pub async fn open_catalog(db_path: &Path, config: &ServiceConfig) -> Result<SqliteCatalog> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    debug!("Opening catalog at {}", db_path.display());
    SqliteCatalog::open_with_pool_size(db_path, config.storage.pool_size).await
}

/// Assemble a recommender over a store
pub async fn build_recommender(
    store: Arc<dyn CatalogStore>,
    artifact_dir: &Path,
    config: Arc<ServiceConfig>,
) -> Result<Arc<Recommender>> {
    let content = Arc::new(ContentModelStore::open(artifact_dir).await?);
    Ok(Arc::new(Recommender::new(store, content, config)))
}

/// Open the SQLite catalog and build a recommender over it
pub async fn open_recommender(
    db_path: &Path,
    config: Arc<ServiceConfig>,
) -> Result<Arc<Recommender>> {
    let store: Arc<dyn CatalogStore> = Arc::new(open_catalog(db_path, &config).await?);
    let artifact_dir = get_artifact_dir(db_path, &config);
    build_recommender(store, &artifact_dir, config).await
}
