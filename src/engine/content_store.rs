//! Persisted content model with a product-set retrain gate
//!
//! The TF-IDF similarity matrix is the one model too expensive to rebuild per
//! request. It is stored as a bincode artifact and only rebuilt when the set
//! of catalog product ids differs from the one it was built from. Writes go
//! to a temporary file that is renamed over the artifact, and the live model
//! is swapped behind a lock only after a successful build.

use crate::error::{RecommendError, Result};
use crate::models::ContentModel;
use crate::storage::CatalogStore;
use crate::types::{ObjectId, Product};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// File name of the content model artifact
pub const CONTENT_ARTIFACT: &str = "content_model.bin";

/// Result of a retrain request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetrainOutcome {
    pub retrained: bool,
    pub products: usize,
}

/// State of the on-disk artifact relative to a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ArtifactStatus {
    Missing,
    Corrupt { reason: String },
    Stale { indexed: usize, catalog: usize },
    InSync { products: usize },
}

pub struct ContentModelStore {
    artifact_path: PathBuf,
    live: RwLock<Arc<ContentModel>>,
    /// Whether `live` came from (or was written to) the artifact
    persisted: RwLock<bool>,
    retrain_lock: Mutex<()>,
}

impl ContentModelStore {
    /// Open the store, loading the artifact when it is readable
    ///
    /// A missing or corrupt artifact leaves an empty live model; the next
    /// `retrain_if_changed` rebuilds it.
    pub async fn open<P: AsRef<Path>>(artifact_dir: P) -> Result<Self> {
        let artifact_dir = artifact_dir.as_ref();
        tokio::fs::create_dir_all(artifact_dir).await?;
        let artifact_path = artifact_dir.join(CONTENT_ARTIFACT);

        let (model, persisted) = match load_artifact(&artifact_path).await {
            Ok(model) => {
                info!(
                    "Loaded content model ({} products) from {}",
                    model.len(),
                    artifact_path.display()
                );
                (model, true)
            }
            Err(RecommendError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No content model artifact at {}", artifact_path.display());
                (ContentModel::default(), false)
            }
            Err(e) => {
                warn!("Ignoring unreadable content model artifact: {}", e);
                (ContentModel::default(), false)
            }
        };

        Ok(Self {
            artifact_path,
            live: RwLock::new(Arc::new(model)),
            persisted: RwLock::new(persisted),
            retrain_lock: Mutex::new(()),
        })
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// The model readers should use right now
    pub async fn current(&self) -> Arc<ContentModel> {
        Arc::clone(&*self.live.read().await)
    }

    /// Rebuild when the catalog's product set changed, or always with `force`
    pub async fn retrain_if_changed(
        &self,
        store: &dyn CatalogStore,
        force: bool,
    ) -> Result<RetrainOutcome> {
        let _guard = self.retrain_lock.lock().await;

        let products = store.list_products().await?;
        let current = self.current().await;
        let persisted = *self.persisted.read().await;

        if !force && persisted && same_products(&current, &products) {
            debug!("Content model up to date ({} products)", products.len());
            return Ok(RetrainOutcome {
                retrained: false,
                products: products.len(),
            });
        }

        info!(
            "Rebuilding content model for {} products{}",
            products.len(),
            if force { " (forced)" } else { "" }
        );

        let path = self.artifact_path.clone();
        let model = tokio::task::spawn_blocking(move || -> Result<ContentModel> {
            let model = ContentModel::build(&products);
            write_atomically(&path, &bincode::serialize(&model)?)?;
            Ok(model)
        })
        .await
        .map_err(|e| RecommendError::Model(format!("Content model build task failed: {}", e)))??;

        let count = model.len();
        *self.live.write().await = Arc::new(model);
        *self.persisted.write().await = true;

        Ok(RetrainOutcome {
            retrained: true,
            products: count,
        })
    }

    /// Compare the on-disk artifact with a catalog product list
    pub async fn artifact_status(&self, products: &[Product]) -> ArtifactStatus {
        match load_artifact(&self.artifact_path).await {
            Ok(model) if same_products(&model, products) => ArtifactStatus::InSync {
                products: model.len(),
            },
            Ok(model) => ArtifactStatus::Stale {
                indexed: model.len(),
                catalog: products.len(),
            },
            Err(RecommendError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                ArtifactStatus::Missing
            }
            Err(e) => ArtifactStatus::Corrupt {
                reason: e.to_string(),
            },
        }
    }
}

fn same_products(model: &ContentModel, products: &[Product]) -> bool {
    let catalog: BTreeSet<&ObjectId> = products.iter().map(|p| &p.id).collect();
    model.product_set() == catalog
}

async fn load_artifact(path: &Path) -> Result<ContentModel> {
    let bytes = tokio::fs::read(path).await?;
    let mut model: ContentModel = bincode::deserialize(&bytes)?;
    if !model.is_consistent() {
        return Err(RecommendError::Model(
            "content model matrix does not match its product list".to_string(),
        ));
    }
    model.reindex();
    Ok(model)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCatalog;
    use tempfile::TempDir;

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    async fn store_with(titles: &[(u8, &str)]) -> MemoryCatalog {
        let store = MemoryCatalog::new();
        for &(n, title) in titles {
            store.upsert_product(&Product::new(oid(n), title)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_retrain_is_gated_on_product_set() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&[(1, "Basmati Rice"), (2, "Brown Rice")]).await;
        let content = ContentModelStore::open(dir.path()).await.unwrap();
        assert!(content.current().await.is_empty());

        let first = content.retrain_if_changed(&store, false).await.unwrap();
        assert_eq!(first, RetrainOutcome { retrained: true, products: 2 });
        assert!(content.artifact_path().exists());

        let second = content.retrain_if_changed(&store, false).await.unwrap();
        assert!(!second.retrained);

        let forced = content.retrain_if_changed(&store, true).await.unwrap();
        assert!(forced.retrained);

        store.upsert_product(&Product::new(oid(3), "Wild Rice")).await.unwrap();
        let third = content.retrain_if_changed(&store, false).await.unwrap();
        assert_eq!(third.products, 3);
        assert!(third.retrained);
        assert_eq!(content.current().await.len(), 3);
    }

    #[tokio::test]
    async fn test_reopen_loads_persisted_model() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&[(1, "Basmati Rice"), (2, "Brown Rice"), (3, "Milk")]).await;
        {
            let content = ContentModelStore::open(dir.path()).await.unwrap();
            content.retrain_if_changed(&store, false).await.unwrap();
        }

        let reopened = ContentModelStore::open(dir.path()).await.unwrap();
        let model = reopened.current().await;
        assert_eq!(model.similar_products(&oid(1), 1), vec![oid(2)]);
        assert!(!reopened.retrain_if_changed(&store, false).await.unwrap().retrained);

        let products = store.list_products().await.unwrap();
        assert_eq!(
            reopened.artifact_status(&products).await,
            ArtifactStatus::InSync { products: 3 }
        );
    }

    #[tokio::test]
    async fn test_corrupt_artifact_triggers_rebuild() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONTENT_ARTIFACT), b"not a model").unwrap();
        let store = store_with(&[(1, "Ghee")]).await;

        let content = ContentModelStore::open(dir.path()).await.unwrap();
        let products = store.list_products().await.unwrap();
        assert!(matches!(
            content.artifact_status(&products).await,
            ArtifactStatus::Corrupt { .. }
        ));

        assert!(content.retrain_if_changed(&store, false).await.unwrap().retrained);
        assert_eq!(
            content.artifact_status(&products).await,
            ArtifactStatus::InSync { products: 1 }
        );
    }

    #[tokio::test]
    async fn test_missing_artifact_status() {
        let dir = TempDir::new().unwrap();
        let content = ContentModelStore::open(dir.path().join("models")).await.unwrap();
        assert_eq!(content.artifact_status(&[]).await, ArtifactStatus::Missing);
    }
}
