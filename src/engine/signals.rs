//! Trained signal models and their revision-keyed cache
//!
//! Everything except the content model is cheap enough to rebuild from a
//! catalog snapshot whenever the store revision moves. Training runs on the
//! blocking pool; readers keep the previous `Arc` until the swap.

use crate::config::ModelConfig;
use crate::error::{RecommendError, Result};
use crate::models::{popularity, AssociationRules, DemographicClusters, InteractionMatrix, KnnModel};
use crate::storage::CatalogStore;
use crate::types::{CatalogSnapshot, ObjectId, UserId};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Models trained from one catalog revision
#[derive(Debug)]
pub struct SignalModels {
    pub revision: u64,
    pub snapshot: CatalogSnapshot,
    pub matrix: InteractionMatrix,
    pub knn: KnnModel,
    pub clusters: DemographicClusters,
    pub rules: AssociationRules,
    /// All catalog products, most weighted first
    pub popular: Vec<ObjectId>,
}

impl SignalModels {
    pub fn train(revision: u64, snapshot: CatalogSnapshot, config: &ModelConfig) -> Self {
        let started = Instant::now();

        let matrix = InteractionMatrix::from_events(&snapshot.events);
        let knn = KnnModel::train(&matrix, &config.knn, config.seed);
        let clusters = DemographicClusters::train(
            &snapshot.users,
            &snapshot.events,
            &config.clustering,
            config.seed,
        );
        let rules = AssociationRules::mine(&snapshot.events, &config.association);
        let popular = popularity::rank(&snapshot.products, &snapshot.events);

        info!(
            "Trained signal models for revision {} in {:?} ({} users, {} products, {} events)",
            revision,
            started.elapsed(),
            snapshot.users.len(),
            snapshot.products.len(),
            snapshot.events.len()
        );

        Self {
            revision,
            snapshot,
            matrix,
            knn,
            clusters,
            rules,
            popular,
        }
    }

    /// The product a user weighted most, ties by product id
    pub fn favourite_product(&self, user: &UserId) -> Option<ObjectId> {
        let u = self.matrix.user_index(user)?;
        self.matrix
            .row(u)
            .iter()
            .fold(None::<(usize, f64)>, |best, (&p, &w)| match best {
                Some((_, bw)) if bw >= w => best,
                _ => Some((p, w)),
            })
            .map(|(p, _)| self.matrix.product_at(p).clone())
    }
}

/// Latest trained models, retrained when the store revision changes
pub struct SignalCache {
    config: ModelConfig,
    current: RwLock<Option<Arc<SignalModels>>>,
    training: Mutex<()>,
}

impl SignalCache {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    /// Models for the store's current revision
    pub async fn get(&self, store: &dyn CatalogStore) -> Result<Arc<SignalModels>> {
        let revision = store.revision().await?;
        if let Some(models) = self.fresh(revision).await {
            return Ok(models);
        }

        // One trainer at a time; late arrivals reuse its result
        let _guard = self.training.lock().await;
        let revision = store.revision().await?;
        if let Some(models) = self.fresh(revision).await {
            return Ok(models);
        }

        debug!("Signal models stale, retraining for revision {}", revision);
        let snapshot = store.snapshot().await?;
        let config = self.config.clone();
        let models = tokio::task::spawn_blocking(move || SignalModels::train(revision, snapshot, &config))
            .await
            .map_err(|e| RecommendError::Model(format!("Signal training task failed: {}", e)))?;

        let models = Arc::new(models);
        *self.current.write().await = Some(Arc::clone(&models));
        Ok(models)
    }

    async fn fresh(&self, revision: u64) -> Option<Arc<SignalModels>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|m| m.revision == revision)
            .cloned()
    }

    /// Revision of the cached models, if any
    pub async fn trained_revision(&self) -> Option<u64> {
        self.current.read().await.as_ref().map(|m| m.revision)
    }
}
