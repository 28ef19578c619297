//! Shared state handed to every handler

use crate::config::ServiceConfig;
use crate::engine::Recommender;
use crate::storage::CatalogStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    /// Short id distinguishing server instances in logs and `/health`
    pub instance_id: String,
}

impl AppState {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self {
            recommender,
            instance_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        self.recommender.store()
    }

    pub fn config(&self) -> &ServiceConfig {
        self.recommender.config()
    }
}
