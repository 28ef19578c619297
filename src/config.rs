//! Service configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `BASKETREC__SECTION__KEY` environment variables.

use crate::error::{RecommendError, Result};
use crate::types::EventType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "BASKETREC";

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "basketrec.toml";

/// Top-level service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub models: ModelConfig,
    pub events: EventWeights,
    pub fusion: FusionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// Interval between background retrain checks; zero disables them
    #[serde(with = "serde_duration")]
    pub retrain_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            retrain_interval: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite catalog path; resolved by the CLI when unset
    pub db_path: Option<String>,
    /// Maximum pooled connections
    pub pool_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            pool_size: 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory for persisted model artifacts; defaults next to the catalog
    pub artifact_dir: Option<String>,
    /// Seed shared by k-means initialisation and the KNN hold-out split
    pub seed: u64,
    pub limits: TopNConfig,
    pub knn: KnnConfig,
    pub clustering: ClusteringConfig,
    pub association: AssociationConfig,
}

/// Result sizes per signal source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopNConfig {
    pub content: usize,
    pub neighbors: usize,
    pub knn: usize,
    pub demographic: usize,
    pub health: usize,
    pub profession: usize,
    pub seasonal: usize,
    pub pairing: usize,
    pub hybrid: usize,
    /// Size of the blended list on the single-user `/recommend` route
    pub single_user_hybrid: usize,
}

impl Default for TopNConfig {
    fn default() -> Self {
        Self {
            content: 5,
            neighbors: 12,
            knn: 8,
            demographic: 5,
            health: 7,
            profession: 5,
            seasonal: 5,
            pairing: 5,
            hybrid: 12,
            single_user_hybrid: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnConfig {
    /// Maximum neighbours consulted per prediction
    pub k: usize,
    /// Fewer usable neighbours than this falls back to the global mean
    pub min_k: usize,
    pub rating_min: f64,
    pub rating_max: f64,
    /// Share of ratings held out of training for evaluation
    pub holdout_fraction: f64,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            k: 40,
            min_k: 1,
            rating_min: 0.0,
            rating_max: 10.0,
            holdout_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub clusters: usize,
    pub max_iter: usize,
    pub n_init: usize,
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            clusters: 3,
            max_iter: 300,
            n_init: 10,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    pub min_support: f64,
    pub min_lift: f64,
    pub max_len: usize,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            min_support: 0.01,
            min_lift: 1.0,
            max_len: 3,
        }
    }
}

/// Weight recorded for each tracked event type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventWeights {
    pub view: f64,
    pub search: f64,
    pub favourite: f64,
    pub add_to_cart: f64,
    pub purchase: f64,
}

impl Default for EventWeights {
    fn default() -> Self {
        Self {
            view: 1.0,
            search: 2.0,
            add_to_cart: 3.0,
            favourite: 5.0,
            purchase: 7.0,
        }
    }
}

impl EventWeights {
    pub fn weight_for(&self, event_type: EventType) -> f64 {
        match event_type {
            EventType::View => self.view,
            EventType::Search => self.search,
            EventType::Favourite => self.favourite,
            EventType::AddToCart => self.add_to_cart,
            EventType::Purchase => self.purchase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Rank offset of reciprocal-rank fusion
    pub rrf_k: f64,
    pub weights: SourceWeights,
    /// Serve popular products when every personal source comes back empty
    pub cold_start_fallback: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            weights: SourceWeights::default(),
            cold_start_fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceWeights {
    pub collaborative: f64,
    pub demographic: f64,
    pub health: f64,
    pub seasonal: f64,
    pub profession: f64,
    pub pairing: f64,
    pub content: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            collaborative: 1.0,
            demographic: 1.0,
            health: 1.0,
            seasonal: 0.5,
            profession: 1.0,
            pairing: 0.75,
            content: 1.0,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from defaults, an optional file, and the environment
    ///
    /// An explicit `path` must exist; otherwise `basketrec.toml` in the working
    /// directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                builder = builder.add_source(
                    config::File::from(PathBuf::from(DEFAULT_CONFIG_FILE)).required(false),
                );
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: ServiceConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the models cannot train with
    pub fn validate(&self) -> Result<()> {
        let knn = &self.models.knn;
        if knn.rating_min >= knn.rating_max {
            return Err(invalid("models.knn.rating_min must be below rating_max"));
        }
        if !(0.0..1.0).contains(&knn.holdout_fraction) {
            return Err(invalid("models.knn.holdout_fraction must be in [0, 1)"));
        }
        if knn.k == 0 || knn.min_k == 0 {
            return Err(invalid("models.knn.k and min_k must be at least 1"));
        }
        let association = &self.models.association;
        if association.min_support <= 0.0 || association.min_support > 1.0 {
            return Err(invalid("models.association.min_support must be in (0, 1]"));
        }
        if association.max_len < 2 {
            return Err(invalid("models.association.max_len must be at least 2"));
        }
        let clustering = &self.models.clustering;
        if clustering.clusters == 0 || clustering.n_init == 0 || clustering.max_iter == 0 {
            return Err(invalid(
                "models.clustering clusters, n_init and max_iter must be at least 1",
            ));
        }
        if self.fusion.rrf_k < 0.0 {
            return Err(invalid("fusion.rrf_k must not be negative"));
        }
        for event_type in EventType::ALL {
            if self.events.weight_for(event_type) <= 0.0 {
                return Err(invalid(&format!(
                    "events.{} weight must be positive",
                    event_type
                )));
            }
        }
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RecommendError::Other(e.to_string()))
    }
}

fn invalid(message: &str) -> RecommendError {
    RecommendError::Config(config::ConfigError::Message(message.to_string()))
}

// Custom serde module for Duration (serialize/deserialize as seconds)
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
