//! Recommendation engine
//!
//! Ties the statistical models to the catalog store:
//! - **signals**: revision-keyed cache of the cheap models
//! - **content_store**: persisted TF-IDF model behind a product-set gate
//! - **fusion**: weighted reciprocal-rank fusion of ranked lists
//! - **recommender**: the hybrid and single-user entry points

pub mod content_store;
pub mod fusion;
pub mod recommender;
pub mod signals;

pub use content_store::{ArtifactStatus, ContentModelStore, RetrainOutcome, CONTENT_ARTIFACT};
pub use fusion::{FusedItem, RankedSource, RrfFusion};
pub use recommender::{HybridBreakdown, Recommender, SingleUserRecommendations};
pub use signals::{SignalCache, SignalModels};
