//! Basketrec - Hybrid Product Recommendation Service
//!
//! Recommends grocery products to storefront users by blending several
//! signal sources:
//! - Collaborative filtering (user-based KNN and similar-user unions)
//! - Demographic clustering over age, weight and height
//! - Health-condition and profession tag matching
//! - Seasonal availability
//! - Co-occurrence pairings mined with Apriori
//! - TF-IDF content similarity
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Catalog documents (User, Product, Event)
//! - **Storage**: Catalog stores (SQLite, in-memory)
//! - **Models**: Statistical building blocks trained from a snapshot
//! - **Engine**: Model caching, persistence and fusion
//! - **API**: axum HTTP surface
//!
//! # Example
//!
//! ```ignore
//! use basketrec_core::{ContentModelStore, Recommender, ServiceConfig, SqliteCatalog, UserId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(ServiceConfig::load(None)?);
//!     let store = Arc::new(SqliteCatalog::open("catalog.db").await?);
//!     let content = Arc::new(ContentModelStore::open("models").await?);
//!     let recommender = Recommender::new(store, content, config);
//!
//!     recommender.retrain(false).await?;
//!     let picks = recommender.hybrid(&UserId::parse("alice")?, 12).await?;
//!     println!("{:?}", picks);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::ServiceConfig;
pub use engine::{ContentModelStore, Recommender, RetrainOutcome, SingleUserRecommendations};
pub use error::{RecommendError, Result};
pub use storage::{CatalogStore, MemoryCatalog, SqliteCatalog};
pub use types::{CatalogSnapshot, Event, EventType, ObjectId, Product, Season, User, UserId};
