//! Statistical building blocks behind each signal source
//!
//! Every model here trains from an in-memory catalog snapshot and answers
//! with product ids in rank order:
//! - **interactions**: user × product weight matrix and user cosine similarity
//! - **neighbors**: products of the most similar users
//! - **knn**: user-based k-nearest-neighbour rating prediction
//! - **tfidf** / **content**: text similarity between products
//! - **clustering**: k-means over demographics, popular products per cluster
//! - **association**: Apriori co-occurrence rules
//! - **attributes**: health, profession and seasonal tag matching
//! - **popularity**: catalog-wide event weight ranking

pub mod association;
pub mod attributes;
pub mod clustering;
pub mod content;
pub mod interactions;
pub mod knn;
pub mod neighbors;
pub mod popularity;
pub mod tfidf;

pub use association::AssociationRules;
pub use clustering::{DemographicClusters, KMeans};
pub use content::ContentModel;
pub use interactions::InteractionMatrix;
pub use knn::{KnnAccuracy, KnnModel};
pub use tfidf::TfidfVectorizer;
