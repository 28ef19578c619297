//! Recommendation orchestration
//!
//! Gathers each signal source for a user and blends them with weighted
//! reciprocal-rank fusion. Two entry points exist: the full hybrid blend used
//! by `/get_recommendations`, and the single-user content + neighbour blend
//! behind `/recommend`.

use crate::config::ServiceConfig;
use crate::engine::content_store::{ContentModelStore, RetrainOutcome};
use crate::engine::fusion::{FusedItem, RankedSource, RrfFusion};
use crate::engine::signals::{SignalCache, SignalModels};
use crate::error::Result;
use crate::models::{attributes, neighbors};
use crate::storage::CatalogStore;
use crate::types::{ObjectId, Product, User, UserId};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Response of the single-user route
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SingleUserRecommendations {
    /// The user never interacted with anything
    NoInteractions {
        message: String,
        recommendations: Vec<ObjectId>,
    },
    Found {
        user_id: String,
        content_based: Vec<ObjectId>,
        collaborative: Vec<ObjectId>,
        hybrid: Vec<ObjectId>,
    },
}

/// Per-source lists behind one hybrid recommendation, for inspection
#[derive(Debug, Clone, Serialize)]
pub struct HybridBreakdown {
    pub sources: Vec<RankedSource>,
    pub fused: Vec<FusedItem>,
    pub cold_start: bool,
}

pub struct Recommender {
    store: Arc<dyn CatalogStore>,
    config: Arc<ServiceConfig>,
    signals: SignalCache,
    content: Arc<ContentModelStore>,
    fusion: RrfFusion,
}

impl Recommender {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        content: Arc<ContentModelStore>,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            signals: SignalCache::new(config.models.clone()),
            fusion: RrfFusion::new(config.fusion.rrf_k),
            store,
            config,
            content,
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn content(&self) -> &Arc<ContentModelStore> {
        &self.content
    }

    /// Signal models for the current catalog revision
    pub async fn signals(&self) -> Result<Arc<SignalModels>> {
        self.signals.get(self.store.as_ref()).await
    }

    /// Gated content-model rebuild
    pub async fn retrain(&self, force: bool) -> Result<RetrainOutcome> {
        let outcome = self.content.retrain_if_changed(self.store.as_ref(), force).await?;
        if outcome.retrained {
            info!("Content model retrained ({} products)", outcome.products);
        }
        Ok(outcome)
    }

    /// Hybrid product ids for a user, best first
    pub async fn hybrid(&self, user: &UserId, n: usize) -> Result<Vec<ObjectId>> {
        let breakdown = self.hybrid_breakdown(user, n, Utc::now().month()).await?;
        Ok(breakdown
            .fused
            .into_iter()
            .take(n)
            .map(|item| item.product_id)
            .collect())
    }

    /// Hybrid recommendations as full product documents
    pub async fn hybrid_products(&self, user: &UserId, n: usize) -> Result<Vec<Product>> {
        let ids = self.hybrid(user, n).await?;
        self.product_details(&ids).await
    }

    /// Every source list and the fused ranking for `month`
    ///
    /// When no personal source produced anything and the cold-start fallback
    /// is enabled, the catalog popularity ranking joins as an extra source.
    pub async fn hybrid_breakdown(
        &self,
        user: &UserId,
        n: usize,
        month: u32,
    ) -> Result<HybridBreakdown> {
        let models = self.signals().await?;
        let limits = &self.config.models.limits;
        let weights = &self.config.fusion.weights;
        let products = &models.snapshot.products;
        let profile: Option<&User> = models.snapshot.user(user);

        let pairings = match models.favourite_product(user) {
            Some(seed) => models.rules.pairings(&seed, limits.pairing),
            None => Vec::new(),
        };

        let mut sources = vec![
            RankedSource::new(
                "collaborative",
                weights.collaborative,
                models.knn.recommend(user, limits.knn),
            ),
            RankedSource::new(
                "demographic",
                weights.demographic,
                models.clusters.cluster_popular(user, limits.demographic),
            ),
            RankedSource::new(
                "health",
                weights.health,
                profile.map_or_else(Vec::new, |u| {
                    attributes::health_matches(u, products, limits.health)
                }),
            ),
            RankedSource::new(
                "profession",
                weights.profession,
                profile.map_or_else(Vec::new, |u| {
                    attributes::profession_matches(u, products, limits.profession)
                }),
            ),
            RankedSource::new("pairing", weights.pairing, pairings),
        ];

        let cold_start =
            self.config.fusion.cold_start_fallback && sources.iter().all(RankedSource::is_empty);
        if cold_start {
            debug!("No personal signals for {}, falling back to popularity", user);
            sources.push(RankedSource::new(
                "popular",
                1.0,
                models.popular.iter().take(n).cloned().collect(),
            ));
        }

        sources.push(RankedSource::new(
            "seasonal",
            weights.seasonal,
            attributes::seasonal(products, month, limits.seasonal),
        ));

        let fused = self.fusion.fuse(&sources);
        debug!(
            "Hybrid for {}: {} candidates from {} sources",
            user,
            fused.len(),
            sources.iter().filter(|s| !s.is_empty()).count()
        );

        Ok(HybridBreakdown {
            sources,
            fused,
            cold_start,
        })
    }

    /// Content and neighbour recommendations for the `/recommend` route
    pub async fn single_user(&self, user: &ObjectId) -> Result<SingleUserRecommendations> {
        let user_id = UserId::from(user);
        let events = self.store.events_for_user(&user_id).await?;
        let Some(first) = events.first() else {
            return Ok(SingleUserRecommendations::NoInteractions {
                message: format!("No interactions found for user {}", user),
                recommendations: Vec::new(),
            });
        };

        let limits = &self.config.models.limits;
        let content = self.content.current().await;
        let models = self.signals().await?;

        let content_based = content.similar_products(&first.product_id, limits.content);
        let collaborative =
            neighbors::similar_user_products(&models.matrix, &user_id, limits.neighbors);

        let blend_n = limits.single_user_hybrid;
        let weights = &self.config.fusion.weights;
        let hybrid = self.fusion.fuse_ids(
            &[
                RankedSource::new(
                    "content",
                    weights.content,
                    content.similar_products(&first.product_id, blend_n),
                ),
                RankedSource::new(
                    "collaborative",
                    weights.collaborative,
                    neighbors::similar_user_products(&models.matrix, &user_id, blend_n),
                ),
            ],
            blend_n,
        );

        Ok(SingleUserRecommendations::Found {
            user_id: user.to_string(),
            content_based,
            collaborative,
            hybrid,
        })
    }

    /// Catalog products by total event weight
    pub async fn popular(&self, n: usize) -> Result<Vec<Product>> {
        let models = self.signals().await?;
        let ids: Vec<ObjectId> = models.popular.iter().take(n).cloned().collect();
        self.product_details(&ids).await
    }

    /// Products frequently bought alongside `product`
    pub async fn pairings(&self, product: &ObjectId, n: usize) -> Result<Vec<ObjectId>> {
        let models = self.signals().await?;
        Ok(models.rules.pairings(product, n))
    }

    /// Products with similar text to `product`
    pub async fn similar(&self, product: &ObjectId, n: usize) -> Result<Vec<ObjectId>> {
        Ok(self.content.current().await.similar_products(product, n))
    }

    /// Products in the given order, unknown ids skipped
    pub async fn product_details(&self, ids: &[ObjectId]) -> Result<Vec<Product>> {
        self.store.get_products(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCatalog;
    use crate::types::{CatalogSnapshot, Event, EventType};
    use tempfile::TempDir;

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    async fn recommender(snapshot: CatalogSnapshot, config: ServiceConfig) -> (Recommender, TempDir) {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalog::from_snapshot(snapshot));
        let content = Arc::new(ContentModelStore::open(dir.path()).await.unwrap());
        let rec = Recommender::new(store, content, Arc::new(config));
        rec.retrain(false).await.unwrap();
        (rec, dir)
    }

    fn product(n: u8, title: &str) -> Product {
        Product::new(oid(n), title)
    }

    #[tokio::test]
    async fn test_cold_start_falls_back_to_popular() {
        let snapshot = CatalogSnapshot {
            products: vec![product(1, "Tea"), product(2, "Coffee")],
            events: vec![Event::new(uid("other"), oid(2), EventType::Purchase, 7.0)],
            ..Default::default()
        };
        let (rec, _dir) = recommender(snapshot, ServiceConfig::default()).await;

        let breakdown = rec.hybrid_breakdown(&uid("newcomer"), 12, 1).await.unwrap();
        assert!(breakdown.cold_start);
        assert_eq!(rec.hybrid(&uid("newcomer"), 12).await.unwrap()[0], oid(2));

        let mut config = ServiceConfig::default();
        config.fusion.cold_start_fallback = false;
        let snapshot = CatalogSnapshot {
            products: vec![product(1, "Tea")],
            ..Default::default()
        };
        let (rec, _dir) = recommender(snapshot, config).await;
        assert!(rec.hybrid_breakdown(&uid("newcomer"), 12, 1).await.unwrap().fused.is_empty());
    }

    #[tokio::test]
    async fn test_health_and_profession_signals_reach_the_blend() {
        let mut alice = User::new(uid("alice"));
        alice.medical_conditions = vec!["anemia".into()];
        alice.occupation = vec!["athlete".into()];

        let mut spinach = product(1, "Spinach");
        spinach.health_conditions = vec!["anemia".into()];
        let mut whey = product(2, "Whey Protein");
        whey.occupation_tags = vec!["athlete".into()];

        let snapshot = CatalogSnapshot {
            users: vec![alice],
            products: vec![spinach, whey, product(3, "Candy")],
            events: Vec::new(),
        };
        let (rec, _dir) = recommender(snapshot, ServiceConfig::default()).await;

        let breakdown = rec.hybrid_breakdown(&uid("alice"), 12, 1).await.unwrap();
        assert!(!breakdown.cold_start);
        let ids: Vec<_> = breakdown.fused.iter().map(|f| f.product_id.clone()).collect();
        assert_eq!(ids, vec![oid(1), oid(2)]);
    }

    #[tokio::test]
    async fn test_single_user_without_events() {
        let snapshot = CatalogSnapshot {
            products: vec![product(1, "Tea")],
            ..Default::default()
        };
        let (rec, _dir) = recommender(snapshot, ServiceConfig::default()).await;

        let user = ObjectId::parse("aaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        match rec.single_user(&user).await.unwrap() {
            SingleUserRecommendations::NoInteractions { message, recommendations } => {
                assert!(message.contains("aaaaaaaaaaaaaaaaaaaaaaaa"));
                assert!(recommendations.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_user_blends_content_and_neighbours() {
        let me = "aaaaaaaaaaaaaaaaaaaaaaaa";
        let twin = "bbbbbbbbbbbbbbbbbbbbbbbb";
        let snapshot = CatalogSnapshot {
            products: vec![
                product(1, "Green Tea"),
                product(2, "Black Tea"),
                product(3, "Honey"),
            ],
            events: vec![
                Event::new(uid(me), oid(1), EventType::View, 1.0),
                Event::new(uid(twin), oid(1), EventType::View, 1.0),
                Event::new(uid(twin), oid(3), EventType::Purchase, 7.0),
            ],
            ..Default::default()
        };
        let (rec, _dir) = recommender(snapshot, ServiceConfig::default()).await;

        let result = rec.single_user(&ObjectId::parse(me).unwrap()).await.unwrap();
        let SingleUserRecommendations::Found {
            content_based,
            collaborative,
            hybrid,
            ..
        } = result
        else {
            panic!("expected recommendations");
        };
        assert_eq!(content_based[0], oid(2));
        assert_eq!(collaborative, vec![oid(1), oid(3)]);
        assert!(hybrid.contains(&oid(2)) && hybrid.contains(&oid(3)));
        assert!(hybrid.len() <= 10);
    }
}
