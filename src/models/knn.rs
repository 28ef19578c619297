//! User-based k-nearest-neighbour collaborative filtering
//!
//! Ratings are the summed event weights per (user, product), clipped to the
//! configured scale. A seeded share of ratings is held out of training and
//! used for accuracy reporting.
//!
//! # Prediction
//!
//! For user `u` and product `i`, the `k` users most similar to `u` among
//! those who rated `i` are taken; those with positive similarity vote:
//!
//! ```text
//! est(u, i) = Σ sim(u, v) · r(v, i) / Σ sim(u, v)
//! ```
//!
//! Similarity is cosine over co-rated products only. When fewer than `min_k`
//! neighbours vote, or the user or product never appeared in training, the
//! estimate falls back to the training mean.

use crate::config::KnnConfig;
use crate::models::InteractionMatrix;
use crate::types::{ObjectId, UserId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Hold-out accuracy of a trained model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KnnAccuracy {
    pub rmse: f64,
    pub mae: f64,
    pub samples: usize,
}

/// Prediction with a flag for the mean fallback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub impossible: bool,
}

#[derive(Debug, Clone)]
pub struct KnnModel {
    config: KnnConfig,
    matrix: InteractionMatrix,
    /// Training ratings per product index: (user index, rating)
    item_ratings: HashMap<usize, Vec<(usize, f64)>>,
    /// Users that kept at least one rating in training
    trained_users: Vec<bool>,
    /// Similarity of user pairs that share a training product, keyed `(low, high)`
    similarity: HashMap<(usize, usize), f64>,
    global_mean: f64,
    holdout: Vec<(usize, usize, f64)>,
}

impl KnnModel {
    pub fn train(matrix: &InteractionMatrix, config: &KnnConfig, seed: u64) -> Self {
        let n_users = matrix.users().len();

        let mut ratings: Vec<(usize, usize, f64)> = (0..n_users)
            .flat_map(|u| {
                matrix
                    .row(u)
                    .iter()
                    .map(move |(&p, &w)| (u, p, w))
                    .collect::<Vec<_>>()
            })
            .map(|(u, p, w)| (u, p, w.clamp(config.rating_min, config.rating_max)))
            .collect();

        let mut rng = StdRng::seed_from_u64(seed);
        ratings.shuffle(&mut rng);

        let mut n_holdout = (config.holdout_fraction * ratings.len() as f64).ceil() as usize;
        if n_holdout >= ratings.len() {
            n_holdout = ratings.len().saturating_sub(1);
        }
        let holdout = ratings.split_off(ratings.len() - n_holdout);
        let train = ratings;

        let mut item_ratings: HashMap<usize, Vec<(usize, f64)>> = HashMap::new();
        let mut trained_users = vec![false; n_users];
        for &(u, p, r) in &train {
            item_ratings.entry(p).or_default().push((u, r));
            trained_users[u] = true;
        }
        for raters in item_ratings.values_mut() {
            raters.sort_by_key(|&(u, _)| u);
        }

        let global_mean = if train.is_empty() {
            (config.rating_min + config.rating_max) / 2.0
        } else {
            train.iter().map(|&(_, _, r)| r).sum::<f64>() / train.len() as f64
        };

        let similarity = co_rated_cosine(&item_ratings);

        debug!(
            "Trained KNN model: {} users, {} training ratings, {} held out",
            n_users,
            train.len(),
            holdout.len()
        );

        Self {
            config: config.clone(),
            matrix: matrix.clone(),
            item_ratings,
            trained_users,
            similarity,
            global_mean,
            holdout,
        }
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    fn sim(&self, a: usize, b: usize) -> f64 {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.similarity.get(&key).copied().unwrap_or(0.0)
    }

    /// Estimate the rating of product index `item` for user index `user`
    pub fn estimate(&self, user: usize, item: usize) -> Estimate {
        let fallback = Estimate {
            value: self.global_mean,
            impossible: true,
        };
        if !self.trained_users.get(user).copied().unwrap_or(false) {
            return fallback;
        }
        let Some(raters) = self.item_ratings.get(&item) else {
            return fallback;
        };

        let mut neighbours: Vec<(f64, f64)> = raters
            .iter()
            .map(|&(v, r)| (self.sim(user, v), r))
            .collect();
        neighbours.sort_by(|a, b| b.0.total_cmp(&a.0));
        neighbours.truncate(self.config.k);

        let mut sum_sim = 0.0;
        let mut sum_ratings = 0.0;
        let mut actual_k = 0;
        for (sim, rating) in neighbours {
            if sim > 0.0 {
                sum_sim += sim;
                sum_ratings += sim * rating;
                actual_k += 1;
            }
        }

        if actual_k < self.config.min_k || sum_sim == 0.0 {
            return fallback;
        }

        Estimate {
            value: (sum_ratings / sum_sim).clamp(self.config.rating_min, self.config.rating_max),
            impossible: false,
        }
    }

    /// Rank products the user has not interacted with by estimated rating
    pub fn recommend(&self, user: &UserId, n: usize) -> Vec<ObjectId> {
        let Some(u) = self.matrix.user_index(user) else {
            return Vec::new();
        };

        let mut scored: Vec<(usize, f64)> = (0..self.matrix.products().len())
            .filter(|&p| self.matrix.weight(u, p) == 0.0)
            .map(|p| (p, self.estimate(u, p).value))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(n)
            .map(|(p, _)| self.matrix.product_at(p).clone())
            .collect()
    }

    /// RMSE and MAE over the held-out ratings
    pub fn evaluate(&self) -> Option<KnnAccuracy> {
        if self.holdout.is_empty() {
            return None;
        }
        let mut squared = 0.0;
        let mut absolute = 0.0;
        for &(u, p, r) in &self.holdout {
            let err = self.estimate(u, p).value - r;
            squared += err * err;
            absolute += err.abs();
        }
        let n = self.holdout.len() as f64;
        Some(KnnAccuracy {
            rmse: (squared / n).sqrt(),
            mae: absolute / n,
            samples: self.holdout.len(),
        })
    }
}

/// Cosine similarity restricted to co-rated products
///
/// Only pairs that share a product get an entry; absent pairs score 0.
fn co_rated_cosine(item_ratings: &HashMap<usize, Vec<(usize, f64)>>) -> HashMap<(usize, usize), f64> {
    // (Σ ra·rb, Σ ra², Σ rb²) per pair
    let mut sums: HashMap<(usize, usize), (f64, f64, f64)> = HashMap::new();

    for raters in item_ratings.values() {
        // Raters are sorted by user index, so `a <= b` below
        for (i, &(a, ra)) in raters.iter().enumerate() {
            for &(b, rb) in &raters[i..] {
                let entry = sums.entry((a, b)).or_insert((0.0, 0.0, 0.0));
                entry.0 += ra * rb;
                entry.1 += ra * ra;
                entry.2 += rb * rb;
            }
        }
    }

    sums.into_iter()
        .map(|(pair, (p, x, y))| {
            let denom = (x * y).sqrt();
            let sim = if denom == 0.0 { 0.0 } else { p / denom };
            (pair, sim)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Event, EventType};
    use proptest::prelude::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    fn event(user: &str, product: u8, weight: f64) -> Event {
        Event::new(UserId::parse(user).unwrap(), oid(product), EventType::View, weight)
    }

    fn no_holdout() -> KnnConfig {
        KnnConfig {
            holdout_fraction: 0.0,
            ..KnnConfig::default()
        }
    }

    #[test]
    fn test_recommends_what_similar_users_rated_highly() {
        let events = vec![
            event("alice", 1, 7.0),
            event("alice", 2, 5.0),
            event("bob", 1, 7.0),
            event("bob", 2, 5.0),
            event("bob", 3, 9.0),
            event("carol", 1, 1.0),
            event("carol", 4, 2.0),
        ];
        let matrix = InteractionMatrix::from_events(&events);
        let model = KnnModel::train(&matrix, &no_holdout(), 7);

        let recs = model.recommend(&UserId::parse("alice").unwrap(), 2);
        assert_eq!(recs, vec![oid(3), oid(4)]);
    }

    #[test]
    fn test_ratings_are_clipped_to_scale() {
        let events = vec![
            event("alice", 1, 7.0),
            event("alice", 1, 7.0),
            event("bob", 1, 3.0),
            event("bob", 2, 30.0),
        ];
        let matrix = InteractionMatrix::from_events(&events);
        let model = KnnModel::train(&matrix, &no_holdout(), 7);

        let alice = matrix.user_index(&UserId::parse("alice").unwrap()).unwrap();
        let item = matrix.product_index(&oid(2)).unwrap();
        let estimate = model.estimate(alice, item);
        assert!(!estimate.impossible);
        assert_eq!(estimate.value, 10.0);
    }

    #[test]
    fn test_unknown_item_falls_back_to_mean() {
        let events = vec![event("alice", 1, 4.0), event("bob", 2, 6.0)];
        let matrix = InteractionMatrix::from_events(&events);
        let model = KnnModel::train(&matrix, &no_holdout(), 7);

        // No co-rated products, so no positive neighbour similarity
        let alice = matrix.user_index(&UserId::parse("alice").unwrap()).unwrap();
        let estimate = model.estimate(alice, 1);
        assert!(estimate.impossible);
        assert_eq!(estimate.value, 5.0);
        assert!(model.recommend(&UserId::parse("nobody").unwrap(), 5).is_empty());
    }

    #[test]
    fn test_similarity_uses_co_rated_products_only() {
        let events = vec![
            event("alice", 1, 2.0),
            event("alice", 2, 8.0),
            event("bob", 1, 4.0),
            event("bob", 3, 9.0),
            event("carol", 4, 5.0),
        ];
        let matrix = InteractionMatrix::from_events(&events);
        let model = KnnModel::train(&matrix, &no_holdout(), 7);

        let index = |name: &str| matrix.user_index(&UserId::parse(name).unwrap()).unwrap();
        let (alice, bob, carol) = (index("alice"), index("bob"), index("carol"));

        // Only product 1 is shared, and the two ratings point the same way
        assert!((model.sim(alice, bob) - 1.0).abs() < 1e-12);
        assert_eq!(model.sim(alice, bob), model.sim(bob, alice));
        assert_eq!(model.sim(alice, carol), 0.0);
        assert!(!model.similarity.contains_key(&(alice.min(carol), alice.max(carol))));
    }

    #[test]
    fn test_holdout_split_is_seeded() {
        let events: Vec<Event> = (0..20u8)
            .map(|i| event(if i % 2 == 0 { "a" } else { "b" }, i, 1.0 + (i % 5) as f64))
            .collect();
        let matrix = InteractionMatrix::from_events(&events);
        let config = KnnConfig::default();

        let first = KnnModel::train(&matrix, &config, 11);
        let second = KnnModel::train(&matrix, &config, 11);
        assert_eq!(first.holdout, second.holdout);
        assert_eq!(first.holdout.len(), 4);
        assert_eq!(first.evaluate().unwrap().samples, 4);
    }

    proptest! {
        #[test]
        fn prop_estimates_stay_on_scale(weights in proptest::collection::vec(0.5f64..40.0, 2..30)) {
            let events: Vec<Event> = weights
                .iter()
                .enumerate()
                .map(|(i, &w)| event(&format!("u{}", i % 4), (i % 6) as u8, w))
                .collect();
            let matrix = InteractionMatrix::from_events(&events);
            let config = KnnConfig::default();
            let model = KnnModel::train(&matrix, &config, 3);

            for u in 0..matrix.users().len() {
                for p in 0..matrix.products().len() {
                    let est = model.estimate(u, p).value;
                    prop_assert!(est >= config.rating_min && est <= config.rating_max);
                }
            }
        }
    }
}
