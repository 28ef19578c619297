//! Demographic clustering
//!
//! Users are clustered with k-means over (age, weight, height). Missing
//! values take the column mean so sparse profiles still land somewhere
//! sensible. Each cluster recommends the products its members weighted most.

use crate::config::ClusteringConfig;
use crate::types::{Event, ObjectId, User, UserId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Fitted k-means model
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub centroids: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeans {
    /// Run k-means with k-means++ seeding, keeping the best of `n_init` restarts
    ///
    /// `k` is clamped to the number of points. An empty input yields an empty model.
    pub fn fit(points: &[Vec<f64>], config: &ClusteringConfig, seed: u64) -> Self {
        if points.is_empty() {
            return Self {
                centroids: Vec::new(),
                labels: Vec::new(),
                inertia: 0.0,
                iterations: 0,
            };
        }

        let k = config.clusters.clamp(1, points.len());
        let mut rng = StdRng::seed_from_u64(seed);

        let mut best: Option<KMeans> = None;
        for _ in 0..config.n_init.max(1) {
            let centroids = plus_plus_init(points, k, &mut rng);
            let run = lloyd(points, centroids, config.max_iter, config.tolerance);
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        // n_init >= 1 guarantees at least one run
        best.unwrap_or_else(|| lloyd(points, points[..k].to_vec(), 1, 0.0))
    }

    /// Index of the nearest centroid
    pub fn predict(&self, point: &[f64]) -> Option<usize> {
        nearest(&self.centroids, point).map(|(i, _)| i)
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(centroids: &[Vec<f64>], point: &[f64]) -> Option<(usize, f64)> {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(c, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

fn plus_plus_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())].clone());

    while centroids.len() < k {
        let distances: Vec<f64> = points
            .iter()
            .map(|p| nearest(&centroids, p).map_or(0.0, |(_, d)| d))
            .collect();
        let total: f64 = distances.iter().sum();

        let next = if total == 0.0 {
            // Every point already coincides with a centroid
            rng.gen_range(0..points.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, d) in distances.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        };
        centroids.push(points[next].clone());
    }
    centroids
}

fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, max_iter: usize, tolerance: f64) -> KMeans {
    let dims = points[0].len();
    let mut labels = vec![0; points.len()];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;
        for (label, point) in labels.iter_mut().zip(points) {
            *label = nearest(&centroids, point).map_or(0, |(i, _)| i);
        }

        let mut sums = vec![vec![0.0; dims]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (&label, point) in labels.iter().zip(points) {
            counts[label] += 1;
            for (s, v) in sums[label].iter_mut().zip(point) {
                *s += v;
            }
        }

        let mut shift = 0.0;
        for (c, (sum, count)) in centroids.iter_mut().zip(sums.into_iter().zip(counts)) {
            // Empty clusters keep their previous centroid
            if count == 0 {
                continue;
            }
            let updated: Vec<f64> = sum.into_iter().map(|s| s / count as f64).collect();
            shift += squared_distance(c, &updated);
            *c = updated;
        }

        if shift <= tolerance {
            break;
        }
    }

    for (label, point) in labels.iter_mut().zip(points) {
        *label = nearest(&centroids, point).map_or(0, |(i, _)| i);
    }
    let inertia = labels
        .iter()
        .zip(points)
        .map(|(&l, p)| squared_distance(&centroids[l], p))
        .sum();

    KMeans {
        centroids,
        labels,
        inertia,
        iterations,
    }
}

/// Demographic feature rows with missing values replaced by column means
pub fn demographic_features(users: &[User]) -> Vec<Vec<f64>> {
    let rows: Vec<[Option<f64>; 3]> = users.iter().map(User::demographics).collect();

    let mut means = [0.0; 3];
    for (col, mean) in means.iter_mut().enumerate() {
        let present: Vec<f64> = rows.iter().filter_map(|r| r[col]).collect();
        if !present.is_empty() {
            *mean = present.iter().sum::<f64>() / present.len() as f64;
        }
    }

    rows.iter()
        .map(|r| (0..3).map(|col| r[col].unwrap_or(means[col])).collect())
        .collect()
}

/// Users grouped by demographics, with per-cluster product popularity
#[derive(Debug, Clone, Default)]
pub struct DemographicClusters {
    assignments: HashMap<UserId, usize>,
    /// Per cluster: products by summed weight, descending, ties by id
    popular: Vec<Vec<ObjectId>>,
}

impl DemographicClusters {
    pub fn train(users: &[User], events: &[Event], config: &ClusteringConfig, seed: u64) -> Self {
        let features = demographic_features(users);
        let kmeans = KMeans::fit(&features, config, seed);

        let assignments: HashMap<UserId, usize> = users
            .iter()
            .zip(&kmeans.labels)
            .map(|(u, &label)| (u.id.clone(), label))
            .collect();

        let mut totals: Vec<HashMap<&ObjectId, f64>> = vec![HashMap::new(); kmeans.centroids.len()];
        for event in events {
            if let Some(&cluster) = assignments.get(&event.user_id) {
                *totals[cluster].entry(&event.product_id).or_insert(0.0) += event.weight;
            }
        }

        let popular = totals
            .into_iter()
            .map(|weights| {
                let mut ranked: Vec<(&ObjectId, f64)> = weights.into_iter().collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                ranked.into_iter().map(|(id, _)| id.clone()).collect()
            })
            .collect();

        debug!(
            "Clustered {} users into {} groups (inertia {:.3})",
            users.len(),
            kmeans.centroids.len(),
            kmeans.inertia
        );

        Self {
            assignments,
            popular,
        }
    }

    pub fn cluster_of(&self, user: &UserId) -> Option<usize> {
        self.assignments.get(user).copied()
    }

    pub fn cluster_count(&self) -> usize {
        self.popular.len()
    }

    /// Members of a cluster
    pub fn members(&self, cluster: usize) -> HashSet<&UserId> {
        self.assignments
            .iter()
            .filter(|(_, &c)| c == cluster)
            .map(|(u, _)| u)
            .collect()
    }

    /// Most weighted products among users sharing `user`'s cluster
    pub fn cluster_popular(&self, user: &UserId, n: usize) -> Vec<ObjectId> {
        match self.cluster_of(user) {
            Some(cluster) => self.popular[cluster].iter().take(n).cloned().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventType;
    use proptest::prelude::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    fn user(id: &str, age: Option<f64>, weight: Option<f64>, height: Option<f64>) -> User {
        let mut u = User::new(UserId::parse(id).unwrap());
        u.age = age;
        u.weight = weight;
        u.height = height;
        u
    }

    #[test]
    fn test_missing_values_take_column_mean() {
        let users = vec![
            user("a", Some(20.0), None, Some(170.0)),
            user("b", Some(40.0), None, None),
        ];
        let features = demographic_features(&users);
        assert_eq!(features[0], vec![20.0, 0.0, 170.0]);
        assert_eq!(features[1], vec![40.0, 0.0, 170.0]);
    }

    #[test]
    fn test_kmeans_separates_obvious_groups() {
        let points = vec![
            vec![1.0, 1.0],
            vec![1.2, 0.8],
            vec![10.0, 10.0],
            vec![10.5, 9.5],
        ];
        let config = ClusteringConfig {
            clusters: 2,
            ..ClusteringConfig::default()
        };
        let model = KMeans::fit(&points, &config, 42);

        assert_eq!(model.labels[0], model.labels[1]);
        assert_eq!(model.labels[2], model.labels[3]);
        assert_ne!(model.labels[0], model.labels[2]);
        assert_eq!(model.predict(&[9.0, 9.0]), Some(model.labels[2]));
    }

    #[test]
    fn test_k_is_clamped_to_point_count() {
        let config = ClusteringConfig {
            clusters: 5,
            ..ClusteringConfig::default()
        };
        let model = KMeans::fit(&[vec![1.0], vec![2.0]], &config, 1);
        assert_eq!(model.centroids.len(), 2);
        assert_eq!(model.inertia, 0.0);

        assert!(KMeans::fit(&[], &config, 1).labels.is_empty());
    }

    #[test]
    fn test_cluster_popular_products() {
        let users = vec![
            user("young1", Some(20.0), Some(60.0), Some(170.0)),
            user("young2", Some(22.0), Some(62.0), Some(172.0)),
            user("old1", Some(70.0), Some(90.0), Some(160.0)),
        ];
        let uid = |s: &str| UserId::parse(s).unwrap();
        let events = vec![
            Event::new(uid("young1"), oid(1), EventType::View, 1.0),
            Event::new(uid("young2"), oid(2), EventType::Purchase, 7.0),
            Event::new(uid("young2"), oid(1), EventType::View, 1.0),
            Event::new(uid("old1"), oid(3), EventType::Purchase, 7.0),
        ];
        let config = ClusteringConfig {
            clusters: 2,
            ..ClusteringConfig::default()
        };
        let clusters = DemographicClusters::train(&users, &events, &config, 7);

        assert_eq!(clusters.cluster_popular(&uid("young1"), 5), vec![oid(2), oid(1)]);
        assert_eq!(clusters.cluster_popular(&uid("old1"), 5), vec![oid(3)]);
        assert!(clusters.cluster_popular(&uid("ghost"), 5).is_empty());
        assert_eq!(clusters.members(clusters.cluster_of(&uid("young1")).unwrap()).len(), 2);
    }

    proptest! {
        #[test]
        fn prop_every_point_gets_its_nearest_centroid(
            raw in proptest::collection::vec((0.0f64..100.0, 0.0f64..100.0), 1..40),
            k in 1usize..6,
        ) {
            let points: Vec<Vec<f64>> = raw.into_iter().map(|(a, b)| vec![a, b]).collect();
            let config = ClusteringConfig { clusters: k, n_init: 2, ..ClusteringConfig::default() };
            let model = KMeans::fit(&points, &config, 9);

            prop_assert_eq!(model.labels.len(), points.len());
            for (point, &label) in points.iter().zip(&model.labels) {
                prop_assert_eq!(model.predict(point), Some(label));
            }
        }
    }
}
