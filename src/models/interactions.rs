//! User × product interaction matrix
//!
//! Cells hold the summed weight of every event a user recorded against a
//! product. Users and products are indexed in sorted id order so iteration
//! is deterministic.

use crate::types::{Event, ObjectId, UserId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct InteractionMatrix {
    users: Vec<UserId>,
    products: Vec<ObjectId>,
    user_index: HashMap<UserId, usize>,
    product_index: HashMap<ObjectId, usize>,
    /// Per user: product index -> summed weight
    rows: Vec<BTreeMap<usize, f64>>,
    norms: Vec<f64>,
}

impl InteractionMatrix {
    pub fn from_events(events: &[Event]) -> Self {
        let users: Vec<UserId> = events
            .iter()
            .map(|e| e.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let products: Vec<ObjectId> = events
            .iter()
            .map(|e| e.product_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let user_index: HashMap<UserId, usize> = users
            .iter()
            .enumerate()
            .map(|(i, u)| (u.clone(), i))
            .collect();
        let product_index: HashMap<ObjectId, usize> = products
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();

        let mut rows = vec![BTreeMap::new(); users.len()];
        for event in events {
            let u = user_index[&event.user_id];
            let p = product_index[&event.product_id];
            *rows[u].entry(p).or_insert(0.0) += event.weight;
        }

        let norms = rows
            .iter()
            .map(|row| row.values().map(|w| w * w).sum::<f64>().sqrt())
            .collect();

        Self {
            users,
            products,
            user_index,
            product_index,
            rows,
            norms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    pub fn products(&self) -> &[ObjectId] {
        &self.products
    }

    pub fn user_index(&self, user: &UserId) -> Option<usize> {
        self.user_index.get(user).copied()
    }

    pub fn product_index(&self, product: &ObjectId) -> Option<usize> {
        self.product_index.get(product).copied()
    }

    pub fn product_at(&self, index: usize) -> &ObjectId {
        &self.products[index]
    }

    /// Non-zero cells of a user row, by product index
    pub fn row(&self, user: usize) -> &BTreeMap<usize, f64> {
        &self.rows[user]
    }

    /// Summed weight for one cell
    pub fn weight(&self, user: usize, product: usize) -> f64 {
        self.rows[user].get(&product).copied().unwrap_or(0.0)
    }

    /// Products a user interacted with, in product id order
    pub fn interacted(&self, user: usize) -> impl Iterator<Item = &ObjectId> + '_ {
        self.rows[user].keys().map(move |&p| &self.products[p])
    }

    /// Cosine similarity of two full user rows (zero when either row is empty)
    pub fn cosine(&self, a: usize, b: usize) -> f64 {
        let denom = self.norms[a] * self.norms[b];
        if denom == 0.0 {
            return 0.0;
        }
        let (small, large) = if self.rows[a].len() <= self.rows[b].len() {
            (&self.rows[a], &self.rows[b])
        } else {
            (&self.rows[b], &self.rows[a])
        };
        let dot: f64 = small
            .iter()
            .filter_map(|(p, w)| large.get(p).map(|v| w * v))
            .sum();
        dot / denom
    }

    /// Similarity of one user to every user, indexed like `users()`
    pub fn similarities_to(&self, user: usize) -> Vec<f64> {
        (0..self.users.len()).map(|other| self.cosine(user, other)).collect()
    }
}
