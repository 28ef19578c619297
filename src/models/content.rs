//! Content similarity between products
//!
//! Each product is indexed by its title and description; the model keeps the
//! full product × product cosine-similarity matrix so lookups are a row scan.
//! The model is serializable and persisted as an artifact by the engine.

use crate::models::tfidf::{sparse_dot, TfidfVectorizer};
use crate::types::{ObjectId, Product};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentModel {
    /// Product ids in catalog order
    product_ids: Vec<ObjectId>,
    vectorizer: TfidfVectorizer,
    /// Row-major dense similarity, `product_ids.len()` squared
    similarity: Vec<f64>,
    #[serde(skip)]
    index: HashMap<ObjectId, usize>,
}

impl ContentModel {
    /// Fit the vectorizer and compute pairwise similarity
    pub fn build(products: &[Product]) -> Self {
        let texts: Vec<String> = products.iter().map(Product::combined_text).collect();
        let vectorizer = TfidfVectorizer::fit(&texts);
        let vectors: Vec<_> = texts.iter().map(|t| vectorizer.transform(t)).collect();

        let n = products.len();
        let mut similarity = vec![0.0; n * n];
        for i in 0..n {
            for j in i..n {
                let sim = sparse_dot(&vectors[i], &vectors[j]);
                similarity[i * n + j] = sim;
                similarity[j * n + i] = sim;
            }
        }

        debug!(
            "Built content model: {} products, {} terms",
            n,
            vectorizer.vocabulary_len()
        );

        let mut model = Self {
            product_ids: products.iter().map(|p| p.id.clone()).collect(),
            vectorizer,
            similarity,
            index: HashMap::new(),
        };
        model.reindex();
        model
    }

    /// Rebuild the id lookup; required after deserializing
    pub fn reindex(&mut self) {
        self.index = self
            .product_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
    }

    pub fn len(&self) -> usize {
        self.product_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.product_ids.is_empty()
    }

    pub fn product_ids(&self) -> &[ObjectId] {
        &self.product_ids
    }

    /// The set of indexed product ids, used to decide whether a rebuild is due
    pub fn product_set(&self) -> BTreeSet<&ObjectId> {
        self.product_ids.iter().collect()
    }

    /// Whether the matrix shape agrees with the product list
    pub fn is_consistent(&self) -> bool {
        self.similarity.len() == self.product_ids.len() * self.product_ids.len()
    }

    pub fn similarity(&self, a: &ObjectId, b: &ObjectId) -> Option<f64> {
        let (i, j) = (*self.index.get(a)?, *self.index.get(b)?);
        Some(self.similarity[i * self.len() + j])
    }

    /// Products most similar to `product`, excluding itself
    ///
    /// Ties keep catalog order. Unknown products get an empty list.
    pub fn similar_products(&self, product: &ObjectId, top_n: usize) -> Vec<ObjectId> {
        let Some(&row) = self.index.get(product) else {
            return Vec::new();
        };
        let n = self.len();
        let scores = &self.similarity[row * n..(row + 1) * n];

        let mut ranked: Vec<usize> = (0..n).filter(|&j| j != row).collect();
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        ranked
            .into_iter()
            .take(top_n)
            .map(|j| self.product_ids[j].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    fn product(n: u8, title: &str, description: &str) -> Product {
        let mut p = Product::new(oid(n), title);
        p.description = Some(description.to_string());
        p
    }

    fn catalog() -> Vec<Product> {
        vec![
            product(1, "Green Apple", "crisp sour apple fruit"),
            product(2, "Red Apple", "sweet apple fruit"),
            product(3, "Whole Milk", "fresh dairy milk"),
            product(4, "Skim Milk", "low fat dairy milk"),
        ]
    }

    #[test]
    fn test_similar_products_prefers_shared_terms() {
        let model = ContentModel::build(&catalog());

        let similar = model.similar_products(&oid(1), 1);
        assert_eq!(similar, vec![oid(2)]);

        let similar = model.similar_products(&oid(3), 3);
        assert_eq!(similar[0], oid(4));
        assert!(!similar.contains(&oid(3)));
    }

    #[test]
    fn test_self_similarity_and_symmetry() {
        let model = ContentModel::build(&catalog());
        assert!((model.similarity(&oid(1), &oid(1)).unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(
            model.similarity(&oid(1), &oid(3)),
            model.similarity(&oid(3), &oid(1))
        );
    }

    #[test]
    fn test_unknown_product_and_ties() {
        let products = vec![
            product(1, "Salt", ""),
            product(2, "Pepper", ""),
            product(3, "Sugar", ""),
        ];
        let model = ContentModel::build(&products);
        assert!(model.similar_products(&oid(9), 5).is_empty());
        // No shared terms: all zero, catalog order wins
        assert_eq!(model.similar_products(&oid(2), 5), vec![oid(1), oid(3)]);
    }

    #[test]
    fn test_bincode_round_trip_needs_reindex() {
        let model = ContentModel::build(&catalog());
        let bytes = bincode::serialize(&model).unwrap();
        let mut restored: ContentModel = bincode::deserialize(&bytes).unwrap();
        assert!(restored.similar_products(&oid(1), 1).is_empty());

        restored.reindex();
        assert!(restored.is_consistent());
        assert_eq!(restored.similar_products(&oid(1), 1), vec![oid(2)]);
    }
}
