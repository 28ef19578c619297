//! Weighted reciprocal-rank fusion
//!
//! Each signal source contributes `weight / (k + rank)` to every product it
//! ranked (ranks start at 1). Products are ordered by total score; equal
//! scores go to the product first produced by an earlier source, then by id.

use crate::types::ObjectId;
use serde::Serialize;
use std::collections::HashMap;

/// One ranked list entering fusion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSource {
    pub name: &'static str,
    pub weight: f64,
    pub items: Vec<ObjectId>,
}

impl RankedSource {
    pub fn new(name: &'static str, weight: f64, items: Vec<ObjectId>) -> Self {
        Self {
            name,
            weight,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fused product with its score and provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedItem {
    pub product_id: ObjectId,
    pub score: f64,
    /// Names of the sources that ranked this product
    pub sources: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfFusion {
    pub k: f64,
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self { k: 60.0 }
    }
}

impl RrfFusion {
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    /// Fuse ranked lists, best first
    ///
    /// Sources with a non-positive weight are ignored. A product repeated
    /// within one source only counts at its best rank.
    pub fn fuse(&self, sources: &[RankedSource]) -> Vec<FusedItem> {
        struct Entry {
            score: f64,
            first_source: usize,
            last_source: usize,
            sources: Vec<&'static str>,
        }

        let mut entries: HashMap<&ObjectId, Entry> = HashMap::new();
        for (source_idx, source) in sources.iter().enumerate() {
            if source.weight <= 0.0 {
                continue;
            }
            for (rank, product) in source.items.iter().enumerate() {
                let entry = entries.entry(product).or_insert_with(|| Entry {
                    score: 0.0,
                    first_source: source_idx,
                    last_source: usize::MAX,
                    sources: Vec::new(),
                });
                if entry.last_source == source_idx {
                    continue;
                }
                entry.score += source.weight / (self.k + rank as f64 + 1.0);
                entry.last_source = source_idx;
                entry.sources.push(source.name);
            }
        }

        let mut fused: Vec<(&ObjectId, Entry)> = entries.into_iter().collect();
        fused.sort_by(|(id_a, a), (id_b, b)| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.first_source.cmp(&b.first_source))
                .then_with(|| id_a.cmp(id_b))
        });

        fused
            .into_iter()
            .map(|(id, entry)| FusedItem {
                product_id: id.clone(),
                score: entry.score,
                sources: entry.sources,
            })
            .collect()
    }

    /// Fuse and keep the first `n` product ids
    pub fn fuse_ids(&self, sources: &[RankedSource], n: usize) -> Vec<ObjectId> {
        self.fuse(sources)
            .into_iter()
            .take(n)
            .map(|item| item.product_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    #[test]
    fn test_agreement_beats_single_source() {
        let fusion = RrfFusion::default();
        let sources = vec![
            RankedSource::new("a", 1.0, vec![oid(1), oid(2)]),
            RankedSource::new("b", 1.0, vec![oid(3), oid(2)]),
        ];
        let fused = fusion.fuse(&sources);

        assert_eq!(fused[0].product_id, oid(2));
        assert_eq!(fused[0].sources, vec!["a", "b"]);
        // 1 and 3 tie on score; 1 came from the earlier source
        assert_eq!(fused[1].product_id, oid(1));
        assert_eq!(fused[2].product_id, oid(3));
    }

    #[test]
    fn test_weights_and_disabled_sources() {
        let fusion = RrfFusion::new(0.0);
        let sources = vec![
            RankedSource::new("light", 0.5, vec![oid(1)]),
            RankedSource::new("heavy", 2.0, vec![oid(2)]),
            RankedSource::new("off", 0.0, vec![oid(3)]),
        ];
        let fused = fusion.fuse(&sources);

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].product_id, oid(2));
        assert!((fused[0].score - 2.0).abs() < 1e-12);
        assert!((fused[1].score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_equal_scores_follow_source_order() {
        let fusion = RrfFusion::default();
        let sources = vec![
            RankedSource::new("a", 1.0, vec![oid(5)]),
            RankedSource::new("b", 1.0, vec![oid(4)]),
            RankedSource::new("b2", 1.0, vec![oid(2)]),
        ];
        // All score 1/61; source order decides
        assert_eq!(fusion.fuse_ids(&sources, 3), vec![oid(5), oid(4), oid(2)]);

        let sources = vec![RankedSource::new("a", 1.0, vec![oid(5), oid(5)])];
        assert_eq!(fusion.fuse(&sources).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_fused_ids_are_unique_and_covered(
            lists in proptest::collection::vec(proptest::collection::vec(0u8..20, 0..10), 0..6)
        ) {
            let sources: Vec<RankedSource> = lists
                .iter()
                .map(|l| RankedSource::new("s", 1.0, l.iter().map(|&n| oid(n)).collect()))
                .collect();
            let fused = RrfFusion::default().fuse(&sources);

            let mut expected: Vec<u8> = lists.iter().flatten().copied().collect();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(fused.len(), expected.len());

            for pair in fused.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
