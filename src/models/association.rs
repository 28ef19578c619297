//! Co-occurrence mining with Apriori
//!
//! Every user is one transaction: the set of products they interacted with.
//! Frequent itemsets are grown level by level, and each one is split into
//! antecedent → consequent rules scored by support, confidence and lift.

use crate::config::AssociationConfig;
use crate::types::{Event, ObjectId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

type Itemset = BTreeSet<usize>;

/// One mined rule `antecedent → consequent`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRule {
    pub antecedent: Vec<ObjectId>,
    pub consequent: Vec<ObjectId>,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

/// Frequent itemset with its support
#[derive(Debug, Clone, PartialEq)]
pub struct FrequentItemset {
    pub items: Vec<ObjectId>,
    pub support: f64,
}

/// Mined rules, strongest first
#[derive(Debug, Clone, Default)]
pub struct AssociationRules {
    itemsets: Vec<FrequentItemset>,
    rules: Vec<AssociationRule>,
}

impl AssociationRules {
    pub fn mine(events: &[Event], config: &AssociationConfig) -> Self {
        let mut baskets: BTreeMap<&str, BTreeSet<&ObjectId>> = BTreeMap::new();
        for event in events {
            baskets
                .entry(event.user_id.as_str())
                .or_default()
                .insert(&event.product_id);
        }

        let products: Vec<&ObjectId> = baskets
            .values()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let column: BTreeMap<&ObjectId, usize> =
            products.iter().enumerate().map(|(i, p)| (*p, i)).collect();
        let transactions: Vec<Itemset> = baskets
            .values()
            .map(|basket| basket.iter().map(|p| column[p]).collect())
            .collect();

        let frequent = apriori(&transactions, products.len(), config.min_support, config.max_len);
        let rules = derive_rules(&frequent, config.min_lift);

        let ids = |set: &Itemset| -> Vec<ObjectId> { set.iter().map(|&i| products[i].clone()).collect() };

        let itemsets: Vec<FrequentItemset> = frequent
            .iter()
            .map(|(set, &support)| FrequentItemset {
                items: ids(set),
                support,
            })
            .collect();
        let rules: Vec<AssociationRule> = rules
            .into_iter()
            .map(|r| AssociationRule {
                antecedent: ids(&r.antecedent),
                consequent: ids(&r.consequent),
                support: r.support,
                confidence: r.confidence,
                lift: r.lift,
            })
            .collect();

        debug!(
            "Mined {} frequent itemsets and {} rules from {} transactions",
            itemsets.len(),
            rules.len(),
            transactions.len()
        );

        Self { itemsets, rules }
    }

    pub fn itemsets(&self) -> &[FrequentItemset] {
        &self.itemsets
    }

    pub fn rules(&self) -> &[AssociationRule] {
        &self.rules
    }

    /// Products that tend to accompany `product`
    ///
    /// Consequents of rules whose antecedent contains the product, in rule
    /// strength order, without duplicates or the product itself.
    pub fn pairings(&self, product: &ObjectId, n: usize) -> Vec<ObjectId> {
        let mut seen = HashSet::new();
        let mut paired = Vec::new();
        if n == 0 {
            return paired;
        }
        for rule in self.rules.iter().filter(|r| r.antecedent.contains(product)) {
            for item in &rule.consequent {
                if item != product && seen.insert(item) {
                    paired.push(item.clone());
                    if paired.len() == n {
                        return paired;
                    }
                }
            }
        }
        paired
    }
}

fn support_of(transactions: &[Itemset], candidate: &Itemset) -> f64 {
    if transactions.is_empty() {
        return 0.0;
    }
    let hits = transactions
        .iter()
        .filter(|t| candidate.is_subset(t))
        .count();
    hits as f64 / transactions.len() as f64
}

/// Level-wise frequent itemset search
fn apriori(
    transactions: &[Itemset],
    n_items: usize,
    min_support: f64,
    max_len: usize,
) -> BTreeMap<Itemset, f64> {
    let mut frequent = BTreeMap::new();

    let mut level: Vec<Itemset> = (0..n_items)
        .map(|i| Itemset::from([i]))
        .filter_map(|set| {
            let support = support_of(transactions, &set);
            (support >= min_support).then(|| {
                frequent.insert(set.clone(), support);
                set
            })
        })
        .collect();

    let mut size = 1;
    while !level.is_empty() && size < max_len {
        size += 1;
        let previous: HashSet<&Itemset> = level.iter().collect();

        let mut candidates: BTreeSet<Itemset> = BTreeSet::new();
        for (i, a) in level.iter().enumerate() {
            for b in &level[i + 1..] {
                let union: Itemset = a.union(b).copied().collect();
                if union.len() != size {
                    continue;
                }
                // Every (size - 1)-subset must itself be frequent
                let all_frequent = union.iter().all(|item| {
                    let mut subset = union.clone();
                    subset.remove(item);
                    previous.contains(&subset)
                });
                if all_frequent {
                    candidates.insert(union);
                }
            }
        }

        let mut next = Vec::new();
        for candidate in candidates {
            let support = support_of(transactions, &candidate);
            if support >= min_support {
                frequent.insert(candidate.clone(), support);
                next.push(candidate);
            }
        }
        level = next;
    }

    frequent
}

struct IndexedRule {
    antecedent: Itemset,
    consequent: Itemset,
    support: f64,
    confidence: f64,
    lift: f64,
}

/// Split every frequent itemset into rules, strongest (lift, then confidence) first
fn derive_rules(frequent: &BTreeMap<Itemset, f64>, min_lift: f64) -> Vec<IndexedRule> {
    let mut rules = Vec::new();

    for (itemset, &support) in frequent.iter().filter(|(s, _)| s.len() >= 2) {
        let items: Vec<usize> = itemset.iter().copied().collect();
        // Every non-empty proper subset as antecedent
        for mask in 1..(1u32 << items.len()) - 1 {
            let antecedent: Itemset = items
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << bit) != 0)
                .map(|(_, &item)| item)
                .collect();
            let consequent: Itemset = itemset.difference(&antecedent).copied().collect();

            // Subsets of a frequent itemset are frequent, so both are present
            let (Some(&support_a), Some(&support_c)) =
                (frequent.get(&antecedent), frequent.get(&consequent))
            else {
                continue;
            };

            let confidence = support / support_a;
            let lift = confidence / support_c;
            if lift >= min_lift {
                rules.push(IndexedRule {
                    antecedent,
                    consequent,
                    support,
                    confidence,
                    lift,
                });
            }
        }
    }

    rules.sort_by(|a, b| {
        b.lift
            .total_cmp(&a.lift)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.antecedent.cmp(&b.antecedent))
            .then_with(|| a.consequent.cmp(&b.consequent))
    });
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, UserId};

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    fn basket(user: &str, products: &[u8]) -> Vec<Event> {
        products
            .iter()
            .map(|&p| Event::new(UserId::parse(user).unwrap(), oid(p), EventType::Purchase, 7.0))
            .collect()
    }

    fn bread_and_butter() -> Vec<Event> {
        // 1 = bread, 2 = butter, 3 = milk, 4 = soap
        [
            basket("u1", &[1, 2]),
            basket("u2", &[1, 2, 3]),
            basket("u3", &[1, 2]),
            basket("u4", &[3, 4]),
            basket("u5", &[4]),
        ]
        .concat()
    }

    #[test]
    fn test_frequent_itemsets_respect_min_support() {
        let config = AssociationConfig {
            min_support: 0.4,
            ..AssociationConfig::default()
        };
        let mined = AssociationRules::mine(&bread_and_butter(), &config);

        let pair = mined
            .itemsets()
            .iter()
            .find(|s| s.items == vec![oid(1), oid(2)])
            .unwrap();
        assert!((pair.support - 0.6).abs() < 1e-12);
        assert!(mined.itemsets().iter().all(|s| s.support >= 0.4));
        assert!(!mined.itemsets().iter().any(|s| s.items.len() == 3));
    }

    #[test]
    fn test_rule_metrics() {
        let config = AssociationConfig {
            min_support: 0.4,
            ..AssociationConfig::default()
        };
        let mined = AssociationRules::mine(&bread_and_butter(), &config);

        let rule = mined
            .rules()
            .iter()
            .find(|r| r.antecedent == vec![oid(1)] && r.consequent == vec![oid(2)])
            .unwrap();
        assert!((rule.confidence - 1.0).abs() < 1e-12);
        // confidence / support(butter) = 1 / 0.6
        assert!((rule.lift - 1.0 / 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_pairings() {
        let mined = AssociationRules::mine(&bread_and_butter(), &AssociationConfig::default());

        let paired = mined.pairings(&oid(1), 5);
        assert_eq!(paired[0], oid(2));
        assert!(!paired.contains(&oid(1)));
        assert!(!paired.contains(&oid(4)));

        let unique: HashSet<_> = paired.iter().collect();
        assert_eq!(unique.len(), paired.len());
        assert!(mined.pairings(&oid(99), 5).is_empty());
    }

    #[test]
    fn test_pairings_with_zero_limit() {
        let config = AssociationConfig {
            min_support: 0.4,
            ..AssociationConfig::default()
        };
        let mined = AssociationRules::mine(&bread_and_butter(), &config);
        assert!(!mined.pairings(&oid(1), 1).is_empty());
        assert!(mined.pairings(&oid(1), 0).is_empty());
    }

    #[test]
    fn test_low_lift_rules_are_dropped() {
        // Milk appears with everything; its rules have lift 1
        let events = [basket("a", &[1, 3]), basket("b", &[2, 3])].concat();
        let config = AssociationConfig {
            min_lift: 1.01,
            ..AssociationConfig::default()
        };
        let mined = AssociationRules::mine(&events, &config);
        assert!(mined.rules().is_empty());
    }
}
