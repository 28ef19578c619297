//! Similar-user product union
//!
//! Walks the other users from most to least similar and collects everything
//! they interacted with until enough products are gathered.

use crate::models::InteractionMatrix;
use crate::types::{ObjectId, UserId};
use std::collections::HashSet;

/// Products interacted with by the users most similar to `user`
///
/// Returns at most `top_n` ids in collection order; unknown users get an
/// empty list.
pub fn similar_user_products(
    matrix: &InteractionMatrix,
    user: &UserId,
    top_n: usize,
) -> Vec<ObjectId> {
    let Some(target) = matrix.user_index(user) else {
        return Vec::new();
    };

    let similarities = matrix.similarities_to(target);
    let mut others: Vec<usize> = (0..matrix.users().len())
        .filter(|&u| u != target)
        .collect();
    others.sort_by(|&a, &b| similarities[b].total_cmp(&similarities[a]));

    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    for other in others {
        for product in matrix.interacted(other) {
            if seen.insert(product.clone()) {
                collected.push(product.clone());
            }
        }
        if collected.len() >= top_n {
            break;
        }
    }

    collected.truncate(top_n);
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Event, EventType};

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    fn event(user: &str, product: u8, weight: f64) -> Event {
        Event::new(UserId::parse(user).unwrap(), oid(product), EventType::View, weight)
    }

    #[test]
    fn test_most_similar_user_comes_first() {
        let events = vec![
            event("target", 1, 5.0),
            event("close", 1, 5.0),
            event("close", 2, 1.0),
            event("far", 9, 7.0),
        ];
        let matrix = InteractionMatrix::from_events(&events);

        let recs = similar_user_products(&matrix, &UserId::parse("target").unwrap(), 2);
        assert_eq!(recs, vec![oid(1), oid(2)]);
    }

    #[test]
    fn test_collects_across_users_until_full() {
        let events = vec![
            event("target", 1, 5.0),
            event("close", 1, 5.0),
            event("far", 9, 7.0),
        ];
        let matrix = InteractionMatrix::from_events(&events);

        let recs = similar_user_products(&matrix, &UserId::parse("target").unwrap(), 12);
        assert_eq!(recs, vec![oid(1), oid(9)]);
    }

    #[test]
    fn test_unknown_user_gets_nothing() {
        let matrix = InteractionMatrix::from_events(&[event("a", 1, 1.0)]);
        assert!(similar_user_products(&matrix, &UserId::parse("zed").unwrap(), 5).is_empty());
    }
}
