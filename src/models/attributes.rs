//! Tag matching between user profiles and product attributes

use crate::types::{ObjectId, Product, Season, User};

/// Products sharing any health condition with the user's medical conditions
pub fn health_matches(user: &User, products: &[Product], n: usize) -> Vec<ObjectId> {
    if user.medical_conditions.is_empty() {
        return Vec::new();
    }
    products
        .iter()
        .filter(|p| {
            p.health_conditions
                .iter()
                .any(|c| user.medical_conditions.contains(c))
        })
        .take(n)
        .map(|p| p.id.clone())
        .collect()
}

/// Products whose occupation tags overlap the user's occupations
pub fn profession_matches(user: &User, products: &[Product], n: usize) -> Vec<ObjectId> {
    if user.occupation.is_empty() {
        return Vec::new();
    }
    products
        .iter()
        .filter(|p| p.occupation_tags.iter().any(|t| user.occupation.contains(t)))
        .take(n)
        .map(|p| p.id.clone())
        .collect()
}

/// Products in season for `month`, or tagged for every season
pub fn seasonal(products: &[Product], month: u32, n: usize) -> Vec<ObjectId> {
    let season = Season::from_month(month).as_str();
    products
        .iter()
        .filter(|p| {
            p.seasonal
                .iter()
                .any(|s| s == season || s == Season::ALL_SEASONS_TAG)
        })
        .take(n)
        .map(|p| p.id.clone())
        .collect()
}
