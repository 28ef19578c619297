//! Storage layer for the product catalog
//!
//! Provides the catalog store abstraction (users, products, interaction
//! events) and its SQLite and in-memory implementations.

pub mod memory;
pub mod seed;
pub mod sqlite;

use crate::error::Result;
use crate::types::{CatalogSnapshot, CatalogStats, Event, EventType, ObjectId, Product, User, UserId};
use async_trait::async_trait;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

/// Catalog store trait defining all required operations
///
/// List operations return documents in insertion order; several signal
/// sources ("first N matching products") depend on that order being stable.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or replace a user profile
    async fn upsert_user(&self, user: &User) -> Result<()>;

    /// Retrieve a user profile
    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// List all user profiles
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Insert or replace a product
    async fn upsert_product(&self, product: &Product) -> Result<()>;

    /// Retrieve a product
    async fn get_product(&self, id: &ObjectId) -> Result<Option<Product>>;

    /// Retrieve several products, keeping the order of `ids` and skipping unknown ones
    async fn get_products(&self, ids: &[ObjectId]) -> Result<Vec<Product>> {
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(product) = self.get_product(id).await? {
                products.push(product);
            }
        }
        Ok(products)
    }

    /// List all products
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Case-insensitive title substring search
    async fn search_products(&self, query: &str) -> Result<Vec<Product>>;

    /// Record an event, returning its assigned id
    async fn insert_event(&self, event: &Event) -> Result<i64>;

    /// Remove one event matching user, product and type
    ///
    /// Fails with `EventNotFound` when nothing matches.
    async fn remove_event(
        &self,
        user: &UserId,
        product: &ObjectId,
        event_type: EventType,
    ) -> Result<()>;

    /// List all events
    async fn list_events(&self) -> Result<Vec<Event>>;

    /// List one user's events, oldest first
    async fn events_for_user(&self, user: &UserId) -> Result<Vec<Event>>;

    /// Write counter; changes whenever any document is written
    async fn revision(&self) -> Result<u64>;

    /// Row counts
    async fn stats(&self) -> Result<CatalogStats>;

    /// Load the whole catalog into memory
    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        Ok(CatalogSnapshot {
            users: self.list_users().await?,
            products: self.list_products().await?,
            events: self.list_events().await?,
        })
    }
}
