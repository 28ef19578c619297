//! In-memory catalog store
//!
//! Backs `serve --in-memory` and the test suites. Documents live in
//! insertion-ordered vectors behind a single lock.

use crate::error::{RecommendError, Result};
use crate::storage::CatalogStore;
use crate::types::{CatalogSnapshot, CatalogStats, Event, EventType, ObjectId, Product, User, UserId};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    events: Vec<Event>,
    next_event_id: i64,
    revision: u64,
}

/// Catalog held entirely in process memory
#[derive(Default)]
pub struct MemoryCatalog {
    tables: RwLock<Tables>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated from a snapshot
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let mut events = snapshot.events;
        for (i, event) in events.iter_mut().enumerate() {
            event.id = Some(i as i64 + 1);
        }
        let next_event_id = events.len() as i64 + 1;
        Self {
            tables: RwLock::new(Tables {
                users: snapshot.users,
                products: snapshot.products,
                events,
                next_event_id,
                revision: 1,
            }),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn upsert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => tables.users.push(user.clone()),
        }
        tables.revision += 1;
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| &u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product.clone(),
            None => tables.products.push(product.clone()),
        }
        tables.revision += 1;
        Ok(())
    }

    async fn get_product(&self, id: &ObjectId) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables.products.iter().find(|p| &p.id == id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.tables.read().await.products.clone())
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let needle = query.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn insert_event(&self, event: &Event) -> Result<i64> {
        let mut tables = self.tables.write().await;
        if tables.next_event_id == 0 {
            tables.next_event_id = 1;
        }
        let id = tables.next_event_id;
        tables.next_event_id += 1;

        let mut stored = event.clone();
        stored.id = Some(id);
        tables.events.push(stored);
        tables.revision += 1;
        Ok(id)
    }

    async fn remove_event(
        &self,
        user: &UserId,
        product: &ObjectId,
        event_type: EventType,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let position = tables.events.iter().position(|e| {
            &e.user_id == user && &e.product_id == product && e.event_type == event_type
        });
        match position {
            Some(index) => {
                tables.events.remove(index);
                tables.revision += 1;
                Ok(())
            }
            None => Err(RecommendError::EventNotFound),
        }
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        Ok(self.tables.read().await.events.clone())
    }

    async fn events_for_user(&self, user: &UserId) -> Result<Vec<Event>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| &e.user_id == user)
            .cloned()
            .collect())
    }

    async fn revision(&self) -> Result<u64> {
        Ok(self.tables.read().await.revision)
    }

    async fn stats(&self) -> Result<CatalogStats> {
        let tables = self.tables.read().await;
        Ok(CatalogStats {
            users: tables.users.len(),
            products: tables.products.len(),
            events: tables.events.len(),
        })
    }

    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        let tables = self.tables.read().await;
        Ok(CatalogSnapshot {
            users: tables.users.clone(),
            products: tables.products.clone(),
            events: tables.events.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::parse(&format!("{:024x}", n)).unwrap()
    }

    #[tokio::test]
    async fn test_revision_tracks_writes() {
        let store = MemoryCatalog::new();
        let start = store.revision().await.unwrap();

        store
            .upsert_product(&Product::new(oid(1), "Banana"))
            .await
            .unwrap();
        let user = UserId::parse("u1").unwrap();
        store
            .insert_event(&Event::new(user.clone(), oid(1), EventType::View, 1.0))
            .await
            .unwrap();

        assert_eq!(store.revision().await.unwrap(), start + 2);
        assert_eq!(store.events_for_user(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_event_only_removes_one() {
        let store = MemoryCatalog::new();
        let user = UserId::parse("u1").unwrap();
        for _ in 0..2 {
            store
                .insert_event(&Event::new(user.clone(), oid(1), EventType::Purchase, 7.0))
                .await
                .unwrap();
        }

        store
            .remove_event(&user, &oid(1), EventType::Purchase)
            .await
            .unwrap();
        assert_eq!(store.list_events().await.unwrap().len(), 1);

        let missing = store.remove_event(&user, &oid(1), EventType::View).await;
        assert!(matches!(missing, Err(RecommendError::EventNotFound)));
    }

    #[tokio::test]
    async fn test_upsert_keeps_insertion_order() {
        let store = MemoryCatalog::new();
        store.upsert_product(&Product::new(oid(1), "Banana")).await.unwrap();
        store.upsert_product(&Product::new(oid(2), "Brinjal")).await.unwrap();
        store.upsert_product(&Product::new(oid(1), "Banana (ripe)")).await.unwrap();

        let titles: Vec<_> = store
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Banana (ripe)", "Brinjal"]);
        assert_eq!(store.search_products("BRIN").await.unwrap().len(), 1);
    }
}
