//! Common test utilities and helpers

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use basketrec_core::{
    api::{build_router, AppState},
    config::EventWeights,
    storage::seed::seed_catalog,
    CatalogSnapshot, CatalogStore, ContentModelStore, MemoryCatalog, Recommender, ServiceConfig,
    SqliteCatalog,
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Configuration sized for the small fixture catalog
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.models.clustering.clusters = 2;
    config.models.clustering.n_init = 3;
    config.models.association.min_support = 0.2;
    config
}

/// Recommender over an in-memory catalog, content model already trained
pub async fn memory_recommender(snapshot: CatalogSnapshot) -> (Arc<Recommender>, TempDir) {
    let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalog::from_snapshot(snapshot));
    build(store).await
}

/// Recommender over a temporary SQLite catalog seeded with `snapshot`
pub async fn sqlite_recommender(snapshot: CatalogSnapshot) -> (Arc<Recommender>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let catalog = SqliteCatalog::open(temp_dir.path().join("catalog.db"))
        .await
        .expect("Failed to open catalog");
    seed_catalog(&catalog, snapshot, &EventWeights::default())
        .await
        .expect("Failed to seed catalog");

    let store: Arc<dyn CatalogStore> = Arc::new(catalog);
    let recommender = open_recommender(store, &temp_dir).await;
    (recommender, temp_dir)
}

async fn build(store: Arc<dyn CatalogStore>) -> (Arc<Recommender>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let recommender = open_recommender(store, &temp_dir).await;
    (recommender, temp_dir)
}

async fn open_recommender(store: Arc<dyn CatalogStore>, temp_dir: &TempDir) -> Arc<Recommender> {
    let content = Arc::new(
        ContentModelStore::open(temp_dir.path().join("models"))
            .await
            .expect("Failed to open content store"),
    );
    let recommender = Arc::new(Recommender::new(store, content, Arc::new(test_config())));
    recommender
        .retrain(false)
        .await
        .expect("Failed to train content model");
    recommender
}

/// Router over a recommender with permissive CORS
pub fn test_router(recommender: Arc<Recommender>) -> Router {
    build_router(AppState::new(recommender), &[])
}

/// Send one request, returning status and JSON body (Null when empty)
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Router failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
