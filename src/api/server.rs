//! HTTP API server

use super::handlers;
use super::state::AppState;
use crate::engine::Recommender;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// Interval between background retrain checks; zero disables them
    pub retrain_interval: Duration,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 5000).into(),
            cors_origins: Vec::new(),
            retrain_interval: Duration::ZERO,
        }
    }
}

/// Build the CORS layer for a list of origins
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build router
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        // Recommendations
        .route(
            "/recommend",
            post(handlers::recommend).options(handlers::recommend_preflight),
        )
        .route("/get_recommendations/:user_id", get(handlers::get_recommendations))
        // Catalog
        .route(
            "/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/products/search", get(handlers::search_products))
        .route("/products/popular", get(handlers::popular_products))
        .route("/products/:product_id/pairings", get(handlers::product_pairings))
        .route("/products/:product_id/similar", get(handlers::similar_products))
        .route("/users/:user_id", axum::routing::put(handlers::upsert_user))
        .route(
            "/events",
            get(handlers::list_events)
                .post(handlers::track_event)
                .delete(handlers::remove_event),
        )
        // Maintenance
        .route("/admin/retrain", post(handlers::retrain))
        .route("/health", get(handlers::health))
        // State
        .with_state(state)
        // Middleware
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    /// Shutdown signal for background tasks
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    /// Retrain task handle for cleanup
    retrain_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ApiServer {
    /// Create new API server
    pub fn new(config: ApiServerConfig, recommender: Arc<Recommender>) -> Self {
        let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
        Self {
            config,
            state: AppState::new(recommender),
            shutdown_tx,
            retrain_handle: None,
        }
    }

    /// Get instance ID
    pub fn instance_id(&self) -> &str {
        &self.state.instance_id
    }

    /// Spawn the periodic gated retrain, unless disabled
    fn spawn_retrain_task(&mut self) {
        if self.config.retrain_interval.is_zero() {
            debug!("Background retrain disabled");
            return;
        }

        let recommender = Arc::clone(&self.state.recommender);
        let period = self.config.retrain_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("Background retrain every {:?}", period);
        self.retrain_handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; startup already retrained
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = recommender.retrain(false).await {
                            warn!("Background retrain failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Retrain task received shutdown signal");
                        break;
                    }
                }
            }
        }));
    }

    /// Start serving with dynamic port allocation
    ///
    /// Runs the gated retrain once, then tries the configured address and the
    /// next ten ports if it is taken. Returns after ctrl-c.
    pub async fn serve(mut self) -> anyhow::Result<()> {
        let outcome = self.state.recommender.retrain(false).await?;
        info!(
            "Content model ready ({} products, retrained: {})",
            outcome.products, outcome.retrained
        );

        self.spawn_retrain_task();
        let router = build_router(self.state.clone(), &self.config.cors_origins);

        let base_port = self.config.addr.port();
        for offset in 0..=10u16 {
            let addr = SocketAddr::new(self.config.addr.ip(), base_port.saturating_add(offset));
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    info!(
                        "API server [{}] listening on http://{}",
                        self.state.instance_id, addr
                    );
                    let mut shutdown_rx = self.shutdown_tx.subscribe();
                    let shutdown_tx = self.shutdown_tx.clone();
                    axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            tokio::select! {
                                _ = tokio::signal::ctrl_c() => {
                                    info!("Received shutdown signal, stopping API server gracefully...");
                                    let _ = shutdown_tx.send(());
                                }
                                _ = shutdown_rx.recv() => {}
                            }
                        })
                        .await?;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    debug!("Port {} in use, trying next port...", addr.port());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(anyhow::anyhow!(
            "All ports ({}-{}) are in use. API server unavailable for instance {}.",
            base_port,
            base_port.saturating_add(10),
            self.state.instance_id
        ))
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        // Send shutdown signal to background tasks
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.retrain_handle.take() {
            handle.abort();
            debug!("ApiServer dropped - retrain task aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_mixed_origins() {
        // Invalid header values are skipped rather than failing the build
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&[]);
    }

    #[test]
    fn test_default_config() {
        let config = ApiServerConfig::default();
        assert_eq!(config.addr.port(), 5000);
        assert!(config.retrain_interval.is_zero());
    }
}
