//! HTTP API for recommendations and catalog tracking
//!
//! Provides:
//! - Single-user and hybrid recommendation routes
//! - Product listing, search, pairings and content similarity
//! - Event tracking for the storefront
//! - Retrain trigger and health check

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use server::{build_router, ApiServer, ApiServerConfig};
pub use state::AppState;
