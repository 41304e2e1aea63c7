//! cross-ext - backend for the Crosspost browser extension
//!
//! Receives saved pages and images from the extension and fans them out to
//! the selected channels through a [`Transport`].

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use libcrosspost::transport::Transport;
use libcrosspost::CrosspostService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: CrosspostService,
    pub transport: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(service: CrosspostService, transport: Arc<dyn Transport>) -> Self {
        Self { service, transport }
    }
}

/// Build the `/api` router
///
/// Requests from any origin are accepted; JSON bodies may be up to
/// `body_limit_mb` megabytes so full-page screenshots fit.
pub fn create_router(state: AppState, body_limit_mb: usize) -> Router {
    let api = Router::new()
        .route("/save-inspiration", post(routes::save_inspiration))
        .route("/save-image", post(routes::save_image))
        .route("/channels", get(routes::channels))
        .route("/health", get(routes::health));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit_mb.saturating_mul(1024 * 1024)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
