pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod registry;
pub mod routes;
pub mod store;
pub mod validation;

use std::sync::Arc;

use axum::http::header;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{models::AppState, registry::Registry, store::Store};

/// The full HTTP application over the given store.
pub fn app(store: Arc<dyn Store>) -> Router {
    let state = AppState {
        registry: Registry::new(store),
    };

    // Browser clients call the API cross-origin; let preflight through.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
