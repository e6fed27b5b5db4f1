//! HTTP layer: stateless request/response handlers over the aggregation
//! and rule-engine modules. Every endpoint rebuilds its snapshot fresh;
//! nothing is shared across requests beyond the clients in `AppState`.

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use error::ApiError;
pub use state::AppState;

/// Assemble the application router. The dashboard front-end is served from
/// elsewhere, so CORS stays permissive and preflight answers 200.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::api_router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
