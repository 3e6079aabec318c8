//! API Routes
//!
//! Configures the Axum router with the admin endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    business_hours_handler, business_open_handler, health_handler, invalidate_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Cache statistics
/// - `DELETE /cache/:prefix` - Invalidate every key under a prefix
/// - `GET /businesses/:id/hours` - Cached weekly hours
/// - `GET /businesses/:id/open` - Open/closed status, optional `?at=`
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/cache/:prefix", delete(invalidate_handler))
        .route("/businesses/:id/hours", get(business_hours_handler))
        .route("/businesses/:id/open", get(business_open_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
