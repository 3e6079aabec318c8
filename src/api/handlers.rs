//! API Handlers
//!
//! HTTP request handlers for the admin endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::config::Config;
use crate::directory::Directory;
use crate::domains::hours::{BusinessHours, OpenStatus};
use crate::error::Result;
use crate::models::{HealthResponse, InvalidateResponse, OpenQuery, StatsResponse};
use crate::query::QueryResult;
use crate::source::InMemoryDirectory;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<Directory>,
}

impl AppState {
    pub fn new(directory: Directory) -> Self {
        Self {
            directory: Arc::new(directory),
        }
    }

    /// Creates a new AppState from configuration over an empty in-memory source.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Directory::new(config, Arc::new(InMemoryDirectory::new())))
    }
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.directory.cache.read().await;
    Json(StatsResponse::from(cache.stats()))
}

/// Handler for DELETE /cache/:prefix
///
/// Drops every entry whose key starts with `prefix`. Matching nothing is
/// not an error.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Json<InvalidateResponse> {
    let removed = state
        .directory
        .engine
        .invalidator()
        .invalidate(std::slice::from_ref(&prefix))
        .await;

    info!("Admin invalidation of '{}' removed {} entries", prefix, removed);
    Json(InvalidateResponse::new(prefix, removed))
}

/// Handler for GET /businesses/:id/hours
pub async fn business_hours_handler(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
) -> Result<Json<QueryResult<BusinessHours>>> {
    let result = state.directory.hours.get_business_hours(&business_id).await?;
    Ok(Json(result))
}

/// Handler for GET /businesses/:id/open
///
/// Evaluates open/closed at `?at=` or at the directory clock's current time.
pub async fn business_open_handler(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
    Query(query): Query<OpenQuery>,
) -> Result<Json<OpenStatus>> {
    let at = query.at.unwrap_or_else(|| state.directory.engine.now_utc());
    let status = state.directory.hours.is_business_open(&business_id, at).await?;
    Ok(Json(status))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
