//! Error types for the query cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Data Source Error ==
/// Failure reported by (or while calling) an external data source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// Backend rejected or failed the request
    #[error("Backend error: {0}")]
    Backend(String),

    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input failed validation before or at the backend
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Call exceeded the configured timeout
    #[error("Data source call timed out after {0:?}")]
    Timeout(Duration),
}

// == Cache Error Enum ==
/// Unified error type for the cache and query layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// TTL must be strictly positive
    #[error("Invalid TTL: {0}ms (must be > 0)")]
    InvalidTtl(i64),

    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Parameters or payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The data source call failed; nothing was cached
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidTtl(_) | CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::DataSource(DataSourceError::NotFound(_)) => StatusCode::NOT_FOUND,
            CacheError::DataSource(DataSourceError::Validation(_)) => StatusCode::BAD_REQUEST,
            CacheError::DataSource(DataSourceError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::DataSource(DataSourceError::Backend(_)) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the query cache.
pub type Result<T> = std::result::Result<T, CacheError>;
