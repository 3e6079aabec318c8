//! API Module
//!
//! HTTP handlers and routing for the admin surface of the query cache.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache statistics
//! - `DELETE /cache/:prefix` - Prefix invalidation
//! - `GET /businesses/:id/hours` - Cached business hours
//! - `GET /businesses/:id/open` - Open/closed check

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
