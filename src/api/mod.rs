//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `GET /entries/:key` - Read an entry
//! - `PUT /entries/:key` - Store an entry
//! - `DELETE /entries/:key` - Delete an entry
//! - `DELETE /entries` - Delete every entry
//! - `GET /stats` - Get request statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
