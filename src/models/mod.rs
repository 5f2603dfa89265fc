//! Request and Response models for the cache server API
//!
//! These are the wire types shared by the server handlers and the remote
//! backend client.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::PutEntryRequest;
pub use responses::{AckResponse, EntryResponse, ErrorResponse, HealthResponse, StatsResponse};
