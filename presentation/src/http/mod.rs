//! HTTP API: JSON endpoints plus the time-travel event stream

pub mod dto;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod router;

pub use error::ApiError;
pub use router::create_router;
