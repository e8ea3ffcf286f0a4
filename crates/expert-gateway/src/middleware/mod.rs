//! Middleware for the Expert Gateway.
//!
//! # Components
//!
//! - `auth` - Session check for protected routes
//! - `http_metrics` - Request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{extract_session_token, require_session, AuthState};
pub use http_metrics::http_metrics_middleware;
