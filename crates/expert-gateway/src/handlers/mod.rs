//! HTTP request handlers for the Expert Gateway.

pub mod auth;
pub mod health;
pub mod metrics;
pub mod search;

pub use auth::{exchange_token, logout};
pub use health::health_check;
pub use metrics::metrics_handler;
pub use search::search;
