//! Expert Gateway Library
//!
//! HTTP backend for the Expert Finder client:
//!
//! - One-time token exchange for short-lived session tokens
//! - Session-gated expert search (LLM answer + topic, web profile lookup)
//! - Session revocation and background eviction of expired sessions
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/*.rs -> services/*.rs
//!                                      \-> auth::TokenAuthority
//! ```
//!
//! # Modules
//!
//! - `auth` - One-time token and session store
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Session check and HTTP metrics
//! - `models` - Request and response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - LLM, web search and markdown rendering
//! - `tasks` - Background maintenance

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod tasks;
