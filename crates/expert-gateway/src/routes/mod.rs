//! HTTP routes for the Expert Gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::TokenAuthority;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_session, AuthState};
use crate::services::{ExpertSearch, LlmClient, MarkdownRenderer};
use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// One-time token and session store. The only instance in the process.
    pub authority: Arc<TokenAuthority>,

    /// Answers and topic extraction.
    pub llm: Arc<dyn LlmClient>,

    /// Expert profile lookup.
    pub search: Arc<dyn ExpertSearch>,

    pub markdown: Arc<MarkdownRenderer>,
}

/// CORS for the browser client, if an origin is configured.
fn cors_layer(frontend_url: Option<&str>) -> Option<CorsLayer> {
    let origin = frontend_url?;
    match HeaderValue::from_str(origin) {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
        Err(e) => {
            tracing::warn!(target: "gw.routes", error = %e, "Ignoring unusable FRONTEND_URL");
            None
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/auth/validate` - One-time token exchange - public
/// - `/api/auth/logout` - Session revocation - public, always 204
/// - `/api/search` - Expert search - requires a session
/// - CORS for `FRONTEND_URL` when configured
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        authority: state.authority.clone(),
    });
    let cors = cors_layer(state.config.frontend_url.as_deref());

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/auth/validate", post(handlers::exchange_token))
        .route("/api/auth/logout", post(handlers::logout))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route("/api/search", post(handlers::search))
        .route_layer(middleware::from_fn_with_state(auth_state, require_session))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. CorsLayer - Answer preflights before tracing/timeouts
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    let router = public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(middleware::from_fn(http_metrics_middleware))
}
