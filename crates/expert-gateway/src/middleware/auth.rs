//! Session middleware for protected routes.
//!
//! Extracts the session token from the Authorization header and checks it
//! against the token authority. Every rejection carries the same message.

use crate::auth::{SessionStatus, TokenAuthority};
use crate::errors::{GatewayError, INVALID_SESSION_MESSAGE};
use crate::observability::metrics;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the session middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authority: Arc<TokenAuthority>,
}

/// Read the session token from the Authorization header.
///
/// Accepts `Bearer <token>` (scheme matched case-insensitively) or the bare
/// token. Returns `None` if the header is missing, not UTF-8, or blank.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();

    let token = match raw.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => raw.get(7..).unwrap_or(""),
        _ => raw,
    }
    .trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Record a validation outcome. Lazy eviction shrinks the session store, so
/// the store gauges are refreshed when a session turns out to be expired.
fn record_validation(authority: &TokenAuthority, status: SessionStatus) {
    metrics::record_session_validation(status.as_str());
    if status == SessionStatus::Expired {
        metrics::set_token_store_sizes(
            authority.active_session_count(),
            authority.unused_token_count(),
        );
    }
}

/// Middleware that admits only requests carrying a live session.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <session-token>
/// ```
///
/// # Response
///
/// - 401 with WWW-Authenticate if the token is missing, unknown, revoked or expired
/// - Otherwise continues to the next handler
#[instrument(skip_all, name = "gw.middleware.session")]
pub async fn require_session(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, GatewayError> {
    let Some(token) = extract_session_token(req.headers()) else {
        tracing::debug!(target: "gw.middleware.session", "Missing session credential");
        metrics::record_session_validation(SessionStatus::Unknown.as_str());
        return Err(GatewayError::InvalidToken(
            INVALID_SESSION_MESSAGE.to_string(),
        ));
    };

    let status = state.authority.session_status(&token);
    record_validation(&state.authority, status);

    if !status.is_valid() {
        tracing::debug!(
            target: "gw.middleware.session",
            outcome = status.as_str(),
            "Session rejected"
        );
        return Err(GatewayError::InvalidToken(
            INVALID_SESSION_MESSAGE.to_string(),
        ));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::ManualClock;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use std::time::Duration;
    use tower::ServiceExt;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    async fn protected() -> &'static str {
        "OK"
    }

    fn app(authority: Arc<TokenAuthority>) -> Router {
        let auth_state = Arc::new(AuthState { authority });
        Router::new()
            .route("/protected", get(protected))
            .route_layer(middleware::from_fn_with_state(auth_state, require_session))
    }

    fn get_with_auth(value: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/protected");
        if let Some(value) = value {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(
            extract_session_token(&headers_with("Bearer abc")),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_session_token(&headers_with("bearer abc")),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_session_token(&headers_with("BEARER   abc  ")),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_extract_raw_token() {
        assert_eq!(
            extract_session_token(&headers_with("abc")),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_session_token(&headers_with("  0123456789abcdef  ")),
            Some("0123456789abcdef".to_string())
        );
    }

    #[test]
    fn test_extract_missing_or_blank() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
        assert_eq!(extract_session_token(&headers_with("")), None);
        assert_eq!(extract_session_token(&headers_with("Bearer ")), None);
        assert_eq!(extract_session_token(&headers_with("Bearer    ")), None);
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    fn gauge_value(snapshotter: &metrics_util::debugging::Snapshotter, name: &str) -> Option<f64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Gauge(v) if key.key().name() == name => Some(v.into_inner()),
                _ => None,
            })
    }

    #[test]
    fn test_expired_validation_refreshes_session_gauge() {
        let clock = Arc::new(ManualClock::new());
        let authority = TokenAuthority::with_options(
            ["abc123", "def456"],
            Duration::from_secs(60),
            clock.clone(),
        )
        .unwrap();
        let session = authority.consume_one_time_token("abc123").unwrap();
        clock.advance(chrono::Duration::seconds(61));

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        ::metrics::with_local_recorder(&recorder, || {
            let status = authority.session_status(&session);
            assert_eq!(status, SessionStatus::Expired);
            record_validation(&authority, status);
        });

        assert_eq!(gauge_value(&snapshotter, "gw_active_sessions"), Some(0.0));
        assert_eq!(gauge_value(&snapshotter, "gw_unused_one_time_tokens"), Some(1.0));
    }

    #[test]
    fn test_valid_validation_leaves_gauges_alone() {
        let authority = TokenAuthority::new(["abc123"]).unwrap();
        let session = authority.consume_one_time_token("abc123").unwrap();

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        ::metrics::with_local_recorder(&recorder, || {
            record_validation(&authority, authority.session_status(&session));
        });

        assert_eq!(gauge_value(&snapshotter, "gw_active_sessions"), None);
    }

    #[tokio::test]
    async fn test_valid_session_passes_through() {
        let authority = Arc::new(TokenAuthority::new(["abc123"]).unwrap());
        let session = authority.consume_one_time_token("abc123").unwrap();

        let response = app(authority)
            .oneshot(get_with_auth(Some(&format!("Bearer {}", session))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let authority = Arc::new(TokenAuthority::new(["abc123"]).unwrap());

        let response = app(authority).oneshot(get_with_auth(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("WWW-Authenticate").is_some());
    }

    #[tokio::test]
    async fn test_one_time_token_is_not_a_session() {
        let authority = Arc::new(TokenAuthority::new(["abc123"]).unwrap());

        let response = app(authority)
            .oneshot(get_with_auth(Some("Bearer abc123")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthorized() {
        let clock = Arc::new(ManualClock::new());
        let authority = Arc::new(
            TokenAuthority::with_options(
                ["abc123"],
                Duration::from_secs(60),
                clock.clone(),
            )
            .unwrap(),
        );
        let session = authority.consume_one_time_token("abc123").unwrap();
        clock.advance(chrono::Duration::seconds(61));

        let response = app(authority.clone())
            .oneshot(get_with_auth(Some(&session)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(authority.active_session_count(), 0);
    }
}
