//! Token exchange and logout handlers.
//!
//! `POST /api/auth/validate` trades a one-time token for a session token.
//! `POST /api/auth/logout` revokes the presented session.

use crate::errors::{GatewayError, INVALID_ONE_TIME_TOKEN_MESSAGE};
use crate::middleware::extract_session_token;
use crate::models::{TokenExchangeRequest, TokenExchangeResponse};
use crate::observability::metrics;
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

const MISSING_TOKEN_MESSAGE: &str = "Please enter a Token";

/// Handler for POST /api/auth/validate
///
/// The body is parsed by hand so that an empty or malformed body gets the
/// same 400 as a missing field.
///
/// # Response
///
/// - 200 `{"valid": true, "sessionToken": "..."}` on first use of a configured token
/// - 400 if the token is missing or blank
/// - 401 if the token is unknown or already used
#[instrument(skip_all, name = "gw.auth.exchange")]
pub async fn exchange_token(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TokenExchangeResponse>, GatewayError> {
    let request: TokenExchangeRequest = serde_json::from_slice(&body).unwrap_or_default();

    let token = request
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::BadRequest(MISSING_TOKEN_MESSAGE.to_string()))?;

    let session_token = state.authority.consume_one_time_token(token);
    metrics::record_token_exchange(session_token.is_some());
    metrics::set_token_store_sizes(
        state.authority.active_session_count(),
        state.authority.unused_token_count(),
    );

    let Some(session_token) = session_token else {
        tracing::info!(target: "gw.auth", "One-time token rejected");
        return Err(GatewayError::InvalidToken(
            INVALID_ONE_TIME_TOKEN_MESSAGE.to_string(),
        ));
    };

    tracing::info!(target: "gw.auth", "Session issued");

    Ok(Json(TokenExchangeResponse {
        valid: true,
        session_token,
    }))
}

/// Handler for POST /api/auth/logout
///
/// Always 204, whether or not the header named a live session.
#[instrument(skip_all, name = "gw.auth.logout")]
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = extract_session_token(&headers) {
        if state.authority.revoke_session(&token) {
            metrics::record_session_revoked();
            metrics::set_token_store_sizes(
                state.authority.active_session_count(),
                state.authority.unused_token_count(),
            );
            tracing::info!(target: "gw.auth", "Session revoked");
        }
    }

    StatusCode::NO_CONTENT
}
