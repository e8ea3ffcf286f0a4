//! Expert Gateway error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Authentication failures carry one uniform message regardless of cause so
//! clients cannot learn which tokens exist or were used. Upstream failures
//! are logged server-side and reported generically.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every rejected one-time token.
pub const INVALID_ONE_TIME_TOKEN_MESSAGE: &str = "Invalid Token - Please add a Valid Token";

/// Message returned for every rejected session credential.
pub const INVALID_SESSION_MESSAGE: &str = "Invalid or expired session";

/// Expert Gateway error type.
///
/// Maps to HTTP status codes:
/// - InvalidToken: 401 Unauthorized
/// - BadRequest: 400 Bad Request
/// - UpstreamUnavailable: 502 Bad Gateway
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            GatewayError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            GatewayError::UpstreamUnavailable(reason) => {
                // Log actual reason server-side
                tracing::warn!(target: "gw.upstream", reason = %reason, "Upstream unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_UNAVAILABLE",
                    "An upstream service is temporarily unavailable".to_string(),
                )
            }
            GatewayError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"expert-gateway\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
