//! Expert Gateway models.
//!
//! Request and response bodies for the HTTP API. Field names are camelCase
//! on the wire to match the browser client.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/auth/validate`.
///
/// The field is optional so that a missing token yields a 400 with a
/// friendly message rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenExchangeRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Successful token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeResponse {
    /// Always true; failures use the error envelope.
    pub valid: bool,

    /// Session token to send as `Authorization: Bearer <token>`.
    pub session_token: String,
}

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub location: Option<String>,
}

impl SearchRequest {
    /// Returns `(query, location)` when both are present and non-blank.
    pub fn validated(&self) -> Option<(&str, &str)> {
        let query = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())?;
        let location = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())?;
        Some((query, location))
    }
}

/// A single expert profile link returned by web search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertLink {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Body of a successful `POST /api/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// LLM answer rendered to sanitized HTML.
    pub answer: String,

    /// Topic used for the expert search.
    pub topic: String,

    /// Matching profile links, LinkedIn first.
    pub experts: Vec<ExpertLink>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status.
    pub status: String,
}
