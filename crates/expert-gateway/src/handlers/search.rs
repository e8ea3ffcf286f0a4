//! Expert search handler.
//!
//! Answers the query with the LLM, extracts its topic, looks up matching
//! profiles and returns the answer as sanitized HTML.

use crate::errors::GatewayError;
use crate::models::{SearchRequest, SearchResponse};
use crate::routes::AppState;
use axum::{body::Bytes, extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

const MISSING_FIELDS_MESSAGE: &str = "Query and Location required";

/// Longest topic used when the LLM returns none.
const FALLBACK_TOPIC_CHARS: usize = 100;

/// Topic to search for: the extracted one, or the start of the query.
fn topic_or_fallback(extracted: String, query: &str) -> String {
    let extracted = extracted.trim();
    if extracted.is_empty() {
        query.chars().take(FALLBACK_TOPIC_CHARS).collect()
    } else {
        extracted.to_string()
    }
}

/// Handler for POST /api/search
///
/// Requires a session (enforced by the router).
///
/// # Response
///
/// - 200 `{"answer": "<html>", "topic": "...", "experts": [...]}`
/// - 400 if query or location is missing or blank
/// - 502 if the LLM or search API fails
#[instrument(skip_all, name = "gw.search")]
pub async fn search(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SearchResponse>, GatewayError> {
    let request: SearchRequest = serde_json::from_slice(&body).unwrap_or_default();
    let (query, location) = request
        .validated()
        .ok_or_else(|| GatewayError::BadRequest(MISSING_FIELDS_MESSAGE.to_string()))?;

    let (answer_markdown, extracted_topic) =
        tokio::try_join!(state.llm.answer(query), state.llm.extract_topic(query))?;

    let topic = topic_or_fallback(extracted_topic, query);

    let experts = state
        .search
        .search(&topic, location, state.config.max_expert_results)
        .await?;

    tracing::debug!(
        target: "gw.search",
        experts = experts.len(),
        "Search completed"
    );

    Ok(Json(SearchResponse {
        answer: state.markdown.render(&answer_markdown),
        topic,
        experts,
    }))
}
