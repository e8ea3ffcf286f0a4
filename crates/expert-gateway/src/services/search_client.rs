//! Web search client for expert profiles.
//!
//! Queries the Google Custom Search JSON API restricted to LinkedIn profile
//! pages and returns title/url/snippet triples.

use crate::errors::GatewayError;
use crate::models::ExpertLink;
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Timeout for search requests in seconds.
const SEARCH_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Connect timeout in seconds.
const SEARCH_CONNECT_TIMEOUT_SECS: u64 = 5;

/// The search API never returns more than ten items per page.
const SEARCH_PAGE_LIMIT: u8 = 10;

/// Expert lookup by topic and location.
#[async_trait]
pub trait ExpertSearch: Send + Sync {
    /// Up to `max_results` profile links, LinkedIn profiles first.
    async fn search(
        &self,
        topic: &str,
        location: &str,
        max_results: u8,
    ) -> Result<Vec<ExpertLink>, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct SearchApiResponse {
    #[serde(default)]
    items: Vec<SearchApiItem>,
}

#[derive(Debug, Deserialize)]
struct SearchApiItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Build the site-restricted query string.
pub fn build_expert_query(topic: &str, location: &str) -> String {
    format!("site:linkedin.com/in \"{}\" {}", topic, location)
}

/// Order LinkedIn profile links first, keeping relative order otherwise,
/// then cap at `limit`.
pub fn rank_experts(mut experts: Vec<ExpertLink>, limit: usize) -> Vec<ExpertLink> {
    experts.sort_by_key(|expert| !expert.url.contains("linkedin.com"));
    experts.truncate(limit);
    experts
}

/// HTTP client for the Custom Search API.
#[derive(Clone)]
pub struct GoogleSearchClient {
    client: Client,

    /// API base URL without trailing slash (e.g., "https://www.googleapis.com").
    base_url: String,

    api_key: SecretString,

    /// Programmable search engine id (`cx`).
    search_engine_id: String,
}

impl GoogleSearchClient {
    /// Create a new search client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Internal` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_key: SecretString,
        search_engine_id: String,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEARCH_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(SEARCH_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "gw.services.search", error = %e, "Failed to build HTTP client");
                GatewayError::Internal
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            search_engine_id,
        })
    }

    async fn fetch(&self, query: &str, num: u8) -> Result<Vec<ExpertLink>, GatewayError> {
        let url = format!("{}/customsearch/v1", self.base_url);
        let num_param = num.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.expose_secret()),
                ("cx", self.search_engine_id.as_str()),
                ("q", query),
                ("num", num_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                // reqwest errors can embed the URL, which carries the key
                warn!(target: "gw.services.search", error = %e.without_url(), "Search request failed");
                GatewayError::UpstreamUnavailable("Search API is unreachable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(
                target: "gw.services.search",
                status = %status,
                body = %error_body,
                "Search API returned an error"
            );
            return Err(GatewayError::UpstreamUnavailable(format!(
                "Search API returned {}",
                status
            )));
        }

        let parsed: SearchApiResponse = response.json().await.map_err(|e| {
            error!(target: "gw.services.search", error = %e.without_url(), "Failed to parse search response");
            GatewayError::Internal
        })?;

        Ok(parsed
            .items
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .map(|item| ExpertLink {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
            })
            .collect())
    }
}

#[async_trait]
impl ExpertSearch for GoogleSearchClient {
    #[instrument(skip_all, name = "gw.services.search.search", fields(max_results = max_results))]
    async fn search(
        &self,
        topic: &str,
        location: &str,
        max_results: u8,
    ) -> Result<Vec<ExpertLink>, GatewayError> {
        let num = max_results.clamp(1, SEARCH_PAGE_LIMIT);
        let query = build_expert_query(topic, location);

        let start = Instant::now();
        let result = self.fetch(&query, num).await;
        metrics::record_upstream_request("search", result.is_ok(), start.elapsed());

        let experts = rank_experts(result?, usize::from(num));
        debug!(target: "gw.services.search", count = experts.len(), "Expert search completed");
        Ok(experts)
    }
}

/// Mock search client for tests.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed result list and records the last query.
    pub struct MockExpertSearch {
        experts: Vec<ExpertLink>,
        return_error: bool,
        last_query: Mutex<Option<(String, String, u8)>>,
    }

    impl MockExpertSearch {
        /// Mock returning `experts`, ranked and capped like the real client.
        pub fn new(experts: Vec<ExpertLink>) -> Self {
            Self {
                experts,
                return_error: false,
                last_query: Mutex::new(None),
            }
        }

        /// Mock whose every call fails as an upstream outage.
        pub fn failing() -> Self {
            Self {
                experts: Vec::new(),
                return_error: true,
                last_query: Mutex::new(None),
            }
        }

        /// `(topic, location, max_results)` of the most recent call.
        pub fn last_query(&self) -> Option<(String, String, u8)> {
            self.last_query
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }
    }

    #[async_trait]
    impl ExpertSearch for MockExpertSearch {
        async fn search(
            &self,
            topic: &str,
            location: &str,
            max_results: u8,
        ) -> Result<Vec<ExpertLink>, GatewayError> {
            *self.last_query.lock().unwrap_or_else(|e| e.into_inner()) =
                Some((topic.to_string(), location.to_string(), max_results));

            if self.return_error {
                return Err(GatewayError::UpstreamUnavailable(
                    "Mock search client error".to_string(),
                ));
            }
            Ok(rank_experts(
                self.experts.clone(),
                usize::from(max_results.min(SEARCH_PAGE_LIMIT)),
            ))
        }
    }
}
