//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.
//! Upstream APIs are reached over HTTP, so tests point them at `wiremock`
//! servers. Time is driven by a `ManualClock` the test controls.

use expert_gateway::auth::{ManualClock, TokenAuthority};
use expert_gateway::config::Config;
use expert_gateway::routes::{self, AppState};
use expert_gateway::services::{GoogleSearchClient, MarkdownRenderer, OpenAiClient};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Address nothing listens on; upstream calls fail fast unless overridden.
const UNREACHABLE_UPSTREAM: &str = "http://127.0.0.1:9";

/// Builder for [`TestGatewayServer`].
#[derive(Debug, Clone)]
pub struct TestGatewayBuilder {
    vars: HashMap<String, String>,
}

impl TestGatewayBuilder {
    fn new() -> Self {
        let vars = HashMap::from([
            ("AUTH_TOKENS".to_string(), "abc123".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("OPENAI_API_KEY".to_string(), "sk-test".to_string()),
            ("OPENAI_BASE_URL".to_string(), UNREACHABLE_UPSTREAM.to_string()),
            ("GOOGLE_API_KEY".to_string(), "google-test-key".to_string()),
            ("GOOGLE_SEARCH_ENGINE_ID".to_string(), "test-cx".to_string()),
            (
                "GOOGLE_SEARCH_BASE_URL".to_string(),
                UNREACHABLE_UPSTREAM.to_string(),
            ),
        ]);
        Self { vars }
    }

    /// One-time tokens accepted by the server.
    pub fn tokens(mut self, tokens: &[&str]) -> Self {
        self.vars
            .insert("AUTH_TOKENS".to_string(), tokens.join(","));
        self
    }

    /// Base URL of the chat completion API (e.g., a `wiremock` server).
    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.vars.insert("OPENAI_BASE_URL".to_string(), url.into());
        self
    }

    /// Base URL of the search API (e.g., a `wiremock` server).
    pub fn search_base_url(mut self, url: impl Into<String>) -> Self {
        self.vars
            .insert("GOOGLE_SEARCH_BASE_URL".to_string(), url.into());
        self
    }

    /// Set any other configuration variable.
    pub fn var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    /// Build the server and start serving on a random port.
    pub async fn spawn(self) -> Result<TestGatewayServer, anyhow::Error> {
        TestGatewayServer::spawn_with_vars(&self.vars).await
    }
}

/// Test harness for spawning the Expert Gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<()> {
///     let server = TestGatewayServer::spawn(&["abc123"]).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    authority: Arc<TokenAuthority>,
    clock: Arc<ManualClock>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a server accepting `tokens`, with unreachable upstreams.
    pub async fn spawn(tokens: &[&str]) -> Result<Self, anyhow::Error> {
        Self::builder().tokens(tokens).spawn().await
    }

    /// Start configuring a server.
    pub fn builder() -> TestGatewayBuilder {
        TestGatewayBuilder::new()
    }

    async fn spawn_with_vars(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let clock = Arc::new(ManualClock::new());
        let authority = Arc::new(
            TokenAuthority::with_options(
                &config.auth_tokens,
                Duration::from_secs(config.session_lifetime_seconds),
                clock.clone(),
            )
            .map_err(|e| anyhow::anyhow!("Failed to create token authority: {}", e))?,
        );

        let llm = OpenAiClient::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.openai_model.clone(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to create LLM client: {}", e))?;
        let search = GoogleSearchClient::new(
            config.google_search_base_url.clone(),
            config.google_api_key.clone(),
            config.google_search_engine_id.clone(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to create search client: {}", e))?;

        let state = Arc::new(AppState {
            config: config.clone(),
            authority: authority.clone(),
            llm: Arc::new(llm),
            search: Arc::new(search),
            markdown: Arc::new(MarkdownRenderer::new()),
        });

        // Per-server recorder handle; nothing is installed globally
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            authority,
            clock,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server's token authority, for asserting on store state.
    pub fn authority(&self) -> &Arc<TokenAuthority> {
        &self.authority
    }

    /// Advance the server's clock.
    pub fn advance_clock(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    /// Exchange a one-time token and return the session token.
    ///
    /// Fails if the server does not answer 200.
    pub async fn exchange(&self, token: &str) -> Result<String, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/api/auth/validate", self.url()))
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            anyhow::bail!("Token exchange returned {}", status);
        }

        let body: serde_json::Value = response.json().await?;
        body["sessionToken"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Response has no sessionToken: {}", body))
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends
        self._handle.abort();
    }
}
