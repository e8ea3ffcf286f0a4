//! Expert Gateway
//!
//! Entry point for the Expert Finder backend.

use expert_gateway::auth::{SystemClock, TokenAuthority};
use expert_gateway::config::Config;
use expert_gateway::observability::metrics::init_metrics_recorder;
use expert_gateway::routes::{self, AppState};
use expert_gateway::services::{GoogleSearchClient, MarkdownRenderer, OpenAiClient};
use expert_gateway::tasks::start_session_sweeper;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default drain period after a shutdown signal.
const DEFAULT_DRAIN_SECONDS: u64 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expert_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Expert Gateway");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        one_time_tokens = config.auth_tokens.len(),
        session_lifetime_seconds = config.session_lifetime_seconds,
        session_sweep_interval_seconds = config.session_sweep_interval_seconds,
        cors_enabled = config.frontend_url.is_some(),
        "Configuration loaded successfully"
    );

    // Build the token authority; no tokens means nobody could ever log in
    let authority = TokenAuthority::with_options(
        &config.auth_tokens,
        Duration::from_secs(config.session_lifetime_seconds),
        Arc::new(SystemClock),
    )
    .map_err(|e| {
        error!("Failed to initialize token authority: {}", e);
        e
    })?;
    let authority = Arc::new(authority);

    // Initialize Prometheus metrics recorder
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Upstream clients
    let llm = OpenAiClient::new(
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    )?;
    let search = GoogleSearchClient::new(
        config.google_search_base_url.clone(),
        config.google_api_key.clone(),
        config.google_search_engine_id.clone(),
    )?;

    // Background tasks share one cancellation token
    let cancel_token = CancellationToken::new();
    let sweeper_handle = if config.session_sweep_interval_seconds > 0 {
        Some(tokio::spawn(start_session_sweeper(
            authority.clone(),
            Duration::from_secs(config.session_sweep_interval_seconds),
            cancel_token.clone(),
        )))
    } else {
        info!("Session sweeper disabled (SESSION_SWEEP_INTERVAL_SECONDS=0)");
        None
    };

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        authority,
        llm: Arc::new(llm),
        search: Arc::new(search),
        markdown: Arc::new(MarkdownRenderer::new()),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Expert Gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            warn!("Session sweeper task failed: {}", e);
        }
    }

    info!("Expert Gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("GATEWAY_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_DRAIN_SECONDS);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (GATEWAY_DRAIN_SECONDS=0)");
    }
}
