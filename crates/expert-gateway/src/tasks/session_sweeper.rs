//! Expired session sweeper.
//!
//! Sessions are evicted lazily when presented after expiry. Sessions that
//! are never presented again would otherwise stay in memory, so this task
//! removes them periodically.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is cancelled. A sweep that is
//! already running completes first.

use crate::auth::TokenAuthority;
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Run one sweep and refresh the store gauges. Returns the number removed.
pub fn run_sweep(authority: &TokenAuthority) -> usize {
    let removed = authority.sweep_expired_sessions();

    metrics::record_sessions_swept(removed);
    metrics::set_token_store_sizes(
        authority.active_session_count(),
        authority.unused_token_count(),
    );

    if removed > 0 {
        info!(
            target: "gw.task.session_sweeper",
            removed = removed,
            "Swept expired sessions"
        );
    } else {
        debug!(target: "gw.task.session_sweeper", "No expired sessions");
    }

    removed
}

/// Start the session sweeper.
///
/// # Arguments
///
/// * `authority` - The process-wide token authority
/// * `interval` - Time between sweeps; must be non-zero
/// * `cancel_token` - Token for graceful shutdown
///
/// # Returns
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "gw.task.session_sweeper")]
pub async fn start_session_sweeper(
    authority: Arc<TokenAuthority>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "gw.task.session_sweeper",
        interval_seconds = interval.as_secs(),
        "Starting session sweeper"
    );

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; nothing can have expired yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweep(&authority);
            }
            _ = cancel_token.cancelled() => {
                info!(target: "gw.task.session_sweeper", "Session sweeper stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::ManualClock;

    fn authority_with_clock(tokens: &[&str]) -> (Arc<TokenAuthority>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let authority = TokenAuthority::with_options(
            tokens.iter().copied(),
            Duration::from_secs(60),
            clock.clone(),
        )
        .unwrap();
        (Arc::new(authority), clock)
    }

    #[test]
    fn test_run_sweep_removes_only_expired() {
        let (authority, clock) = authority_with_clock(&["a", "b"]);
        let old = authority.consume_one_time_token("a").unwrap();
        clock.advance(chrono::Duration::seconds(30));
        let fresh = authority.consume_one_time_token("b").unwrap();
        clock.advance(chrono::Duration::seconds(31));

        assert_eq!(run_sweep(&authority), 1);
        assert!(!authority.validate_session(&old));
        assert!(authority.validate_session(&fresh));
        assert_eq!(authority.active_session_count(), 1);
    }

    #[test]
    fn test_run_sweep_with_nothing_expired() {
        let (authority, _clock) = authority_with_clock(&["a"]);
        authority.consume_one_time_token("a").unwrap();

        assert_eq!(run_sweep(&authority), 0);
        assert_eq!(authority.active_session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let (authority, clock) = authority_with_clock(&["a"]);
        authority.consume_one_time_token("a").unwrap();
        clock.advance(chrono::Duration::seconds(61));

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(start_session_sweeper(
            authority.clone(),
            Duration::from_secs(10),
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(authority.active_session_count(), 0);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let (authority, _clock) = authority_with_clock(&["a"]);
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(start_session_sweeper(
            authority,
            Duration::from_secs(3600),
            cancel_token.clone(),
        ));

        cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop promptly")
            .unwrap();
    }
}
