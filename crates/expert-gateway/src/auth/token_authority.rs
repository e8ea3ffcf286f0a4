//! One-time token exchange and session tracking.
//!
//! Two concurrent stores back the authority:
//!
//! - a set of one-time tokens that have never been consumed
//! - a map from session id to its absolute expiry
//!
//! # Guarantees
//!
//! - Consuming a one-time token is a single atomic remove on the set, so of
//!   any number of concurrent callers presenting the same token at most one
//!   receives a session.
//! - Sessions have a fixed expiry set at issuance. Validation never extends
//!   it.
//! - Expired sessions are evicted when they are next validated. A periodic
//!   sweep (see `tasks::session_sweeper`) may also evict them, but nothing
//!   relies on it.
//! - Failures never reveal whether a one-time token existed before.
//!
//! All state lives in memory and is lost on restart.

use super::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default session lifetime (4 hours).
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(4 * 60 * 60);

/// Errors raised while constructing a [`TokenAuthority`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("No one-time tokens configured; no client could ever authenticate")]
    NoOneTimeTokens,

    #[error("Invalid session lifetime: {0}")]
    InvalidSessionLifetime(String),
}

/// Result of looking up a session id.
///
/// Only [`SessionStatus::Valid`] authenticates a request. The other variants
/// exist for logging and metrics and must never be reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Present and not yet expired.
    Valid,
    /// Blank, never issued, revoked or already evicted.
    Unknown,
    /// Present but past its expiry. The entry has been evicted.
    Expired,
}

impl SessionStatus {
    /// Returns true only for a live session.
    pub fn is_valid(self) -> bool {
        matches!(self, SessionStatus::Valid)
    }

    /// Label used for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Valid => "valid",
            SessionStatus::Unknown => "invalid",
            SessionStatus::Expired => "expired",
        }
    }
}

/// Issues and checks session tokens in exchange for one-time tokens.
///
/// Constructed once at startup and shared via `Arc`. Every method takes
/// `&self`; callers never need an external lock.
pub struct TokenAuthority {
    one_time_tokens: DashSet<String>,
    sessions: DashMap<String, DateTime<Utc>>,
    session_lifetime: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    /// Create an authority with the default lifetime and the system clock.
    ///
    /// Each token is trimmed; blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError::NoOneTimeTokens` if no usable token remains.
    pub fn new<I, S>(tokens: I) -> Result<Self, AuthorityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_options(tokens, DEFAULT_SESSION_LIFETIME, Arc::new(SystemClock))
    }

    /// Create an authority with an explicit session lifetime and clock.
    ///
    /// # Errors
    ///
    /// - `AuthorityError::NoOneTimeTokens` if no usable token remains
    /// - `AuthorityError::InvalidSessionLifetime` if the lifetime is zero or
    ///   too large to represent
    pub fn with_options<I, S>(
        tokens: I,
        session_lifetime: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthorityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if session_lifetime.is_zero() {
            return Err(AuthorityError::InvalidSessionLifetime(
                "session lifetime must be greater than zero".to_string(),
            ));
        }

        let session_lifetime = chrono::Duration::from_std(session_lifetime)
            .map_err(|e| AuthorityError::InvalidSessionLifetime(e.to_string()))?;

        if clock.now().checked_add_signed(session_lifetime).is_none() {
            return Err(AuthorityError::InvalidSessionLifetime(
                "session lifetime overflows the representable date range".to_string(),
            ));
        }

        let one_time_tokens: DashSet<String> = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if one_time_tokens.is_empty() {
            return Err(AuthorityError::NoOneTimeTokens);
        }

        Ok(Self {
            one_time_tokens,
            sessions: DashMap::new(),
            session_lifetime,
            clock,
        })
    }

    /// Exchange a one-time token for a new session id.
    ///
    /// Returns `None` for blank input, unknown tokens and tokens that have
    /// already been used. Nothing changes when `None` is returned.
    pub fn consume_one_time_token(&self, token: &str) -> Option<String> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        // Computed before the removal so an unrepresentable expiry leaves the
        // token in place.
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.session_lifetime)?;

        // The check and the removal are the same operation.
        self.one_time_tokens.remove(token)?;

        let session_id = Uuid::new_v4().simple().to_string();
        self.sessions.insert(session_id.clone(), expires_at);

        Some(session_id)
    }

    /// Returns true if `session_token` names a live session.
    pub fn validate_session(&self, session_token: &str) -> bool {
        self.session_status(session_token).is_valid()
    }

    /// Look up a session, evicting it if it has expired.
    pub fn session_status(&self, session_token: &str) -> SessionStatus {
        let session_token = session_token.trim();
        if session_token.is_empty() {
            return SessionStatus::Unknown;
        }

        let now = self.clock.now();

        // Copy the expiry out so the shard guard is released before any removal.
        let Some(expires_at) = self.sessions.get(session_token).map(|e| *e.value()) else {
            return SessionStatus::Unknown;
        };

        if expires_at <= now {
            self.sessions
                .remove_if(session_token, |_, expiry| *expiry <= now);
            return SessionStatus::Expired;
        }

        SessionStatus::Valid
    }

    /// Remove a session. Unknown or blank ids are ignored.
    ///
    /// Returns true if a session was removed.
    pub fn revoke_session(&self, session_token: &str) -> bool {
        let session_token = session_token.trim();
        if session_token.is_empty() {
            return false;
        }

        self.sessions.remove(session_token).is_some()
    }

    /// Returns true if `token` is still available for exchange. Read-only.
    pub fn is_one_time_token_unused(&self, token: &str) -> bool {
        let token = token.trim();
        !token.is_empty() && self.one_time_tokens.contains(token)
    }

    /// Remove every expired session and return how many were removed.
    pub fn sweep_expired_sessions(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        self.sessions.retain(|_, expires_at| {
            if *expires_at > now {
                true
            } else {
                removed += 1;
                false
            }
        });

        removed
    }

    /// Number of one-time tokens not yet exchanged.
    pub fn unused_token_count(&self) -> usize {
        self.one_time_tokens.len()
    }

    /// Number of sessions currently stored, including expired ones that
    /// have not been evicted yet.
    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Lifetime given to newly issued sessions.
    pub fn session_lifetime(&self) -> Duration {
        self.session_lifetime.to_std().unwrap_or(DEFAULT_SESSION_LIFETIME)
    }
}

/// Only sizes are shown; token values never appear in Debug output.
impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("unused_one_time_tokens", &self.one_time_tokens.len())
            .field("sessions", &self.sessions.len())
            .field("session_lifetime", &self.session_lifetime)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn authority_with_clock(tokens: &[&str]) -> (TokenAuthority, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let authority =
            TokenAuthority::with_options(tokens.iter(), DEFAULT_SESSION_LIFETIME, clock.clone())
                .expect("authority should build");
        (authority, clock)
    }

    #[test]
    fn test_exchange_scenario() {
        let authority = TokenAuthority::new(["abc123"]).unwrap();

        let session = authority
            .consume_one_time_token("abc123")
            .expect("first exchange should succeed");

        assert_eq!(session.len(), 32);
        assert!(session.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(authority.consume_one_time_token("abc123"), None);
        assert!(authority.validate_session(&session));
        assert!(!authority.validate_session("garbage"));
    }

    #[test]
    fn test_unknown_token_leaves_sessions_untouched() {
        let authority = TokenAuthority::new(["abc123"]).unwrap();

        for candidate in ["nope", "ABC123", "abc1234", "abc", "", "   "] {
            assert_eq!(authority.consume_one_time_token(candidate), None);
        }

        assert_eq!(authority.active_session_count(), 0);
        assert_eq!(authority.unused_token_count(), 1);
    }

    #[test]
    fn test_token_is_trimmed_before_lookup() {
        let authority = TokenAuthority::new(["abc123"]).unwrap();

        let session = authority.consume_one_time_token("  abc123\t\n");
        assert!(session.is_some());
        assert!(!authority.is_one_time_token_unused("abc123"));
    }

    #[test]
    fn test_tokens_are_independent() {
        let authority = TokenAuthority::new(["tok1", "tok2"]).unwrap();

        assert!(authority.consume_one_time_token("tok1").is_some());

        assert!(authority.is_one_time_token_unused("tok2"));
        assert!(authority.consume_one_time_token("tok2").is_some());
        assert_eq!(authority.unused_token_count(), 0);
    }

    #[test]
    fn test_each_exchange_issues_distinct_session() {
        let authority = TokenAuthority::new(["a", "b", "c"]).unwrap();

        let s1 = authority.consume_one_time_token("a").unwrap();
        let s2 = authority.consume_one_time_token("b").unwrap();
        let s3 = authority.consume_one_time_token("c").unwrap();

        assert_ne!(s1, s2);
        assert_ne!(s2, s3);
        assert_ne!(s1, s3);
        assert_eq!(authority.active_session_count(), 3);
    }

    #[test]
    fn test_session_valid_until_lifetime_elapses() {
        let (authority, clock) = authority_with_clock(&["abc123"]);
        let session = authority.consume_one_time_token("abc123").unwrap();

        clock.advance(chrono::Duration::hours(3) + chrono::Duration::minutes(59));
        assert!(authority.validate_session(&session));

        clock.advance(chrono::Duration::minutes(2));
        assert_eq!(authority.session_status(&session), SessionStatus::Expired);

        // Entry was evicted by the previous check.
        assert_eq!(authority.session_status(&session), SessionStatus::Unknown);
        assert!(!authority.validate_session(&session));
        assert_eq!(authority.active_session_count(), 0);
    }

    #[test]
    fn test_session_invalid_exactly_at_expiry() {
        let (authority, clock) = authority_with_clock(&["abc123"]);
        let session = authority.consume_one_time_token("abc123").unwrap();

        clock.advance(chrono::Duration::hours(4));
        assert!(!authority.validate_session(&session));
    }

    #[test]
    fn test_validation_does_not_extend_expiry() {
        let (authority, clock) = authority_with_clock(&["abc123"]);
        let session = authority.consume_one_time_token("abc123").unwrap();

        for _ in 0..3 {
            clock.advance(chrono::Duration::hours(1));
            assert!(authority.validate_session(&session));
        }

        clock.advance(chrono::Duration::hours(1));
        assert!(!authority.validate_session(&session));
    }

    #[test]
    fn test_revoke_invalidates_session() {
        let authority = TokenAuthority::new(["abc123"]).unwrap();
        let session = authority.consume_one_time_token("abc123").unwrap();

        assert!(authority.revoke_session(&session));
        assert!(!authority.validate_session(&session));

        // Revoking again, or revoking garbage, is a silent no-op.
        assert!(!authority.revoke_session(&session));
        assert!(!authority.revoke_session("garbage"));
        assert!(!authority.revoke_session("   "));
    }

    #[test]
    fn test_blank_session_is_invalid() {
        let authority = TokenAuthority::new(["abc123"]).unwrap();

        assert!(!authority.validate_session(""));
        assert!(!authority.validate_session(" \t "));
    }

    #[test]
    fn test_is_one_time_token_unused_has_no_side_effect() {
        let authority = TokenAuthority::new(["abc123"]).unwrap();

        assert!(authority.is_one_time_token_unused(" abc123 "));
        assert!(authority.is_one_time_token_unused("abc123"));
        assert!(!authority.is_one_time_token_unused(""));
        assert!(!authority.is_one_time_token_unused("other"));

        assert!(authority.consume_one_time_token("abc123").is_some());
        assert!(!authority.is_one_time_token_unused("abc123"));
    }

    #[test]
    fn test_sweep_removes_only_expired_sessions() {
        let (authority, clock) = authority_with_clock(&["old", "new"]);

        let old = authority.consume_one_time_token("old").unwrap();
        clock.advance(chrono::Duration::hours(2));
        let new = authority.consume_one_time_token("new").unwrap();
        clock.advance(chrono::Duration::hours(3));

        assert_eq!(authority.sweep_expired_sessions(), 1);
        assert_eq!(authority.active_session_count(), 1);
        assert_eq!(authority.session_status(&old), SessionStatus::Unknown);
        assert!(authority.validate_session(&new));

        assert_eq!(authority.sweep_expired_sessions(), 0);
    }

    #[test]
    fn test_custom_session_lifetime() {
        let clock = Arc::new(ManualClock::new());
        let authority =
            TokenAuthority::with_options(["abc123"], Duration::from_secs(60), clock.clone())
                .unwrap();
        let session = authority.consume_one_time_token("abc123").unwrap();

        assert_eq!(authority.session_lifetime(), Duration::from_secs(60));

        clock.advance(chrono::Duration::seconds(59));
        assert!(authority.validate_session(&session));
        clock.advance(chrono::Duration::seconds(1));
        assert!(!authority.validate_session(&session));
    }

    #[test]
    fn test_construction_requires_a_token() {
        let empty: [&str; 0] = [];
        assert_eq!(
            TokenAuthority::new(empty).unwrap_err(),
            AuthorityError::NoOneTimeTokens
        );
        assert_eq!(
            TokenAuthority::new(["", "  ", "\t"]).unwrap_err(),
            AuthorityError::NoOneTimeTokens
        );
    }

    #[test]
    fn test_construction_rejects_zero_lifetime() {
        let result =
            TokenAuthority::with_options(["abc123"], Duration::ZERO, Arc::new(SystemClock));
        assert!(matches!(
            result,
            Err(AuthorityError::InvalidSessionLifetime(_))
        ));
    }

    #[test]
    fn test_construction_rejects_lifetime_past_date_range() {
        let result = TokenAuthority::with_options(
            ["abc123"],
            Duration::from_secs(9_000_000_000_000),
            Arc::new(SystemClock),
        );
        assert!(matches!(
            result,
            Err(AuthorityError::InvalidSessionLifetime(_))
        ));
    }

    #[test]
    fn test_consume_with_unrepresentable_expiry_keeps_token() {
        let (authority, clock) = authority_with_clock(&["abc123"]);
        clock.set(DateTime::<Utc>::MAX_UTC - chrono::Duration::seconds(1));

        assert_eq!(authority.consume_one_time_token("abc123"), None);
        assert!(authority.is_one_time_token_unused("abc123"));
        assert_eq!(authority.active_session_count(), 0);

        clock.set(Utc::now());
        assert!(authority.consume_one_time_token("abc123").is_some());
    }

    #[test]
    fn test_construction_deduplicates_and_trims() {
        let authority = TokenAuthority::new([" abc ", "abc", "def"]).unwrap();
        assert_eq!(authority.unused_token_count(), 2);
        assert!(authority.is_one_time_token_unused("abc"));
    }

    #[test]
    fn test_concurrent_consume_has_single_winner() {
        let authority = TokenAuthority::new(["race-me", "bystander"]).unwrap();
        let winners = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..64 {
                scope.spawn(|| {
                    if authority.consume_one_time_token("race-me").is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(authority.active_session_count(), 1);
        assert!(authority.is_one_time_token_unused("bystander"));
    }

    #[test]
    fn test_debug_does_not_leak_tokens() {
        let authority = TokenAuthority::new(["super-secret-token"]).unwrap();
        let session = authority
            .consume_one_time_token("super-secret-token")
            .unwrap();

        let debug_output = format!("{:?}", authority);
        assert!(!debug_output.contains("super-secret-token"));
        assert!(!debug_output.contains(&session));
        assert!(debug_output.contains("sessions"));
    }
}
