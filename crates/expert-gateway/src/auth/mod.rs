//! Session authentication for the gateway.
//!
//! Clients hold an out-of-band one-time token which they exchange, exactly
//! once, for a session token. The session token then authenticates every
//! protected call until it expires or is revoked.
//!
//! # Components
//!
//! - `token_authority` - In-memory one-time token and session stores
//! - `clock` - Injectable time source used for expiry checks

pub mod clock;
pub mod token_authority;

pub use clock::{Clock, ManualClock, SystemClock};
pub use token_authority::{
    AuthorityError, SessionStatus, TokenAuthority, DEFAULT_SESSION_LIFETIME,
};
