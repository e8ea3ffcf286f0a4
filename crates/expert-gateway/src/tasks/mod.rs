//! Background tasks for the Expert Gateway.
//!
//! # Tasks
//!
//! - `session_sweeper` - Removes expired sessions nobody presented again

pub mod session_sweeper;

pub use session_sweeper::{run_sweep, start_session_sweeper};
