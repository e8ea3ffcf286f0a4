//! # Gateway Test Utilities
//!
//! Shared test utilities for the Expert Gateway.
//!
//! This crate provides:
//! - Server test harness (`TestGatewayServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestGatewayServer::spawn(&["abc123"]).await?;
//!     let session = server.exchange("abc123").await?;
//!
//!     let response = reqwest::Client::new()
//!         .post(format!("{}/api/auth/logout", server.url()))
//!         .bearer_auth(&session)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 204);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
