//! chatpull Common Library
//!
//! Shared utilities and error handling for the chatpull workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and its [`Result`] alias
//! - **Checksums**: streaming SHA-256 for sink integrity
//! - **Credentials**: hub token resolution from explicit values, environment or token file
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use chatpull_common::checksum::compute_file_checksum;
//!
//! fn fingerprint(path: &str) -> chatpull_common::Result<()> {
//!     let digest = compute_file_checksum(path)?;
//!     println!("sha256: {}", digest);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod credentials;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use credentials::HubToken;
pub use error::{CommonError, Result};
