//! Address Import Common Library
//!
//! Shared error handling and logging for the address import workspace.
//!
//! - **Error Handling**: [`AddrError`] and the [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`]
//!
//! # Example
//!
//! ```no_run
//! use addr_common::{AddrError, Result};
//!
//! fn require_dataset(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(AddrError::Config("dataset name is empty".into()));
//!     }
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{AddrError, Result};
