//! # Rostik Platform
//!
//! Core platform types for the rostik RouterOS API client ecosystem.
//!
//! This crate provides:
//! - Unified error types (`RostikError`, `RostikResult`)
//! - The device failure record carried by `!trap`/`!fatal` replies
//!
//! # Examples
//!
//! ```
//! use rostik_platform::{RostikError, RostikResult};
//!
//! fn example_function() -> RostikResult<String> {
//!     Ok("Hello, rostik!".to_string())
//! }
//!
//! # fn main() -> RostikResult<()> {
//! let result = example_function()?;
//! assert_eq!(result, "Hello, rostik!");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{DeviceFailure, RostikError, RostikResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
