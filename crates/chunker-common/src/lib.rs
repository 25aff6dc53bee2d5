//! Chunker Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types and utilities for the csv-chunker workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Checksums**: content signatures for source files
//! - **Types**: the import status vocabulary shared with downstream workers
//!
//! # Example
//!
//! ```no_run
//! use chunker_common::checksum::file_signature;
//!
//! fn main() -> chunker_common::Result<()> {
//!     let signature = file_signature("clients.csv")?;
//!     println!("signature: {}", signature);
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{CommonError, Result};
pub use types::ImportStatus;
