//! Chunker Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Splits a large CSV of client records into JSON chunk files and publishes
//! the resulting manifest on the import's row in the shared store, where the
//! per-chunk workers pick it up.
//!
//! # Modules
//!
//! - [`normalizer`]: streaming CSV reader producing `{company, email, phone}` records
//! - [`writer`]: fixed-size chunk files under `<storage-root>/chunks/<signature>/`
//! - [`manifest`]: the `data` payload describing a chunk set
//! - [`store`]: the two status updates against the `imports` table
//! - [`pipeline`]: one run from source file to published status
//!
//! # Example
//!
//! ```no_run
//! use chunker_ingest::config::{ChunkSettings, RunConfig, Signature, StoreConfig};
//! use chunker_ingest::pipeline;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RunConfig {
//!         import_id: "42".to_string(),
//!         source: "uploads/clients.csv".into(),
//!         signature: Signature::new("9f86d081884c7d65")?,
//!         settings: ChunkSettings::default(),
//!         store: StoreConfig::from_credentials_file(".env")?,
//!     };
//!
//!     let manifest = pipeline::execute(&config).await?;
//!     println!("{} chunks", manifest.total_chunks);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod manifest;
pub mod normalizer;
pub mod pipeline;
pub mod store;
pub mod writer;

pub use error::{ChunkError, Result};
