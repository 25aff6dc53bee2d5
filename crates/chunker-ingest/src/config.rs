//! Run configuration
//!
//! Everything a run needs is carried in [`RunConfig`] and handed to
//! [`crate::pipeline::execute`]. The credentials file is parsed into a
//! [`StoreConfig`] without touching the process environment.

use crate::error::{ChunkError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Store host used when the credentials file has no `DB_HOST`.
pub const DEFAULT_DB_HOST: &str = "127.0.0.1";

/// Store port used when the credentials file has no `DB_PORT`.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Records per chunk file.
pub const DEFAULT_ROWS_PER_CHUNK: usize = 5000;

/// Raw rows pulled from the source per read batch.
pub const DEFAULT_READ_BATCH_SIZE: usize = 10_000;

/// Root under which `chunks/<signature>/` is created.
pub const DEFAULT_STORAGE_ROOT: &str = "./storage/app";

/// Directory under the storage root that holds every chunk set.
pub const CHUNKS_DIR_NAME: &str = "chunks";

const MAX_SIGNATURE_LEN: usize = 255;

/// Connection parameters for the import store
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl StoreConfig {
    /// Load credentials from a dotenv-style key/value file
    ///
    /// Reads `DB_HOST`, `DB_PORT`, `DB_DATABASE`, `DB_USERNAME` and
    /// `DB_PASSWORD`. Host and port fall back to defaults; the rest are
    /// required.
    pub fn from_credentials_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path).map_err(|e| {
            ChunkError::config(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut values = HashMap::new();
        for entry in entries {
            let (key, value) = entry.map_err(|e| {
                ChunkError::config(format!(
                    "invalid line in credentials file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            values.insert(key, value);
        }

        Self::from_values(&values)
    }

    /// Build from already-parsed key/value pairs
    pub fn from_values(values: &HashMap<String, String>) -> Result<Self> {
        let port = match values.get("DB_PORT").map(|p| p.trim()) {
            None | Some("") => DEFAULT_DB_PORT,
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| ChunkError::config(format!("DB_PORT is not a valid port: {}", raw)))?,
        };

        let host = values
            .get("DB_HOST")
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_DB_HOST)
            .to_string();

        Ok(Self {
            host,
            port,
            database: required(values, "DB_DATABASE")?,
            username: required(values, "DB_USERNAME")?,
            password: values
                .get("DB_PASSWORD")
                .cloned()
                .ok_or_else(|| ChunkError::config("DB_PASSWORD is not set in credentials file"))?,
        })
    }
}

fn required(values: &HashMap<String, String>, key: &str) -> Result<String> {
    values
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ChunkError::config(format!("{} is not set in credentials file", key)))
}

/// Name of one chunk set: its directory and the prefix of every chunk file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Signature(String);

impl Signature {
    /// Accepts a single path component made of `[A-Za-z0-9._-]`
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SIGNATURE_LEN
            && raw != "."
            && raw != ".."
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

        if valid {
            Ok(Self(raw))
        } else {
            Err(ChunkError::InvalidSignature(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the chunk at `index`, e.g. `abc_0.json`
    pub fn chunk_file_name(&self, index: usize) -> String {
        format!("{}_{}.json", self.0, index)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Signature {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Tunables for the read/write pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSettings {
    pub storage_root: PathBuf,
    pub rows_per_chunk: usize,
    /// Internal read batch; bounds memory, does not affect output
    pub read_batch_size: usize,
    /// Hash the source and compare it with the signature before chunking
    pub verify_signature: bool,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            rows_per_chunk: DEFAULT_ROWS_PER_CHUNK,
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            verify_signature: false,
        }
    }
}

impl ChunkSettings {
    pub fn validate(&self) -> Result<()> {
        if self.rows_per_chunk == 0 {
            return Err(ChunkError::config("rows_per_chunk must be greater than 0"));
        }
        if self.read_batch_size == 0 {
            return Err(ChunkError::config("read_batch_size must be greater than 0"));
        }
        Ok(())
    }

    /// Absolute-or-relative directory the chunk files are written to
    pub fn chunks_dir(&self, signature: &Signature) -> PathBuf {
        self.storage_root
            .join(CHUNKS_DIR_NAME)
            .join(signature.as_str())
    }

    /// Directory as recorded in the manifest, relative to the storage root
    pub fn manifest_dir(signature: &Signature) -> String {
        format!("{}/{}", CHUNKS_DIR_NAME, signature)
    }
}

/// Everything one chunking run needs
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub import_id: String,
    pub source: PathBuf,
    pub signature: Signature,
    pub settings: ChunkSettings,
    pub store: StoreConfig,
}
