//! Chunk manifest stored in the import row's `data` column

use crate::config::{ChunkSettings, Signature};
use crate::error::{ChunkError, Result};
use crate::normalizer::NormalizedRecord;
use crate::writer::WrittenChunks;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Description of a completed chunk set
///
/// `chunks_directory` is relative to the storage root, which is how the
/// workers resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub chunks_directory: String,
    pub total_chunks: usize,
    pub total_rows: u64,
    pub rows_per_chunk: usize,
    pub chunk_files: Vec<String>,
    pub chunked_at: DateTime<Utc>,
}

impl ChunkManifest {
    pub fn new(signature: &Signature, rows_per_chunk: usize, written: WrittenChunks) -> Self {
        Self {
            chunks_directory: ChunkSettings::manifest_dir(signature),
            total_chunks: written.chunk_files.len(),
            total_rows: written.total_rows,
            rows_per_chunk,
            chunk_files: written.chunk_files,
            chunked_at: Utc::now(),
        }
    }

    /// Path of the chunk at `index` under `storage_root`
    pub fn chunk_path(&self, storage_root: impl AsRef<Path>, index: usize) -> Result<PathBuf> {
        let file_name = self.chunk_files.get(index).ok_or_else(|| {
            ChunkError::config(format!(
                "chunk index {} out of range, manifest has {} chunks",
                index, self.total_chunks
            ))
        })?;

        if self.chunks_directory.contains("..") || file_name.contains("..") {
            return Err(ChunkError::config(format!(
                "refusing path outside the chunk directory: {}/{}",
                self.chunks_directory, file_name
            )));
        }

        Ok(storage_root
            .as_ref()
            .join(&self.chunks_directory)
            .join(file_name))
    }

    /// Read back the records of one chunk
    pub fn load_chunk(
        &self,
        storage_root: impl AsRef<Path>,
        index: usize,
    ) -> Result<Vec<NormalizedRecord>> {
        let path = self.chunk_path(storage_root, index)?;
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// `data` payload written when a run fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureData {
    pub error: String,
}

impl FailureData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
