//! Chunk writer
//!
//! Buffers normalized records and writes them out as JSON array files of at
//! most `rows_per_chunk` records, named `<signature>_<index>.json` with a
//! zero-based, gap-free index in write order.
//!
//! Each file is written to a temporary file in the chunk directory and
//! renamed into place once complete, so a chunk file is either absent or
//! whole.

use crate::config::Signature;
use crate::error::{ChunkError, Result};
use crate::normalizer::NormalizedRecord;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// What the writer produced, in write order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenChunks {
    pub chunk_files: Vec<String>,
    pub total_rows: u64,
}

pub struct ChunkWriter {
    dir: PathBuf,
    signature: Signature,
    rows_per_chunk: usize,
    buffer: Vec<NormalizedRecord>,
    written: WrittenChunks,
}

impl ChunkWriter {
    /// Create the chunk directory if needed and start an empty chunk set
    pub fn create(dir: impl Into<PathBuf>, signature: Signature, rows_per_chunk: usize) -> Result<Self> {
        if rows_per_chunk == 0 {
            return Err(ChunkError::config("rows_per_chunk must be greater than 0"));
        }

        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(directory = %dir.display(), "Chunk directory ready");

        Ok(Self {
            dir,
            signature,
            rows_per_chunk,
            buffer: Vec::with_capacity(rows_per_chunk),
            written: WrittenChunks::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append a record, writing a chunk file as soon as the buffer is full
    pub fn push(&mut self, record: NormalizedRecord) -> Result<()> {
        self.buffer.push(record);
        self.written.total_rows += 1;

        if self.buffer.len() >= self.rows_per_chunk {
            self.flush()?;
        }
        Ok(())
    }

    /// Write any remaining records as a final, possibly short, chunk
    pub fn finish(mut self) -> Result<WrittenChunks> {
        self.flush()?;
        Ok(self.written)
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let index = self.written.chunk_files.len();
        let file_name = self.signature.chunk_file_name(index);
        write_chunk_file(&self.dir, &file_name, &self.buffer)?;

        info!(
            chunk_index = index,
            file = %file_name,
            rows = self.buffer.len(),
            "Chunk written"
        );

        self.written.chunk_files.push(file_name);
        self.buffer.clear();
        Ok(())
    }
}

fn write_chunk_file(dir: &Path, file_name: &str, records: &[NormalizedRecord]) -> Result<()> {
    let mut writer = BufWriter::new(temp_chunk_file(dir)?);
    serde_json::to_writer(&mut writer, records)?;
    writer.flush()?;

    let temp = writer.into_inner().map_err(|e| e.into_error())?;
    temp.persist(dir.join(file_name))?;
    Ok(())
}

fn temp_chunk_file(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".chunk-").suffix(".tmp");

    // Downstream workers may run as a different user.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }

    builder.tempfile_in(dir)
}
