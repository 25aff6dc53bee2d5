//! Streaming record normalizer
//!
//! Reads the source CSV in fixed-size batches and yields one
//! [`NormalizedRecord`] per well-formed row. Only the `company`, `email` and
//! `phone` columns are looked at; every other column is ignored. Peak memory
//! is one batch of records plus the reader's fixed input buffer, whatever the
//! size of the file.
//!
//! Rows that cannot be parsed (wrong field count, invalid UTF-8) are logged
//! and skipped. I/O failures underneath the reader end the sequence with an
//! error.

use crate::error::{ChunkError, Result};
use csv::{ErrorKind, ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Size of the reader's input buffer in bytes
const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// Log progress at `info` every this many batches
const PROGRESS_EVERY_BATCHES: u64 = 10;

/// Upper bound on up-front batch allocation
const MAX_BATCH_PREALLOC: usize = 16 * 1024;

/// Raw values that mean "no value" and normalize to an empty string
const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One source row reduced to the three tracked fields
///
/// All three fields are always present; a missing or null source value is
/// the empty string, never `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub company: String,
    pub email: String,
    pub phone: String,
}

/// Normalize a single raw cell
///
/// `None` (column absent) and null tokens become `""`; anything else is
/// trimmed of surrounding whitespace.
pub fn normalize_value(raw: Option<&str>) -> String {
    match raw {
        None => String::new(),
        Some(value) if NULL_TOKENS.contains(&value) => String::new(),
        Some(value) => value.trim().to_string(),
    }
}

/// Positions of the tracked columns in the header row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldColumns {
    company: Option<usize>,
    email: Option<usize>,
    phone: Option<usize>,
}

impl FieldColumns {
    fn from_headers(headers: &StringRecord) -> Self {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == name)
        };

        Self {
            company: position("company"),
            email: position("email"),
            phone: position("phone"),
        }
    }

    fn normalize(&self, row: &StringRecord) -> NormalizedRecord {
        let cell = |column: Option<usize>| normalize_value(column.and_then(|i| row.get(i)));

        NormalizedRecord {
            company: cell(self.company),
            email: cell(self.email),
            phone: cell(self.phone),
        }
    }
}

/// Progress counters, exposed for logging only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizerStats {
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub batches_read: u64,
}

/// Lazy, single-pass sequence of normalized records
pub struct RecordNormalizer<R: Read> {
    reader: csv::Reader<R>,
    columns: FieldColumns,
    batch_size: usize,
    pending: std::vec::IntoIter<NormalizedRecord>,
    row: StringRecord,
    stats: NormalizerStats,
    exhausted: bool,
}

impl RecordNormalizer<File> {
    /// Open a source file, failing with [`ChunkError::SourceNotFound`] if it
    /// does not exist
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ChunkError::SourceNotFound(path.to_path_buf()),
            _ => ChunkError::Io(e),
        })?;

        Self::from_reader(file, batch_size)
    }
}

impl<R: Read> RecordNormalizer<R> {
    /// Wrap any reader; the first row is taken as the header
    pub fn from_reader(source: R, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ChunkError::config("read batch size must be greater than 0"));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .buffer_capacity(READ_BUFFER_CAPACITY)
            .from_reader(source);

        let columns = FieldColumns::from_headers(reader.headers()?);
        if columns == FieldColumns::default() {
            warn!("Source has none of the company/email/phone columns; every record will be empty");
        } else {
            debug!(?columns, "Resolved source columns");
        }

        Ok(Self {
            reader,
            columns,
            batch_size,
            pending: Vec::new().into_iter(),
            row: StringRecord::new(),
            stats: NormalizerStats::default(),
            exhausted: false,
        })
    }

    pub fn stats(&self) -> NormalizerStats {
        self.stats
    }

    /// Read up to `batch_size` rows into `pending`
    fn fill_batch(&mut self) -> Result<()> {
        let mut batch = Vec::with_capacity(self.batch_size.min(MAX_BATCH_PREALLOC));

        while batch.len() < self.batch_size {
            match self.reader.read_record(&mut self.row) {
                Ok(true) => {
                    self.stats.rows_read += 1;
                    batch.push(self.columns.normalize(&self.row));
                },
                Ok(false) => {
                    self.exhausted = true;
                    break;
                },
                Err(err) => match err.kind() {
                    ErrorKind::Utf8 { .. } | ErrorKind::UnequalLengths { .. } => {
                        self.stats.rows_skipped += 1;
                        let skipped = ChunkError::MalformedRow {
                            line: err.position().map(|p| p.line()).unwrap_or_default(),
                            reason: err.to_string(),
                        };
                        warn!(error = %skipped, "Skipping malformed row");
                    },
                    _ => return Err(err.into()),
                },
            }
        }

        if !batch.is_empty() {
            self.stats.batches_read += 1;
            let NormalizerStats {
                rows_read,
                rows_skipped,
                batches_read,
            } = self.stats;

            if batches_read % PROGRESS_EVERY_BATCHES == 0 {
                info!(batch = batches_read, rows_read, rows_skipped, "Source read progress");
            } else {
                debug!(batch = batches_read, rows = batch.len(), rows_read, "Read source batch");
            }
        }

        self.pending = batch.into_iter();
        Ok(())
    }
}

impl<R: Read> Iterator for RecordNormalizer<R> {
    type Item = Result<NormalizedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(Ok(record));
            }
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.fill_batch() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
    }
}
