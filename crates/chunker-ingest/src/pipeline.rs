//! One chunking run, end to end
//!
//! ```text
//! source.csv -> RecordNormalizer -> ChunkWriter -> ChunkManifest -> ImportStore
//! ```
//!
//! The whole run is one sequential pass. Chunk files are written as the
//! buffer fills; the import row is only touched once, at the end, either
//! with the manifest (`chunks_ready`) or with the error (`failed`). Workers
//! poll the status column, so chunk files left behind by a failed or killed
//! run are never picked up.

use crate::config::RunConfig;
use crate::error::{ChunkError, Result};
use crate::manifest::ChunkManifest;
use crate::normalizer::RecordNormalizer;
use crate::store::{ImportStore, PgImportStore};
use crate::writer::ChunkWriter;
use chunker_common::checksum::file_signature;
use tracing::{error, info, warn};

/// Normalize the source and write every chunk file
///
/// Nothing is created on disk if the source file is missing.
pub fn write_chunks(config: &RunConfig) -> Result<ChunkManifest> {
    let settings = &config.settings;
    settings.validate()?;

    let mut normalizer = RecordNormalizer::open(&config.source, settings.read_batch_size)?;

    if let Ok(metadata) = std::fs::metadata(&config.source) {
        info!(
            source = %config.source.display(),
            size_mb = %format!("{:.2}", metadata.len() as f64 / (1024.0 * 1024.0)),
            "Opened source file"
        );
    }

    if settings.verify_signature {
        let actual = file_signature(&config.source)?;
        if actual != config.signature.as_str() {
            return Err(ChunkError::SignatureMismatch {
                expected: config.signature.to_string(),
                actual,
            });
        }
        info!("Source content matches signature");
    }

    let mut writer = ChunkWriter::create(
        settings.chunks_dir(&config.signature),
        config.signature.clone(),
        settings.rows_per_chunk,
    )?;

    for record in normalizer.by_ref() {
        writer.push(record?)?;
    }

    let stats = normalizer.stats();
    let directory = writer.dir().display().to_string();
    let written = writer.finish()?;

    info!(
        directory = %directory,
        total_rows = written.total_rows,
        total_chunks = written.chunk_files.len(),
        rows_skipped = stats.rows_skipped,
        batches = stats.batches_read,
        "Chunking complete"
    );

    Ok(ChunkManifest::new(
        &config.signature,
        settings.rows_per_chunk,
        written,
    ))
}

/// Write the chunks and publish the outcome through `store`
///
/// On any error the failure update is attempted once. If that update fails
/// too it is logged and dropped; the original error is returned either way.
pub async fn run_with_store<S>(store: &mut S, config: &RunConfig) -> Result<ChunkManifest>
where
    S: ImportStore + ?Sized,
{
    let outcome = match write_chunks(config) {
        Ok(manifest) => store
            .mark_chunks_ready(&config.import_id, &manifest)
            .await
            .map(|()| manifest),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(manifest) => {
            info!(
                total_chunks = manifest.total_chunks,
                "Manifest published, status set to chunks_ready"
            );
            Ok(manifest)
        },
        Err(err) => {
            error!(error = %err, "Chunking run failed");

            let message = err.to_string();
            if let Err(update_err) = store.mark_failed(&config.import_id, &message).await {
                error!(
                    error = %update_err,
                    "Could not record failed status; import row left as it was"
                );
            }
            Err(err)
        },
    }
}

/// Connect to the store, run, and close the connection on every path
pub async fn execute(config: &RunConfig) -> Result<ChunkManifest> {
    let mut store = PgImportStore::connect(&config.store).await?;
    let result = run_with_store(&mut store, config).await;

    if let Err(err) = store.close().await {
        warn!(error = %err, "Failed to close import store connection");
    }

    result
}
