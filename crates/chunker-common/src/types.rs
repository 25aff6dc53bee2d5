//! Shared domain types

use crate::error::CommonError;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a row in the `imports` table
///
/// The table is shared with the downstream workers, so this enum carries the
/// whole vocabulary even though the chunker itself only ever writes
/// [`ImportStatus::ChunksReady`] and [`ImportStatus::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    PendingLargeCsv,
    ProcessingLargeCsv,
    ChunksReady,
    ProcessingChunks,
    Queued,
    Processing,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::PendingLargeCsv => "pending_large_csv",
            ImportStatus::ProcessingLargeCsv => "processing_large_csv",
            ImportStatus::ChunksReady => "chunks_ready",
            ImportStatus::ProcessingChunks => "processing_chunks",
            ImportStatus::Queued => "queued",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::CompletedWithErrors => "completed_with_errors",
            ImportStatus::Failed => "failed",
        }
    }

    /// No further work will happen for this import
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            ImportStatus::Completed | ImportStatus::CompletedWithErrors | ImportStatus::Failed
        )
    }

    /// Work is queued or underway somewhere in the pipeline
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            ImportStatus::PendingLargeCsv
                | ImportStatus::ProcessingLargeCsv
                | ImportStatus::ChunksReady
                | ImportStatus::ProcessingChunks
                | ImportStatus::Queued
                | ImportStatus::Processing
        )
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImportStatus::Pending),
            "pending_large_csv" => Ok(ImportStatus::PendingLargeCsv),
            "processing_large_csv" => Ok(ImportStatus::ProcessingLargeCsv),
            "chunks_ready" => Ok(ImportStatus::ChunksReady),
            "processing_chunks" => Ok(ImportStatus::ProcessingChunks),
            "queued" => Ok(ImportStatus::Queued),
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "completed_with_errors" => Ok(ImportStatus::CompletedWithErrors),
            "failed" => Ok(ImportStatus::Failed),
            other => Err(CommonError::Parse(format!("unknown import status: {}", other))),
        }
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
