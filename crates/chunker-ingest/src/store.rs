//! Import store
//!
//! The chunker issues exactly two statements against the shared `imports`
//! table: the success update that publishes the manifest and flips the row to
//! `chunks_ready`, and the failure update. [`ImportStore`] is the seam the
//! run is written against; [`PgImportStore`] is the Postgres implementation.

use crate::config::StoreConfig;
use crate::error::{ChunkError, Result};
use crate::manifest::{ChunkManifest, FailureData};
use async_trait::async_trait;
use chunker_common::ImportStatus;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::types::Json;
use sqlx::{ConnectOptions, Connection};
use tracing::{debug, info};

/// Table holding one row per import
pub const IMPORTS_TABLE: &str = "imports";

/// Terminal status updates for one import row
#[async_trait]
pub trait ImportStore: Send {
    /// Set `status = 'chunks_ready'`, `total_rows` and the manifest in one statement
    async fn mark_chunks_ready(&mut self, import_id: &str, manifest: &ChunkManifest) -> Result<()>;

    /// Set `status = 'failed'` with `data = {"error": message}`
    async fn mark_failed(&mut self, import_id: &str, message: &str) -> Result<()>;
}

/// Single Postgres connection, opened once per run
pub struct PgImportStore {
    conn: PgConnection,
}

impl PgImportStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let options = connect_options(config);
        let conn = options.connect().await.map_err(ChunkError::StoreConnection)?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to import store"
        );

        Ok(Self { conn })
    }

    /// Close the connection gracefully
    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(ChunkError::StoreConnection)?;
        debug!("Import store connection closed");
        Ok(())
    }
}

pub fn connect_options(config: &StoreConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.username)
        .password(&config.password)
        .application_name("chunker-ingest")
}

fn expect_one_row(import_id: &str, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        return Err(ChunkError::ImportNotFound(import_id.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn mark_chunks_ready(&mut self, import_id: &str, manifest: &ChunkManifest) -> Result<()> {
        let total_rows = i64::try_from(manifest.total_rows)
            .map_err(|_| ChunkError::config("total_rows does not fit in a BIGINT"))?;

        // id is compared as text so integer and uuid keys both work
        let sql = format!(
            r#"
            UPDATE {IMPORTS_TABLE}
            SET status = $1,
                total_rows = $2,
                data = $3,
                updated_at = NOW()
            WHERE id::text = $4
            "#
        );

        let result = sqlx::query(&sql)
            .bind(ImportStatus::ChunksReady.as_str())
            .bind(total_rows)
            .bind(Json(manifest))
            .bind(import_id)
            .execute(&mut self.conn)
            .await
            .map_err(ChunkError::StoreWrite)?;

        expect_one_row(import_id, result.rows_affected())
    }

    async fn mark_failed(&mut self, import_id: &str, message: &str) -> Result<()> {
        let sql = format!(
            r#"
            UPDATE {IMPORTS_TABLE}
            SET status = $1,
                data = $2,
                updated_at = NOW()
            WHERE id::text = $3
            "#
        );

        let result = sqlx::query(&sql)
            .bind(ImportStatus::Failed.as_str())
            .bind(Json(FailureData::new(message)))
            .bind(import_id)
            .execute(&mut self.conn)
            .await
            .map_err(ChunkError::StoreWrite)?;

        expect_one_row(import_id, result.rows_affected())
    }
}
