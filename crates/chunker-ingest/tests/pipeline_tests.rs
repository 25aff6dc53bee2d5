//! End-to-end tests for a chunking run
//!
//! These drive `pipeline::run_with_store` against a recording in-memory store,
//! so they cover the full read/normalize/write/publish path without Postgres.

use async_trait::async_trait;
use chunker_common::checksum::file_signature;
use chunker_ingest::config::{ChunkSettings, RunConfig, Signature, StoreConfig};
use chunker_ingest::manifest::ChunkManifest;
use chunker_ingest::normalizer::NormalizedRecord;
use chunker_ingest::pipeline::run_with_store;
use chunker_ingest::store::ImportStore;
use chunker_ingest::{ChunkError, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Store
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum StoreUpdate {
    ChunksReady {
        import_id: String,
        manifest: ChunkManifest,
    },
    Failed {
        import_id: String,
        message: String,
    },
}

#[derive(Debug, Default)]
struct RecordingStore {
    updates: Vec<StoreUpdate>,
    fail_ready: bool,
    fail_failed: bool,
    failed_attempts: usize,
}

fn connection_reset() -> ChunkError {
    ChunkError::StoreWrite(sqlx::Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    )))
}

#[async_trait]
impl ImportStore for RecordingStore {
    async fn mark_chunks_ready(&mut self, import_id: &str, manifest: &ChunkManifest) -> Result<()> {
        if self.fail_ready {
            return Err(connection_reset());
        }
        self.updates.push(StoreUpdate::ChunksReady {
            import_id: import_id.to_string(),
            manifest: manifest.clone(),
        });
        Ok(())
    }

    async fn mark_failed(&mut self, import_id: &str, message: &str) -> Result<()> {
        self.failed_attempts += 1;
        if self.fail_failed {
            return Err(connection_reset());
        }
        self.updates.push(StoreUpdate::Failed {
            import_id: import_id.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            temp: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn storage_root(&self) -> PathBuf {
        self.temp.path().join("storage")
    }

    fn write_source(&self, contents: &[u8]) -> PathBuf {
        let path = self.temp.path().join("clients.csv");
        fs::write(&path, contents).expect("Failed to write source");
        path
    }

    fn write_rows(&self, rows: usize) -> PathBuf {
        let mut csv = String::from("id,company,email,phone\n");
        for i in 0..rows {
            csv.push_str(&format!("{i},Company {i},user{i}@example.test,555-{i:05}\n"));
        }
        self.write_source(csv.as_bytes())
    }

    fn config(&self, source: PathBuf, signature: &str, rows_per_chunk: usize) -> RunConfig {
        RunConfig {
            import_id: "42".to_string(),
            source,
            signature: Signature::new(signature).expect("valid signature"),
            settings: ChunkSettings {
                storage_root: self.storage_root(),
                rows_per_chunk,
                ..ChunkSettings::default()
            },
            store: StoreConfig {
                host: "127.0.0.1".into(),
                port: 5432,
                database: "imports".into(),
                username: "app".into(),
                password: "pw".into(),
            },
        }
    }
}

fn read_chunk(path: &Path) -> Vec<Value> {
    let bytes = fs::read(path).expect("Failed to read chunk");
    serde_json::from_slice(&bytes).expect("Chunk is not a JSON array")
}

fn ready_manifest(store: &RecordingStore) -> &ChunkManifest {
    match store.updates.as_slice() {
        [StoreUpdate::ChunksReady { manifest, .. }] => manifest,
        other => panic!("expected a single chunks_ready update, got {:?}", other),
    }
}

fn failed_message(store: &RecordingStore) -> &str {
    match store.updates.as_slice() {
        [StoreUpdate::Failed { message, .. }] => message,
        other => panic!("expected a single failed update, got {:?}", other),
    }
}

// ============================================================================
// Success Path
// ============================================================================

#[tokio::test]
async fn test_twelve_thousand_rows_make_three_chunks() {
    let fixture = Fixture::new();
    let source = fixture.write_rows(12_000);
    let config = fixture.config(source, "sig12k", 5000);
    let mut store = RecordingStore::default();

    let manifest = run_with_store(&mut store, &config).await.expect("run failed");

    assert_eq!(manifest.total_chunks, 3);
    assert_eq!(manifest.total_rows, 12_000);
    assert_eq!(manifest.rows_per_chunk, 5000);
    assert_eq!(manifest.chunks_directory, "chunks/sig12k");
    assert_eq!(
        manifest.chunk_files,
        vec!["sig12k_0.json", "sig12k_1.json", "sig12k_2.json"]
    );
    assert_eq!(ready_manifest(&store), &manifest);

    let dir = fixture.storage_root().join("chunks").join("sig12k");
    let chunks: Vec<Vec<Value>> = manifest
        .chunk_files
        .iter()
        .map(|f| read_chunk(&dir.join(f)))
        .collect();

    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![5000, 5000, 2000]);

    // input order is preserved across and within chunks
    assert_eq!(chunks[0][0]["company"], "Company 0");
    assert_eq!(chunks[1][0]["company"], "Company 5000");
    assert_eq!(chunks[2][1999]["company"], "Company 11999");

    for record in chunks.iter().flatten() {
        let object = record.as_object().expect("record is an object");
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["company", "email", "phone"]);
        assert!(object.values().all(Value::is_string));
    }
}

#[tokio::test]
async fn test_row_counts_add_up_for_any_chunk_size() {
    for rows_per_chunk in 1..=7 {
        let fixture = Fixture::new();
        let source = fixture.write_rows(23);
        let mut config = fixture.config(source, "sum", rows_per_chunk);
        config.settings.read_batch_size = 4;
        let mut store = RecordingStore::default();

        let manifest = run_with_store(&mut store, &config).await.expect("run failed");
        let dir = fixture.storage_root().join("chunks").join("sum");

        let sizes: Vec<usize> = manifest
            .chunk_files
            .iter()
            .map(|f| read_chunk(&dir.join(f)).len())
            .collect();

        assert_eq!(sizes.iter().sum::<usize>() as u64, manifest.total_rows);
        assert_eq!(manifest.total_chunks, 23usize.div_ceil(rows_per_chunk));

        let (last, full) = sizes.split_last().expect("at least one chunk");
        assert!(full.iter().all(|&n| n == rows_per_chunk));
        assert!((1..=rows_per_chunk).contains(last));

        for (index, name) in manifest.chunk_files.iter().enumerate() {
            assert_eq!(name, &format!("sum_{index}.json"));
        }
    }
}

#[tokio::test]
async fn test_header_only_source_is_ready_with_no_chunks() {
    let fixture = Fixture::new();
    let source = fixture.write_source(b"company,email,phone\n");
    let config = fixture.config(source, "empty", 5000);
    let mut store = RecordingStore::default();

    let manifest = run_with_store(&mut store, &config).await.expect("run failed");

    assert_eq!(manifest.total_chunks, 0);
    assert_eq!(manifest.total_rows, 0);
    assert!(manifest.chunk_files.is_empty());
    assert_eq!(ready_manifest(&store).total_chunks, 0);

    let dir = fixture.storage_root().join("chunks").join("empty");
    assert_eq!(fs::read_dir(dir).expect("chunk dir exists").count(), 0);
}

#[tokio::test]
async fn test_zero_byte_source_is_ready_with_no_chunks() {
    let fixture = Fixture::new();
    let source = fixture.write_source(b"");
    let config = fixture.config(source, "zero", 5000);
    let mut store = RecordingStore::default();

    let manifest = run_with_store(&mut store, &config).await.expect("run failed");
    assert_eq!(manifest.total_chunks, 0);
    assert_eq!(ready_manifest(&store).total_rows, 0);
}

#[tokio::test]
async fn test_missing_email_column_normalizes_to_empty_string() {
    let fixture = Fixture::new();
    let source = fixture.write_source(b"company,phone\nAcme,555-0100\n  Globex  ,NaN\n");
    let config = fixture.config(source, "noemail", 5000);
    let mut store = RecordingStore::default();

    let manifest = run_with_store(&mut store, &config).await.expect("run failed");
    let records = manifest
        .load_chunk(fixture.storage_root(), 0)
        .expect("chunk readable");

    assert_eq!(
        records,
        vec![
            NormalizedRecord {
                company: "Acme".into(),
                email: String::new(),
                phone: "555-0100".into(),
            },
            NormalizedRecord {
                company: "Globex".into(),
                email: String::new(),
                phone: String::new(),
            },
        ]
    );

    let raw = read_chunk(&manifest.chunk_path(fixture.storage_root(), 0).expect("path"));
    assert_eq!(raw[0]["email"], Value::String(String::new()));
}

#[tokio::test]
async fn test_malformed_rows_are_skipped_not_fatal() {
    let fixture = Fixture::new();
    let source = fixture.write_source(
        b"company,email,phone\nAcme,a@acme.test,1\ntoo,few\nGlobex,g@globex.test,2,extra\nInitech,i@initech.test,3\n",
    );
    let config = fixture.config(source, "skips", 5000);
    let mut store = RecordingStore::default();

    let manifest = run_with_store(&mut store, &config).await.expect("run failed");

    assert_eq!(manifest.total_rows, 2);
    let records = manifest
        .load_chunk(fixture.storage_root(), 0)
        .expect("chunk readable");
    assert_eq!(records[0].company, "Acme");
    assert_eq!(records[1].company, "Initech");
}

#[tokio::test]
async fn test_rerun_with_same_signature_succeeds() {
    let fixture = Fixture::new();
    let source = fixture.write_rows(10);
    let config = fixture.config(source, "rerun", 4);

    for _ in 0..2 {
        let mut store = RecordingStore::default();
        let manifest = run_with_store(&mut store, &config).await.expect("run failed");
        assert_eq!(manifest.total_chunks, 3);
    }

    let dir = fixture.storage_root().join("chunks").join("rerun");
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("chunk dir exists")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["rerun_0.json", "rerun_1.json", "rerun_2.json"]);
}

#[tokio::test]
async fn test_matching_signature_passes_verification() {
    let fixture = Fixture::new();
    let source = fixture.write_rows(3);
    let signature = file_signature(&source).expect("hash source");
    let mut config = fixture.config(source, &signature, 5000);
    config.settings.verify_signature = true;
    let mut store = RecordingStore::default();

    let manifest = run_with_store(&mut store, &config).await.expect("run failed");
    assert_eq!(manifest.chunk_files, vec![format!("{signature}_0.json")]);
}

// ============================================================================
// Failure Path
// ============================================================================

#[tokio::test]
async fn test_missing_source_marks_failed_and_creates_nothing() {
    let fixture = Fixture::new();
    let source = fixture.temp.path().join("does-not-exist.csv");
    let config = fixture.config(source, "missing", 5000);
    let mut store = RecordingStore::default();

    let err = run_with_store(&mut store, &config).await.unwrap_err();

    assert!(matches!(err, ChunkError::SourceNotFound(_)));
    assert!(failed_message(&store).contains("not found"));
    assert!(!fixture.storage_root().exists());
}

#[tokio::test]
async fn test_signature_mismatch_marks_failed() {
    let fixture = Fixture::new();
    let source = fixture.write_rows(3);
    let mut config = fixture.config(source, "not-the-hash", 5000);
    config.settings.verify_signature = true;
    let mut store = RecordingStore::default();

    let err = run_with_store(&mut store, &config).await.unwrap_err();

    assert!(matches!(err, ChunkError::SignatureMismatch { .. }));
    assert!(failed_message(&store).starts_with("Signature mismatch"));
    assert!(!fixture.storage_root().join("chunks").exists());
}

#[tokio::test]
async fn test_invalid_settings_mark_failed() {
    let fixture = Fixture::new();
    let source = fixture.write_rows(3);
    let config = fixture.config(source, "zero", 0);
    let mut store = RecordingStore::default();

    let err = run_with_store(&mut store, &config).await.unwrap_err();

    assert!(matches!(err, ChunkError::Config(_)));
    assert!(failed_message(&store).contains("rows_per_chunk"));
}

#[tokio::test]
async fn test_failed_ready_update_falls_back_to_failed_status() {
    let fixture = Fixture::new();
    let source = fixture.write_rows(7);
    let config = fixture.config(source, "storefail", 5);
    let mut store = RecordingStore {
        fail_ready: true,
        ..RecordingStore::default()
    };

    let err = run_with_store(&mut store, &config).await.unwrap_err();

    assert!(matches!(err, ChunkError::StoreWrite(_)));
    assert_eq!(store.failed_attempts, 1);
    let message = failed_message(&store);
    assert!(message.contains("connection reset"));

    // chunk files stay behind as orphans; only the status row matters to workers
    let dir = fixture.storage_root().join("chunks").join("storefail");
    assert!(dir.join("storefail_0.json").exists());
    assert!(dir.join("storefail_1.json").exists());
}

#[tokio::test]
async fn test_double_failure_returns_original_error() {
    let fixture = Fixture::new();
    let source = fixture.write_rows(2);
    let config = fixture.config(source, "doublefail", 5000);
    let mut store = RecordingStore {
        fail_ready: true,
        fail_failed: true,
        ..RecordingStore::default()
    };

    let err = run_with_store(&mut store, &config).await.unwrap_err();

    assert!(matches!(err, ChunkError::StoreWrite(_)));
    assert_eq!(store.failed_attempts, 1);
    assert!(store.updates.is_empty());
}
