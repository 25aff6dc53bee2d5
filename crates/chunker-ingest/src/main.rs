//! chunker-ingest - split a large CSV into JSON chunk files
//!
//! Exit code 0 on success, 1 on any failure including bad arguments.

use chunker_common::logging::{init_logging, LogConfig, LogGuard, LogLevel};
use chunker_ingest::config::{
    ChunkSettings, RunConfig, Signature, StoreConfig, DEFAULT_READ_BATCH_SIZE,
    DEFAULT_ROWS_PER_CHUNK, DEFAULT_STORAGE_ROOT,
};
use chunker_ingest::pipeline;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, info_span, Instrument};

#[derive(Parser, Debug)]
#[command(name = "chunker-ingest")]
#[command(author, version, about = "Split a large CSV into JSON chunk files for the import workers")]
struct Cli {
    /// Identifier of the row in the imports table
    import_id: String,

    /// Source CSV file
    csv_file: PathBuf,

    /// Credentials file with DB_HOST, DB_PORT, DB_DATABASE, DB_USERNAME, DB_PASSWORD
    env_file: PathBuf,

    /// Chunk set name, used as directory name and file prefix
    signature: String,

    /// Root directory; chunks go to <root>/chunks/<signature>/
    #[arg(long, env = "CHUNKER_STORAGE_ROOT", default_value = DEFAULT_STORAGE_ROOT)]
    storage_root: PathBuf,

    /// Records per chunk file
    #[arg(long, env = "CHUNKER_ROWS_PER_CHUNK", default_value_t = DEFAULT_ROWS_PER_CHUNK)]
    rows_per_chunk: usize,

    /// Rows read from the source per batch
    #[arg(long, default_value_t = DEFAULT_READ_BATCH_SIZE, hide = true)]
    read_batch_size: usize,

    /// Fail unless the signature is the SHA-256 of the source file
    #[arg(long)]
    verify_signature: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) -> anyhow::Result<LogGuard> {
    let level = if verbose { LogLevel::Debug } else { LogLevel::Info };

    let config = LogConfig::builder()
        .level(level)
        .log_file_prefix("chunker-ingest")
        .build()
        .merge_env()?;

    init_logging(&config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        },
    };

    let _log_guard = match init_tracing(cli.verbose) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: failed to initialize logging: {:#}", err);
            return ExitCode::FAILURE;
        },
    };

    let import_id = cli.import_id.clone();
    let config = match build_config(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("[{}] ERROR: {}", import_id, err);
            return ExitCode::FAILURE;
        },
    };

    let span = info_span!(
        "chunk_import",
        import_id = %config.import_id,
        signature = %config.signature
    );

    async {
        info!(source = %config.source.display(), "Starting CSV to JSON chunking");

        match pipeline::execute(&config).await {
            Ok(manifest) => {
                info!(
                    total_rows = manifest.total_rows,
                    total_chunks = manifest.total_chunks,
                    "Import chunked"
                );
                ExitCode::SUCCESS
            },
            Err(err) => {
                eprintln!("[{}] ERROR: {}", config.import_id, err);
                ExitCode::FAILURE
            },
        }
    }
    .instrument(span)
    .await
}

fn build_config(cli: Cli) -> chunker_ingest::Result<RunConfig> {
    let signature = Signature::new(cli.signature)?;
    let store = StoreConfig::from_credentials_file(&cli.env_file)?;

    Ok(RunConfig {
        import_id: cli.import_id,
        source: cli.csv_file,
        signature,
        settings: ChunkSettings {
            storage_root: cli.storage_root,
            rows_per_chunk: cli.rows_per_chunk,
            read_batch_size: cli.read_batch_size,
            verify_signature: cli.verify_signature,
        },
        store,
    })
}
