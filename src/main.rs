//! docport - streaming collection export
//!
//! Acquires a pooled connection for a credential id, streams a filtered
//! query page by page and writes the documents to a single JSON array file.
//!
//! # Usage
//!
//! ```bash
//! # Export open orders
//! docport export --credential local --db shop --collection orders \
//!     --filter '{"status":"open"}' --out orders.json
//!
//! # List configured credential ids
//! docport credentials
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use docport::cli::{CliInterface, Commands, ExportArgs};
use docport::connection::{ConnectionRegistry, MongoConnector};
use docport::credentials::ConfigCredentialResolver;
use docport::cursor::CursorRequest;
use docport::error::Result;
use docport::export::{ExportSink, ProgressTracker, default_filename};
use docport::{ExportOutcome, StreamingCursor};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Dispatch the subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);
    cli.config().validate()?;

    match &cli.args().command {
        Commands::Credentials => {
            list_credentials(&cli);
            Ok(())
        }
        Commands::Export(args) => run_export(&cli, args).await,
    }
}

fn list_credentials(cli: &CliInterface) {
    let resolver = ConfigCredentialResolver::new(cli.config().credentials.clone());
    let ids = resolver.credential_ids();
    if ids.is_empty() {
        println!("No credentials configured");
        return;
    }
    for id in ids {
        println!("{}", id);
    }
}

/// Acquire, stream, export and release
async fn run_export(cli: &CliInterface, args: &ExportArgs) -> Result<()> {
    let config = cli.config();
    let registry = ConnectionRegistry::new(
        Arc::new(ConfigCredentialResolver::new(config.credentials.clone())),
        Arc::new(MongoConnector),
        config.connection.clone(),
    );

    let cancel = CancellationToken::new();
    let ctrl_c_handle = spawn_ctrl_c_listener(cancel.clone());

    let result = export_collection(cli, args, &registry, &cancel).await;

    ctrl_c_handle.abort();
    registry.release_all().await;

    let (outcome, destination) = result?;
    print_summary(&outcome, &destination);
    Ok(())
}

async fn export_collection(
    cli: &CliInterface,
    args: &ExportArgs,
    registry: &ConnectionRegistry,
    cancel: &CancellationToken,
) -> Result<(ExportOutcome, PathBuf)> {
    let config = cli.config();
    let conn = registry.acquire(&args.credential).await?;
    debug!("Acquired connection {:?}", conn);

    let request = CursorRequest::new(&args.database, &args.collection)
        .filter(args.filter.as_deref())
        .skip(args.skip)
        .limit(args.limit)
        .batch_size(config.export.batch_size);
    let mut cursor = StreamingCursor::open(&conn, request, cancel.clone()).await?;

    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_filename(&args.collection)));
    info!("Exporting {} to {}", cursor.namespace(), destination.display());

    let tracker = ProgressTracker::new(!args.no_progress);
    let outcome = ExportSink::from_config(&config.export)
        .run(&mut cursor, &destination, |event| tracker.observe(event), cancel)
        .await;
    tracker.finish();

    Ok((outcome?, destination))
}

/// Cancel `token` on the first Ctrl+C
fn spawn_ctrl_c_listener(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => token.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    })
}

fn print_summary(outcome: &ExportOutcome, destination: &std::path::Path) {
    if outcome.cancelled {
        println!(
            "Export cancelled after {} documents; {} was removed",
            outcome.documents_exported,
            destination.display()
        );
    } else {
        println!(
            "Exported {} documents to {} ({} bytes in {} ms)",
            outcome.documents_exported,
            destination.display(),
            outcome.bytes_written,
            outcome.elapsed_ms
        );
    }
}

/// Initialize logging system
///
/// `RUST_LOG` wins when set; otherwise the level comes from `-v` / `--vv`
/// or the config file.
fn initialize_logging(cli: &CliInterface) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().as_str().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
