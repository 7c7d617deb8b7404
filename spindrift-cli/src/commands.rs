//! CLI command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use spindrift_core::SpindriftConfig;
use spindrift_core::tracing_setup::init_tracing;
use spindrift_sim::{AssemblyProfile, InMemorySource};
use tracing::info;

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Server {
        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Root directory of fully resident files
        #[arg(long, default_value = "downloads")]
        download_dir: PathBuf,
        /// Where uploaded .torrent files are saved
        #[arg(long, default_value = "uploads")]
        upload_dir: PathBuf,
        /// Static web assets directory
        #[arg(long, default_value = "static")]
        static_dir: PathBuf,
        /// Enable verbose console logging
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Dispatches the parsed command.
///
/// # Errors
///
/// Returns the failing command's error.
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Server {
            port,
            download_dir,
            upload_dir,
            static_dir,
            verbose,
        } => run_server(port, download_dir, upload_dir, static_dir, verbose).await,
    }
}

async fn run_server(
    port: u16,
    download_dir: PathBuf,
    upload_dir: PathBuf,
    static_dir: PathBuf,
    verbose: bool,
) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    init_tracing(level, None)?;

    let mut config = SpindriftConfig::default();
    config.storage.download_dir = download_dir;
    config.storage.upload_dir = upload_dir;
    config.storage.static_dir = static_dir;

    // The acquisition backend is external by design; the bundled source
    // assembles ingested jobs in memory on a timer so the full streaming
    // path is exercisable out of the box.
    let source = Arc::new(InMemorySource::with_auto_assembly(
        AssemblyProfile::default(),
    ));

    info!(port, "starting Spindrift server");
    spindrift_web::run_server(source, config, port)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))
}
