//! eznotif CLI - runs the push notification server.
//!
//! This is the main binary entry point. See the `eznotif` library for the
//! core functionality.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use eznotif::{server, AppState, Config, VapidKeys};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "eznotif")]
#[command(version)]
#[command(about = "Self-hosted Web Push notification server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Subscription file (overrides EZNOTIF_DATA_FILE)
        #[arg(long)]
        data_file: Option<PathBuf>,
    },
    /// Print a fresh VAPID keypair in .env format
    GenerateVapidKeys,
}

async fn run_server(port: Option<u16>, data_file: Option<PathBuf>) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_file) = data_file {
        config.data_file = data_file;
    }

    log::info!(
        "Starting eznotif (data file: {}, static files: {})",
        config.data_file.display(),
        config
            .public_dir
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |d| d.display().to_string())
    );

    let state = AppState::from_config(&config)?;
    server::serve(&config, state).await
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal in production
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        data_file: None,
    }) {
        Commands::Serve { port, data_file } => run_server(port, data_file).await?,
        Commands::GenerateVapidKeys => {
            println!("{}", VapidKeys::generate().to_env_lines());
        }
    }

    Ok(())
}
