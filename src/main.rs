//! Lattice CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "lattice")]
#[command(about = "Live module topology console for distributed applications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the console server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8892")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Upstream schema stream WebSocket URL
        #[arg(long, default_value = "ws://127.0.0.1:8891/schema/stream")]
        upstream: String,

        /// Base URL of the module detail API; omitted means no runtime detail
        #[arg(long)]
        details_url: Option<String>,

        /// Open the console in a browser automatically
        #[arg(short, long)]
        open: bool,
    },
    /// Lay out a recorded stream of change events and print the result
    Layout {
        /// JSON file containing an array of change events
        file: PathBuf,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "lattice={log_level}"
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Lattice v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve {
            port,
            host,
            upstream,
            details_url,
            open,
        } => commands::serve(host, port, upstream, details_url, open).await,
        Commands::Layout { file } => commands::layout_file(file),
        Commands::Version => {
            println!("Lattice v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
