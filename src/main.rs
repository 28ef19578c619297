//! Basketrec - Hybrid Product Recommendation Service
//!
//! Command-line entry point: serves the HTTP API and runs catalog
//! maintenance commands (seed, retrain, evaluate, doctor).

mod cli;

use clap::{Parser, Subcommand};
use basketrec_core::error::Result;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use cli::config::ConfigAction;
use cli::helpers::{get_db_path, load_config};

#[derive(Parser)]
#[command(name = "basketrec")]
#[command(about = "Hybrid product recommendation service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Database path (overrides BASKETREC_DB_PATH env var and config)
    #[arg(long)]
    db_path: Option<String>,

    /// Configuration file (defaults to ./basketrec.toml when present)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Server address (overrides server.addr)
        #[arg(long)]
        addr: Option<String>,

        /// Seconds between background retrain checks, 0 disables
        #[arg(long)]
        retrain_interval: Option<u64>,

        /// Serve from an empty in-memory catalog
        #[arg(long)]
        in_memory: bool,
    },

    /// Print hybrid recommendations for a user
    Recommend {
        /// User id
        user_id: String,

        /// Number of products
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Rebuild the content model if the catalog changed
    Retrain {
        /// Rebuild even when the product set is unchanged
        #[arg(long)]
        force: bool,
    },

    /// Load a catalog snapshot (JSON) into the database
    Seed {
        /// Snapshot file
        file: PathBuf,
    },

    /// Initialize the database
    Init,

    /// Report hold-out accuracy of the KNN model
    Evaluate {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Run health checks
    Doctor {
        /// Show details for every check
        #[arg(short, long)]
        verbose: bool,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG wins; otherwise the chosen level for basketrec and request traces
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_str().to_lowercase();
        EnvFilter::new(format!(
            "basketrec={level},basketrec_core={level},tower_http={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Write logs to stderr, not stdout
        .init();

    debug!("Basketrec v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;
    let db_path = get_db_path(cli.db_path, &config);

    match cli.command {
        Commands::Serve {
            addr,
            retrain_interval,
            in_memory,
        } => cli::serve::handle(addr, retrain_interval, in_memory, &db_path, config).await,
        Commands::Recommend {
            user_id,
            limit,
            format,
        } => cli::recommend::handle(user_id, limit, format, &db_path, config).await,
        Commands::Retrain { force } => cli::retrain::handle(force, &db_path, config).await,
        Commands::Seed { file } => cli::seed::handle(&file, &db_path, config).await,
        Commands::Init => cli::init::handle(&db_path, &config).await,
        Commands::Evaluate { json } => cli::evaluate::handle(json, &db_path, config).await,
        Commands::Doctor { verbose, json } => {
            cli::doctor::handle(verbose, json, &db_path, config).await
        }
        Commands::Config { action } => cli::config::handle(action, &db_path, &config),
    }
}
