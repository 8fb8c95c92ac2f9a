//! Wallet Bootstrap - set up, inspect and reset the local wallet record

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use wallet_bootstrap::cli::commands;
use wallet_bootstrap::config::Config;

/// Wallet Bootstrap - credential setup and load-stage engine
#[derive(Parser)]
#[command(name = "wallet-bootstrap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "bootstrap.toml", env = "BOOTSTRAP_CONFIG")]
    config: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what kind of credential an input claims to be
    Classify {
        /// Input to classify (prompted when omitted)
        input: Option<String>,
    },

    /// Import a wallet, or create one from unrecognized input
    Setup {
        /// Mnemonic, WIF/hex key or address (prompted when omitted)
        input: Option<String>,
    },

    /// Load the stored wallet and show its stage
    Status,

    /// Remove the stored wallet
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("wallet_bootstrap=info".parse()?);

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Classify { input } => commands::classify_command(input),
        Commands::Setup { input } => commands::setup(&config, input).await,
        Commands::Status => commands::status(&config).await,
        Commands::Reset { force } => commands::reset(&config, force),
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
