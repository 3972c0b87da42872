//! kvsync CLI
//!
//! Command-line tools for inspecting and editing file-backed kvsync stores.
//!
//! # Commands
//!
//! - `dump` - Print every entry of the store
//! - `get` - Print one value as JSON
//! - `set` - Write one JSON value
//! - `remove` - Remove keys

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// kvsync command-line store tools.
#[derive(Parser)]
#[command(name = "kvsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every entry of the store
    Dump {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the value stored under a key
    Get {
        /// Key to read
        key: String,
    },

    /// Store a JSON value under a key
    Set {
        /// Key to write
        key: String,

        /// Value as JSON text, e.g. '"dark"' or '{"volume": 3}'
        value: String,
    },

    /// Remove keys from the store
    Remove {
        /// Keys to remove
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Dump { format } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&path, &format).await?;
        }
        Commands::Get { key } => {
            let path = cli.path.ok_or("Store path required for get")?;
            commands::get::run(&path, &key).await?;
        }
        Commands::Set { key, value } => {
            let path = cli.path.ok_or("Store path required for set")?;
            commands::set::run(&path, &key, &value).await?;
        }
        Commands::Remove { keys } => {
            let path = cli.path.ok_or("Store path required for remove")?;
            commands::remove::run(&path, keys).await?;
        }
        Commands::Version => {
            println!("kvsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("kvsync Core v{}", kvsync_core::VERSION);
        }
    }

    Ok(())
}
