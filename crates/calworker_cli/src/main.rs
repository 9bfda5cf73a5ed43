//! Calworker CLI
//!
//! Runs an in-process calendar worker and drives it through the bridge.
//!
//! # Commands
//!
//! - `sync` - Sync a generated set of accounts against a simulated server
//! - `echo` - Round-trip arguments through the worker
//! - `accounts` - List accounts, optionally creating one first

mod commands;
mod worker;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Calendar worker command-line driver.
#[derive(Parser)]
#[command(name = "calworker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Talk to the worker over newline-delimited JSON instead of in memory
    #[arg(global = true, long)]
    json_wire: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync generated accounts against a simulated server
    Sync {
        /// Number of accounts
        #[arg(short, long, default_value = "3")]
        accounts: usize,

        /// Calendars per account
        #[arg(short, long, default_value = "2")]
        calendars: usize,

        /// Make the account with this one-based index fail (repeatable)
        #[arg(short, long)]
        fail: Vec<usize>,

        /// Pretend the device is offline
        #[arg(long)]
        offline: bool,

        /// Simulated server latency per unit, in milliseconds
        #[arg(long, default_value = "50")]
        latency: u64,
    },

    /// Round-trip arguments through the worker
    Echo {
        /// Arguments; each is parsed as JSON, or taken as a string
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List accounts
    Accounts {
        /// Create an account from this preset first
        #[arg(long)]
        create: Option<String>,

        /// Make the created account a CalDAV account
        #[arg(long)]
        caldav: bool,
    },
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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync {
            accounts,
            calendars,
            fail,
            offline,
            latency,
        } => {
            let plan = commands::sync::Plan {
                accounts,
                calendars,
                failing: fail,
                offline,
                latency_ms: latency,
            };
            commands::sync::run(&plan, cli.json_wire).await?;
        }
        Commands::Echo { args } => {
            commands::echo::run(&args, cli.json_wire).await?;
        }
        Commands::Accounts { create, caldav } => {
            commands::accounts::run(create.as_deref(), caldav, cli.json_wire).await?;
        }
    }

    Ok(())
}
