//! Zynvo CLI - waitlist operations from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Public count (authoritative, cached or estimated)
//! zynvo-cli count
//!
//! # Sign someone up, queueing locally when the store is unavailable
//! zynvo-cli signup fan@example.com
//!
//! # Push the offline queue
//! zynvo-cli sync
//!
//! # Export every entry as CSV
//! zynvo-cli export --out waitlist.csv
//! ```
//!
//! # Commands
//!
//! - `count` - Print the waitlist count
//! - `signup` - Add an email to the waitlist
//! - `sync` - Push queued signups to the remote store
//! - `entries` - List entries, newest first
//! - `export` - Write entries as CSV
//! - `status` - Show connectivity, queue and permission state
//! - `reset-permission` - Clear the permission-error flag
//!
//! Configuration comes from the same environment variables as the site.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "zynvo-cli")]
#[command(author, version, about = "Zynvo waitlist CLI tools")]
struct Cli {
    /// Treat the remote store as unreachable
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the waitlist count
    Count,
    /// Add an email to the waitlist
    Signup {
        /// Email address
        email: String,
    },
    /// Push queued signups to the remote store
    Sync,
    /// List entries, newest first
    Entries {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Write entries as CSV
    Export {
        /// Output file, `-` for stdout (default: zynvo-waitlist-<date>.csv)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show connectivity, queue and permission state
    Status,
    /// Clear the permission-error flag
    ResetPermission,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zynvo_site=warn,zynvo_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let state = commands::open_state(cli.offline).await?;
    let mut out = std::io::stdout();

    match cli.command {
        Commands::Count => commands::waitlist::count(&state, &mut out).await?,
        Commands::Signup { email } => commands::waitlist::signup(&state, &email, &mut out).await?,
        Commands::Sync => commands::waitlist::sync(&state, &mut out).await?,
        Commands::Entries { json } => commands::waitlist::entries(&state, json, &mut out).await?,
        Commands::Export { out: path } => commands::export::run(&state, path, &mut out).await?,
        Commands::Status => commands::waitlist::status(&state, &mut out)?,
        Commands::ResetPermission => commands::waitlist::reset_permission(&state, &mut out)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_offline_flag() {
        let cli = Cli::try_parse_from(["zynvo-cli", "signup", "a@example.com", "--offline"]);
        assert!(cli.is_ok_and(|cli| cli.offline));
    }
}
