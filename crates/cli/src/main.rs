// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kv - command line client for the kvlog daemon

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::client::DaemonClient;
use crate::output::{Entry, OutputFormat};

#[derive(Parser)]
#[command(
    name = "kv",
    version,
    about = "Key-value store backed by a durable transaction log"
)]
struct Cli {
    /// Daemon state directory (defaults to $KVLOG_STATE_DIR or the platform state dir)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored at a key
    Get { key: String },
    /// Set a key, overwriting any previous value
    Put { key: String, value: String },
    /// Remove a key
    Delete { key: String },
    /// Show daemon status
    Status,
    /// Drain the transaction log and stop the daemon
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();

    let client = DaemonClient::connect(cli.state_dir)?;

    match cli.command {
        Commands::Get { key } => match client.get(&key).await? {
            Some(value) => output::print(
                &Entry {
                    key: &key,
                    value: &value,
                },
                cli.output,
            ),
            None => anyhow::bail!("no such key: {}", key),
        },

        Commands::Put { key, value } => {
            client.put(&key, &value).await?;
        }

        Commands::Delete { key } => {
            client.delete(&key).await?;
        }

        Commands::Status => {
            let status = client.status().await?;
            output::print(&status, cli.output);
        }

        Commands::Shutdown => {
            client.shutdown().await?;
            println!("Daemon shutting down");
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so command output stays clean
fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
