//! CLI entry point for Companion.
//!
//! This binary provides the `companion` command with subcommands for
//! running the Telegram bot, checking status, writing starter config and
//! asking the provider chain a one-off question.

use anyhow::Result;
use clap::Parser;

use companion_bot::bot::cmd_bot;
use companion_bot::cli::{Cli, Commands};
use companion_bot::subcommands::{cmd_ask, cmd_setup, cmd_status};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bot {
            poll_timeout,
            no_health,
        } => cmd_bot(poll_timeout, no_health).await,
        Commands::Status => cmd_status().await,
        Commands::Setup { force } => cmd_setup(force).await,
        Commands::Ask { text, gender, mode } => cmd_ask(&text, &gender, &mode).await,
    }
}
