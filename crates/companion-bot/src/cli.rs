//! CLI argument definitions for Companion.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use clap::{Parser, Subcommand};

/// Companion -- an AI life partner on Telegram.
#[derive(Parser)]
#[command(
    name = "companion",
    version,
    about = "Companion -- AI life partner Telegram bot",
    long_about = "A Telegram bot that remembers each user's recent conversation and replies \
                  through a prioritized chain of text-generation providers."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Telegram bot (long polling) and the health endpoint.
    Bot {
        /// Telegram long-polling timeout in seconds.
        #[arg(long, default_value_t = 30)]
        poll_timeout: u64,

        /// Do not start the HTTP health endpoint.
        #[arg(long)]
        no_health: bool,
    },

    /// Show configuration and database status.
    Status,

    /// Write starter `.env` and `config/companion.toml` files.
    Setup {
        /// Overwrite files that already exist.
        #[arg(long)]
        force: bool,
    },

    /// Resolve one reply against the configured provider chain.
    Ask {
        /// The message to send.
        text: String,

        /// Persona gender framing: male, female, transgender, nonbinary.
        #[arg(long, default_value = "unset")]
        gender: String,

        /// Persona mode: romantic, calm, thinker, motivating, balanced.
        #[arg(long, default_value = "balanced")]
        mode: String,
    },
}
