//! Telegram gateway for Companion.
//!
//! Wires the store and the agent core to the Telegram Bot API: long polling,
//! per-update tasks, onboarding keyboards, owner tools and a health endpoint.
//!
//! ## Modules
//!
//! - [`bot`] -- Shared [`bot::App`] state, polling loop and `companion bot`.
//! - [`handlers`] -- Command, callback, owner and conversation handlers.
//! - [`telegram`] -- Minimal Bot API client.
//! - [`update`] -- Decoding of raw updates.
//! - [`config`] -- Environment and TOML configuration.
//! - [`messages`] -- User-facing templates.
//! - [`subscription`] -- Force-subscribe gate.
//! - [`flood`] -- Per-user flood control.
//! - [`health`] -- HTTP health endpoint.
//! - [`subcommands`] -- `status`, `setup` and `ask`.

pub mod bot;
pub mod cli;
pub mod config;
pub mod flood;
pub mod handlers;
pub mod health;
pub mod helpers;
pub mod keyboards;
pub mod messages;
pub mod subcommands;
pub mod subscription;
pub mod telegram;
pub mod update;
