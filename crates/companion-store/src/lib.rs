//! # companion-store
//!
//! Storage engine for Companion.
//!
//! Provides SQLite-backed persistence with WAL mode for user profiles,
//! the per-user conversation log, and a small key-value table for bot
//! state that must survive restarts (the Telegram polling offset).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  ProfileStore       (profiles)          │
//! │  ConversationStore  (chat_turns)        │
//! │  BotStateStore      (bot_state)         │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL)                │
//! │  Schema steps (user_version pragma)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use companion_store::{ConversationStore, Database, ProfileStore};
//!
//! let db = Database::open("data/companion.db").await?;
//! let profiles = ProfileStore::new(db.clone());
//! let turns = ConversationStore::new(db);
//! ```

pub mod bot_state;
pub mod conversation;
pub mod db;
pub mod error;
pub mod migration;
pub mod profile;

// ── re-exports ───────────────────────────────────────────────────────

pub use bot_state::BotStateStore;
pub use conversation::{ChatTurn, ConversationStore};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use profile::{Gender, GenderBreakdown, Mode, ProfileStore, UserProfile};
