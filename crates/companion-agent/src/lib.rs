//! Conversation core for Companion.
//!
//! Builds the prompt for one reply and resolves it against a chain of
//! text-generation providers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────┐     ┌──────────────┐
//! │ UserProfile  │     │  build_context  │     │   Provider   │
//! │ + history    │────>│ (persona, turns)│────>│   Resolver   │──> reply
//! └──────────────┘     └─────────────────┘     └──────┬───────┘
//!                                                     │ sequential
//!                                     ┌───────────────┼───────────────┐
//!                                     v               v               v
//!                                HuggingFace       Gemini        Groq / OpenAI / Grok
//! ```
//!
//! ## Modules
//!
//! - [`context`] -- Prompt assembly from profile and history.
//! - [`persona`] -- System prompt from gender and mode.
//! - [`llm`] -- Provider table, extraction, resolver and wire types.
//! - [`error`] -- Agent error types.

pub mod context;
pub mod error;
pub mod llm;
pub mod persona;

pub use context::{build_context, chronological};
pub use error::{AgentError, RejectReason, Result};
pub use llm::{
    PromptMessage, ProviderAffinity, ProviderConfig, ProviderKind, ProviderResolver, Resolution,
    ResolverSettings, Role, fallback_message,
};
pub use persona::system_prompt;
