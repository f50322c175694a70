//! Provider integration layer.
//!
//! - [`types`] -- Role-tagged prompt messages.
//! - [`provider`] -- Closed provider enum and its dispatch table.
//! - [`extract`] -- Generic JSON-pointer reply extraction.
//! - [`resolver`] -- Sequential fallback over the configured chain.

pub mod extract;
pub mod provider;
pub mod resolver;
pub mod types;

pub use provider::{
    AuthScheme, HUGGINGFACE_FALLBACK_MODELS, PROVIDER_TABLE, ProviderConfig, ProviderKind,
    ProviderSpec, RequestShape,
};
pub use resolver::{
    ProviderAffinity, ProviderResolver, Resolution, ResolverSettings, fallback_message,
    validate_reply,
};
pub use types::{PromptMessage, Role};
