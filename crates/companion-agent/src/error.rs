//! Agent error types.
//!
//! Provider attempts surface failures through [`AgentError`]. The resolver
//! absorbs all of them and moves on to the next provider; callers of
//! [`crate::ProviderResolver::resolve`] never see one.

use std::fmt;

/// Why an extracted reply was thrown away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing left after trimming.
    Empty,
    /// The provider parroted the user's message back.
    Echo,
    /// Shorter than the configured minimum, in characters.
    TooShort { len: usize, min: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty reply"),
            Self::Echo => f.write_str("reply echoes the user message"),
            Self::TooShort { len, min } => write!(f, "reply too short ({len} < {min} chars)"),
        }
    }
}

/// Unified error type for provider calls.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Transport -----------------------------------------------------------
    /// Connection, TLS or body read failure.
    #[error("{provider}: request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    /// The call did not finish within the provider's timeout.
    #[error("{provider}: timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    // -- Backend rejection ---------------------------------------------------
    /// Non-2xx HTTP status.
    #[error("{provider}: HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// 2xx with a body that is not JSON.
    #[error("{provider}: invalid JSON response: {reason}")]
    ParseFailed { provider: String, reason: String },

    /// 2xx JSON where none of the configured field paths held text.
    #[error("{provider}: no text at any known response path")]
    UnrecognizedShape { provider: String },

    // -- Semantic rejection --------------------------------------------------
    #[error("{provider}: {reason}")]
    Rejected {
        provider: String,
        reason: RejectReason,
    },

    // -- Configuration -------------------------------------------------------
    /// Client construction or provider configuration problem.
    #[error("config error: {reason}")]
    Config { reason: String },
}

impl AgentError {
    /// Name of the provider the failure belongs to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::RequestFailed { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Status { provider, .. }
            | Self::ParseFailed { provider, .. }
            | Self::UnrecognizedShape { provider }
            | Self::Rejected { provider, .. } => Some(provider),
            Self::Config { .. } => None,
        }
    }
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;
