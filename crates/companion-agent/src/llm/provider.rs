//! Provider definitions and the per-kind dispatch table.
//!
//! A [`ProviderKind`] selects one row of [`PROVIDER_TABLE`], which fixes the
//! request shape, the auth scheme and the default endpoint, model, timeout
//! and extraction paths. [`ProviderConfig`] is a concrete, configured
//! instance of one row.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{Value, json};

use crate::error::AgentError;
use crate::llm::types::{PromptMessage, Role};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const HUGGINGFACE_BASE_URL: &str = "https://api-inference.huggingface.co";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROK_BASE_URL: &str = "https://api.x.ai/v1";

/// Chat-completions style paths, loosest last.
const CHAT_PATHS: &[&str] = &[
    "/choices/0/message/content",
    "/choices/0/text",
    "/content",
    "/text",
    "/result",
    "/output",
];

/// Inference API answers with either a list of objects, a list of strings or a bare object.
const INFERENCE_PATHS: &[&str] = &[
    "/0/generated_text",
    "/0/summary_text",
    "/0/translation_text",
    "/0/text",
    "/0",
    "/generated_text",
    "/text",
    "/summary_text",
];

const GEMINI_PATHS: &[&str] = &["/candidates/0/content/parts/0/text"];

// ---------------------------------------------------------------------------
// Provider kind
// ---------------------------------------------------------------------------

/// Closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    HuggingFace,
    Gemini,
    Groq,
    OpenAi,
    Grok,
}

/// How the prompt is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// `{model, messages: [{role, content}], temperature, max_tokens}`.
    ChatCompletions,
    /// `{contents: [{parts: [{text}]}], generationConfig}` with a flattened prompt.
    GeminiContents,
    /// `{inputs, parameters, options}` with a flattened prompt.
    TextGeneration,
}

/// How the credential is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    /// `?key=<credential>` on the URL.
    QueryKey,
}

/// One row of the dispatch table.
#[derive(Debug)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub label: &'static str,
    pub key_env: &'static str,
    pub model_env: &'static str,
    pub default_endpoint: &'static str,
    pub default_model: &'static str,
    pub timeout_secs: u64,
    pub request: RequestShape,
    pub auth: AuthScheme,
    pub extraction: &'static [&'static str],
}

/// Every provider in declared fallback order.
pub const PROVIDER_TABLE: &[ProviderSpec] = &[
    ProviderSpec {
        kind: ProviderKind::HuggingFace,
        label: "huggingface",
        key_env: "HUGGINGFACE_API_KEY",
        model_env: "HUGGINGFACE_MODEL",
        default_endpoint: HUGGINGFACE_BASE_URL,
        default_model: "mistralai/Mistral-7B-Instruct-v0.2",
        timeout_secs: 45,
        request: RequestShape::TextGeneration,
        auth: AuthScheme::Bearer,
        extraction: INFERENCE_PATHS,
    },
    ProviderSpec {
        kind: ProviderKind::Gemini,
        label: "gemini",
        key_env: "GEMINI_API_KEY",
        model_env: "GEMINI_MODEL",
        default_endpoint: GEMINI_BASE_URL,
        default_model: "gemini-pro",
        timeout_secs: 30,
        request: RequestShape::GeminiContents,
        auth: AuthScheme::QueryKey,
        extraction: GEMINI_PATHS,
    },
    ProviderSpec {
        kind: ProviderKind::Groq,
        label: "groq",
        key_env: "GROQ_API_KEY",
        model_env: "GROQ_MODEL",
        default_endpoint: GROQ_BASE_URL,
        default_model: "llama-3.1-70b-versatile",
        timeout_secs: 30,
        request: RequestShape::ChatCompletions,
        auth: AuthScheme::Bearer,
        extraction: CHAT_PATHS,
    },
    ProviderSpec {
        kind: ProviderKind::OpenAi,
        label: "openai",
        key_env: "OPENAI_API_KEY",
        model_env: "OPENAI_MODEL",
        default_endpoint: OPENAI_BASE_URL,
        default_model: "gpt-4",
        timeout_secs: 60,
        request: RequestShape::ChatCompletions,
        auth: AuthScheme::Bearer,
        extraction: CHAT_PATHS,
    },
    ProviderSpec {
        kind: ProviderKind::Grok,
        label: "grok",
        key_env: "GROK_API_KEY",
        model_env: "GROK_MODEL",
        default_endpoint: GROK_BASE_URL,
        default_model: "grok-beta",
        timeout_secs: 60,
        request: RequestShape::ChatCompletions,
        auth: AuthScheme::Bearer,
        extraction: CHAT_PATHS,
    },
];

/// Smaller inference models tried after the configured one when HuggingFace
/// is in the chain. Each becomes its own chain entry.
pub const HUGGINGFACE_FALLBACK_MODELS: &[&str] = &[
    "google/flan-t5-base",
    "facebook/blenderbot-400M-distill",
    "microsoft/DialoGPT-medium",
];

impl ProviderKind {
    /// The dispatch-table row for this kind.
    pub fn spec(self) -> &'static ProviderSpec {
        match self {
            Self::HuggingFace => &PROVIDER_TABLE[0],
            Self::Gemini => &PROVIDER_TABLE[1],
            Self::Groq => &PROVIDER_TABLE[2],
            Self::OpenAi => &PROVIDER_TABLE[3],
            Self::Grok => &PROVIDER_TABLE[4],
        }
    }

    pub fn as_str(self) -> &'static str {
        self.spec().label
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "gemini" | "google" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            "openai" | "gpt" => Ok(Self::OpenAi),
            "grok" | "xai" => Ok(Self::Grok),
            other => Err(AgentError::Config {
                reason: format!("unknown AI provider: {other}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider config
// ---------------------------------------------------------------------------

/// One configured backend. Static once loaded.
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Display name used in logs and `/debug`, e.g. `groq` or `huggingface:google/flan-t5-base`.
    pub name: String,
    /// Base URL; the kind decides the path appended to it.
    pub endpoint: String,
    pub credential: String,
    pub model: String,
    pub timeout: Duration,
    /// Ordered JSON pointers probed by [`super::extract::extract_text`].
    pub extraction: Vec<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A request body plus the flattened prompt, when one was sent.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub body: Value,
    pub prompt: Option<String>,
}

impl ProviderConfig {
    /// Config with every default from the dispatch table.
    pub fn new(kind: ProviderKind, credential: impl Into<String>) -> Self {
        let spec = kind.spec();
        Self {
            kind,
            name: spec.label.to_string(),
            endpoint: spec.default_endpoint.to_string(),
            credential: credential.into(),
            model: spec.default_model.to_string(),
            timeout: Duration::from_secs(spec.timeout_secs),
            extraction: spec.extraction.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_extraction<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extraction = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Only providers with a credential take part in resolution.
    pub fn is_eligible(&self) -> bool {
        !self.credential.trim().is_empty()
    }

    /// Full URL of the generation call (without auth query).
    pub fn request_url(&self) -> String {
        match self.kind.spec().request {
            RequestShape::TextGeneration => format!("{}/models/{}", self.endpoint, self.model),
            RequestShape::GeminiContents => {
                format!("{}/models/{}:generateContent", self.endpoint, self.model)
            }
            RequestShape::ChatCompletions => format!("{}/chat/completions", self.endpoint),
        }
    }

    /// Encode `messages` into this provider's request shape.
    pub fn encode(&self, messages: &[PromptMessage], temperature: f32) -> EncodedRequest {
        match self.kind.spec().request {
            RequestShape::ChatCompletions => EncodedRequest {
                body: json!({
                    "model": self.model,
                    "messages": messages,
                    "temperature": temperature,
                    "max_tokens": 1000,
                }),
                prompt: None,
            },
            RequestShape::GeminiContents => {
                let prompt = flatten_prompt(messages);
                EncodedRequest {
                    body: json!({
                        "contents": [{ "parts": [{ "text": prompt }] }],
                        "generationConfig": {
                            "temperature": temperature,
                            "maxOutputTokens": 800,
                        },
                    }),
                    prompt: Some(prompt),
                }
            }
            RequestShape::TextGeneration => {
                let prompt = format!("{}\n{}:", flatten_prompt(messages), Role::Assistant.label());
                EncodedRequest {
                    body: json!({
                        "inputs": prompt,
                        "parameters": {
                            "max_new_tokens": 150,
                            "temperature": temperature,
                            "top_p": 0.9,
                            "do_sample": true,
                            "return_full_text": false,
                        },
                        "options": {
                            "wait_for_model": true,
                            "use_cache": true,
                        },
                    }),
                    prompt: Some(prompt),
                }
            }
        }
    }

    /// Attach auth to an outgoing request.
    pub(crate) fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.kind.spec().auth {
            AuthScheme::Bearer => request.bearer_auth(&self.credential),
            AuthScheme::QueryKey => request.query(&[("key", self.credential.as_str())]),
        }
    }
}

/// Flatten a role-tagged prompt into plain text.
///
/// The system message leads as a paragraph; the conversation follows as
/// `User: …` / `Assistant: …` lines.
pub fn flatten_prompt(messages: &[PromptMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        match message.role {
            Role::System => {
                out.push_str(&message.content);
                out.push_str("\n\n");
            }
            Role::User | Role::Assistant => {
                out.push_str(message.role.label());
                out.push_str(": ");
                out.push_str(&message.content);
                out.push('\n');
            }
        }
    }
    out.trim_end().to_string()
}

/// Remove an echoed prompt from a text-generation reply.
pub(crate) fn strip_prompt(text: &str, prompt: Option<&str>) -> String {
    match prompt {
        Some(p) if !p.is_empty() && text.contains(p) => text.replace(p, "").trim().to_string(),
        _ => text.trim().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
