//! Sequential provider resolution with fallback.
//!
//! [`ProviderResolver::resolve`] walks the eligible chain one provider at a
//! time. Transport errors, non-2xx statuses, unrecognized bodies and
//! rejected replies all move on to the next entry. When every entry fails,
//! a fixed localized message naming the owner contact is returned instead of
//! an error.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AgentError, RejectReason, Result};
use crate::llm::extract::extract_text;
use crate::llm::provider::{ProviderConfig, strip_prompt};
use crate::llm::types::{PromptMessage, last_user_text};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Reply validation and warm-up knobs.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Replies shorter than this many characters are rejected.
    pub min_reply_len: usize,
    /// Compare echoes ignoring case and surrounding whitespace.
    pub echo_case_insensitive: bool,
    /// A 503 `estimated_time` at or above this is not worth waiting for.
    pub warmup_max_wait: Duration,
    /// Added on top of `estimated_time` before the retry.
    pub warmup_padding: Duration,
    /// Shown in the exhaustion message.
    pub owner_contact: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            min_reply_len: 4,
            echo_case_insensitive: false,
            warmup_max_wait: Duration::from_secs(20),
            warmup_padding: Duration::from_secs(2),
            owner_contact: String::new(),
        }
    }
}

/// The reply returned when no provider produced usable text.
pub fn fallback_message(owner_contact: &str) -> String {
    format!(
        "Sorry yaar, abhi AI services busy hain 😔\n\n\
         Kuch der baad try karo ya owner ko batao!\n\n\
         Contact: {owner_contact}"
    )
}

/// Check an extracted reply against the user's last message.
pub fn validate_reply(
    text: &str,
    user_text: Option<&str>,
    settings: &ResolverSettings,
) -> std::result::Result<(), RejectReason> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RejectReason::Empty);
    }

    if let Some(user_text) = user_text {
        let echoed = if settings.echo_case_insensitive {
            trimmed.to_lowercase() == user_text.trim().to_lowercase()
        } else {
            text == user_text
        };
        if echoed {
            return Err(RejectReason::Echo);
        }
    }

    let len = trimmed.chars().count();
    if len < settings.min_reply_len {
        return Err(RejectReason::TooShort {
            len,
            min: settings.min_reply_len,
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Affinity
// ---------------------------------------------------------------------------

const NO_HINT: usize = usize::MAX;

/// Last chain index that produced an accepted reply.
///
/// Shared through an `Arc` so callers can inject or inspect it. Concurrent
/// writers race harmlessly: the last store wins.
#[derive(Debug)]
pub struct ProviderAffinity {
    index: AtomicUsize,
}

impl Default for ProviderAffinity {
    fn default() -> Self {
        Self {
            index: AtomicUsize::new(NO_HINT),
        }
    }
}

impl ProviderAffinity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<usize> {
        match self.index.load(Ordering::Relaxed) {
            NO_HINT => None,
            i => Some(i),
        }
    }

    pub fn set(&self, index: usize) {
        self.index.store(index, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Outcome of one [`ProviderResolver::resolve_detailed`] call.
#[derive(Debug)]
pub struct Resolution {
    /// Accepted reply, or the fallback message.
    pub text: String,
    /// Name of the provider whose reply was accepted. `None` means fallback.
    pub provider: Option<String>,
    /// Every failed attempt, in order.
    pub failures: Vec<AgentError>,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        self.provider.is_none()
    }
}

/// Tries providers in priority order until one returns an acceptable reply.
#[derive(Clone)]
pub struct ProviderResolver {
    chain: Arc<Vec<ProviderConfig>>,
    settings: Arc<ResolverSettings>,
    affinity: Arc<ProviderAffinity>,
    http: reqwest::Client,
}

impl ProviderResolver {
    /// Build a resolver over `chain`. Entries without a credential are dropped.
    pub fn new(chain: Vec<ProviderConfig>, settings: ResolverSettings) -> Result<Self> {
        Self::with_affinity(chain, settings, Arc::new(ProviderAffinity::new()))
    }

    /// Same as [`Self::new`] with an externally owned affinity hint.
    pub fn with_affinity(
        chain: Vec<ProviderConfig>,
        settings: ResolverSettings,
        affinity: Arc<ProviderAffinity>,
    ) -> Result<Self> {
        let eligible: Vec<ProviderConfig> =
            chain.into_iter().filter(ProviderConfig::is_eligible).collect();

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AgentError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        info!(
            providers = eligible.len(),
            chain = %eligible.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(" → "),
            "provider resolver ready"
        );

        Ok(Self {
            chain: Arc::new(eligible),
            settings: Arc::new(settings),
            affinity,
            http,
        })
    }

    /// Eligible providers in priority order.
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.chain
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn affinity(&self) -> &Arc<ProviderAffinity> {
        &self.affinity
    }

    /// Produce a reply for `messages`. Never fails; exhaustion yields the fallback text.
    pub async fn resolve(&self, messages: &[PromptMessage], temperature: f32) -> String {
        self.resolve_detailed(messages, temperature).await.text
    }

    /// Like [`Self::resolve`] but reports which provider answered and what failed.
    pub async fn resolve_detailed(
        &self,
        messages: &[PromptMessage],
        temperature: f32,
    ) -> Resolution {
        let mut failures = Vec::new();

        for index in self.attempt_order() {
            let provider = &self.chain[index];
            match self.attempt(provider, messages, temperature).await {
                Ok(text) => {
                    self.affinity.set(index);
                    info!(provider = %provider.name, failed_before = failures.len(), "reply accepted");
                    return Resolution {
                        text,
                        provider: Some(provider.name.clone()),
                        failures,
                    };
                }
                Err(err) => {
                    warn!(provider = %provider.name, error = %err, "provider attempt failed");
                    failures.push(err);
                }
            }
        }

        warn!(attempts = failures.len(), "all providers failed, returning fallback");
        Resolution {
            text: fallback_message(&self.settings.owner_contact),
            provider: None,
            failures,
        }
    }

    /// Call every eligible provider once with `messages`, ignoring affinity.
    ///
    /// Used by diagnostics; results are in chain order.
    pub async fn probe(&self, messages: &[PromptMessage]) -> Vec<(String, Result<String>)> {
        let mut results = Vec::with_capacity(self.chain.len());
        for provider in self.chain.iter() {
            let outcome = self.attempt(provider, messages, 0.0).await;
            results.push((provider.name.clone(), outcome));
        }
        results
    }

    /// Chain indices in attempt order: the affinity hint first, then the rest.
    fn attempt_order(&self) -> Vec<usize> {
        let len = self.chain.len();
        match self.affinity.get().filter(|&i| i < len) {
            Some(hint) => std::iter::once(hint)
                .chain((0..len).filter(move |&i| i != hint))
                .collect(),
            None => (0..len).collect(),
        }
    }

    /// One provider, at most one extra call after a warm-up wait.
    async fn attempt(
        &self,
        provider: &ProviderConfig,
        messages: &[PromptMessage],
        temperature: f32,
    ) -> Result<String> {
        let request = provider.encode(messages, temperature);
        let mut warmed_up = false;

        loop {
            match self.call(provider, &request.body).await {
                Ok(body) => {
                    let text = extract_text(&body, &provider.extraction).ok_or_else(|| {
                        AgentError::UnrecognizedShape {
                            provider: provider.name.clone(),
                        }
                    })?;
                    let text = strip_prompt(&text, request.prompt.as_deref());

                    validate_reply(&text, last_user_text(messages), &self.settings).map_err(
                        |reason| AgentError::Rejected {
                            provider: provider.name.clone(),
                            reason,
                        },
                    )?;
                    return Ok(text);
                }
                Err(CallError::WarmingUp(estimated)) if !warmed_up => {
                    if estimated >= self.settings.warmup_max_wait {
                        return Err(AgentError::Status {
                            provider: provider.name.clone(),
                            status: 503,
                            body: format!("model loading, estimated {}s", estimated.as_secs_f64()),
                        });
                    }
                    let wait = estimated + self.settings.warmup_padding;
                    info!(provider = %provider.name, wait_ms = wait.as_millis() as u64, "model warming up, waiting once");
                    tokio::time::sleep(wait).await;
                    warmed_up = true;
                }
                Err(CallError::WarmingUp(_)) => {
                    return Err(AgentError::Status {
                        provider: provider.name.clone(),
                        status: 503,
                        body: "model still loading after wait".into(),
                    });
                }
                Err(CallError::Failed(err)) => return Err(err),
            }
        }
    }

    /// One POST under the provider's timeout. Returns the parsed JSON body.
    async fn call(
        &self,
        provider: &ProviderConfig,
        body: &Value,
    ) -> std::result::Result<Value, CallError> {
        let request = provider.authorize(self.http.post(provider.request_url()).json(body));
        debug!(provider = %provider.name, url = %provider.request_url(), "sending request");

        let exchange = async {
            let resp = request.send().await.map_err(|e| AgentError::RequestFailed {
                provider: provider.name.clone(),
                reason: e.to_string(),
            })?;
            let status = resp.status();
            let text = resp.text().await.map_err(|e| AgentError::RequestFailed {
                provider: provider.name.clone(),
                reason: format!("failed to read response body: {e}"),
            })?;
            Ok::<_, AgentError>((status, text))
        };

        let (status, text) = match tokio::time::timeout(provider.timeout, exchange).await {
            Ok(result) => result.map_err(CallError::Failed)?,
            Err(_) => {
                return Err(CallError::Failed(AgentError::Timeout {
                    provider: provider.name.clone(),
                    secs: provider.timeout.as_secs(),
                }));
            }
        };

        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            if let Some(estimated) = estimated_wait(&text) {
                return Err(CallError::WarmingUp(estimated));
            }
        }

        if !status.is_success() {
            return Err(CallError::Failed(AgentError::Status {
                provider: provider.name.clone(),
                status: status.as_u16(),
                body: truncate(&text, 200),
            }));
        }

        serde_json::from_str(&text).map_err(|e| {
            CallError::Failed(AgentError::ParseFailed {
                provider: provider.name.clone(),
                reason: e.to_string(),
            })
        })
    }
}

enum CallError {
    /// 503 carrying `estimated_time`.
    WarmingUp(Duration),
    Failed(AgentError),
}

/// `estimated_time` (seconds) from a model-loading 503 body.
fn estimated_wait(body: &str) -> Option<Duration> {
    let value: Value = serde_json::from_str(body).ok()?;
    let secs = value.get("estimated_time")?.as_f64()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ProviderKind;

    fn settings() -> ResolverSettings {
        ResolverSettings {
            owner_contact: "@owner".into(),
            ..ResolverSettings::default()
        }
    }

    #[test]
    fn validate_rejects_empty_echo_and_short() {
        let s = settings();
        assert_eq!(validate_reply("   ", Some("hi"), &s), Err(RejectReason::Empty));
        assert_eq!(
            validate_reply("I'm tired", Some("I'm tired"), &s),
            Err(RejectReason::Echo)
        );
        assert_eq!(
            validate_reply("ok", Some("hello"), &s),
            Err(RejectReason::TooShort { len: 2, min: 4 })
        );
        assert!(validate_reply("sure thing", Some("hello"), &s).is_ok());
    }

    #[test]
    fn echo_is_exact_unless_configured() {
        let mut s = settings();
        assert!(validate_reply("HELLO THERE", Some("hello there"), &s).is_ok());

        s.echo_case_insensitive = true;
        assert_eq!(
            validate_reply(" HELLO THERE ", Some("hello there"), &s),
            Err(RejectReason::Echo)
        );
    }

    #[test]
    fn min_length_counts_chars_not_bytes() {
        let s = settings();
        // Four emoji are 16 bytes but four characters.
        assert!(validate_reply("😊😊😊😊", Some("x"), &s).is_ok());
        assert!(validate_reply("😊😊😊", Some("x"), &s).is_err());
    }

    #[test]
    fn fallback_names_owner_contact() {
        let text = fallback_message("https://t.me/someone");
        assert!(text.starts_with("Sorry yaar"));
        assert!(text.ends_with("Contact: https://t.me/someone"));
    }

    #[test]
    fn estimated_wait_parses_loading_body() {
        let body = r#"{"error":"Model is currently loading","estimated_time":3.5}"#;
        assert_eq!(estimated_wait(body), Some(Duration::from_millis(3500)));
        assert_eq!(estimated_wait(r#"{"error":"overloaded"}"#), None);
        assert_eq!(estimated_wait("not json"), None);
    }

    #[test]
    fn affinity_reorders_attempts() {
        let chain = vec![
            ProviderConfig::new(ProviderKind::Groq, "a"),
            ProviderConfig::new(ProviderKind::OpenAi, "b"),
            ProviderConfig::new(ProviderKind::Grok, "c"),
        ];
        let resolver = ProviderResolver::new(chain, settings()).unwrap();
        assert_eq!(resolver.attempt_order(), vec![0, 1, 2]);

        resolver.affinity().set(2);
        assert_eq!(resolver.attempt_order(), vec![2, 0, 1]);

        // Stale hints beyond the chain are ignored.
        resolver.affinity().set(9);
        assert_eq!(resolver.attempt_order(), vec![0, 1, 2]);
    }

    #[test]
    fn ineligible_providers_are_dropped() {
        let chain = vec![
            ProviderConfig::new(ProviderKind::Groq, ""),
            ProviderConfig::new(ProviderKind::OpenAi, "key"),
        ];
        let resolver = ProviderResolver::new(chain, settings()).unwrap();
        assert_eq!(resolver.providers().len(), 1);
        assert_eq!(resolver.providers()[0].kind, ProviderKind::OpenAi);
    }

    #[tokio::test]
    async fn empty_chain_returns_fallback() {
        let resolver = ProviderResolver::new(Vec::new(), settings()).unwrap();
        let resolution = resolver
            .resolve_detailed(&[PromptMessage::system("s"), PromptMessage::user("hi")], 0.7)
            .await;
        assert!(resolution.is_fallback());
        assert!(resolution.failures.is_empty());
        assert!(resolution.text.contains("@owner"));
    }
}
