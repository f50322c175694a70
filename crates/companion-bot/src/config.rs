//! Bot configuration.
//!
//! Values come from three layers, highest priority first:
//!
//! 1. Environment variables (a `.env` file is loaded by [`BotConfig::from_env`]).
//! 2. The optional `config/companion.toml` file.
//! 3. Built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use companion_agent::llm::{HUGGINGFACE_FALLBACK_MODELS, PROVIDER_TABLE};
use companion_agent::{ProviderConfig, ProviderKind, ResolverSettings};

use crate::telegram::ChatId;

/// Location of the optional TOML config file.
pub const DEFAULT_CONFIG_PATH: &str = "config/companion.toml";

const DEFAULT_BOT_NAME: &str = "AI Life Partner";
const DEFAULT_OWNER_CONTACT: &str = "the bot owner";
const DEFAULT_DATABASE_PATH: &str = "data/companion.db";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// TOML file
// ---------------------------------------------------------------------------

/// Shape of `config/companion.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bot: BotSection,
    pub resolver: ResolverSection,
    /// Message template overrides, flattened to dotted keys on load.
    pub messages: toml::Table,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BotSection {
    pub name: Option<String>,
    pub database_path: Option<PathBuf>,
    pub owner_contact: Option<String>,
    pub flood_sleep: Option<u64>,
    pub port: Option<u16>,
    pub history_window: Option<usize>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    pub primary: Option<String>,
    pub timeout_secs: Option<u64>,
    pub min_reply_len: Option<usize>,
    pub echo_case_insensitive: Option<bool>,
}

impl FileConfig {
    /// Load the file at `path`.
    ///
    /// Falls back to defaults if the file is missing or does not parse.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };

        match toml::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                Self::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Credential and overrides for one provider kind.
#[derive(Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub credential: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

impl ProviderSettings {
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }
}

/// Fully resolved configuration for the bot and the CLI.
#[derive(Clone)]
pub struct BotConfig {
    pub bot_token: Option<String>,
    pub bot_name: String,
    /// Tried before the rest of the table when set.
    pub primary: Option<ProviderKind>,
    /// One entry per provider kind, in table order.
    pub providers: Vec<ProviderSettings>,
    pub database_path: PathBuf,
    pub log_channel: Option<ChatId>,
    pub force_sub_channel: Option<String>,
    pub owner_ids: Vec<i64>,
    pub owner_contact: String,
    pub flood_window: Duration,
    pub port: u16,
    /// Overrides every provider's table timeout when set.
    pub provider_timeout: Option<Duration>,
    pub history_window: usize,
    pub min_reply_len: usize,
    pub echo_case_insensitive: bool,
    pub temperature: f32,
    pub message_overrides: toml::Table,
}

impl BotConfig {
    /// Load `.env`, the default config file and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let file = FileConfig::load(DEFAULT_CONFIG_PATH);
        Self::from_sources(|key| std::env::var(key).ok(), file)
    }

    /// Merge `lookup` (environment-style) over `file` over defaults.
    pub fn from_sources<F>(lookup: F, file: FileConfig) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let primary = match var("AI_PROVIDER").or(file.resolver.primary) {
            Some(raw) => Some(
                raw.parse::<ProviderKind>()
                    .map_err(|e| invalid("AI_PROVIDER", &raw, e))?,
            ),
            None => None,
        };

        let providers = PROVIDER_TABLE
            .iter()
            .map(|spec| {
                let endpoint = match spec.kind {
                    ProviderKind::Grok => var("GROK_API_URL").map(|url| {
                        url.trim_end_matches('/')
                            .trim_end_matches("/chat/completions")
                            .to_string()
                    }),
                    _ => None,
                };
                ProviderSettings {
                    kind: spec.kind,
                    credential: var(spec.key_env),
                    model: var(spec.model_env),
                    endpoint,
                }
            })
            .collect();

        let log_channel = var("LOG_CHANNEL")
            .filter(|v| v != "0")
            .map(|v| ChatId::parse(&v));

        let owner_ids = match var("OWNER_ID") {
            Some(raw) => raw
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<i64>().map_err(|e| invalid("OWNER_ID", s, e)))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let flood_secs = parse_or(&var, "FLOOD_SLEEP", file.bot.flood_sleep, 3)?;
        let port = parse_or(&var, "PORT", file.bot.port, 8080)?;
        let history_window = parse_or(&var, "HISTORY_WINDOW", file.bot.history_window, 5)?;
        let min_reply_len = parse_or(&var, "MIN_REPLY_LEN", file.resolver.min_reply_len, 4)?;
        let echo_case_insensitive = parse_or(
            &var,
            "ECHO_CASE_INSENSITIVE",
            file.resolver.echo_case_insensitive,
            false,
        )?;
        let provider_timeout = match var("PROVIDER_TIMEOUT_SECS") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|e| invalid("PROVIDER_TIMEOUT_SECS", &raw, e))?,
            ),
            None => file.resolver.timeout_secs,
        }
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs);

        Ok(Self {
            bot_token: var("BOT_TOKEN"),
            bot_name: var("BOT_NAME")
                .or(file.bot.name)
                .unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),
            primary,
            providers,
            database_path: var("DATABASE_PATH")
                .map(PathBuf::from)
                .or(file.bot.database_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            log_channel,
            force_sub_channel: var("FORCE_SUB_CHANNEL"),
            owner_ids,
            owner_contact: var("OWNER_CONTACT")
                .or(file.bot.owner_contact)
                .unwrap_or_else(|| DEFAULT_OWNER_CONTACT.to_string()),
            flood_window: Duration::from_secs(flood_secs),
            port,
            provider_timeout,
            history_window,
            min_reply_len,
            echo_case_insensitive,
            temperature: file.bot.temperature.unwrap_or(0.8),
            message_overrides: file.messages,
        })
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_ids.contains(&user_id)
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.kind == kind)
    }

    /// Provider kinds in attempt order: primary first, then table order.
    pub fn provider_order(&self) -> Vec<ProviderKind> {
        let mut order: Vec<ProviderKind> = self.primary.into_iter().collect();
        order.extend(
            PROVIDER_TABLE
                .iter()
                .map(|spec| spec.kind)
                .filter(|kind| Some(*kind) != self.primary),
        );
        order
    }

    /// The resolver chain. Kinds without a credential are skipped.
    ///
    /// Hugging Face contributes one extra entry per fallback model.
    pub fn provider_chain(&self) -> Vec<ProviderConfig> {
        let mut chain = Vec::new();

        for kind in self.provider_order() {
            let Some(settings) = self.provider(kind) else {
                continue;
            };
            let Some(credential) = settings.credential.as_deref() else {
                continue;
            };

            let mut config = ProviderConfig::new(kind, credential);
            if let Some(model) = &settings.model {
                config = config.with_model(model);
            }
            if let Some(endpoint) = &settings.endpoint {
                config = config.with_endpoint(endpoint);
            }
            if let Some(timeout) = self.provider_timeout {
                config = config.with_timeout(timeout);
            }

            let primary_model = config.model.clone();
            chain.push(config.clone());

            if kind == ProviderKind::HuggingFace {
                for model in HUGGINGFACE_FALLBACK_MODELS
                    .iter()
                    .filter(|m| **m != primary_model)
                {
                    chain.push(
                        config
                            .clone()
                            .with_model(*model)
                            .with_name(format!("{}:{model}", kind.as_str())),
                    );
                }
            }
        }

        chain
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            min_reply_len: self.min_reply_len,
            echo_case_insensitive: self.echo_case_insensitive,
            owner_contact: self.owner_contact.clone(),
            ..ResolverSettings::default()
        }
    }
}

fn parse_or<T, V>(var: &V, key: &'static str, file_value: Option<T>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.parse::<T>().map_err(|e| invalid(key, &raw, e)),
        None => Ok(file_value.unwrap_or(default)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> BotConfig {
        config_with_file(vars, FileConfig::default())
    }

    fn config_with_file(vars: &[(&str, &str)], file: FileConfig) -> BotConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_sources(|key| map.get(key).cloned(), file).unwrap()
    }

    #[test]
    fn defaults_without_any_source() {
        let cfg = config(&[]);
        assert_eq!(cfg.bot_name, "AI Life Partner");
        assert_eq!(cfg.flood_window, Duration::from_secs(3));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.history_window, 5);
        assert_eq!(cfg.min_reply_len, 4);
        assert!(!cfg.echo_case_insensitive);
        assert!(cfg.provider_chain().is_empty());
        assert!(cfg.log_channel.is_none());
    }

    #[test]
    fn primary_goes_first_and_missing_keys_are_skipped() {
        let cfg = config(&[
            ("AI_PROVIDER", "groq"),
            ("GEMINI_API_KEY", "g"),
            ("GROQ_API_KEY", "q"),
            ("OPENAI_API_KEY", "  "),
        ]);
        let names: Vec<String> = cfg.provider_chain().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["groq", "gemini"]);
    }

    #[test]
    fn huggingface_adds_fallback_models() {
        let cfg = config(&[("HUGGINGFACE_API_KEY", "hf")]);
        let chain = cfg.provider_chain();
        assert_eq!(chain.len(), 1 + HUGGINGFACE_FALLBACK_MODELS.len());
        assert_eq!(chain[0].name, "huggingface");
        assert!(chain[1].name.starts_with("huggingface:"));
        assert!(chain.iter().all(|p| p.kind == ProviderKind::HuggingFace));
    }

    #[test]
    fn grok_url_and_timeout_override() {
        let cfg = config(&[
            ("GROK_API_KEY", "x"),
            ("GROK_API_URL", "https://proxy.example/v1/chat/completions"),
            ("PROVIDER_TIMEOUT_SECS", "12"),
        ]);
        let chain = cfg.provider_chain();
        assert_eq!(chain[0].endpoint, "https://proxy.example/v1");
        assert_eq!(chain[0].request_url(), "https://proxy.example/v1/chat/completions");
        assert_eq!(chain[0].timeout, Duration::from_secs(12));
    }

    #[test]
    fn owner_ids_are_space_separated() {
        let cfg = config(&[("OWNER_ID", "111 222  333")]);
        assert_eq!(cfg.owner_ids, vec![111, 222, 333]);
        assert!(cfg.is_owner(222));
        assert!(!cfg.is_owner(444));
    }

    #[test]
    fn log_channel_accepts_id_or_username() {
        assert_eq!(config(&[("LOG_CHANNEL", "-1001234")]).log_channel, Some(ChatId::Id(-1001234)));
        assert_eq!(
            config(&[("LOG_CHANNEL", "mylogs")]).log_channel,
            Some(ChatId::Username("@mylogs".into()))
        );
        assert_eq!(config(&[("LOG_CHANNEL", "0")]).log_channel, None);
    }

    #[test]
    fn env_beats_file() {
        let file: FileConfig = toml::from_str(
            r#"
            [bot]
            name = "From File"
            flood_sleep = 7

            [resolver]
            primary = "gemini"
            min_reply_len = 2
            "#,
        )
        .unwrap();

        let cfg = config_with_file(&[("BOT_NAME", "From Env")], file);
        assert_eq!(cfg.bot_name, "From Env");
        assert_eq!(cfg.flood_window, Duration::from_secs(7));
        assert_eq!(cfg.primary, Some(ProviderKind::Gemini));
        assert_eq!(cfg.resolver_settings().min_reply_len, 2);
    }

    #[test]
    fn bad_numbers_are_reported() {
        let map: HashMap<&str, &str> = [("PORT", "eighty")].into_iter().collect();
        let err = BotConfig::from_sources(|k| map.get(k).map(|v| v.to_string()), FileConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let result = BotConfig::from_sources(
            |k| (k == "AI_PROVIDER").then(|| "claude".to_string()),
            FileConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let file = FileConfig::load("does/not/exist.toml");
        assert!(file.bot.name.is_none());
        assert!(file.messages.is_empty());
    }
}
