//! Subcommands: `status`, `setup` and `ask`.

use std::path::Path;

use anyhow::{Context, Result};

use companion_agent::{ProviderResolver, build_context};
use companion_store::{Database, Gender, Mode, ProfileStore, UserProfile};

use crate::config::{BotConfig, DEFAULT_CONFIG_PATH};
use crate::helpers::{init_tracing, set_marker};

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

pub async fn cmd_status() -> Result<()> {
    init_tracing("warn");
    let config = BotConfig::from_env().context("invalid configuration")?;

    println!();
    println!("  Companion v{}", env!("CARGO_PKG_VERSION"));
    println!("  ─────────────────────────────────");
    println!("  Bot name:       {}", config.bot_name);
    println!("  BOT_TOKEN:      {}", set_marker(config.bot_token.is_some()));
    println!("  Owners:         {}", config.owner_ids.len());
    println!("  Log channel:    {}", set_marker(config.log_channel.is_some()));
    println!(
        "  Force sub:      {}",
        config.force_sub_channel.as_deref().unwrap_or("❌ Not Set")
    );
    println!("  Flood window:   {}s", config.flood_window.as_secs());
    println!("  History window: {} turns", config.history_window);
    println!(
        "  Config file:    {}",
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            DEFAULT_CONFIG_PATH
        } else {
            "(none)"
        }
    );

    println!();
    println!("  Providers (attempt order):");
    let chain = config.provider_chain();
    if chain.is_empty() {
        println!("    ❌ no API keys configured");
    }
    for (i, provider) in chain.iter().enumerate() {
        println!(
            "    {}. {:<28} model={} timeout={}s",
            i + 1,
            provider.name,
            provider.model,
            provider.timeout.as_secs()
        );
    }

    println!();
    if config.database_path.exists() {
        let db = Database::open(config.database_path.clone())
            .await
            .context("failed to open database")?;
        let profiles = ProfileStore::new(db.clone());
        let users = profiles.count().await?;
        let genders = profiles.gender_breakdown().await?;
        println!(
            "  Database:       {} (schema v{})",
            config.database_path.display(),
            db.schema_version().await?
        );
        println!("  Users:          {users} ({} without gender)", genders.unset);
    } else {
        println!(
            "  Database:       {} (not created yet)",
            config.database_path.display()
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// setup
// ---------------------------------------------------------------------------

const ENV_TEMPLATE: &str = "\
# Telegram
BOT_TOKEN=
BOT_NAME=AI Life Partner
OWNER_ID=
OWNER_CONTACT=
LOG_CHANNEL=
FORCE_SUB_CHANNEL=

# AI providers (any subset; the primary is tried first)
AI_PROVIDER=huggingface
HUGGINGFACE_API_KEY=
GEMINI_API_KEY=
GROQ_API_KEY=
OPENAI_API_KEY=
GROK_API_KEY=

# Runtime
DATABASE_PATH=data/companion.db
FLOOD_SLEEP=3
PORT=8080
";

const CONFIG_TEMPLATE: &str = r#"# Companion configuration. Environment variables take precedence.

[bot]
name = "AI Life Partner"
database_path = "data/companion.db"
flood_sleep = 3
port = 8080
history_window = 5
temperature = 0.8

[resolver]
# primary = "groq"
# timeout_secs = 30
min_reply_len = 4
echo_case_insensitive = false

# Override any user-facing text. Keys match the built-in templates.
[messages]
# errors.flood_wait = "⏳ Thoda ruko!"
"#;

/// Write a file unless it exists and `force` is off. Returns whether it was written.
fn write_template(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

pub async fn cmd_setup(force: bool) -> Result<()> {
    println!();
    for (path, content) in [
        (Path::new(".env"), ENV_TEMPLATE),
        (Path::new(DEFAULT_CONFIG_PATH), CONFIG_TEMPLATE),
    ] {
        if write_template(path, content, force)? {
            println!("  ✅ wrote {}", path.display());
        } else {
            println!("  ·  kept existing {} (use --force to overwrite)", path.display());
        }
    }
    println!();
    println!("  Next: fill in BOT_TOKEN and at least one provider key, then run `companion bot`.");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// ask
// ---------------------------------------------------------------------------

/// Resolve one message against the configured chain and print the outcome.
///
/// Uses an empty history and never touches the database.
pub async fn cmd_ask(text: &str, gender: &str, mode: &str) -> Result<()> {
    init_tracing("warn");
    let config = BotConfig::from_env().context("invalid configuration")?;

    let gender: Gender = gender.parse().context("invalid --gender")?;
    let mode: Mode = mode.parse().context("invalid --mode")?;
    let profile = UserProfile {
        gender,
        mode,
        ..UserProfile::new(0, "cli")
    };

    let resolver = ProviderResolver::new(config.provider_chain(), config.resolver_settings())
        .context("failed to build provider resolver")?;
    if resolver.providers().is_empty() {
        anyhow::bail!("no AI provider has an API key; run `companion status`");
    }

    let context = build_context(&profile, &[], text);
    let resolution = resolver.resolve_detailed(&context, config.temperature).await;

    for failure in &resolution.failures {
        eprintln!("  ✗ {failure}");
    }
    match &resolution.provider {
        Some(name) => eprintln!("  ✓ answered by {name}"),
        None => eprintln!("  ✗ every provider failed; fallback text below"),
    }
    println!("{}", resolution.text);
    Ok(())
}
