//! Subcommand: `companion bot` -- Telegram long-polling gateway.
//!
//! Polls Telegram for updates, persists the offset after each one so a
//! restart never replays a message, and hands every update to its own task.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use companion_agent::ProviderResolver;
use companion_store::{BotStateStore, ConversationStore, Database, ProfileStore};

use crate::config::BotConfig;
use crate::flood::FloodGuard;
use crate::handlers;
use crate::health;
use crate::helpers::{TELEGRAM_CHUNK_LEN, init_tracing, split_telegram_message};
use crate::messages::Messages;
use crate::subscription::SubscriptionGate;
use crate::telegram::TelegramClient;
use crate::update::{Update, update_id};

// ═══════════════════════════════════════════════════════════════════════
//  Shared state
// ═══════════════════════════════════════════════════════════════════════

/// Everything a handler needs, shared across update tasks.
pub struct App {
    pub config: BotConfig,
    pub telegram: TelegramClient,
    pub db: Database,
    pub profiles: ProfileStore,
    pub turns: ConversationStore,
    pub state: BotStateStore,
    pub resolver: ProviderResolver,
    pub flood: FloodGuard,
    pub gate: SubscriptionGate,
    pub messages: Messages,
}

impl App {
    pub fn new(
        config: BotConfig,
        telegram: TelegramClient,
        db: Database,
        resolver: ProviderResolver,
    ) -> Self {
        Self {
            profiles: ProfileStore::new(db.clone()),
            turns: ConversationStore::new(db.clone()),
            state: BotStateStore::new(db.clone()),
            flood: FloodGuard::new(config.flood_window),
            gate: SubscriptionGate::new(
                config.force_sub_channel.as_deref(),
                config.owner_ids.clone(),
            ),
            messages: Messages::with_overrides(&config.message_overrides),
            config,
            telegram,
            db,
            resolver,
        }
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.config.is_owner(user_id)
    }

    /// Send HTML text, splitting long bodies. Failures are logged and dropped.
    pub async fn reply(&self, chat_id: i64, text: &str) {
        self.reply_with(chat_id, text, None).await;
    }

    /// Like [`Self::reply`]; the keyboard is attached to the last chunk.
    pub async fn reply_with(&self, chat_id: i64, text: &str, markup: Option<Value>) {
        let chunks = split_telegram_message(text, TELEGRAM_CHUNK_LEN);
        let last = chunks.len().saturating_sub(1);
        let mut markup = markup;

        for (i, chunk) in chunks.iter().enumerate() {
            let keyboard = if i == last { markup.take() } else { None };
            if let Err(e) = self.telegram.send_message(chat_id, chunk, keyboard).await {
                warn!(chat_id, error = %e, "failed to send message");
                return;
            }
        }
    }

    /// Send provider output as plain text so stray `<` or `&` cannot break it.
    pub async fn reply_plain(&self, chat_id: i64, text: &str) {
        for chunk in split_telegram_message(text, TELEGRAM_CHUNK_LEN) {
            if let Err(e) = self.telegram.send_plain(chat_id, &chunk).await {
                warn!(chat_id, error = %e, "failed to send reply");
                return;
            }
        }
    }

    /// Forward an HTML notice to the log channel, if one is configured.
    pub async fn log(&self, text: &str) {
        let Some(channel) = &self.config.log_channel else {
            return;
        };
        for chunk in split_telegram_message(text, TELEGRAM_CHUNK_LEN) {
            if let Err(e) = self
                .telegram
                .send_message(channel.clone(), &chunk, None)
                .await
            {
                warn!(channel = %channel, error = %e, "failed to write to log channel");
                return;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Polling
// ═══════════════════════════════════════════════════════════════════════

/// Fetch one batch and persist the offset past each update.
///
/// Returns the next offset and the raw updates in arrival order.
pub async fn poll_once(app: &App, offset: i64, poll_timeout: u64) -> Result<(i64, Vec<Value>)> {
    let updates = app
        .telegram
        .get_updates(offset, poll_timeout)
        .await
        .context("getUpdates failed")?;

    let mut next = offset;
    for update in &updates {
        if let Some(id) = update_id(update) {
            next = next.max(id + 1);
            if let Err(e) = app.state.set_polling_offset(next).await {
                warn!(offset = next, error = %e, "failed to persist polling offset");
            }
        }
    }
    Ok((next, updates))
}

/// Run the polling loop forever.
pub async fn run(app: Arc<App>, poll_timeout: u64) -> Result<()> {
    let mut offset = app
        .state
        .polling_offset()
        .await
        .context("failed to read polling offset")?;
    if offset > 0 {
        info!(offset, "restored Telegram polling offset from database");
    }

    loop {
        let updates = match poll_once(&app, offset, poll_timeout).await {
            Ok((next, updates)) => {
                offset = next;
                updates
            }
            Err(e) => {
                warn!(error = %e, "Telegram poll failed, retrying...");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for raw in updates {
            let update = Update::parse(&raw);
            if update == Update::Other {
                debug!("skipping unsupported update");
                continue;
            }
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                handlers::dispatch(&app, update).await;
            });
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Entry point
// ═══════════════════════════════════════════════════════════════════════

/// Run the Telegram bot gateway until Ctrl-C.
pub async fn cmd_bot(poll_timeout: u64, no_health: bool) -> Result<()> {
    init_tracing("info");
    info!("starting Telegram bot gateway");

    let config = BotConfig::from_env().context("invalid configuration")?;

    let token = config.bot_token.clone().ok_or_else(|| {
        anyhow::anyhow!("BOT_TOKEN is required. Create a bot at https://t.me/BotFather")
    })?;
    let telegram = TelegramClient::new(&token);

    // Verify the token before touching anything else.
    let me = telegram.get_me().await.context("Telegram getMe failed")?;
    let username = me
        .pointer("/username")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let db = Database::open(config.database_path.clone())
        .await
        .context("failed to open database")?;

    let chain = config.provider_chain();
    if chain.is_empty() {
        warn!("no AI provider has an API key; every reply will be the fallback message");
    }
    let resolver = ProviderResolver::new(chain, config.resolver_settings())
        .context("failed to build provider resolver")?;

    if !no_health {
        let name = config.bot_name.clone();
        let port = config.port;
        tokio::spawn(async move {
            if let Err(e) = health::serve(&name, port).await {
                warn!(port, error = %e, "health endpoint stopped");
            }
        });
    }

    info!(
        bot = %username,
        name = %config.bot_name,
        providers = resolver.providers().len(),
        owners = config.owner_ids.len(),
        "bot ready"
    );
    println!("  ✅ {} started as @{username}", config.bot_name);
    println!("  Press Ctrl+C to stop.");

    let app = Arc::new(App::new(config, telegram, db, resolver));

    tokio::select! {
        result = run(app, poll_timeout) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
