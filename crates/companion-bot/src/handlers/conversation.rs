//! Free-text conversation.
//!
//! Gate checks, then history, context, provider resolution, reply and
//! persistence. The turn is stored even when the fallback text was sent.

use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use companion_agent::{build_context, chronological};
use companion_store::Gender;

use crate::bot::App;
use crate::handlers::commands::admit;
use crate::helpers::{escape_html, random_reaction};
use crate::messages::keys;
use crate::telegram::TelegramClient;
use crate::update::IncomingMessage;

const TYPING_REFRESH: Duration = Duration::from_secs(4);

pub async fn handle(app: &App, msg: &IncomingMessage) -> Result<()> {
    let user_id = msg.from.id;

    if !admit(app, msg, true).await? {
        return Ok(());
    }

    if !app.flood.check(user_id).await {
        app.reply(msg.chat_id, &app.messages.get(keys::FLOOD_WAIT)).await;
        return Ok(());
    }

    let Some(profile) = app.profiles.get(user_id).await? else {
        app.reply(msg.chat_id, &app.messages.get(keys::START_FIRST)).await;
        return Ok(());
    };
    if profile.gender == Gender::Unset {
        app.reply(msg.chat_id, &app.messages.get(keys::GENDER_FIRST)).await;
        return Ok(());
    }

    let history = chronological(app.turns.recent(user_id, app.config.history_window).await?);
    let context = build_context(&profile, &history, &msg.text);

    react(app, msg).await;

    let _ = app.telegram.send_chat_action(msg.chat_id, "typing").await;
    let typing = Typing::start(app.telegram.clone(), msg.chat_id, TYPING_REFRESH);
    let resolution = app
        .resolver
        .resolve_detailed(&context, app.config.temperature)
        .await;
    drop(typing);

    info!(
        user_id,
        history = history.len(),
        provider = resolution.provider.as_deref().unwrap_or("fallback"),
        failures = resolution.failures.len(),
        "reply resolved"
    );

    app.reply_plain(msg.chat_id, &resolution.text).await;
    app.turns
        .append_turn(user_id, &msg.text, &resolution.text)
        .await?;

    app.log(&format!(
        "💬 <b>Conversation Log</b>\n\n\
         👤 <b>User:</b> {}\n\
         🆔 <b>ID:</b> <code>{}</code>\n\
         🎭 <b>Gender:</b> {}\n\
         ⚙️ <b>Mode:</b> {}\n\
         📊 <b>Total Chats:</b> {}\n\
         {sep}\n\n\
         <b>👤 User Message:</b>\n{}\n\n\
         {sep}\n\n\
         <b>🤖 Bot Response:</b>\n{}",
        escape_html(&msg.from.first_name),
        user_id,
        profile.gender.label(),
        profile.mode.title(),
        profile.conversation_count + 1,
        escape_html(&msg.text),
        escape_html(&resolution.text),
        sep = "=".repeat(30),
    ))
    .await;

    Ok(())
}

/// Re-sends the typing action until dropped.
struct Typing {
    task: JoinHandle<()>,
}

impl Typing {
    fn start(telegram: TelegramClient, chat_id: i64, every: Duration) -> Self {
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let _ = telegram.send_chat_action(chat_id, "typing").await;
            }
        });
        Self { task }
    }
}

impl Drop for Typing {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// React with a random emoji. Chats that reject reactions are ignored.
async fn react(app: &App, msg: &IncomingMessage) {
    let emoji = random_reaction();
    if let Err(e) = app
        .telegram
        .set_message_reaction(msg.chat_id, msg.message_id, emoji)
        .await
    {
        if e.description().is_some_and(|d| d.contains("REACTION_INVALID")) {
            return;
        }
        debug!(error = %e, "reaction failed");
    }
}
