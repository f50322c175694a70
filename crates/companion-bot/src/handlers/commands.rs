//! User commands.

use anyhow::Result;
use tracing::info;

use companion_store::{Gender, Mode};

use crate::bot::App;
use crate::helpers::escape_html;
use crate::keyboards::{gender_keyboard, mode_keyboard};
use crate::messages::keys;
use crate::subscription::GateOutcome;
use crate::update::IncomingMessage;

pub fn gender_emoji(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "👨",
        Gender::Female => "👩",
        Gender::Transgender => "🏳️‍⚧️",
        Gender::Nonbinary => "⚧️",
        Gender::Unset => "😊",
    }
}

/// Shared prelude for `/start` and conversation: database, subscription, ban.
///
/// Returns `false` after replying when the user may not continue.
pub(crate) async fn admit(app: &App, msg: &IncomingMessage, short: bool) -> Result<bool> {
    let user_id = msg.from.id;

    if !app.db.ping().await {
        let text = app.messages.get_with(
            keys::DB_UNAVAILABLE,
            &[("contact", escape_html(&app.config.owner_contact).as_str())],
        );
        app.reply(msg.chat_id, &text).await;
        return Ok(false);
    }

    if let GateOutcome::Blocked { keyboard } = app.gate.check(&app.telegram, user_id).await {
        let text = if short {
            app.messages.get(keys::SUB_REQUIRED_SHORT)
        } else {
            app.messages.get_with(
                keys::SUB_REQUIRED,
                &[("channel", app.gate.channel().unwrap_or_default())],
            )
        };
        app.reply_with(msg.chat_id, &text, Some(keyboard)).await;
        return Ok(false);
    }

    if app.profiles.is_banned(user_id).await? {
        // Conversation stays silent for banned users.
        if !short {
            app.reply(msg.chat_id, &app.messages.get(keys::BANNED)).await;
        }
        return Ok(false);
    }

    Ok(true)
}

pub async fn start(app: &App, msg: &IncomingMessage) -> Result<()> {
    if !admit(app, msg, false).await? {
        return Ok(());
    }

    let user = &msg.from;
    let existed = app.profiles.exists(user.id).await?;
    let profile = app
        .profiles
        .ensure(user.id, &user.first_name, user.username.as_deref())
        .await?;

    if profile.gender == Gender::Unset {
        let bot_name = escape_html(&app.config.bot_name);
        let text = app
            .messages
            .get_with(keys::WELCOME_NEW, &[("bot_name", bot_name.as_str())]);
        app.reply_with(msg.chat_id, &text, Some(gender_keyboard())).await;

        if !existed {
            info!(user_id = user.id, "new user");
            app.log(&format!(
                "🆕 <b>New User Started Bot</b>\n\n\
                 👤 Name: {}\n\
                 🆔 User ID: <code>{}</code>\n\
                 📝 Username: @{}\n\
                 🕐 Time: {}",
                escape_html(&user.first_name),
                user.id,
                escape_html(user.username.as_deref().unwrap_or("None")),
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            ))
            .await;
        }
    } else {
        let text = app
            .messages
            .get_with(keys::WELCOME_BACK, &[("emoji", gender_emoji(profile.gender))]);
        app.reply(msg.chat_id, &text).await;
    }

    Ok(())
}

pub async fn help(app: &App, msg: &IncomingMessage) -> Result<()> {
    let text = app.messages.get_with(
        keys::HELP,
        &[
            ("bot_name", escape_html(&app.config.bot_name).as_str()),
            ("contact", escape_html(&app.config.owner_contact).as_str()),
        ],
    );
    app.reply(msg.chat_id, &text).await;
    Ok(())
}

pub async fn mode(app: &App, msg: &IncomingMessage) -> Result<()> {
    let current = app
        .profiles
        .get(msg.from.id)
        .await?
        .map(|p| p.mode)
        .unwrap_or(Mode::Balanced);

    let text = app
        .messages
        .get_with(keys::MODE_PROMPT, &[("mode", current.title())]);
    app.reply_with(msg.chat_id, &text, Some(mode_keyboard())).await;
    Ok(())
}

pub async fn mood(app: &App, msg: &IncomingMessage) -> Result<()> {
    app.reply(msg.chat_id, &app.messages.get(keys::MOOD)).await;
    Ok(())
}

/// Forget the user's conversation history.
pub async fn reset(app: &App, msg: &IncomingMessage) -> Result<()> {
    let removed = app.turns.clear(msg.from.id).await?;
    info!(user_id = msg.from.id, removed, "history reset");

    app.reply(msg.chat_id, &app.messages.get(keys::RESET_DONE)).await;
    app.log(&format!(
        "🔄 <b>Memory Reset</b>\n\n👤 User: {} (<code>{}</code>)",
        escape_html(&msg.from.first_name),
        msg.from.id,
    ))
    .await;
    Ok(())
}

pub async fn privacy(app: &App, msg: &IncomingMessage) -> Result<()> {
    app.reply(msg.chat_id, &app.messages.get(keys::PRIVACY)).await;
    Ok(())
}
