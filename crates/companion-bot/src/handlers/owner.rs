//! Owner-only administration commands.
//!
//! The dispatcher only calls into this module for ids in `OWNER_ID`.

use anyhow::Result;
use tracing::{info, warn};

use companion_agent::PromptMessage;

use crate::bot::App;
use crate::helpers::{TELEGRAM_CHUNK_LEN, escape_html, set_marker, split_telegram_message};
use crate::telegram::{self, ChatId};
use crate::update::IncomingMessage;

/// Commands routed here.
pub const COMMANDS: &[&str] = &[
    "ownerpanel",
    "broadcast",
    "banuser",
    "unbanuser",
    "viewstats",
    "debug",
];

/// Edit the broadcast status message after this many deliveries.
const BROADCAST_PROGRESS_EVERY: usize = 50;

const PROBE_EXPECTED: &str = "WORKING";

pub async fn handle(app: &App, msg: &IncomingMessage, command: &str, args: &str) -> Result<()> {
    info!(owner = msg.from.id, command, "owner command");
    match command {
        "ownerpanel" => panel(app, msg).await,
        "broadcast" => broadcast(app, msg, args).await,
        "banuser" => set_ban(app, msg, args, true).await,
        "unbanuser" => set_ban(app, msg, args, false).await,
        "viewstats" => stats(app, msg).await,
        "debug" => debug_report(app, msg).await,
        _ => Ok(()),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Panel and stats
// ═══════════════════════════════════════════════════════════════════════

async fn panel(app: &App, msg: &IncomingMessage) -> Result<()> {
    let total = app.profiles.count().await?;
    let providers: Vec<&str> = app
        .resolver
        .providers()
        .iter()
        .map(|p| p.name.as_str())
        .collect();

    let text = format!(
        "🛠️ <b>Owner Control Panel</b>\n\n\
         📊 <b>Statistics:</b>\n\
         👥 Total Users: {total}\n\n\
         <b>Available Commands:</b>\n\
         /broadcast - Message all users\n\
         /viewstats - Detailed stats\n\
         /banuser - Ban a user\n\
         /unbanuser - Unban a user\n\
         /debug - System health check\n\n\
         <b>Current Config:</b>\n\
         🤖 Bot Name: {}\n\
         🧠 AI Providers: {}\n\
         💾 Database: {}\n\
         📢 Log Channel: {}\n\
         🔒 Force Sub: {}",
        escape_html(&app.config.bot_name),
        if providers.is_empty() {
            "❌ Not Set".to_string()
        } else {
            format!("✅ {}", providers.join(" → "))
        },
        if app.db.ping().await { "✅ Connected" } else { "❌ Not Connected" },
        set_marker(app.config.log_channel.is_some()),
        set_marker(app.gate.channel().is_some()),
    );
    app.reply(msg.chat_id, &text).await;
    Ok(())
}

async fn stats(app: &App, msg: &IncomingMessage) -> Result<()> {
    let total = app.profiles.count().await?;
    let genders = app.profiles.gender_breakdown().await?;

    let text = format!(
        "📊 <b>Detailed Statistics</b>\n\n\
         <b>Total Users:</b> {total}\n\n\
         <b>Gender Breakdown:</b>\n\
         👨 Male: {}\n\
         👩 Female: {}\n\
         🏳️‍⚧️ Transgender: {}\n\
         ⚧️ Non-Binary: {}\n\
         ❓ Not Set: {}\n\n\
         <b>Database:</b> <code>{}</code>",
        genders.male,
        genders.female,
        genders.transgender,
        genders.nonbinary,
        genders.unset,
        escape_html(&app.config.database_path.display().to_string()),
    );
    app.reply(msg.chat_id, &text).await;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Moderation
// ═══════════════════════════════════════════════════════════════════════

async fn set_ban(app: &App, msg: &IncomingMessage, args: &str, banned: bool) -> Result<()> {
    let command = if banned { "banuser" } else { "unbanuser" };
    let Some(raw) = args.split_whitespace().next() else {
        app.reply(msg.chat_id, &format!("❌ Usage: /{command} &lt;user_id&gt;"))
            .await;
        return Ok(());
    };
    let Ok(user_id) = raw.parse::<i64>() else {
        app.reply(msg.chat_id, "❌ Invalid user ID").await;
        return Ok(());
    };

    app.profiles.set_banned(user_id, banned).await?;
    info!(user_id, banned, "ban flag changed");

    let (verb, title) = if banned {
        ("banned", "🚫 <b>User Banned</b>")
    } else {
        ("unbanned", "✅ <b>User Unbanned</b>")
    };
    app.reply(msg.chat_id, &format!("✅ User {user_id} {verb}!")).await;
    app.log(&format!(
        "{title}\n\nUser ID: <code>{user_id}</code>\nBy: {}",
        escape_html(&msg.from.first_name)
    ))
    .await;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Broadcast
// ═══════════════════════════════════════════════════════════════════════

/// What is being broadcast: owner-typed text or a copy of a replied message.
enum Payload<'a> {
    Text(&'a str),
    Copy { from_chat: i64, message_id: i64 },
}

/// Delivery tally for one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BroadcastReport {
    success: usize,
    failed: usize,
}

async fn broadcast(app: &App, msg: &IncomingMessage, args: &str) -> Result<()> {
    let payload = match msg.reply_to {
        Some(message_id) => Payload::Copy {
            from_chat: msg.chat_id,
            message_id,
        },
        None if !args.is_empty() => Payload::Text(args),
        None => {
            app.reply(
                msg.chat_id,
                "❌ Usage: /broadcast &lt;message&gt; ya kisi message ko reply karo",
            )
            .await;
            return Ok(());
        }
    };

    let users = app.profiles.active_ids().await?;
    let status_id = app
        .telegram
        .send_message(
            msg.chat_id,
            &format!("📤 Broadcasting to {} users...", users.len()),
            None,
        )
        .await
        .ok();

    let mut report = BroadcastReport::default();
    for user_id in users {
        let sent = match &payload {
            Payload::Text(text) => send_text(app, user_id, text).await,
            Payload::Copy {
                from_chat,
                message_id,
            } => {
                app.telegram
                    .copy_message(user_id, *from_chat, *message_id)
                    .await
            }
        };
        match sent {
            Ok(()) => report.success += 1,
            Err(e) => {
                report.failed += 1;
                warn!(user_id, error = %e, "broadcast delivery failed");
            }
        }

        if (report.success + report.failed) % BROADCAST_PROGRESS_EVERY == 0 {
            if let Some(status_id) = status_id {
                let _ = app
                    .telegram
                    .edit_message_text(
                        msg.chat_id,
                        status_id,
                        &format!(
                            "📤 Broadcasting...\n✅ Success: {}\n❌ Failed: {}",
                            report.success, report.failed
                        ),
                        None,
                    )
                    .await;
            }
        }
    }

    info!(success = report.success, failed = report.failed, "broadcast complete");
    let summary = format!(
        "✅ <b>Broadcast Complete!</b>\n\n✅ Successful: {}\n❌ Failed: {}",
        report.success, report.failed
    );
    match status_id {
        Some(id) => {
            if app
                .telegram
                .edit_message_text(msg.chat_id, id, &summary, None)
                .await
                .is_err()
            {
                app.reply(msg.chat_id, &summary).await;
            }
        }
        None => app.reply(msg.chat_id, &summary).await,
    }
    Ok(())
}

/// Owner-typed text goes out verbatim, so no parse mode and split to fit.
async fn send_text(app: &App, chat_id: i64, text: &str) -> telegram::Result<()> {
    for chunk in split_telegram_message(text, TELEGRAM_CHUNK_LEN) {
        app.telegram.send_plain(chat_id, &chunk).await?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Diagnostics
// ═══════════════════════════════════════════════════════════════════════

/// Classify one probe answer.
fn probe_status(outcome: &companion_agent::Result<String>) -> (String, String) {
    match outcome {
        Ok(text) if text.to_uppercase().contains(PROBE_EXPECTED) => {
            ("✅ Working".into(), text.chars().take(50).collect())
        }
        Ok(text) => (
            "⚠️ Unexpected Response".into(),
            text.chars().take(100).collect(),
        ),
        Err(e) => ("❌ Error".into(), e.to_string().chars().take(200).collect()),
    }
}

async fn chat_access(app: &App, chat: Option<ChatId>) -> &'static str {
    match chat {
        None => "❌ Not Set",
        Some(chat) => match app.telegram.get_chat(chat).await {
            Ok(_) => "✅ Accessible",
            Err(_) => "⚠️ Set but not accessible",
        },
    }
}

async fn debug_report(app: &App, msg: &IncomingMessage) -> Result<()> {
    let testing = app
        .telegram
        .send_message(msg.chat_id, "🔍 Testing AI providers...", None)
        .await
        .ok();

    let probe = [
        PromptMessage::system("You are a helpful assistant."),
        PromptMessage::user(format!("Reply with only: {PROBE_EXPECTED}")),
    ];
    let results = app.resolver.probe(&probe).await;

    if let Some(id) = testing {
        let _ = app.telegram.delete_message(msg.chat_id, id).await;
    }

    let mut provider_lines = String::new();
    let mut any_broken = results.is_empty();
    for (name, outcome) in &results {
        let (status, detail) = probe_status(outcome);
        any_broken |= !status.starts_with('✅');
        provider_lines.push_str(&format!(
            "• <b>{}</b>: {status}\n  <i>{}</i>\n",
            escape_html(name),
            escape_html(&detail)
        ));
    }
    if results.is_empty() {
        provider_lines.push_str("❌ No provider has an API key\n");
    }

    let log_status = chat_access(app, app.config.log_channel.clone()).await;
    let force_status = chat_access(
        app,
        app.gate.channel().map(|c| ChatId::Username(format!("@{c}"))),
    )
    .await;
    let db_status = if app.db.ping().await {
        "✅ Connected"
    } else {
        "❌ Not Connected"
    };

    let mut env_lines = format!(
        "{} BOT_TOKEN\n",
        presence(app.config.bot_token.is_some())
    );
    for settings in &app.config.providers {
        env_lines.push_str(&format!(
            "{} {}\n",
            presence(settings.is_configured()),
            settings.kind.spec().key_env
        ));
    }

    let tips = if any_broken {
        "⚠️ <b>Provider issues detected!</b>\n\
         1. Check that each API key is correct and active\n\
         2. Check the account's billing or quota\n\
         3. Set AI_PROVIDER to a provider that works\n\
         4. Check the bot logs for the HTTP status"
    } else {
        "✅ All systems operational!"
    };

    let text = format!(
        "🔍 <b>System Health Check</b>\n\n\
         <b>🧠 AI Providers</b> (primary: {}):\n{provider_lines}\n\
         <b>💾 Database:</b> {db_status}\n\
         <b>📢 Log Channel:</b> {log_status}\n\
         <b>🔒 Force Sub:</b> {force_status}\n\n\
         <b>🔧 Environment Variables:</b>\n{env_lines}\n\
         <b>💡 Troubleshooting:</b>\n{tips}",
        app.config
            .primary
            .map(|k| k.as_str())
            .unwrap_or("table order"),
    );
    app.reply(msg.chat_id, &text).await;
    Ok(())
}

fn presence(set: bool) -> &'static str {
    if set { "✅ Set:" } else { "❌ Missing:" }
}
