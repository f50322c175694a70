//! Inline keyboard callbacks: `gender_*`, `mode_*`, `refresh_sub`.

use anyhow::Result;
use tracing::{debug, info, warn};

use companion_store::{Gender, Mode};

use crate::bot::App;
use crate::helpers::escape_html;
use crate::keyboards::{GENDER_PREFIX, MODE_PREFIX, REFRESH_SUB};
use crate::messages::keys;
use crate::update::CallbackQuery;

pub async fn handle(app: &App, cb: &CallbackQuery) -> Result<()> {
    if let Some(raw) = cb.data.strip_prefix(GENDER_PREFIX) {
        answer(app, cb, None, false).await;
        return set_gender(app, cb, raw).await;
    }
    if let Some(raw) = cb.data.strip_prefix(MODE_PREFIX) {
        answer(app, cb, None, false).await;
        return set_mode(app, cb, raw).await;
    }
    if cb.data == REFRESH_SUB {
        return refresh_subscription(app, cb).await;
    }

    debug!(data = %cb.data, "unknown callback");
    answer(app, cb, None, false).await;
    Ok(())
}

async fn answer(app: &App, cb: &CallbackQuery, text: Option<&str>, alert: bool) {
    if let Err(e) = app.telegram.answer_callback_query(&cb.id, text, alert).await {
        debug!(error = %e, "answerCallbackQuery failed");
    }
}

async fn edit(app: &App, cb: &CallbackQuery, text: &str) {
    if let Err(e) = app
        .telegram
        .edit_message_text(cb.chat_id, cb.message_id, text, None)
        .await
    {
        warn!(chat_id = cb.chat_id, error = %e, "failed to edit message");
    }
}

async fn set_gender(app: &App, cb: &CallbackQuery, raw: &str) -> Result<()> {
    let gender: Gender = match raw.parse() {
        Ok(g) if g != Gender::Unset => g,
        _ => {
            debug!(value = raw, "ignoring invalid gender callback");
            return Ok(());
        }
    };

    let user = &cb.from;
    // A gender tap can arrive before /start created the profile.
    app.profiles
        .ensure(user.id, &user.first_name, user.username.as_deref())
        .await?;
    app.profiles.set_gender(user.id, gender).await?;
    info!(user_id = user.id, %gender, "gender set");

    let text = format!(
        "{}\n\n{}",
        app.messages.get(&keys::gender_set(&gender.to_string())),
        app.messages.get(keys::GENDER_SET_FOOTER),
    );
    edit(app, cb, &text).await;

    app.log(&format!(
        "✅ <b>User Gender Set</b>\n\n\
         👤 User: {}\n\
         🆔 ID: <code>{}</code>\n\
         🎭 Gender: <b>{}</b>",
        escape_html(&user.first_name),
        user.id,
        gender.label(),
    ))
    .await;
    Ok(())
}

async fn set_mode(app: &App, cb: &CallbackQuery, raw: &str) -> Result<()> {
    let Ok(mode) = raw.parse::<Mode>() else {
        debug!(value = raw, "ignoring invalid mode callback");
        return Ok(());
    };

    let user = &cb.from;
    app.profiles
        .ensure(user.id, &user.first_name, user.username.as_deref())
        .await?;
    app.profiles.set_mode(user.id, mode).await?;
    info!(user_id = user.id, %mode, "mode set");

    edit(app, cb, &app.messages.get(&keys::mode_set(mode.as_str()))).await;

    app.log(&format!(
        "🎭 <b>Mode Changed</b>\n\n\
         👤 User: {} (<code>{}</code>)\n\
         Mode: <b>{}</b>",
        escape_html(&user.first_name),
        user.id,
        mode.title(),
    ))
    .await;
    Ok(())
}

async fn refresh_subscription(app: &App, cb: &CallbackQuery) -> Result<()> {
    if app.gate.check(&app.telegram, cb.from.id).await.is_allowed() {
        if let Err(e) = app.telegram.delete_message(cb.chat_id, cb.message_id).await {
            debug!(error = %e, "could not delete subscription prompt");
        }
        app.reply(cb.chat_id, &app.messages.get(keys::SUB_VERIFIED)).await;
        answer(app, cb, Some(&app.messages.get(keys::SUB_VERIFIED_TOAST)), false).await;
    } else {
        answer(app, cb, Some(&app.messages.get(keys::SUB_STILL_MISSING)), true).await;
    }
    Ok(())
}
