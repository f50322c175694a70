//! Inline keyboards and their callback-data prefixes.

use serde_json::{Value, json};

use companion_store::{Gender, Mode};

pub const GENDER_PREFIX: &str = "gender_";
pub const MODE_PREFIX: &str = "mode_";
pub const REFRESH_SUB: &str = "refresh_sub";

fn button(text: &str, data: String) -> Value {
    json!({ "text": text, "callback_data": data })
}

pub fn gender_keyboard() -> Value {
    let b = |text: &str, gender: Gender| button(text, format!("{GENDER_PREFIX}{gender}"));
    json!({
        "inline_keyboard": [
            [b("👨 Male", Gender::Male), b("👩 Female", Gender::Female)],
            [b("🏳️‍⚧️ Transgender", Gender::Transgender), b("⚧️ Non-Binary", Gender::Nonbinary)],
        ]
    })
}

pub fn mode_emoji(mode: Mode) -> &'static str {
    match mode {
        Mode::Romantic => "💕",
        Mode::Calm => "🧘",
        Mode::Thinker => "🧠",
        Mode::Motivating => "🔥",
        Mode::Balanced => "⚖️",
    }
}

pub fn mode_keyboard() -> Value {
    let b = |mode: Mode| {
        button(
            &format!("{} {}", mode_emoji(mode), mode.title()),
            format!("{MODE_PREFIX}{mode}"),
        )
    };
    json!({
        "inline_keyboard": [
            [b(Mode::Romantic), b(Mode::Calm)],
            [b(Mode::Thinker), b(Mode::Motivating)],
            [b(Mode::Balanced)],
        ]
    })
}

/// Join link plus a re-check button. `channel` is a bare username.
pub fn subscription_keyboard(channel: &str) -> Value {
    json!({
        "inline_keyboard": [
            [{ "text": "🔔 Join Channel", "url": format!("https://t.me/{channel}") }],
            [button("✅ Check Again", REFRESH_SUB.to_string())],
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback_data(keyboard: &Value) -> Vec<String> {
        keyboard["inline_keyboard"]
            .as_array()
            .unwrap()
            .iter()
            .flat_map(|row| row.as_array().unwrap().iter())
            .filter_map(|b| b.get("callback_data").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn gender_buttons_round_trip_through_from_str() {
        let data = callback_data(&gender_keyboard());
        assert_eq!(data.len(), 4);
        for d in data {
            let g: Gender = d.strip_prefix(GENDER_PREFIX).unwrap().parse().unwrap();
            assert_ne!(g, Gender::Unset);
        }
    }

    #[test]
    fn mode_keyboard_covers_every_mode() {
        let data = callback_data(&mode_keyboard());
        for mode in Mode::ALL {
            assert!(data.contains(&format!("mode_{mode}")));
        }
    }

    #[test]
    fn subscription_keyboard_links_channel() {
        let kb = subscription_keyboard("news");
        assert_eq!(kb["inline_keyboard"][0][0]["url"], "https://t.me/news");
        assert_eq!(callback_data(&kb), vec![REFRESH_SUB]);
    }
}
