//! Shared helper functions used across subcommands and handlers.

use rand::seq::SliceRandom;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Telegram text
// ---------------------------------------------------------------------------

/// Telegram rejects messages above 4096 chars; stay well below.
pub const TELEGRAM_CHUNK_LEN: usize = 4000;

/// Split a message into chunks that fit within Telegram's length limit.
///
/// Prefers newline, then space boundaries, and never splits a UTF-8 char.
pub fn split_telegram_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_owned());
            break;
        }

        let mut boundary = max_len;
        while boundary > 0 && !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }

        let window = &remaining[..boundary];
        let split_at = match window.rfind('\n').or_else(|| window.rfind(' ')) {
            Some(0) | None => boundary,
            Some(i) => i,
        };

        chunks.push(remaining[..split_at].to_owned());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Split `/cmd@bot arg1 arg2` into (`cmd`, `arg1 arg2`). `None` if not a command.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), args.to_string()))
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

const REACTIONS: &[&str] = &["❤", "🔥", "👍", "🎉", "😍", "💯", "🥰", "🤩", "👏", "⚡"];

/// Pick a reaction emoji at random.
pub fn random_reaction() -> &'static str {
    REACTIONS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("❤")
}

/// `✅ Set` / `❌ Not Set` marker used by status screens.
pub fn set_marker(present: bool) -> &'static str {
    if present { "✅ Set" } else { "❌ Not Set" }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_single_chunk() {
        assert_eq!(split_telegram_message("hello", 4000), vec!["hello"]);
    }

    #[test]
    fn splits_on_newline_first() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_telegram_message(&text, 40);
        assert_eq!(chunks, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn never_splits_inside_a_char() {
        let text = "é".repeat(50); // 100 bytes, no spaces
        let chunks = split_telegram_message(&text, 15);
        assert!(chunks.iter().all(|c| c.len() <= 15));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn escape_html_handles_markup() {
        assert_eq!(escape_html("<b>Tom & Jerry</b>"), "&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;");
    }

    #[test]
    fn parse_command_variants() {
        assert_eq!(parse_command("/start"), Some(("start".into(), String::new())));
        assert_eq!(
            parse_command("/Broadcast@CompanionBot  hello all "),
            Some(("broadcast".into(), "hello all".into()))
        );
        assert_eq!(parse_command("hello /start"), None);
        assert_eq!(parse_command("/"), None);
    }

    #[test]
    fn reaction_comes_from_the_set() {
        for _ in 0..20 {
            assert!(REACTIONS.contains(&random_reaction()));
        }
    }
}
