//! Context builder.
//!
//! Turns a profile, a bounded slice of history and the new user text into
//! the role-tagged sequence sent to a provider:
//!
//! ```text
//! system(persona + mode)
//! user(turn 1)  assistant(turn 1)
//! ...
//! user(turn k)  assistant(turn k)
//! user(new text)
//! ```
//!
//! The result always holds `2k + 2` messages and none of them is empty.

use companion_store::{ChatTurn, UserProfile};

use crate::llm::types::PromptMessage;
use crate::persona::system_prompt;

/// Stand-in for a stored user text that is blank.
pub const EMPTY_USER_PLACEHOLDER: &str = "(no message)";
/// Stand-in for a stored bot reply that is blank.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "(no reply)";

/// Assemble the prompt. `history` must already be in chronological order.
pub fn build_context(
    profile: &UserProfile,
    history: &[ChatTurn],
    new_user_text: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(2 * history.len() + 2);
    messages.push(PromptMessage::system(system_prompt(profile.gender, profile.mode)));

    for turn in history {
        messages.push(PromptMessage::user(non_blank(&turn.user_text, EMPTY_USER_PLACEHOLDER)));
        messages.push(PromptMessage::assistant(non_blank(
            &turn.bot_text,
            EMPTY_REPLY_PLACEHOLDER,
        )));
    }

    messages.push(PromptMessage::user(non_blank(new_user_text, EMPTY_USER_PLACEHOLDER)));
    messages
}

/// Convert a newest-first read from the store into chronological order.
pub fn chronological(mut recent: Vec<ChatTurn>) -> Vec<ChatTurn> {
    recent.reverse();
    recent
}

fn non_blank<'a>(text: &'a str, placeholder: &'a str) -> &'a str {
    if text.trim().is_empty() { placeholder } else { text }
}
