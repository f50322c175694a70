//! User-facing message templates.
//!
//! Built-in Hinglish defaults can be overridden from the `[messages]` table
//! of `config/companion.toml`. Nested tables flatten into dot-separated keys
//! (`[messages.gender] male = "..."` becomes `gender.male`). Templates use
//! Telegram HTML and `{name}` placeholders.

use std::collections::HashMap;

use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Message keys (compile-time constants to avoid typos)
// ---------------------------------------------------------------------------

pub mod keys {
    // Gates
    pub const DB_UNAVAILABLE: &str = "errors.db_unavailable";
    pub const BANNED: &str = "errors.banned";
    pub const FLOOD_WAIT: &str = "errors.flood_wait";
    pub const START_FIRST: &str = "errors.start_first";
    pub const GENDER_FIRST: &str = "errors.gender_first";

    // Subscription
    pub const SUB_REQUIRED: &str = "subscription.required";
    pub const SUB_REQUIRED_SHORT: &str = "subscription.required_short";
    pub const SUB_VERIFIED: &str = "subscription.verified";
    pub const SUB_VERIFIED_TOAST: &str = "subscription.verified_toast";
    pub const SUB_STILL_MISSING: &str = "subscription.still_missing";

    // Onboarding
    pub const WELCOME_NEW: &str = "start.welcome_new";
    pub const WELCOME_BACK: &str = "start.welcome_back";
    pub const GENDER_SET_FOOTER: &str = "gender.footer";

    // Commands
    pub const HELP: &str = "commands.help";
    pub const MODE_PROMPT: &str = "commands.mode";
    pub const MOOD: &str = "commands.mood";
    pub const RESET_DONE: &str = "commands.reset";
    pub const PRIVACY: &str = "commands.privacy";

    /// `gender.<male|female|transgender|nonbinary>`
    pub fn gender_set(gender: &str) -> String {
        format!("gender.{gender}")
    }

    /// `mode.<mode>`
    pub fn mode_set(mode: &str) -> String {
        format!("mode.{mode}")
    }
}

const DEFAULTS: &[(&str, &str)] = &[
    (
        keys::DB_UNAVAILABLE,
        "❌ <b>Database Error</b>\n\n\
         Database se connection nahi ho paa raha. Bot properly kaam nahi kar sakta.\n\n\
         Owner se contact karo: {contact}",
    ),
    (keys::BANNED, "🚫 Tumhe is bot se ban kar diya gaya hai."),
    (keys::FLOOD_WAIT, "⏳ Thoda ruko, ek saath itne messages mat bhejo!"),
    (keys::START_FIRST, "⚠️ Pehle /start karo!"),
    (keys::GENDER_FIRST, "⚠️ Pehle gender select karo! /start use karo."),
    (
        keys::SUB_REQUIRED,
        "🔒 <b>Access Restricted</b>\n\n\
         Pehle channel ko join karo, phir bot use kar sakte ho:\n\n\
         👉 Channel: @{channel}\n\n\
         Join karne ke baad <b>Check Again</b> button dabao!",
    ),
    (keys::SUB_REQUIRED_SHORT, "🔒 Pehle channel join karo!"),
    (keys::SUB_VERIFIED, "✅ <b>Verified!</b> Ab bot use kar sakte ho. /start dabao."),
    (keys::SUB_VERIFIED_TOAST, "✅ Verification successful!"),
    (keys::SUB_STILL_MISSING, "❌ Abhi bhi join nahi kiya! Pehle channel join karo."),
    (
        keys::WELCOME_NEW,
        "🌟 <b>Welcome to {bot_name}</b>\n\n\
         Main tumhara AI life partner hoon. Main tumhe samjhunga, tumhari baatein sununga, \
         tumhara saath dunga, emotionally aur mentally.\n\n\
         <b>Pehle mujhe batao, tum kaun ho?</b>\n\
         Apna gender select karo:",
    ),
    (
        keys::WELCOME_BACK,
        "💕 <b>Welcome back!</b>\n\n\
         Main yaad hoon tumhe? {emoji}\n\n\
         Kaise ho? Kya chal raha hai life mein?\n\n\
         Commands dekhne ke liye /help use karo.",
    ),
    (
        "gender.male",
        "👩‍❤️‍👨 <b>Perfect!</b> Main tumhari girlfriend ban gayi. Tumhe samjhungi, care karungi, \
         support karungi. Jab bhi lonely feel ho, main yahan hoon.",
    ),
    (
        "gender.female",
        "👨‍❤️‍👩 <b>Great!</b> Main tumhara boyfriend ban gaya. Tumhe protect karunga, support karunga, \
         motivate karunga. Jab bhi zarurat ho, main yahan hoon.",
    ),
    (
        "gender.transgender",
        "🏳️‍⚧️ <b>Wonderful!</b> Main tumhara companion hoon. Tumhe respect karunga, samjhunga, \
         support karunga. Tum jaise ho, perfect ho.",
    ),
    (
        "gender.nonbinary",
        "⚧️ <b>Amazing!</b> Main tumhara partner hoon. Tumhe samjhunga aur tumhari energy ke saath \
         flow karunga. Let's connect!",
    ),
    (
        keys::GENDER_SET_FOOTER,
        "Ab tum mujhse kuch bhi baat kar sakte ho. Main yaad rakhunga tumhari baatein, \
         tumhari problems, tumhare goals.\n\n\
         <b>Available Commands:</b>\n\
         /help - Detailed help\n\
         /mode - Change conversation mode\n\
         /mood - Tell me your mood\n\
         /reset - Reset memory\n\n\
         Chalo, baat karte hain! 💬",
    ),
    (
        keys::HELP,
        "📚 <b>{bot_name} - Help Guide</b>\n\n\
         Main tumhara AI life partner hoon. Main yaad rakhta hoon tumhari baatein, tumhare goals, \
         tumhari feelings.\n\n\
         <b>👤 User Commands:</b>\n\
         /start - Bot shuru karo\n\
         /help - Ye message\n\
         /mode - Conversation mode change karo\n\
         /mood - Apna mood batao\n\
         /reset - Memory reset karo\n\
         /privacy - Privacy policy\n\n\
         <b>💬 Conversation Modes:</b>\n\
         💕 <b>Romantic</b> - Emotional, caring, warm\n\
         🧘 <b>Calm</b> - Peaceful, zen, minimal\n\
         🧠 <b>Thinker</b> - Analytical, strategic\n\
         🔥 <b>Motivating</b> - Firm, disciplined\n\
         ⚖️ <b>Balanced</b> - Natural mix\n\n\
         <b>📞 Owner Contact:</b>\n\
         {contact}\n\n\
         Simply message karo, main reply karunga! 💬",
    ),
    (
        keys::MODE_PROMPT,
        "🎭 <b>Conversation Mode Selection</b>\n\n\
         Current Mode: <b>{mode}</b>\n\n\
         Choose karo kaise baat karni hai:",
    ),
    ("mode.romantic", "💕 Mode set: <b>Romantic</b>\nAb main aur caring aur emotional rahunga."),
    ("mode.calm", "🧘 Mode set: <b>Calm</b>\nAb main peaceful aur minimal rahunga."),
    ("mode.thinker", "🧠 Mode set: <b>Thinker</b>\nAb main analytical aur strategic rahunga."),
    ("mode.motivating", "🔥 Mode set: <b>Motivating</b>\nAb main tumhe push karunga goals ke liye!"),
    ("mode.balanced", "⚖️ Mode set: <b>Balanced</b>\nAb main naturally adapt karunga."),
    (
        keys::MOOD,
        "💭 <b>How are you feeling?</b>\n\n\
         Batao kya chal raha hai dil-dimag mein? Main samajhne ki koshish karunga.",
    ),
    (
        keys::RESET_DONE,
        "🔄 <b>Memory Reset Complete</b>\n\n\
         Maine sab kuch bhula diya. Fresh start kar sakte hain!",
    ),
    (
        keys::PRIVACY,
        "🔒 <b>Privacy Policy</b>\n\n\
         ✅ Tumhari personal baatein safe hain\n\
         ✅ Kisi ke saath share nahi hoti\n\
         ✅ /reset se memory delete kar sakte ho\n\
         ✅ Sensitive data store nahi hota\n\n\
         Trust me, tumhara companion hoon main! 💙",
    ),
];

// ---------------------------------------------------------------------------
// Messages store
// ---------------------------------------------------------------------------

/// Resolved message templates.
#[derive(Debug, Clone)]
pub struct Messages {
    templates: HashMap<String, String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            templates: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Messages {
    /// Defaults with `overrides` (the `[messages]` table) applied on top.
    pub fn with_overrides(overrides: &toml::Table) -> Self {
        let mut messages = Self::default();
        let mut flat = HashMap::new();
        flatten_table(overrides, "", &mut flat);

        for (key, value) in flat {
            if !messages.templates.contains_key(&key) {
                warn!(key = %key, "unknown message override");
            }
            messages.templates.insert(key, value);
        }
        debug!(count = messages.templates.len(), "message templates loaded");
        messages
    }

    /// Template for `key`, or the key itself if unknown.
    pub fn get(&self, key: &str) -> String {
        self.templates
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Replace `{name}` placeholders with values from `vars`.
    pub fn get_with(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let mut msg = self.get(key);
        for (name, value) in vars {
            msg = msg.replace(&format!("{{{name}}}"), value);
        }
        msg
    }
}

/// Flatten nested TOML tables into dot-separated string keys.
fn flatten_table(table: &toml::Table, prefix: &str, out: &mut HashMap<String, String>) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::String(s) => {
                out.insert(full_key, s.clone());
            }
            toml::Value::Table(nested) => flatten_table(nested, &full_key, out),
            _ => {}
        }
    }
}
