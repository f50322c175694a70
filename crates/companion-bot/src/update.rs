//! Decoding of raw Telegram updates.
//!
//! Only the fields the bot reads are extracted, via JSON pointers.

use serde_json::Value;

/// The sender of a message or callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Sender {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub chat_type: String,
    pub from: Sender,
    /// Message text. Empty for photos, stickers and other media.
    pub text: String,
    /// Id of the message this one replies to, if any.
    pub reply_to: Option<i64>,
}

impl IncomingMessage {
    pub fn is_private(&self) -> bool {
        self.chat_type == "private"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: Sender,
    pub data: String,
    /// The message carrying the inline keyboard.
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Message(IncomingMessage),
    Callback(CallbackQuery),
    Other,
}

impl Update {
    /// Decode one element of a `getUpdates` result.
    pub fn parse(raw: &Value) -> Self {
        if let Some(msg) = raw.get("message") {
            return parse_message(msg).map_or(Self::Other, Self::Message);
        }
        if let Some(cb) = raw.get("callback_query") {
            return parse_callback(cb).map_or(Self::Other, Self::Callback);
        }
        Self::Other
    }
}

/// `update_id` of a raw update, used to advance the polling offset.
pub fn update_id(raw: &Value) -> Option<i64> {
    raw.get("update_id").and_then(Value::as_i64)
}

fn parse_sender(from: &Value) -> Option<Sender> {
    Some(Sender {
        id: from.get("id")?.as_i64()?,
        first_name: from
            .get("first_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        username: from
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_string),
        is_bot: from.get("is_bot").and_then(Value::as_bool).unwrap_or(false),
    })
}

fn parse_message(msg: &Value) -> Option<IncomingMessage> {
    let text = msg
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(IncomingMessage {
        message_id: msg.get("message_id")?.as_i64()?,
        chat_id: msg.pointer("/chat/id")?.as_i64()?,
        chat_type: msg
            .pointer("/chat/type")
            .and_then(Value::as_str)
            .unwrap_or("private")
            .to_string(),
        from: parse_sender(msg.get("from")?)?,
        text,
        reply_to: msg
            .pointer("/reply_to_message/message_id")
            .and_then(Value::as_i64),
    })
}

fn parse_callback(cb: &Value) -> Option<CallbackQuery> {
    Some(CallbackQuery {
        id: cb.get("id")?.as_str()?.to_string(),
        from: parse_sender(cb.get("from")?)?,
        data: cb
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        chat_id: cb.pointer("/message/chat/id")?.as_i64()?,
        message_id: cb.pointer("/message/message_id")?.as_i64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_private_text_message() {
        let raw = json!({
            "update_id": 10,
            "message": {
                "message_id": 3,
                "chat": { "id": 77, "type": "private" },
                "from": { "id": 77, "first_name": "Asha", "username": "asha", "is_bot": false },
                "text": "hello"
            }
        });

        assert_eq!(update_id(&raw), Some(10));
        let Update::Message(msg) = Update::parse(&raw) else {
            panic!("expected a message");
        };
        assert!(msg.is_private());
        assert_eq!(msg.from.first_name, "Asha");
        assert_eq!(msg.from.username.as_deref(), Some("asha"));
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.reply_to, None);
    }

    #[test]
    fn media_caption_is_not_text() {
        let raw = json!({
            "update_id": 11,
            "message": {
                "message_id": 4,
                "chat": { "id": 1, "type": "private" },
                "from": { "id": 1, "first_name": "O" },
                "caption": "look",
                "reply_to_message": { "message_id": 2 }
            }
        });
        let Update::Message(msg) = Update::parse(&raw) else {
            panic!("expected a message");
        };
        assert_eq!(msg.text, "");
        assert_eq!(msg.reply_to, Some(2));
    }

    #[test]
    fn parses_callback() {
        let raw = json!({
            "update_id": 12,
            "callback_query": {
                "id": "cb1",
                "from": { "id": 5, "first_name": "R" },
                "data": "gender_female",
                "message": { "message_id": 8, "chat": { "id": 5, "type": "private" } }
            }
        });
        assert_eq!(
            Update::parse(&raw),
            Update::Callback(CallbackQuery {
                id: "cb1".into(),
                from: Sender {
                    id: 5,
                    first_name: "R".into(),
                    username: None,
                    is_bot: false,
                },
                data: "gender_female".into(),
                chat_id: 5,
                message_id: 8,
            })
        );
    }

    #[test]
    fn unknown_kinds_are_other() {
        assert_eq!(Update::parse(&json!({ "update_id": 1, "edited_message": {} })), Update::Other);
        assert_eq!(Update::parse(&json!({ "update_id": 1, "message": {} })), Update::Other);
    }
}
