//! Force-subscribe gate.
//!
//! When a channel is configured, users must be a member of it before they can
//! talk to the bot. Owners always pass, and a failed lookup lets the user in.

use serde_json::Value;
use tracing::warn;

use crate::keyboards::subscription_keyboard;
use crate::telegram::{ChatId, TelegramClient, normalize_username};

/// Membership statuses that count as subscribed.
const MEMBER_STATUSES: &[&str] = &["creator", "administrator", "member"];

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Allowed,
    /// Not a member; carries the join keyboard to show.
    Blocked { keyboard: Value },
}

impl GateOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Clone)]
pub struct SubscriptionGate {
    /// Bare channel username, without `@`.
    channel: Option<String>,
    owner_ids: Vec<i64>,
}

impl SubscriptionGate {
    pub fn new(channel: Option<&str>, owner_ids: Vec<i64>) -> Self {
        Self {
            channel: channel
                .map(normalize_username)
                .filter(|c| !c.is_empty()),
            owner_ids,
        }
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub async fn check(&self, telegram: &TelegramClient, user_id: i64) -> GateOutcome {
        let Some(channel) = &self.channel else {
            return GateOutcome::Allowed;
        };
        if self.owner_ids.contains(&user_id) {
            return GateOutcome::Allowed;
        }

        match telegram
            .get_chat_member(ChatId::Username(format!("@{channel}")), user_id)
            .await
        {
            Ok(status) if MEMBER_STATUSES.contains(&status.as_str()) => GateOutcome::Allowed,
            Ok(_) => GateOutcome::Blocked {
                keyboard: subscription_keyboard(channel),
            },
            Err(e) => {
                warn!(user_id, channel = %channel, error = %e, "subscription check failed, allowing");
                GateOutcome::Allowed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_status(status: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/getChatMember"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": true, "result": { "status": status } })),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn unset_channel_allows_without_calls() {
        let server = MockServer::start().await;
        let telegram = TelegramClient::with_base_url(&server.uri(), "T");
        let gate = SubscriptionGate::new(None, vec![]);
        assert!(gate.check(&telegram, 1).await.is_allowed());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn members_pass_and_others_get_keyboard() {
        let gate = SubscriptionGate::new(Some("https://t.me/news"), vec![]);

        let member = server_with_status("administrator").await;
        let telegram = TelegramClient::with_base_url(&member.uri(), "T");
        assert!(gate.check(&telegram, 1).await.is_allowed());

        let left = server_with_status("left").await;
        let telegram = TelegramClient::with_base_url(&left.uri(), "T");
        match gate.check(&telegram, 1).await {
            GateOutcome::Blocked { keyboard } => {
                assert_eq!(keyboard["inline_keyboard"][0][0]["url"], "https://t.me/news");
            }
            GateOutcome::Allowed => panic!("non-member should be blocked"),
        }
    }

    #[tokio::test]
    async fn owners_bypass() {
        let left = server_with_status("kicked").await;
        let telegram = TelegramClient::with_base_url(&left.uri(), "T");
        let gate = SubscriptionGate::new(Some("@news"), vec![99]);
        assert!(gate.check(&telegram, 99).await.is_allowed());
    }

    #[tokio::test]
    async fn lookup_errors_fail_open() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false, "error_code": 400, "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;
        let telegram = TelegramClient::with_base_url(&server.uri(), "T");
        let gate = SubscriptionGate::new(Some("@missing"), vec![]);
        assert!(gate.check(&telegram, 5).await.is_allowed());
    }
}
