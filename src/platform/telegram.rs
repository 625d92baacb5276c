use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::platform::{InboundMessage, MessagingPlatform, PlatformError};

/// Default Telegram Bot API host, overridable for tests and proxies.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API client backed by plain HTTP calls.
pub struct TelegramApi {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    description: Option<String>,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    text: Option<String>,
    chat: Option<Chat>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl TelegramApi {
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        }
    }

    /// Builds the full URL for a Bot API method. The token is part of the
    /// path, so the result must never end up in logs.
    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

fn to_inbound(updates: Vec<Update>) -> Vec<InboundMessage> {
    updates
        .into_iter()
        .filter_map(|update| update.message)
        .map(|message| InboundMessage {
            chat_id: message
                .chat
                .map(|chat| chat.id.to_string())
                .unwrap_or_default(),
            text: message.text.unwrap_or_default(),
        })
        .collect()
}

#[async_trait]
impl MessagingPlatform for TelegramApi {
    async fn recent_messages(&self) -> Result<Vec<InboundMessage>, PlatformError> {
        debug!("Fetching pending updates");
        let response = self.client.get(self.endpoint("getUpdates")).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "getUpdates returned {status}: {body}"
            )));
        }

        let updates: UpdatesResponse = response.json().await?;
        if !updates.ok {
            return Err(PlatformError::Api(format!(
                "getUpdates rejected: {}",
                updates.description.as_deref().unwrap_or("no description")
            )));
        }

        Ok(to_inbound(updates.result))
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), PlatformError> {
        debug!("Sending message to chat {}", chat_id);
        let response = self
            .client
            .get(self.endpoint("sendMessage"))
            .query(&[("chat_id", chat_id), ("text", text)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api(format!(
                "sendMessage returned {status}: {body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_embeds_token() {
        let api = TelegramApi::new("https://api.telegram.org", "123:abc");
        assert_eq!(
            api.endpoint("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn test_updates_parse_and_map() {
        let raw = r#"{
            "ok": true,
            "result": [
                {"update_id": 1, "message": {"message_id": 10, "text": "hello", "chat": {"id": 42, "type": "private"}}},
                {"update_id": 2, "edited_message": {"message_id": 11}},
                {"update_id": 3, "message": {"message_id": 12, "chat": {"id": -100123, "type": "group"}}},
                {"update_id": 4, "message": {"message_id": 13, "text": "orphan"}}
            ]
        }"#;

        let parsed: UpdatesResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.ok);

        let inbound = to_inbound(parsed.result);
        assert_eq!(inbound.len(), 3);
        assert_eq!(inbound[0].chat_id, "42");
        assert_eq!(inbound[0].text, "hello");
        assert_eq!(inbound[1].chat_id, "-100123");
        assert_eq!(inbound[1].text, "");
        assert_eq!(inbound[2].chat_id, "");
        assert_eq!(inbound[2].text, "orphan");
    }

    #[test]
    fn test_error_response_parse() {
        let raw = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let parsed: UpdatesResponse = serde_json::from_str(raw).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Unauthorized"));
        assert!(parsed.result.is_empty());
    }
}
