pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

/// A message received from the messaging platform
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Platform-specific chat/channel ID as string; empty when the
    /// platform omitted it
    pub chat_id: String,
    /// The message text
    pub text: String,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("platform API error: {0}")]
    Api(String),
}

/// The two calls this service needs from a messaging platform.
///
/// Injected so the resolver and dispatcher run against a stub in tests;
/// production wires in [`telegram::TelegramApi`].
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Fetch the platform's recent inbound messages. Only the platform's
    /// bounded recent window is visible; there is no pagination.
    async fn recent_messages(&self) -> Result<Vec<InboundMessage>, PlatformError>;

    /// Send `text` to the given chat.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), PlatformError>;
}

/// Scriptable platform double: preset inbound messages, recorded sends,
/// optional failure injection on either call.
#[cfg(test)]
pub struct StubPlatform {
    messages: Vec<InboundMessage>,
    fail_fetch: bool,
    fail_sends: bool,
    sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl StubPlatform {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            fail_fetch: false,
            fail_sends: false,
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_messages(mut self, messages: Vec<InboundMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Every (chat_id, text) handed to `send_message`, including attempts
    /// that were scripted to fail.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl MessagingPlatform for StubPlatform {
    async fn recent_messages(&self) -> Result<Vec<InboundMessage>, PlatformError> {
        if self.fail_fetch {
            return Err(PlatformError::Api("stub upstream failure".to_string()));
        }
        Ok(self.messages.clone())
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), PlatformError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        if self.fail_sends {
            return Err(PlatformError::Api("stub send failure".to_string()));
        }
        Ok(())
    }
}
