use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::platform::MessagingPlatform;
use crate::token::{TokenCipher, TokenError};

/// Decodes channel tokens and delivers the notification text.
pub struct Dispatcher {
    platform: Arc<dyn MessagingPlatform>,
    cipher: TokenCipher,
    message: String,
    retry_delay: Duration,
    max_retries: u32,
}

impl Dispatcher {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        cipher: TokenCipher,
        message: String,
        retry_delay: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            platform,
            cipher,
            message,
            retry_delay,
            max_retries,
        }
    }

    /// Decode `token` and send the configured text the requested number of
    /// times, pausing between attempts. The count is clamped to
    /// `1..=max_retries`. Individual send failures are logged and do not
    /// stop the remaining attempts; the return value is the number of
    /// attempts made.
    pub async fn dispatch(&self, token: &str, retries: u32) -> Result<u32, TokenError> {
        let chat_id = self.cipher.decode_identity(token)?;
        let attempts = retries.clamp(1, self.max_retries.max(1));

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry_delay).await;
            }
            match self.platform.send_message(&chat_id, &self.message).await {
                Ok(()) => debug!("Sent notification to chat {} (attempt {})", chat_id, attempt),
                Err(e) => warn!("Send attempt {} failed: {}", attempt, e),
            }
        }

        Ok(attempts)
    }
}
