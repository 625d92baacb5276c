use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::counter::{CounterError, CounterMap, CounterStore};
use crate::dispatch::Dispatcher;
use crate::platform::{MessagingPlatform, PlatformError};
use crate::resolver;
use crate::token::{self, TokenCipher, TokenError};

/// Failures an orchestrator call can surface, grouped by who is at fault.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("required input is missing or empty")]
    MissingInput,
    #[error("messaging platform request failed: {0}")]
    Upstream(#[from] PlatformError),
    #[error("no recent message matches the given identifier")]
    NotFound,
    #[error("token cannot be decoded: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("counter store failure: {0}")]
    Store(#[from] CounterError),
}

impl ServiceError {
    /// Machine-readable kind, used verbatim in error response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingInput => "missing_input",
            Self::Upstream(_) => "upstream_error",
            Self::NotFound => "not_found",
            Self::InvalidToken(_) => "invalid_token",
            Self::Store(_) => "store_io_error",
        }
    }
}

/// Registration and notification workflows behind the HTTP surface.
pub struct RelayService {
    platform: Arc<dyn MessagingPlatform>,
    store: Arc<dyn CounterStore>,
    cipher: TokenCipher,
    dispatcher: Dispatcher,
}

impl RelayService {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        store: Arc<dyn CounterStore>,
        cipher: TokenCipher,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            platform,
            store,
            cipher,
            dispatcher,
        }
    }

    /// Correlate `id` against the platform's recent messages and hand back
    /// the encrypted channel token for the matching chat.
    pub async fn register(&self, id: &str) -> Result<String, ServiceError> {
        if id.is_empty() {
            return Err(ServiceError::MissingInput);
        }
        let messages = self.platform.recent_messages().await?;
        let chat_id = resolver::resolve(id, &messages).ok_or(ServiceError::NotFound)?;
        info!("Registered identifier '{}'", id);
        Ok(self.cipher.encode(chat_id.as_bytes()))
    }

    /// Record the attempt, then decode the token and deliver the
    /// notification. Counting is unconditional and happens first: an empty
    /// or garbage token still moves its counter before the decode failure
    /// surfaces.
    pub async fn notify(&self, token: &str, retries: u32) -> Result<u32, ServiceError> {
        self.store.increment(&token::counter_key(token)).await?;
        let attempts = self.dispatcher.dispatch(token, retries).await?;
        info!("Notification dispatched ({} attempts)", attempts);
        Ok(attempts)
    }

    /// Snapshot of every dispatch counter.
    pub async fn counters(&self) -> Result<CounterMap, ServiceError> {
        Ok(self.store.read().await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::counter::MemoryCounterStore;
    use crate::platform::{InboundMessage, StubPlatform};
    use crate::token::CipherKey;

    const TEXT: &str = "Your Solo Shuffle is ready.";

    fn cipher() -> TokenCipher {
        TokenCipher::new(CipherKey::from_bytes(&[3u8; 16]).unwrap(), true)
    }

    fn service(platform: Arc<StubPlatform>) -> RelayService {
        service_with_store(platform, Arc::new(MemoryCounterStore::new()))
    }

    fn service_with_store(
        platform: Arc<StubPlatform>,
        store: Arc<MemoryCounterStore>,
    ) -> RelayService {
        let dispatcher = Dispatcher::new(
            platform.clone(),
            cipher(),
            TEXT.to_string(),
            Duration::ZERO,
            10,
        );
        RelayService::new(platform, store, cipher(), dispatcher)
    }

    #[tokio::test]
    async fn test_register_then_notify_round_trip() {
        let platform = Arc::new(StubPlatform::new().with_messages(vec![InboundMessage {
            chat_id: "42".to_string(),
            text: "hello".to_string(),
        }]));
        let store = Arc::new(MemoryCounterStore::new());
        let svc = service_with_store(platform.clone(), store.clone());

        let token = svc.register("hello").await.unwrap();
        let attempts = svc.notify(&token, 1).await.unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(platform.sent(), vec![("42".to_string(), TEXT.to_string())]);
        let counters = svc.counters().await.unwrap();
        assert_eq!(counters.get(&token::counter_key(&token)), Some(&1));
    }

    #[tokio::test]
    async fn test_register_empty_id() {
        let svc = service(Arc::new(StubPlatform::new()));
        assert!(matches!(
            svc.register("").await,
            Err(ServiceError::MissingInput)
        ));
    }

    #[tokio::test]
    async fn test_register_unmatched_id() {
        let platform = Arc::new(StubPlatform::new().with_messages(vec![InboundMessage {
            chat_id: "42".to_string(),
            text: "something else".to_string(),
        }]));
        let svc = service(platform);
        assert!(matches!(
            svc.register("hello").await,
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_register_upstream_failure() {
        let svc = service(Arc::new(StubPlatform::new().failing_fetch()));
        assert!(matches!(
            svc.register("hello").await,
            Err(ServiceError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_notify_counts_undecodable_tokens() {
        let store = Arc::new(MemoryCounterStore::new());
        let svc = service_with_store(Arc::new(StubPlatform::new()), store.clone());
        let garbage = "*** not a token ***";

        let result = svc.notify(garbage, 1).await;

        // The attempt is recorded before decoding, so the counter moved
        // even though the call failed.
        assert!(matches!(result, Err(ServiceError::InvalidToken(_))));
        let counters = store.read().await.unwrap();
        assert_eq!(counters.get(&token::counter_key(garbage)), Some(&1));
    }

    #[tokio::test]
    async fn test_notify_empty_token_still_counts() {
        let platform = Arc::new(StubPlatform::new());
        let store = Arc::new(MemoryCounterStore::new());
        let svc = service_with_store(platform.clone(), store.clone());

        let result = svc.notify("", 1).await;

        // Even the empty token is counted before it fails to decode.
        assert!(matches!(result, Err(ServiceError::InvalidToken(_))));
        let counters = store.read().await.unwrap();
        assert_eq!(counters.get(&token::counter_key("")), Some(&1));
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notify_repeats_move_same_counter() {
        let platform = Arc::new(StubPlatform::new());
        let store = Arc::new(MemoryCounterStore::new());
        let svc = service_with_store(platform, store);
        let token = cipher().encode(b"42");

        for _ in 0..3 {
            svc.notify(&token, 1).await.unwrap();
        }

        let counters = svc.counters().await.unwrap();
        assert_eq!(counters.get(&token::counter_key(&token)), Some(&3));
        assert_eq!(counters.len(), 1);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ServiceError::MissingInput.kind(), "missing_input");
        assert_eq!(ServiceError::NotFound.kind(), "not_found");
        assert_eq!(
            ServiceError::InvalidToken(TokenError::TooShort).kind(),
            "invalid_token"
        );
        assert_eq!(
            ServiceError::Upstream(PlatformError::Api("down".into())).kind(),
            "upstream_error"
        );
        assert_eq!(
            ServiceError::Store(CounterError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk"
            )))
            .kind(),
            "store_io_error"
        );
    }
}
