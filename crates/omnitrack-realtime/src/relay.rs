//! External relay publisher: the hop that reaches browser/remote
//! subscribers via a hosted realtime service.

use async_trait::async_trait;
use thiserror::Error;

use crate::event::RealtimeEvent;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("relay rejected publish with status {status}")]
    Rejected { status: u16 },
}

/// One realtime destination. [`HttpRelay`] is the production implementation;
/// tests substitute an in-memory recorder.
#[async_trait]
pub trait RelayPublisher: Send + Sync {
    async fn publish(&self, event: &RealtimeEvent) -> Result<(), RelayError>;
}

/// Publishes events to the configured relay endpoint as JSON POSTs.
pub struct HttpRelay {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpRelay {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl RelayPublisher for HttpRelay {
    async fn publish(&self, event: &RealtimeEvent) -> Result<(), RelayError> {
        let mut request = self.client.post(&self.endpoint).json(event);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Records published events in memory. Intended for tests and local
/// development where no relay endpoint exists.
#[derive(Default)]
pub struct MemoryRelay {
    published: std::sync::Mutex<Vec<RealtimeEvent>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MemoryRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail, simulating a relay outage.
    pub fn set_failing(&self, failing: bool) {
        self.fail
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    #[must_use]
    pub fn published(&self) -> Vec<RealtimeEvent> {
        self.published.lock().expect("relay lock poisoned").clone()
    }
}

#[async_trait]
impl RelayPublisher for MemoryRelay {
    async fn publish(&self, event: &RealtimeEvent) -> Result<(), RelayError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RelayError::Rejected { status: 503 });
        }
        self.published
            .lock()
            .expect("relay lock poisoned")
            .push(event.clone());
        Ok(())
    }
}
