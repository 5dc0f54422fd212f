use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use relay_core::{ReceivedMessage, StoredWebhookMessage};
use thiserror::Error;
use tokio::sync::RwLock;

/// Source of ingestion timestamps; swapped out in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

/// Per-account, append-only buffer of webhook messages.
///
/// Insertion order is the only ordering signal consumers get.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Stamps `message` and appends it, creating the account's buffer if needed.
    async fn append(
        &self,
        account_id: &str,
        message: ReceivedMessage,
    ) -> Result<StoredWebhookMessage, StoreError>;

    /// Current buffer in insertion order; empty for unknown accounts.
    async fn list(&self, account_id: &str) -> Result<Vec<StoredWebhookMessage>, StoreError>;

    /// Empties the buffer. Idempotent.
    async fn clear(&self, account_id: &str) -> Result<(), StoreError>;
}

pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct InMemoryStore {
    buffers: RwLock<HashMap<String, Vec<StoredWebhookMessage>>>,
    clock: Clock,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of accounts that have ever posted or been cleared.
    pub async fn account_count(&self) -> usize {
        self.buffers.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(
        &self,
        account_id: &str,
        message: ReceivedMessage,
    ) -> Result<StoredWebhookMessage, StoreError> {
        let mut buffers = self.buffers.write().await;
        // Stamped under the lock, so concurrent appends are stamped in buffer order.
        let stored = message.stamp(format_timestamp((self.clock)()));
        buffers
            .entry(account_id.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, account_id: &str) -> Result<Vec<StoredWebhookMessage>, StoreError> {
        let buffers = self.buffers.read().await;
        Ok(buffers.get(account_id).cloned().unwrap_or_default())
    }

    async fn clear(&self, account_id: &str) -> Result<(), StoreError> {
        let mut buffers = self.buffers.write().await;
        buffers.entry(account_id.to_string()).or_default().clear();
        Ok(())
    }
}
