// # Memory Log Store
//
// In-memory implementation of LogStore.
//
// Nothing survives a restart: the logs start as placeholders again. Useful
// for tests and for hosts that persist the rendered text themselves.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::messages::MessageCategory;
use crate::traits::LogStore;

/// In-memory log store
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStore {
    inner: Arc<RwLock<HashMap<MessageCategory, String>>>,
}

impl MemoryLogStore {
    /// Create a new empty memory log store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored logs
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if nothing has been stored
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn load(&self, category: MessageCategory) -> Result<Option<String>, Error> {
        Ok(self.inner.read().await.get(&category).cloned())
    }

    async fn save(&self, category: MessageCategory, text: &str) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(category, text.to_string());
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
