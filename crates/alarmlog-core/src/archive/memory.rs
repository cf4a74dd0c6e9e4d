// # Memory Archive
//
// In-memory implementation of ArchiveSink. Nothing survives a restart.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ArchiveData;
use crate::Error;
use crate::traits::{ArchiveSink, LoggedValue};

/// In-memory archive
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    inner: Arc<RwLock<ArchiveData>>,
}

impl MemoryArchive {
    /// Create a new empty archive
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArchiveSink for MemoryArchive {
    async fn write_value(
        &self,
        variable: &str,
        value: &str,
        timestamp: NaiveDateTime,
    ) -> Result<(), Error> {
        if !self.inner.write().await.write(variable, value, timestamp) {
            tracing::trace!("Logging disabled for {}, value not recorded", variable);
        }
        Ok(())
    }

    async fn set_logging_enabled(&self, variable: &str, enabled: bool) -> Result<(), Error> {
        self.inner.write().await.set_logging(variable, enabled);
        Ok(())
    }

    async fn logging_enabled(&self, variable: &str) -> Result<bool, Error> {
        Ok(self.inner.read().await.logging(variable))
    }

    async fn logged_values(
        &self,
        variable: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<LoggedValue>, Error> {
        Ok(self.inner.read().await.values(variable, start, end))
    }

    async fn delete_values(
        &self,
        variable: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<usize, Error> {
        Ok(self.inner.write().await.delete(variable, start, end))
    }

    fn archive_name(&self) -> &'static str {
        "memory"
    }
}
