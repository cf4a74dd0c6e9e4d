// # File Archive
//
// JSON file implementation of ArchiveSink.
//
// Every mutation is written through with the same atomic write and backup
// strategy as the file log store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::path::Path;
use tokio::sync::RwLock;

use super::ArchiveData;
use crate::Error;
use crate::state::json_file::JsonFile;
use crate::traits::{ArchiveSink, LoggedValue};

/// File-based archive with crash recovery
#[derive(Debug)]
pub struct FileArchive {
    file: JsonFile,
    data: RwLock<ArchiveData>,
}

impl FileArchive {
    /// Create or load a file archive
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = JsonFile::open(path).await?;
        let data: ArchiveData = file.load_with_recovery().await?.unwrap_or_default();

        Ok(Self {
            file,
            data: RwLock::new(data),
        })
    }

    async fn persist(&self, data: &ArchiveData) -> Result<(), Error> {
        self.file.write(data).await.map_err(|e| {
            Error::archive(format!(
                "Failed to write {}: {}",
                self.file.path().display(),
                e
            ))
        })
    }
}

#[async_trait]
impl ArchiveSink for FileArchive {
    async fn write_value(
        &self,
        variable: &str,
        value: &str,
        timestamp: NaiveDateTime,
    ) -> Result<(), Error> {
        let mut data = self.data.write().await;
        if data.write(variable, value, timestamp) {
            self.persist(&data).await?;
        } else {
            tracing::trace!("Logging disabled for {}, value not recorded", variable);
        }
        Ok(())
    }

    async fn set_logging_enabled(&self, variable: &str, enabled: bool) -> Result<(), Error> {
        let mut data = self.data.write().await;
        if data.logging(variable) != enabled {
            data.set_logging(variable, enabled);
            self.persist(&data).await?;
        }
        Ok(())
    }

    async fn logging_enabled(&self, variable: &str) -> Result<bool, Error> {
        Ok(self.data.read().await.logging(variable))
    }

    async fn logged_values(
        &self,
        variable: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<LoggedValue>, Error> {
        Ok(self.data.read().await.values(variable, start, end))
    }

    async fn delete_values(
        &self,
        variable: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<usize, Error> {
        let mut data = self.data.write().await;
        let deleted = data.delete(variable, start, end);
        if deleted > 0 {
            self.persist(&data).await?;
        }
        Ok(deleted)
    }

    fn archive_name(&self) -> &'static str {
        "file"
    }
}
