// # File Log Store
//
// File-based implementation of LogStore with crash recovery.
//
// ## Purpose
//
// Keeps the rendered message logs across daemon restarts and crashes. Every
// save is written through immediately; see `json_file` for the atomic write
// and backup strategy.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "data": {
//     "alarm": "15.03.2024, 10:00:00, Zone 1 alarm",
//     "state": "No state messages present!",
//     "event": ""
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use super::json_file::JsonFile;
use crate::Error;
use crate::messages::MessageCategory;
use crate::traits::LogStore;

/// File-based log store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use alarmlog_core::messages::MessageCategory;
/// use alarmlog_core::state::FileLogStore;
/// use alarmlog_core::traits::LogStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileLogStore::new("/var/lib/alarmlog/logs.json").await?;
///
///     store.save(MessageCategory::Alarm, "15.03.2024, 10:00:00, Alarm").await?;
///     let text = store.load(MessageCategory::Alarm).await?;
///     assert!(text.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileLogStore {
    file: JsonFile,
    state: RwLock<FileState>,
}

#[derive(Debug)]
struct FileState {
    logs: HashMap<MessageCategory, String>,
    dirty: bool,
}

impl FileLogStore {
    /// Create or load a file log store
    ///
    /// A corrupted file is recovered from its backup; if both are unreadable
    /// the store starts empty.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = JsonFile::open(path).await?;
        let logs: HashMap<MessageCategory, String> =
            file.load_with_recovery().await?.unwrap_or_default();

        tracing::debug!("Loaded {} message logs from {}", logs.len(), file.path().display());

        Ok(Self {
            file,
            state: RwLock::new(FileState { logs, dirty: false }),
        })
    }

    async fn write_state(&self) -> Result<(), Error> {
        let mut state = self.state.write().await;
        self.file.write(&state.logs).await.map_err(|e| {
            Error::log_store(format!(
                "Failed to write {}: {}",
                self.file.path().display(),
                e
            ))
        })?;
        state.dirty = false;
        Ok(())
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn load(&self, category: MessageCategory) -> Result<Option<String>, Error> {
        let state = self.state.read().await;
        Ok(state.logs.get(&category).cloned())
    }

    async fn save(&self, category: MessageCategory, text: &str) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            state.logs.insert(category, text.to_string());
            state.dirty = true;
        }

        // Immediate write for durability
        self.write_state().await
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_state().await } else { Ok(()) }
    }
}
