// # Archive Sink Trait
//
// Defines the interface to the time-series archive that durably stores the
// message archive variable.
//
// ## Implementations
//
// - In-memory: `archive::MemoryArchive`
// - JSON file: `archive::FileArchive`
// - Host archives: provided by the embedding runtime
//
// ## Usage
//
// ```rust,ignore
// use alarmlog_core::ArchiveSink;
//
// let sink = /* ArchiveSink implementation */;
//
// sink.set_logging_enabled("message_archive", true).await?;
// sink.write_value("message_archive", "15.03.2024, 10:00:00, Alarm", now).await?;
//
// let values = sink.logged_values("message_archive", start, end).await?;
// ```

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A value read back from the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedValue {
    /// The archived text
    pub value: String,
    /// When the value was written (local time)
    pub timestamp: NaiveDateTime,
}

impl LoggedValue {
    /// Create a logged value
    pub fn new(value: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

/// Trait for archive sink implementations
///
/// Variables are addressed by identifier. Writes made while logging is
/// disabled for a variable are accepted but not recorded, mirroring how a
/// host archive only keeps values of variables it is told to log.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    /// Write the current value of `variable`
    async fn write_value(
        &self,
        variable: &str,
        value: &str,
        timestamp: NaiveDateTime,
    ) -> Result<(), crate::Error>;

    /// Enable or disable logging for `variable`
    async fn set_logging_enabled(&self, variable: &str, enabled: bool) -> Result<(), crate::Error>;

    /// Whether logging is enabled for `variable`
    async fn logging_enabled(&self, variable: &str) -> Result<bool, crate::Error>;

    /// Values logged for `variable` within `[start, end]`, oldest first
    async fn logged_values(
        &self,
        variable: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<LoggedValue>, crate::Error>;

    /// Delete values logged for `variable` within `[start, end]`
    ///
    /// # Returns
    ///
    /// The number of deleted values
    async fn delete_values(
        &self,
        variable: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<usize, crate::Error>;

    /// Archive name (for logging/debugging)
    fn archive_name(&self) -> &'static str;
}
