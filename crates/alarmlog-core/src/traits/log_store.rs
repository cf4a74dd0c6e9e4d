// # Log Store Trait
//
// Defines the interface for persisting the rendered message logs.
//
// ## Purpose
//
// The message log manager keeps the logs in memory and writes the rendered
// text of a log through to the store after every change. On start-up the
// logs are rebuilt from the stored text, so a restart keeps the messages.
//
// ## Implementations
//
// - In-memory: `state::MemoryLogStore`
// - JSON file with backup recovery: `state::FileLogStore`

use async_trait::async_trait;

use crate::messages::MessageCategory;

/// Trait for log store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// ## Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Explicit flush**: `flush()` must persist all pending changes
/// - **No business logic**: retention and ordering belong to the manager
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Load the stored text of a log
    ///
    /// # Returns
    ///
    /// - `Ok(Some(text))`: the stored text
    /// - `Ok(None)`: nothing stored yet
    /// - `Err(Error)`: storage error
    async fn load(&self, category: MessageCategory) -> Result<Option<String>, crate::Error>;

    /// Store the rendered text of a log
    async fn save(&self, category: MessageCategory, text: &str) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
