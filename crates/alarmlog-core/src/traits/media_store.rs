// # Media Store Trait
//
// Named byte blobs scoped to one instance. Generated protocol documents are
// stored here so that mailers can attach them by path.

use async_trait::async_trait;
use std::path::PathBuf;

/// Trait for media store implementations
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `content` under `ident`, replacing any previous content
    ///
    /// # Returns
    ///
    /// The path the document can be read from
    async fn put(&self, ident: &str, extension: &str, content: &[u8])
    -> Result<PathBuf, crate::Error>;

    /// Read the content stored under `ident`
    async fn get(&self, ident: &str) -> Result<Option<Vec<u8>>, crate::Error>;
}
