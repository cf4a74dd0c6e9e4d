// # Memory Media Store
//
// Keeps documents in memory. The returned paths are logical names only;
// use it with mailers that do not read attachments from disk.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::MediaStore;

/// In-memory media store
#[derive(Debug, Clone, Default)]
pub struct MemoryMediaStore {
    inner: Arc<RwLock<HashMap<String, (PathBuf, Vec<u8>)>>>,
}

impl MemoryMediaStore {
    /// Create a new empty media store
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical path of the document stored under `ident`
    pub async fn path_of(&self, ident: &str) -> Option<PathBuf> {
        self.inner
            .read()
            .await
            .get(ident)
            .map(|(path, _)| path.clone())
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn put(&self, ident: &str, extension: &str, content: &[u8]) -> Result<PathBuf, Error> {
        if ident.is_empty() {
            return Err(Error::invalid_input("Media ident cannot be empty"));
        }

        let path = PathBuf::from(format!("{}.{}", ident, extension));
        self.inner
            .write()
            .await
            .insert(ident.to_string(), (path.clone(), content.to_vec()));
        Ok(path)
    }

    async fn get(&self, ident: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self
            .inner
            .read()
            .await
            .get(ident)
            .map(|(_, content)| content.clone()))
    }
}
