// # File Media Store
//
// Stores each document as `<dir>/<ident>.<extension>`. A new document under
// the same ident replaces the old one, whatever its extension was.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::traits::MediaStore;

/// Directory-backed media store
#[derive(Debug, Clone)]
pub struct FileMediaStore {
    dir: PathBuf,
}

impl FileMediaStore {
    /// Use `dir` for documents, creating it if needed
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|e| {
            Error::config(format!(
                "Failed to create media directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    /// Directory the documents are stored in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn find(&self, ident: &str) -> Result<Option<PathBuf>, Error> {
        let prefix = format!("{}.", ident);
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) && !name.ends_with(".tmp") {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl MediaStore for FileMediaStore {
    async fn put(&self, ident: &str, extension: &str, content: &[u8]) -> Result<PathBuf, Error> {
        if ident.is_empty() || ident.contains(['/', '\\', '.']) {
            return Err(Error::invalid_input(format!("Invalid media ident: {:?}", ident)));
        }

        let path = self.dir.join(format!("{}.{}", ident, extension));
        if let Some(previous) = self.find(ident).await? {
            if previous != path {
                fs::remove_file(&previous).await?;
            }
        }

        let temp_path = self.dir.join(format!("{}.tmp", ident));
        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(content).await?;
            file.flush().await?;
            fs::rename(&temp_path, &path).await
        };
        write.await.map_err(|e| {
            Error::media_store(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!("Stored {} ({} bytes)", path.display(), content.len());
        Ok(path)
    }

    async fn get(&self, ident: &str) -> Result<Option<Vec<u8>>, Error> {
        match self.find(ident).await? {
            Some(path) => Ok(Some(fs::read(&path).await?)),
            None => Ok(None),
        }
    }
}
