// # Versioned JSON Files
//
// Shared persistence for the file-backed stores.
//
// ## Crash Recovery
//
// - Atomic writes: write to `<name>.tmp`, then rename over the file
// - Automatic backup: the previous file is copied to `<name>.backup`
// - Corruption detection: JSON validation on load
// - Recovery: falls back to the backup if the main file does not parse
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "data": { ... }
// }
// ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;

/// File format version
const FILE_VERSION: &str = "1.0";

#[derive(Serialize)]
struct Envelope<'a, T> {
    version: &'a str,
    data: &'a T,
}

#[derive(serde::Deserialize)]
struct OwnedEnvelope<T> {
    version: String,
    data: T,
}

/// A JSON document on disk, written atomically with a backup copy
#[derive(Debug, Clone)]
pub(crate) struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// Use `path`, creating its parent directory if needed
    pub(crate) async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, recovering from the backup if it is corrupted
    ///
    /// Returns `None` when neither file holds a readable document.
    pub(crate) async fn load_with_recovery<T: DeserializeOwned>(&self) -> Result<Option<T>, Error> {
        match Self::load(&self.path).await {
            Ok(data) => Ok(data),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "{} appears corrupted: {}. Attempting recovery from backup.",
                    self.path.display(),
                    e
                );

                let backup_path = self.backup_path();
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting empty.");
                    return Ok(None);
                }

                match Self::load(&backup_path).await {
                    Ok(data) => {
                        tracing::info!("Recovered {} from backup", self.path.display());
                        if let Err(restore_err) = fs::copy(&backup_path, &self.path).await {
                            tracing::error!(
                                "Failed to restore {} from backup: {}",
                                self.path.display(),
                                restore_err
                            );
                        }
                        Ok(data)
                    }
                    Err(backup_err) => {
                        tracing::error!("Backup also corrupted: {}. Starting empty.", backup_err);
                        Ok(None)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
        if !path.exists() {
            tracing::debug!("File does not exist: {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path).await?;
        let envelope: OwnedEnvelope<T> = serde_json::from_str(&content)?;

        if envelope.version != FILE_VERSION {
            tracing::warn!(
                "File version mismatch in {}: expected {}, got {}. Attempting to load anyway.",
                path.display(),
                FILE_VERSION,
                envelope.version
            );
        }

        Ok(Some(envelope.data))
    }

    /// Write `data` atomically, keeping the previous file as backup
    pub(crate) async fn write<T: Serialize>(&self, data: &T) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(&Envelope {
            version: FILE_VERSION,
            data,
        })?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, self.backup_path()).await {
                tracing::warn!("Failed to create backup of {}: {}", self.path.display(), e);
            }
        }

        fs::rename(&temp_path, &self.path).await?;

        tracing::trace!("Written {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    pub(crate) fn backup_path(&self) -> PathBuf {
        let mut backup = self.path.clone();
        backup.set_extension("backup");
        backup
    }
}
