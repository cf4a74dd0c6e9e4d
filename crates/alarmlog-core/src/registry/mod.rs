//! Service instance registry
//!
//! Archives and mailers are host services addressed by an opaque
//! [`ObjectId`]. The configuration refers to them by id; the registry
//! resolves an id to the registered service at the moment it is needed.
//! An id that was never registered, or was unregistered since, resolves to
//! `None` and the feature depending on it is skipped.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use alarmlog_core::registry::{ObjectId, ServiceRegistry};
//!
//! let registry = ServiceRegistry::new();
//! registry.register_archive(ObjectId(100), Arc::new(archive));
//! registry.register_mailer(ObjectId(200), Arc::new(mailer));
//!
//! let mailer = registry.mailer(config.monthly_protocol.mailer);
//! ```

use crate::traits::{ArchiveSink, Mailer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Opaque reference to a host service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry of archive and mailer instances
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ServiceRegistry {
    archives: RwLock<HashMap<ObjectId, Arc<dyn ArchiveSink>>>,
    mailers: RwLock<HashMap<ObjectId, Arc<dyn Mailer>>>,
}

impl ServiceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an archive instance, replacing any previous one with that id
    pub fn register_archive(&self, id: ObjectId, archive: Arc<dyn ArchiveSink>) {
        debug!("Registering archive {} ({})", id, archive.archive_name());
        write(&self.archives).insert(id, archive);
    }

    /// Register a mailer instance, replacing any previous one with that id
    pub fn register_mailer(&self, id: ObjectId, mailer: Arc<dyn Mailer>) {
        debug!("Registering mailer {} ({})", id, mailer.mailer_name());
        write(&self.mailers).insert(id, mailer);
    }

    /// Remove whatever is registered under `id`
    ///
    /// Returns `true` if something was removed.
    pub fn unregister(&self, id: ObjectId) -> bool {
        let archive = write(&self.archives).remove(&id).is_some();
        let mailer = write(&self.mailers).remove(&id).is_some();
        archive || mailer
    }

    /// Whether any service is registered under `id`
    pub fn exists(&self, id: ObjectId) -> bool {
        read(&self.archives).contains_key(&id) || read(&self.mailers).contains_key(&id)
    }

    /// Resolve an archive reference
    pub fn archive(&self, id: Option<ObjectId>) -> Option<Arc<dyn ArchiveSink>> {
        let Some(id) = id else {
            debug!("No archive configured");
            return None;
        };
        let archive = read(&self.archives).get(&id).cloned();
        if archive.is_none() {
            debug!("Archive {} is not registered", id);
        }
        archive
    }

    /// Resolve a mailer reference
    pub fn mailer(&self, id: Option<ObjectId>) -> Option<Arc<dyn Mailer>> {
        let Some(id) = id else {
            debug!("No mailer configured");
            return None;
        };
        let mailer = read(&self.mailers).get(&id).cloned();
        if mailer.is_none() {
            debug!("Mailer {} is not registered", id);
        }
        mailer
    }

    /// Ids of all registered archives, ascending
    pub fn list_archives(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = read(&self.archives).keys().copied().collect();
        ids.sort();
        ids
    }

    /// Ids of all registered mailers, ascending
    pub fn list_mailers(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = read(&self.mailers).keys().copied().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("archives", &self.list_archives())
            .field("mailers", &self.list_mailers())
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
