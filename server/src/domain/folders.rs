//! Client folder resolution
//!
//! Documents are filed under one top-level folder per client, but callers
//! spell client names loosely ("Acme Corp", "acme-corp"). The resolver maps a
//! normalized key (lowercase alphanumerics) to the folder that actually exists
//! at the storage root. The map is built from a root listing and cached for
//! a fixed TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::data::storage::paths::normalize_path;
use crate::data::storage::{ObjectStore, StorageError};

/// How long a root listing stays authoritative
pub const CLIENT_FOLDER_TTL: Duration = Duration::from_secs(30 * 60);

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Lookup key for a client name: lowercase alphanumerics only
pub fn client_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

struct Snapshot {
    folders: HashMap<String, String>,
    built_at: Instant,
}

/// Maps loosely-typed client names to top-level storage folders
pub struct ClientFolderResolver {
    store: ObjectStore,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl ClientFolderResolver {
    pub fn new(store: ObjectStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), CLIENT_FOLDER_TTL)
    }

    pub fn with_clock(store: ObjectStore, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// Drop the cached map; the next lookup lists the root again
    pub fn invalidate(&self) {
        if self.snapshot.write().take().is_some() {
            tracing::debug!("Client folder cache invalidated");
        }
    }

    /// Invalidate if a top-level folder is not in the cached map
    pub fn note_folder(&self, name: &str) {
        let known = self
            .snapshot
            .read()
            .as_ref()
            .is_none_or(|s| s.folders.contains_key(&client_key(name)));
        if !known {
            self.invalidate();
        }
    }

    /// Actual folder name for a client, if one exists
    pub async fn resolve(&self, client: &str) -> Result<Option<String>, StorageError> {
        let key = client_key(client);
        if key.is_empty() {
            return Ok(None);
        }
        let snapshot = self.get_or_refresh().await?;
        Ok(snapshot.folders.get(&key).cloned())
    }

    /// Replace the first segment of a document path with the matching client folder.
    ///
    /// Paths without a folder segment, or whose folder matches nothing, come
    /// back normalized but otherwise unchanged.
    pub async fn correct_path(&self, path: &str) -> Result<String, StorageError> {
        let path = normalize_path(path);
        let Some((first, rest)) = path.split_once('/') else {
            return Ok(path);
        };

        match self.resolve(first).await? {
            Some(folder) if folder != first => {
                let corrected = format!("{}/{}", folder, rest);
                tracing::debug!(from = %path, to = %corrected, "Corrected document path");
                Ok(corrected)
            }
            _ => Ok(path),
        }
    }

    async fn get_or_refresh(&self) -> Result<Arc<Snapshot>, StorageError> {
        let now = self.clock.now();
        let cached = self.snapshot.read().clone();
        if let Some(snapshot) = cached
            && now.saturating_duration_since(snapshot.built_at) < self.ttl
        {
            return Ok(snapshot);
        }

        let folders: HashMap<String, String> = self
            .store
            .list("")
            .await?
            .into_iter()
            .filter(|o| o.is_directory)
            .map(|o| (client_key(&o.name), o.name))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        tracing::debug!(folders = folders.len(), "Client folder cache rebuilt");
        let snapshot = Arc::new(Snapshot {
            folders,
            built_at: self.clock.now(),
        });
        *self.snapshot.write() = Some(snapshot.clone());
        Ok(snapshot)
    }
}
