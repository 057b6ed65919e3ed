//! Object operations: upload, download, delete, list, exists

use std::sync::Arc;

use chrono::DateTime;

use super::error::{StorageError, truncate_body};
use super::paths::{
    cache_policy_for, content_type_for, is_dir_path, normalize_dir, normalize_path, parent_dir,
    public_url_for, validate_path,
};
use super::transport::{ObjectHeaders, StorageTransport};
use super::types::{ListingEntry, StorageObject};
use super::verify::Verifier;
use crate::utils::time::parse_storage_timestamp;

/// Result of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub path: String,
    pub public_url: String,
    /// False when the object did not become visible within the verification window
    pub verified: bool,
}

/// Object-level access to one storage zone
#[derive(Clone)]
pub struct ObjectStore {
    pub(super) transport: Arc<dyn StorageTransport>,
    verifier: Verifier,
    cdn_base: String,
}

impl ObjectStore {
    pub fn new(transport: Arc<dyn StorageTransport>, verifier: Verifier, cdn_base: &str) -> Self {
        Self {
            transport,
            verifier,
            cdn_base: cdn_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn backend_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn public_url(&self, path: &str) -> String {
        public_url_for(&self.cdn_base, path)
    }

    /// Upload a file, creating missing parent folders first.
    ///
    /// The content type is inferred from the extension when not given; the
    /// cache policy always is. An upload that does not become visible is still
    /// returned, flagged `verified = false`.
    pub async fn upload(
        &self,
        path: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<UploadReceipt, StorageError> {
        let path = normalize_path(path);
        if path.is_empty() || is_dir_path(&path) {
            return Err(StorageError::InvalidPath(format!(
                "upload target must be a file path: {:?}",
                path
            )));
        }
        validate_path(&path).map_err(StorageError::InvalidPath)?;

        let parent = parent_dir(&path);
        if !parent.is_empty() && !self.ensure_folder_exists(&parent).await {
            tracing::warn!(path = %path, parent = %parent, "Parent folders not confirmed, uploading anyway");
        }

        let content_type = content_type
            .filter(|ct| !ct.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(&path));
        let policy = cache_policy_for(&path);
        let headers = ObjectHeaders {
            content_type: Some(content_type.clone()),
            cache_control: Some(policy.cache_control_header.to_string()),
        };

        let size = content.len();
        let response = self.transport.put(&path, content, &headers).await?;
        if !response.is_success() {
            tracing::warn!(path = %path, status = %response.status, "Upload rejected");
            return Err(StorageError::from_status(
                &path,
                response.status,
                &response.body,
            ));
        }

        let verified = self.verifier.verify_exists(&path).await;
        tracing::debug!(
            path = %path,
            size,
            content_type = %content_type,
            cache_category = ?policy.category,
            verified,
            "Uploaded"
        );

        Ok(UploadReceipt {
            public_url: self.public_url(&path),
            path,
            verified,
        })
    }

    pub async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let path = normalize_path(path);
        let response = self.transport.get(&path).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(StorageError::from_status(
                &path,
                response.status,
                &response.body,
            ))
        }
    }

    /// Delete a file or directory. Missing paths count as deleted.
    ///
    /// Returns false when the path is still visible after the verification window.
    pub async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let path = normalize_path(path);
        if path.is_empty() {
            return Err(StorageError::InvalidPath(
                "refusing to delete the storage root".to_string(),
            ));
        }

        let probe = self.transport.get(&path).await?;
        if probe.is_not_found() {
            tracing::debug!(path = %path, "Delete of missing path, nothing to do");
            return Ok(true);
        }
        if !probe.is_success() {
            return Err(StorageError::from_status(&path, probe.status, &probe.body));
        }

        let response = self.transport.delete(&path).await?;
        if !response.is_success() && !response.is_not_found() {
            return Err(StorageError::from_status(
                &path,
                response.status,
                &response.body,
            ));
        }

        let gone = self.verifier.verify_absent(&path).await;
        if !gone {
            tracing::warn!(path = %path, "Deleted path still visible");
        }
        Ok(gone)
    }

    /// Immediate children of a directory, directories first, then by name
    pub async fn list(&self, directory: &str) -> Result<Vec<StorageObject>, StorageError> {
        let dir = normalize_dir(directory);
        let response = self.transport.get(&dir).await?;
        if !response.is_success() {
            return Err(StorageError::from_status(
                &dir,
                response.status,
                &response.body,
            ));
        }

        let entries: Vec<ListingEntry> =
            serde_json::from_slice(&response.body).map_err(|e| StorageError::InvalidListing {
                path: dir.clone(),
                reason: e.to_string(),
                body: truncate_body(&response.body),
            })?;

        let mut objects: Vec<StorageObject> = entries
            .into_iter()
            .filter(|entry| !is_self_echo(&dir, entry))
            .map(|entry| self.to_object(&dir, entry))
            .collect();

        objects.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(objects)
    }

    /// Every descendant of a directory, parents before children
    pub async fn list_recursive(&self, directory: &str) -> Result<Vec<StorageObject>, StorageError> {
        let mut pending = vec![normalize_dir(directory)];
        let mut all = Vec::new();

        while let Some(dir) = pending.pop() {
            for object in self.list(&dir).await? {
                if object.is_directory {
                    pending.push(object.storage_relative_path.clone());
                }
                all.push(object);
            }
        }
        Ok(all)
    }

    /// Single HEAD: 2xx is present, 404 is absent, anything else an error
    pub async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let path = normalize_path(path);
        let response = self.transport.head(&path).await?;
        if response.is_success() {
            Ok(true)
        } else if response.is_not_found() {
            Ok(false)
        } else {
            Err(StorageError::from_status(
                &path,
                response.status,
                &response.body,
            ))
        }
    }

    /// Whether a directory listing can be fetched
    pub async fn dir_exists(&self, directory: &str) -> Result<bool, StorageError> {
        let dir = normalize_dir(directory);
        if dir.is_empty() {
            return Ok(true);
        }
        let response = self.transport.get(&dir).await?;
        if response.is_success() {
            Ok(true)
        } else if response.is_not_found() {
            Ok(false)
        } else {
            Err(StorageError::from_status(
                &dir,
                response.status,
                &response.body,
            ))
        }
    }

    fn to_object(&self, dir: &str, entry: ListingEntry) -> StorageObject {
        let mut path = format!("{}{}", dir, entry.object_name);
        if entry.is_directory {
            path.push('/');
        }
        let path = normalize_path(&path);

        let last_modified = entry
            .last_changed
            .as_deref()
            .or(entry.date_created.as_deref())
            .map(parse_storage_timestamp)
            .unwrap_or(DateTime::UNIX_EPOCH);

        let content_type = if entry.is_directory {
            None
        } else {
            entry
                .content_type
                .filter(|ct| !ct.is_empty())
                .or_else(|| Some(content_type_for(&entry.object_name)))
        };

        StorageObject {
            public_url: self.public_url(&path),
            name: entry.object_name,
            is_directory: entry.is_directory,
            size_bytes: entry.length,
            last_modified,
            storage_relative_path: path,
            content_type,
            guid: entry.guid.filter(|g| !g.is_empty()),
        }
    }
}

/// Zone-relative directory an entry was listed under, from its `Path` field
///
/// `Path` looks like `/{zone}/{dir}/`; the zone segment is dropped.
fn listing_parent(entry: &ListingEntry) -> Option<String> {
    let raw = entry.path.as_deref()?;
    let trimmed = raw.trim_start_matches('/');
    let rest = match trimmed.split_once('/') {
        Some((_, rest)) => rest,
        None => "",
    };
    Some(normalize_dir(rest))
}

/// Entries that describe the listed directory itself rather than a child
fn is_self_echo(dir: &str, entry: &ListingEntry) -> bool {
    let name = entry.object_name.trim_matches('/');
    if name.is_empty() {
        return true;
    }
    if !entry.is_directory {
        return false;
    }
    match listing_parent(entry) {
        Some(parent) if parent != dir => normalize_dir(&format!("{}{}", parent, name)) == dir,
        _ => false,
    }
}
