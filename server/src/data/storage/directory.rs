//! Directory emulation
//!
//! The store has no real directories. A folder is a zero-byte object whose
//! key ends with `/`; it also exists implicitly while anything lives under it.

use futures::future::join_all;

use super::error::StorageError;
use super::objects::ObjectStore;
use super::paths::{is_dir_path, normalize_dir, validate_path};
use super::transport::ObjectHeaders;
use super::types::StorageObject;

impl ObjectStore {
    /// Create every missing folder marker along `path`.
    ///
    /// Returns false on the first prefix that can neither be read nor created.
    pub async fn ensure_folder_exists(&self, path: &str) -> bool {
        let dir = normalize_dir(path);
        let mut prefix = String::with_capacity(dir.len());

        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            prefix.push_str(segment);
            prefix.push('/');

            let probe = match self.transport.get(&prefix).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(folder = %prefix, error = %e, "Folder probe failed");
                    return false;
                }
            };
            if probe.is_success() {
                continue;
            }
            if !probe.is_not_found() {
                tracing::warn!(folder = %prefix, status = %probe.status, "Folder probe rejected");
                return false;
            }

            match self
                .transport
                .put(&prefix, Vec::new(), &ObjectHeaders::default())
                .await
            {
                Ok(response) if response.is_success() => {
                    tracing::debug!(folder = %prefix, "Created folder marker");
                }
                Ok(response) => {
                    tracing::warn!(folder = %prefix, status = %response.status, "Folder marker rejected");
                    return false;
                }
                Err(e) => {
                    tracing::warn!(folder = %prefix, error = %e, "Folder marker request failed");
                    return false;
                }
            }
        }
        true
    }

    /// PUT an empty marker at the `/`-terminated path.
    ///
    /// Returns the directory path and whether it became visible.
    pub async fn create_directory(&self, path: &str) -> Result<(String, bool), StorageError> {
        let dir = normalize_dir(path);
        if dir.is_empty() {
            return Err(StorageError::InvalidPath(
                "the storage root always exists".to_string(),
            ));
        }
        validate_path(&dir).map_err(StorageError::InvalidPath)?;

        let response = self
            .transport
            .put(&dir, Vec::new(), &ObjectHeaders::default())
            .await?;
        if !response.is_success() {
            return Err(StorageError::from_status(
                &dir,
                response.status,
                &response.body,
            ));
        }

        let visible = self.verifier().verify_exists(&dir).await;
        Ok((dir, visible))
    }

    /// Delete a folder and everything under it, files deepest first.
    ///
    /// Returns warnings for entries that could not be removed.
    pub async fn delete_folder(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let dir = normalize_dir(path);
        if dir.is_empty() {
            return Err(StorageError::InvalidPath(
                "refusing to delete the storage root".to_string(),
            ));
        }
        let entries = self.list_recursive(&dir).await?;
        tracing::debug!(folder = %dir, entries = entries.len(), "Deleting folder");
        Ok(self.delete_tree(&dir, &entries, &[]).await)
    }

    /// Delete files deepest first, then folder markers, then the root marker.
    ///
    /// Entries that failed to copy stay, and so does every folder above them:
    /// a folder delete on the store is recursive. Failures are returned as
    /// warnings.
    pub(super) async fn delete_tree(
        &self,
        root: &str,
        entries: &[StorageObject],
        uncopied: &[String],
    ) -> Vec<String> {
        let depth = |p: &str| p.trim_end_matches('/').matches('/').count();
        let keep = |p: &str| {
            uncopied
                .iter()
                .any(|u| u == p || (is_dir_path(p) && u.starts_with(p)))
        };
        let mut warnings = Vec::new();

        let mut files: Vec<&str> = entries
            .iter()
            .filter(|e| !e.is_directory)
            .map(|e| e.storage_relative_path.as_str())
            .filter(|p| !keep(*p))
            .collect();
        files.sort_by_key(|p| std::cmp::Reverse(depth(*p)));

        let results = join_all(files.iter().map(|path| self.delete(path))).await;
        for (path, result) in files.iter().zip(results) {
            match result {
                Ok(true) => {}
                Ok(false) => {
                    warnings.push(format!("{} is still visible after delete", path))
                }
                Err(e) => {
                    tracing::warn!(path, error = %e, "File delete failed");
                    warnings.push(format!("failed to delete {}: {}", path, e));
                }
            }
        }

        let mut dirs: Vec<&str> = entries
            .iter()
            .filter(|e| e.is_directory)
            .map(|e| e.storage_relative_path.as_str())
            .chain(std::iter::once(root))
            .collect();
        dirs.sort_by_key(|p| std::cmp::Reverse(depth(*p)));

        for dir in dirs {
            if keep(dir) {
                tracing::debug!(folder = dir, "Keeping folder with uncopied entries");
                continue;
            }
            match self.delete(dir).await {
                Ok(true) => {}
                Ok(false) => warnings.push(format!("folder {} is still visible", dir)),
                Err(e) => {
                    tracing::warn!(folder = dir, error = %e, "Folder delete failed");
                    warnings.push(format!("failed to delete folder {}: {}", dir, e));
                }
            }
        }

        if !uncopied.is_empty() {
            warnings.push(format!(
                "{} source entries were not copied and remain under {}",
                uncopied.len(),
                root
            ));
        }
        warnings
    }
}
