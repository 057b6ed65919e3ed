//! Rename and move on a store without rename
//!
//! Every transfer is copy, verify, then delete:
//!
//! ```text
//! Copying ──▶ Verifying ──▶ Deleting ──▶ Done
//!    │            │
//!    └────────────┴──▶ Failed (source untouched)
//! ```
//!
//! The source is only touched once the destination is confirmed. A failure
//! while deleting the source does not undo the transfer; it is reported as a
//! warning on an otherwise successful outcome.
//!
//! Concurrent transfers over overlapping paths are not coordinated.

use std::fmt;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::StorageError;
use super::objects::ObjectStore;
use super::paths::{
    is_dir_path, join, leaf_name, normalize_dir, normalize_path, parent_dir, validate_name,
    validate_path,
};
use super::types::StorageObject;

/// What to do when a folder copy comes up short
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyPolicy {
    /// Warn, delete what was copied and keep the rest at the source
    #[default]
    Tolerant,
    /// Abort before touching the source
    Strict,
}

impl std::str::FromStr for CopyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tolerant" => Ok(Self::Tolerant),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown copy policy '{}', expected 'tolerant' or 'strict'",
                other
            )),
        }
    }
}

/// Phase of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Copying,
    Verifying,
    Deleting,
    Done,
    Failed,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Copying => "copying",
            Self::Verifying => "verifying",
            Self::Deleting => "deleting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of a completed rename or move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TransferOutcome {
    pub source: String,
    pub destination: String,
    pub public_url: String,
    /// Entries present at the destination after the copy (folders only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries_copied: Option<usize>,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

/// Tracks and logs phase transitions of one transfer
struct Transfer<'a> {
    kind: &'static str,
    source: &'a str,
    destination: &'a str,
    phase: TransferPhase,
}

impl<'a> Transfer<'a> {
    fn start(kind: &'static str, source: &'a str, destination: &'a str) -> Self {
        tracing::info!(kind, source, destination, phase = %TransferPhase::Copying, "Transfer started");
        Self {
            kind,
            source,
            destination,
            phase: TransferPhase::Copying,
        }
    }

    fn enter(&mut self, phase: TransferPhase) {
        tracing::debug!(
            kind = self.kind,
            source = self.source,
            destination = self.destination,
            from = %self.phase,
            to = %phase,
            "Transfer phase"
        );
        self.phase = phase;
    }

    fn fail(&mut self, err: StorageError) -> StorageError {
        tracing::warn!(
            kind = self.kind,
            source = self.source,
            destination = self.destination,
            phase = %self.phase,
            error = %err,
            "Transfer failed"
        );
        self.phase = TransferPhase::Failed;
        err
    }
}

/// Copy-verify-delete rename and move
#[derive(Clone)]
pub struct RenameEngine {
    store: ObjectStore,
    copy_policy: CopyPolicy,
}

impl RenameEngine {
    pub fn new(store: ObjectStore, copy_policy: CopyPolicy) -> Self {
        Self { store, copy_policy }
    }

    /// Rename a file within its directory
    pub async fn rename_file(
        &self,
        old_path: &str,
        new_name: &str,
    ) -> Result<TransferOutcome, StorageError> {
        let source = normalize_path(old_path);
        if source.is_empty() || is_dir_path(&source) {
            return Err(StorageError::InvalidPath(format!(
                "not a file path: {:?}",
                old_path
            )));
        }
        validate_path(&source).map_err(StorageError::InvalidPath)?;
        validate_name(new_name).map_err(StorageError::InvalidPath)?;

        let destination = join(&parent_dir(&source), new_name.trim());
        self.transfer_file("rename_file", &source, &destination)
            .await
    }

    /// Move a file to an explicit destination.
    ///
    /// A directory source is moved as a folder and `new_path` names the new
    /// folder itself. For files, a `/`-terminated destination receives the
    /// file under its current name.
    pub async fn move_file(
        &self,
        old_path: &str,
        new_path: &str,
    ) -> Result<TransferOutcome, StorageError> {
        let source = normalize_path(old_path);
        if is_dir_path(&source) {
            return self.move_folder(&source, new_path).await;
        }
        validate_path(&source).map_err(StorageError::InvalidPath)?;

        let mut destination = normalize_path(new_path);
        if is_dir_path(&destination) {
            destination = join(&destination, leaf_name(&source));
        }
        validate_path(&destination).map_err(StorageError::InvalidPath)?;

        self.transfer_file("move_file", &source, &destination)
            .await
    }

    /// Rename a folder within its parent
    pub async fn rename_folder(
        &self,
        old_path: &str,
        new_name: &str,
    ) -> Result<TransferOutcome, StorageError> {
        validate_name(new_name).map_err(StorageError::InvalidPath)?;
        let source = normalize_dir(old_path);
        let destination = normalize_dir(&join(&parent_dir(&source), new_name.trim()));
        self.move_folder(&source, &destination).await
    }

    /// Move a folder and everything under it to `new_path`
    pub async fn move_folder(
        &self,
        old_path: &str,
        new_path: &str,
    ) -> Result<TransferOutcome, StorageError> {
        let source = normalize_dir(old_path);
        let destination = normalize_dir(new_path);
        if source.is_empty() || destination.is_empty() {
            return Err(StorageError::InvalidPath(
                "the storage root cannot be moved or replaced".to_string(),
            ));
        }
        validate_path(&source).map_err(StorageError::InvalidPath)?;
        validate_path(&destination).map_err(StorageError::InvalidPath)?;
        if source == destination {
            return Err(StorageError::InvalidPath(format!(
                "source and destination are the same: {}",
                source
            )));
        }
        if destination.starts_with(&source) {
            return Err(StorageError::Conflict { path: destination });
        }
        if self.store.dir_exists(&destination).await?
            || self.store.exists(destination.trim_end_matches('/')).await?
        {
            return Err(StorageError::Conflict { path: destination });
        }

        let mut transfer = Transfer::start("move_folder", &source, &destination);
        let mut warnings = Vec::new();

        // Copying
        let entries = self
            .store
            .list_recursive(&source)
            .await
            .map_err(|e| transfer.fail(e))?;

        if let Err(e) = self.store.create_directory(&destination).await {
            tracing::warn!(folder = %destination, error = %e, "Destination marker failed");
            return Err(transfer.fail(StorageError::FolderCreation {
                path: destination.clone(),
            }));
        }

        let copies = entries
            .iter()
            .map(|entry| self.copy_entry(entry, &source, &destination));
        let mut uncopied = Vec::new();
        for result in join_all(copies).await {
            if let Err((path, e)) = result {
                tracing::warn!(path = %path, error = %e, "Entry copy failed");
                warnings.push(format!("failed to copy {}: {}", path, e));
                uncopied.push(path);
            }
        }

        // Verifying
        transfer.enter(TransferPhase::Verifying);
        let expected = entries.len();
        let copied = self
            .store
            .list_recursive(&destination)
            .await
            .map_err(|e| transfer.fail(e))?
            .len();

        if copied < expected {
            if self.copy_policy == CopyPolicy::Strict {
                return Err(transfer.fail(StorageError::PartialCopy { expected, copied }));
            }
            tracing::warn!(expected, copied, "Folder copy incomplete, continuing");
            warnings.push(StorageError::PartialCopy { expected, copied }.to_string());
        }

        if copied == 0 {
            if expected > 0 {
                return Err(transfer.fail(StorageError::PartialCopy { expected, copied }));
            }
            let marker_visible = self
                .store
                .dir_exists(&destination)
                .await
                .map_err(|e| transfer.fail(e))?;
            if !marker_visible {
                return Err(transfer.fail(StorageError::VerificationTimeout {
                    operation: "create folder",
                    path: destination.clone(),
                }));
            }
        }

        // Deleting
        transfer.enter(TransferPhase::Deleting);
        warnings.extend(
            self.store
                .delete_tree(&source, &entries, &uncopied)
                .await,
        );

        transfer.enter(TransferPhase::Done);
        Ok(TransferOutcome {
            public_url: self.store.public_url(&destination),
            source: source.clone(),
            destination: destination.clone(),
            entries_copied: Some(copied),
            warnings,
        })
    }

    async fn transfer_file(
        &self,
        kind: &'static str,
        source: &str,
        destination: &str,
    ) -> Result<TransferOutcome, StorageError> {
        if source == destination {
            return Err(StorageError::InvalidPath(format!(
                "source and destination are the same: {}",
                source
            )));
        }
        if self.store.exists(destination).await?
            || self.store.dir_exists(&normalize_dir(destination)).await?
        {
            return Err(StorageError::Conflict {
                path: destination.to_string(),
            });
        }

        let mut transfer = Transfer::start(kind, source, destination);

        // Copying
        let content = self
            .store
            .download(source)
            .await
            .map_err(|e| transfer.fail(e))?;
        let receipt = self
            .store
            .upload(destination, content, None)
            .await
            .map_err(|e| transfer.fail(e))?;

        // Verifying
        transfer.enter(TransferPhase::Verifying);
        let confirmed = receipt.verified
            || self
                .store
                .exists(destination)
                .await
                .map_err(|e| transfer.fail(e))?;
        if !confirmed {
            return Err(transfer.fail(StorageError::VerificationTimeout {
                operation: "copy",
                path: destination.to_string(),
            }));
        }

        // Deleting
        transfer.enter(TransferPhase::Deleting);
        let mut warnings = Vec::new();
        match self.store.delete(source).await {
            Ok(true) => {}
            Ok(false) => {
                warnings.push(format!("source {} is still visible after delete", source));
            }
            Err(e) => {
                tracing::warn!(source, error = %e, "Source cleanup failed");
                warnings.push(format!("failed to delete source {}: {}", source, e));
            }
        }

        transfer.enter(TransferPhase::Done);
        Ok(TransferOutcome {
            source: source.to_string(),
            destination: receipt.path,
            public_url: receipt.public_url,
            entries_copied: None,
            warnings,
        })
    }

    /// Copy one listed entry under the new root
    async fn copy_entry(
        &self,
        entry: &StorageObject,
        source_root: &str,
        destination_root: &str,
    ) -> Result<(), (String, StorageError)> {
        let relative = entry
            .storage_relative_path
            .strip_prefix(source_root)
            .unwrap_or(&entry.storage_relative_path);
        let target = format!("{}{}", destination_root, relative);
        let fail = |e| (entry.storage_relative_path.clone(), e);

        if entry.is_directory {
            self.store.create_directory(&target).await.map_err(fail)?;
        } else {
            let content = self
                .store
                .download(&entry.storage_relative_path)
                .await
                .map_err(fail)?;
            self.store
                .upload(&target, content, entry.content_type.as_deref())
                .await
                .map_err(fail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "rename_tests.rs"]
mod tests;
