//! File service
//!
//! Request-level orchestration over the storage layer. Each operation runs
//!
//! ```text
//! start ─▶ precondition check ─▶ execute ─▶ postcondition verify ─▶ success
//!                 │                  │                │
//!                 └──────────────────┴────────────────┴─▶ failure (retryable?)
//! ```
//!
//! and always returns an [`OperationResult`]. This is the only place storage
//! errors are turned into envelopes; nothing above it sees a `StorageError`.
//!
//! ## Usage
//!
//! ```text
//! let files = FileService::new(store, cache, CopyPolicy::Tolerant);
//!
//! let result = files.rename_path("documents/a.txt", "b.txt").await;
//! if !result.success && result.retryable {
//!     // re-check both paths, then try again
//! }
//! ```

pub mod result;

use serde::Serialize;
use utoipa::ToSchema;

use crate::data::storage::paths::{
    CacheCategory, cache_policy_for, content_type_for, is_dir_path, leaf_name, normalize_dir,
    normalize_path, parent_dir, validate_name, validate_path,
};
use crate::data::storage::{
    CacheControl, CacheStatus, CopyPolicy, ObjectStore, RenameEngine, StorageError,
    StorageObject, TransferOutcome,
};
use crate::domain::ClientFolderResolver;

pub use result::{FailureKind, OperationResult};

/// Directory contents
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DirectoryListing {
    pub path: String,
    pub entries: Vec<StorageObject>,
}

/// A stored upload
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadedFile {
    pub path: String,
    pub public_url: String,
    pub size_bytes: u64,
    pub content_type: String,
    pub cache_category: CacheCategory,
    pub cache_control: String,
}

/// File bytes with their content type
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletedPath {
    pub path: String,
    pub is_directory: bool,
    /// False when there was nothing to delete
    pub existed: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedFolder {
    pub path: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurgeResult {
    pub path: String,
    pub purged: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedPath {
    pub requested: String,
    pub resolved: String,
    pub corrected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathKind {
    File,
    Folder,
}

type Step<T> = Result<OperationResult<T>, StorageError>;

fn invalid(message: String) -> StorageError {
    StorageError::InvalidPath(message)
}

fn require_file_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty() || is_dir_path(path) {
        return Err(invalid(format!("not a file path: {:?}", path)));
    }
    validate_path(path).map_err(invalid)
}

/// File operations with pre/post checks and the uniform envelope
pub struct FileService {
    store: ObjectStore,
    engine: RenameEngine,
    cache: CacheControl,
    folders: ClientFolderResolver,
}

impl FileService {
    pub fn new(store: ObjectStore, cache: CacheControl, copy_policy: CopyPolicy) -> Self {
        Self::with_resolver(
            store.clone(),
            cache,
            copy_policy,
            ClientFolderResolver::new(store),
        )
    }

    pub fn with_resolver(
        store: ObjectStore,
        cache: CacheControl,
        copy_policy: CopyPolicy,
        folders: ClientFolderResolver,
    ) -> Self {
        tracing::debug!(
            backend = store.backend_name(),
            copy_policy = ?copy_policy,
            purge_enabled = cache.purge_enabled(),
            "File service initialized"
        );
        Self {
            engine: RenameEngine::new(store.clone(), copy_policy),
            store,
            cache,
            folders,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn list_files(&self, path: &str) -> OperationResult<DirectoryListing> {
        let dir = normalize_dir(path);
        tracing::debug!(op = "list", path = %dir, "File operation started");
        finish("list", &dir, self.list_step(&dir).await)
    }

    async fn list_step(&self, dir: &str) -> Step<DirectoryListing> {
        validate_path(dir).map_err(invalid)?;
        let entries = self.store.list(dir).await?;
        Ok(OperationResult::ok(DirectoryListing {
            path: dir.to_string(),
            entries,
        }))
    }

    pub async fn upload_file(
        &self,
        path: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> OperationResult<UploadedFile> {
        let path = normalize_path(path);
        tracing::debug!(op = "upload", path = %path, size = content.len(), "File operation started");
        finish(
            "upload",
            &path,
            self.upload_step(&path, content, content_type).await,
        )
    }

    async fn upload_step(
        &self,
        path: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Step<UploadedFile> {
        let size_bytes = content.len() as u64;
        let receipt = self.store.upload(path, content, content_type).await?;

        let mut warnings = Vec::new();
        if !receipt.verified {
            tracing::warn!(path = %receipt.path, "Upload not yet visible");
            warnings.push(format!(
                "upload of {} is not visible yet; it may take a moment to appear",
                receipt.path
            ));
        }
        if let Some((top, _)) = receipt.path.split_once('/') {
            self.folders.note_folder(top);
        }

        let policy = cache_policy_for(&receipt.path);
        let content_type = content_type
            .filter(|ct| !ct.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for(&receipt.path));
        Ok(OperationResult::ok(UploadedFile {
            path: receipt.path,
            public_url: receipt.public_url,
            size_bytes,
            content_type,
            cache_category: policy.category,
            cache_control: policy.cache_control_header.to_string(),
        })
        .with_warnings(warnings))
    }

    pub async fn download_file(&self, path: &str) -> OperationResult<FileDownload> {
        let path = normalize_path(path);
        tracing::debug!(op = "download", path = %path, "File operation started");
        finish("download", &path, self.download_step(&path).await)
    }

    async fn download_step(&self, path: &str) -> Step<FileDownload> {
        require_file_path(path)?;
        let bytes = self.store.download(path).await?;
        Ok(OperationResult::ok(FileDownload {
            path: path.to_string(),
            content_type: content_type_for(path),
            bytes,
        }))
    }

    /// Delete a file or a folder with everything under it. Missing paths succeed.
    pub async fn delete_path(&self, path: &str) -> OperationResult<DeletedPath> {
        let path = normalize_path(path);
        tracing::debug!(op = "delete", path = %path, "File operation started");
        finish("delete", &path, self.delete_step(&path).await)
    }

    async fn delete_step(&self, path: &str) -> Step<DeletedPath> {
        if path.is_empty() {
            return Err(invalid("refusing to delete the storage root".to_string()));
        }
        validate_path(path).map_err(invalid)?;

        let Some(kind) = self.probe(path).await? else {
            tracing::debug!(path, "Nothing to delete");
            return Ok(OperationResult::ok(DeletedPath {
                path: path.to_string(),
                is_directory: is_dir_path(path),
                existed: false,
            }));
        };

        match kind {
            PathKind::File => {
                if !self.store.delete(path).await? {
                    return Err(StorageError::VerificationTimeout {
                        operation: "delete",
                        path: path.to_string(),
                    });
                }
                Ok(OperationResult::ok(DeletedPath {
                    path: path.to_string(),
                    is_directory: false,
                    existed: true,
                }))
            }
            PathKind::Folder => {
                let dir = normalize_dir(path);
                let warnings = self.store.delete_folder(&dir).await?;
                if parent_dir(&dir).is_empty() {
                    self.folders.invalidate();
                }
                if self.store.dir_exists(&dir).await? {
                    let mut failed = OperationResult::from_error(&StorageError::VerificationTimeout {
                        operation: "delete",
                        path: dir,
                    });
                    failed.warnings = warnings;
                    return Ok(failed);
                }
                Ok(OperationResult::ok(DeletedPath {
                    path: dir,
                    is_directory: true,
                    existed: true,
                })
                .with_warnings(warnings))
            }
        }
    }

    /// Rename a file or folder in place
    pub async fn rename_path(&self, path: &str, new_name: &str) -> OperationResult<TransferOutcome> {
        let path = normalize_path(path);
        tracing::debug!(op = "rename", path = %path, new_name, "File operation started");
        finish("rename", &path, self.rename_step(&path, new_name).await)
    }

    async fn rename_step(&self, path: &str, new_name: &str) -> Step<TransferOutcome> {
        if path.is_empty() {
            return Err(invalid("the storage root cannot be renamed".to_string()));
        }
        validate_path(path).map_err(invalid)?;
        validate_name(new_name).map_err(invalid)?;

        let kind = self.require(path).await?;
        let outcome = match kind {
            PathKind::File => self.engine.rename_file(path, new_name).await?,
            PathKind::Folder => self.engine.rename_folder(path, new_name).await?,
        };
        self.confirm_transfer(kind, outcome).await
    }

    /// Move a file or folder to an explicit destination
    pub async fn move_path(&self, from: &str, to: &str) -> OperationResult<TransferOutcome> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        tracing::debug!(op = "move", path = %from, to = %to, "File operation started");
        finish("move", &from, self.move_step(&from, &to).await)
    }

    async fn move_step(&self, from: &str, to: &str) -> Step<TransferOutcome> {
        if from.is_empty() || to.is_empty() {
            return Err(invalid("the storage root cannot be moved".to_string()));
        }
        validate_path(from).map_err(invalid)?;
        validate_path(to).map_err(invalid)?;

        let kind = self.require(from).await?;
        let outcome = match kind {
            PathKind::File => self.engine.move_file(from, to).await?,
            PathKind::Folder => {
                self.engine
                    .move_folder(&normalize_dir(from), &normalize_dir(to))
                    .await?
            }
        };
        self.confirm_transfer(kind, outcome).await
    }

    pub async fn create_folder(&self, path: &str) -> OperationResult<CreatedFolder> {
        let dir = normalize_dir(path);
        tracing::debug!(op = "create_folder", path = %dir, "File operation started");
        finish("create_folder", &dir, self.create_folder_step(&dir).await)
    }

    async fn create_folder_step(&self, dir: &str) -> Step<CreatedFolder> {
        if dir.is_empty() {
            return Err(invalid("the storage root always exists".to_string()));
        }
        validate_path(dir).map_err(invalid)?;
        if self.store.dir_exists(dir).await? || self.store.exists(dir.trim_end_matches('/')).await? {
            return Err(StorageError::Conflict {
                path: dir.to_string(),
            });
        }

        let parent = parent_dir(dir);
        if !parent.is_empty() && !self.store.ensure_folder_exists(&parent).await {
            tracing::warn!(parent = %parent, "Parent folders not confirmed");
        }
        let (dir, visible) = self.store.create_directory(dir).await?;

        if parent.is_empty() {
            self.folders.note_folder(leaf_name(&dir));
        }

        let mut warnings = Vec::new();
        if !visible {
            warnings.push(format!("folder {} is not visible yet", dir));
        }
        Ok(OperationResult::ok(CreatedFolder {
            public_url: self.store.public_url(&dir),
            path: dir,
        })
        .with_warnings(warnings))
    }

    pub async fn check_cache(&self, path: &str) -> OperationResult<CacheStatus> {
        let path = normalize_path(path);
        tracing::debug!(op = "check_cache", path = %path, "File operation started");
        finish("check_cache", &path, self.check_cache_step(&path).await)
    }

    async fn check_cache_step(&self, path: &str) -> Step<CacheStatus> {
        require_file_path(path)?;
        let url = self.store.public_url(path);
        Ok(OperationResult::ok(self.cache.check_cache_status(&url).await?))
    }

    pub async fn purge_cache(&self, path: &str) -> OperationResult<PurgeResult> {
        let path = normalize_path(path);
        tracing::debug!(op = "purge_cache", path = %path, "File operation started");
        finish("purge_cache", &path, self.purge_step(&path).await)
    }

    async fn purge_step(&self, path: &str) -> Step<PurgeResult> {
        if path.is_empty() {
            return Err(invalid("a path is required".to_string()));
        }
        if !self.cache.purge_enabled() {
            return Err(StorageError::Configuration(
                "cache purge needs a pull zone id".to_string(),
            ));
        }
        if !self.cache.purge_cache(path).await {
            return Ok(OperationResult::failure(
                FailureKind::Unavailable,
                format!("cache purge failed for {}", path),
            ));
        }
        Ok(OperationResult::ok(PurgeResult {
            path: path.to_string(),
            purged: true,
        }))
    }

    /// Correct the client folder segment of a document path
    pub async fn resolve_document_path(&self, path: &str) -> OperationResult<ResolvedPath> {
        let requested = normalize_path(path);
        tracing::debug!(op = "resolve", path = %requested, "File operation started");
        finish("resolve", &requested, self.resolve_step(&requested).await)
    }

    async fn resolve_step(&self, requested: &str) -> Step<ResolvedPath> {
        let resolved = self.folders.correct_path(requested).await?;
        Ok(OperationResult::ok(ResolvedPath {
            corrected: resolved != requested,
            requested: requested.to_string(),
            resolved,
        }))
    }

    /// Whether a path is a file, a folder, or absent
    async fn probe(&self, path: &str) -> Result<Option<PathKind>, StorageError> {
        if is_dir_path(path) {
            let found = self.store.dir_exists(path).await?;
            return Ok(found.then_some(PathKind::Folder));
        }
        if self.store.exists(path).await? {
            return Ok(Some(PathKind::File));
        }
        let found = self.store.dir_exists(&normalize_dir(path)).await?;
        Ok(found.then_some(PathKind::Folder))
    }

    async fn require(&self, path: &str) -> Result<PathKind, StorageError> {
        self.probe(path)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }

    /// Destination must be present; a lingering source only warns
    async fn confirm_transfer(
        &self,
        kind: PathKind,
        mut outcome: TransferOutcome,
    ) -> Step<TransferOutcome> {
        let (destination_ok, source_gone) = match kind {
            PathKind::File => (
                self.store
                    .verifier()
                    .verify_exists(&outcome.destination)
                    .await,
                !self.store.exists(&outcome.source).await.unwrap_or(true),
            ),
            PathKind::Folder => (
                self.store.dir_exists(&outcome.destination).await?,
                !self.store.dir_exists(&outcome.source).await.unwrap_or(true),
            ),
        };

        if kind == PathKind::Folder
            && (parent_dir(&outcome.source).is_empty()
                || parent_dir(&outcome.destination).is_empty())
        {
            self.folders.invalidate();
        }

        if !destination_ok {
            return Err(StorageError::VerificationTimeout {
                operation: "transfer",
                path: outcome.destination,
            });
        }
        if !source_gone {
            tracing::warn!(source = %outcome.source, "Source still visible after transfer");
            outcome
                .warnings
                .push(format!("source {} is still visible", outcome.source));
        }

        let warnings = std::mem::take(&mut outcome.warnings);
        Ok(OperationResult::ok(outcome).with_warnings(warnings))
    }
}

/// Log the exit branch and convert errors into the envelope
fn finish<T>(op: &'static str, path: &str, step: Step<T>) -> OperationResult<T> {
    let result = step.unwrap_or_else(|e| OperationResult::from_error(&e));
    if result.success {
        tracing::info!(op, path, warnings = result.warnings.len(), "File operation succeeded");
    } else {
        tracing::warn!(
            op,
            path,
            error = result.error.as_deref().unwrap_or_default(),
            retryable = result.retryable,
            "File operation failed"
        );
    }
    result
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
