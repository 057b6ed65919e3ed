//! Files API endpoints
//!
//! Thin adapters over [`FileService`]. Every JSON response is the operation
//! envelope; the status code follows its failure kind.

pub mod types;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use types::{CreateFolderRequest, ListQuery, MoveRequest, PathQuery, PurgeRequest, RenameRequest};

use crate::api::types::{ApiError, Envelope};
use crate::core::constants::UPLOAD_BODY_LIMIT;
use crate::data::files::{
    CreatedFolder, DeletedPath, DirectoryListing, FileService, OperationResult, PurgeResult,
    ResolvedPath, UploadedFile,
};
use crate::data::storage::paths::DEFAULT_CONTENT_TYPE;
use crate::data::storage::{CacheStatus, TransferOutcome};

/// Content types that clients send without meaning them
const UNSPECIFIED_CONTENT_TYPES: &[&str] = &["application/x-www-form-urlencoded"];

/// Shared state for Files API endpoints
#[derive(Clone)]
pub struct FilesApiState {
    pub files: Arc<FileService>,
}

/// Build Files API routes
pub fn routes(files: Arc<FileService>) -> Router<()> {
    let state = FilesApiState { files };

    Router::new()
        .route("/", get(list_files))
        .route(
            "/content/{*path}",
            get(download_file)
                .put(upload_file)
                .delete(delete_path)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/folders", post(create_folder))
        .route("/rename", post(rename_path))
        .route("/move", post(move_path))
        .route("/cache", get(check_cache))
        .route("/cache/purge", post(purge_cache))
        .route("/resolve", get(resolve_path))
        .with_state(state)
}

/// Content type from the request, if the client meant one
fn declared_content_type(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| {
        ApiError::bad_request("INVALID_CONTENT_TYPE", "Content-Type is not valid ASCII")
    })?;
    let value = value.trim();
    if value.is_empty() || UNSPECIFIED_CONTENT_TYPES.contains(&value) {
        return Ok(None);
    }
    Ok(Some(value.to_string()))
}

/// List a directory
#[utoipa::path(
    get,
    path = "/api/v1/files",
    tag = "files",
    params(
        ("path" = Option<String>, Query, description = "Directory to list; the root when absent")
    ),
    responses(
        (status = 200, description = "Directory contents", body = OperationResult<DirectoryListing>),
        (status = 404, description = "Directory not found"),
        (status = 503, description = "Storage unavailable, retry")
    )
)]
pub async fn list_files(
    State(state): State<FilesApiState>,
    Query(query): Query<ListQuery>,
) -> Envelope<DirectoryListing> {
    Envelope(state.files.list_files(&query.path).await)
}

/// Download a file
///
/// Returns the raw bytes on success and the failure envelope otherwise.
#[utoipa::path(
    get,
    path = "/api/v1/files/content/{path}",
    tag = "files",
    params(
        ("path" = String, Path, description = "File path inside the storage zone")
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 404, description = "File not found"),
        (status = 503, description = "Storage unavailable, retry")
    )
)]
pub async fn download_file(
    State(state): State<FilesApiState>,
    Path(path): Path<String>,
) -> Response {
    let result = state.files.download_file(&path).await;
    if !result.success {
        return Envelope(result.map(|_| ())).into_response();
    }
    let Some(download) = result.data else {
        return ApiError::internal("download returned no content").into_response();
    };

    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    ([(header::CONTENT_TYPE, content_type)], download.bytes).into_response()
}

/// Upload a file from the raw request body
#[utoipa::path(
    put,
    path = "/api/v1/files/content/{path}",
    tag = "files",
    params(
        ("path" = String, Path, description = "Destination file path")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "File stored", body = OperationResult<UploadedFile>),
        (status = 400, description = "Invalid path"),
        (status = 503, description = "Storage unavailable, retry")
    )
)]
pub async fn upload_file(
    State(state): State<FilesApiState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Envelope<UploadedFile>, ApiError> {
    let content_type = declared_content_type(&headers)?;
    Ok(Envelope(
        state
            .files
            .upload_file(&path, body.to_vec(), content_type.as_deref())
            .await,
    ))
}

/// Delete a file, or a folder with everything under it
#[utoipa::path(
    delete,
    path = "/api/v1/files/content/{path}",
    tag = "files",
    params(
        ("path" = String, Path, description = "File or folder path")
    ),
    responses(
        (status = 200, description = "Deleted, or nothing to delete", body = OperationResult<DeletedPath>),
        (status = 503, description = "Deletion not confirmed, retry")
    )
)]
pub async fn delete_path(
    State(state): State<FilesApiState>,
    Path(path): Path<String>,
) -> Envelope<DeletedPath> {
    Envelope(state.files.delete_path(&path).await)
}

/// Create a folder
#[utoipa::path(
    post,
    path = "/api/v1/files/folders",
    tag = "files",
    request_body = CreateFolderRequest,
    responses(
        (status = 200, description = "Folder created", body = OperationResult<CreatedFolder>),
        (status = 409, description = "Folder or file already exists")
    )
)]
pub async fn create_folder(
    State(state): State<FilesApiState>,
    Json(request): Json<CreateFolderRequest>,
) -> Envelope<CreatedFolder> {
    Envelope(state.files.create_folder(&request.path).await)
}

/// Rename a file or folder in place
#[utoipa::path(
    post,
    path = "/api/v1/files/rename",
    tag = "files",
    request_body = RenameRequest,
    responses(
        (status = 200, description = "Renamed", body = OperationResult<TransferOutcome>),
        (status = 404, description = "Source not found"),
        (status = 409, description = "Destination already exists"),
        (status = 503, description = "Copy or verification failed, retry")
    )
)]
pub async fn rename_path(
    State(state): State<FilesApiState>,
    Json(request): Json<RenameRequest>,
) -> Envelope<TransferOutcome> {
    Envelope(
        state
            .files
            .rename_path(&request.path, &request.new_name)
            .await,
    )
}

/// Move a file or folder
#[utoipa::path(
    post,
    path = "/api/v1/files/move",
    tag = "files",
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Moved", body = OperationResult<TransferOutcome>),
        (status = 404, description = "Source not found"),
        (status = 409, description = "Destination already exists"),
        (status = 503, description = "Copy or verification failed, retry")
    )
)]
pub async fn move_path(
    State(state): State<FilesApiState>,
    Json(request): Json<MoveRequest>,
) -> Envelope<TransferOutcome> {
    Envelope(state.files.move_path(&request.from, &request.to).await)
}

/// Edge cache status of a file's public URL
#[utoipa::path(
    get,
    path = "/api/v1/files/cache",
    tag = "files",
    params(
        ("path" = String, Query, description = "File path")
    ),
    responses(
        (status = 200, description = "Cache status", body = OperationResult<CacheStatus>)
    )
)]
pub async fn check_cache(
    State(state): State<FilesApiState>,
    Query(query): Query<PathQuery>,
) -> Envelope<CacheStatus> {
    Envelope(state.files.check_cache(&query.path).await)
}

/// Purge a file from the edge cache
#[utoipa::path(
    post,
    path = "/api/v1/files/cache/purge",
    tag = "files",
    request_body = PurgeRequest,
    responses(
        (status = 200, description = "Purge accepted", body = OperationResult<PurgeResult>),
        (status = 500, description = "Purge not configured"),
        (status = 503, description = "Purge rejected, retry")
    )
)]
pub async fn purge_cache(
    State(state): State<FilesApiState>,
    Json(request): Json<PurgeRequest>,
) -> Envelope<PurgeResult> {
    Envelope(state.files.purge_cache(&request.path).await)
}

/// Correct the client folder of a document path
#[utoipa::path(
    get,
    path = "/api/v1/files/resolve",
    tag = "files",
    params(
        ("path" = String, Query, description = "Document path starting with a client folder")
    ),
    responses(
        (status = 200, description = "Resolved path", body = OperationResult<ResolvedPath>)
    )
)]
pub async fn resolve_path(
    State(state): State<FilesApiState>,
    Query(query): Query<PathQuery>,
) -> Envelope<ResolvedPath> {
    Envelope(state.files.resolve_document_path(&query.path).await)
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
