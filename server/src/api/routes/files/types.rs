//! Files API request types

use serde::Deserialize;
use utoipa::ToSchema;

/// Query for directory listing; an absent path lists the root
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub path: String,
}

/// Query naming a single path
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFolderRequest {
    /// Folder path, with or without a trailing slash
    pub path: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameRequest {
    /// File or folder to rename
    pub path: String,
    /// New leaf name; must not contain `/`
    pub new_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveRequest {
    pub from: String,
    /// Destination path; a trailing `/` moves a file into that folder
    pub to: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PurgeRequest {
    pub path: String,
}
