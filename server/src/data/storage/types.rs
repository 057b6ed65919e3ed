//! Storage descriptors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of a storage-zone directory listing, as the store returns it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListingEntry {
    pub object_name: String,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_zone_name: Option<String>,
}

/// A file or directory in the storage zone
///
/// Built fresh from every listing; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StorageObject {
    pub name: String,
    pub is_directory: bool,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    /// Normalized path; directories end with `/`
    pub storage_relative_path: String,
    pub public_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

/// CDN edge cache state for a public URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheStatus {
    pub url: String,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_cache: Option<String>,
}
