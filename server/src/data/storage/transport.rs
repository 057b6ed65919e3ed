//! Storage and CDN transport traits
//!
//! Transports issue raw requests and hand back the raw response. They never
//! interpret status codes: a 404 or 500 is a successful round trip here and
//! callers decide what it means. Only network failures surface as errors.

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use super::error::StorageError;

/// Raw response from the object store or CDN
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Headers attached to an object on upload
#[derive(Debug, Clone, Default)]
pub struct ObjectHeaders {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

/// Raw access to a storage zone
///
/// Paths are storage-relative and already normalized. A path ending in `/`
/// addresses a directory: GET returns a JSON listing, PUT with an empty body
/// creates the directory marker.
#[async_trait]
pub trait StorageTransport: Send + Sync {
    async fn get(&self, path: &str) -> Result<RawResponse, StorageError>;

    async fn put(
        &self,
        path: &str,
        body: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<RawResponse, StorageError>;

    async fn delete(&self, path: &str) -> Result<RawResponse, StorageError>;

    async fn head(&self, path: &str) -> Result<RawResponse, StorageError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Raw access to the CDN edge and its management API
#[async_trait]
pub trait CdnTransport: Send + Sync {
    /// HEAD a public URL through the CDN edge
    async fn head(&self, url: &str) -> Result<RawResponse, StorageError>;

    /// Ask the CDN to drop cached copies of the given paths
    async fn purge(&self, pull_zone_id: &str, paths: &[String])
    -> Result<RawResponse, StorageError>;
}
