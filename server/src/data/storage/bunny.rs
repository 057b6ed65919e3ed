//! Bunny.net storage zone and CDN clients
//!
//! Thin reqwest wrappers: every request carries the `AccessKey` header and
//! an explicit timeout, responses are returned raw.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use super::error::StorageError;
use super::transport::{CdnTransport, ObjectHeaders, RawResponse, StorageTransport};

/// Header carrying the storage zone password or account API key
pub const ACCESS_KEY_HEADER: &str = "AccessKey";

/// Default storage endpoint (Falkenstein)
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.bunnycdn.com";

/// Default management API base
pub const DEFAULT_API_BASE: &str = "https://api.bunny.net";

/// Resolve the storage endpoint for a region code.
///
/// Empty, `de` and `falkenstein` map to the primary endpoint; any other
/// region `xx` maps to `https://xx.storage.bunnycdn.com`.
pub fn storage_endpoint_for_region(region: Option<&str>) -> String {
    match region.map(|r| r.trim().to_ascii_lowercase()) {
        None => DEFAULT_STORAGE_ENDPOINT.to_string(),
        Some(r) if r.is_empty() || r == "de" || r == "falkenstein" => {
            DEFAULT_STORAGE_ENDPOINT.to_string()
        }
        Some(r) => format!("https://{}.storage.bunnycdn.com", r),
    }
}

/// Percent-encode each segment, keeping `/` separators and the trailing slash
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_client(timeout: Duration) -> Result<Client, StorageError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

async fn into_raw(response: reqwest::Response) -> Result<RawResponse, StorageError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();
    Ok(RawResponse {
        status,
        headers,
        body,
    })
}

/// Storage zone client
#[derive(Debug, Clone)]
pub struct BunnyStorageClient {
    http: Client,
    /// `{endpoint}/{zone}`
    zone_url: String,
    access_key: String,
}

impl BunnyStorageClient {
    pub fn new(
        endpoint: &str,
        zone: &str,
        access_key: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        if zone.trim().is_empty() {
            return Err(StorageError::Configuration(
                "storage zone name is empty".to_string(),
            ));
        }
        if access_key.trim().is_empty() {
            return Err(StorageError::Configuration(
                "storage access key is empty".to_string(),
            ));
        }

        let zone_url = format!("{}/{}", endpoint.trim_end_matches('/'), zone.trim());

        tracing::debug!(
            zone_url = %zone_url,
            timeout_secs = timeout.as_secs(),
            "Bunny storage client initialized"
        );

        Ok(Self {
            http: build_client(timeout)?,
            zone_url,
            access_key: access_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.zone_url, encode_path(path))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        headers: Option<&ObjectHeaders>,
    ) -> Result<RawResponse, StorageError> {
        let url = self.url(path);
        tracing::trace!(method = %method, url = %url, "Storage request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(ACCESS_KEY_HEADER, &self.access_key);

        if let Some(headers) = headers {
            if let Some(content_type) = &headers.content_type {
                request = request.header(reqwest::header::CONTENT_TYPE, content_type);
            }
            if let Some(cache_control) = &headers.cache_control {
                request = request.header(reqwest::header::CACHE_CONTROL, cache_control);
            }
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(method = %method, url = %url, error = %e, "Storage request failed");
            StorageError::Http(e)
        })?;

        let raw = into_raw(response).await?;
        tracing::trace!(method = %method, url = %url, status = %raw.status, "Storage response");
        Ok(raw)
    }
}

#[async_trait]
impl StorageTransport for BunnyStorageClient {
    async fn get(&self, path: &str) -> Result<RawResponse, StorageError> {
        self.send(Method::GET, path, None, None).await
    }

    async fn put(
        &self,
        path: &str,
        body: Vec<u8>,
        headers: &ObjectHeaders,
    ) -> Result<RawResponse, StorageError> {
        self.send(Method::PUT, path, Some(body), Some(headers))
            .await
    }

    async fn delete(&self, path: &str) -> Result<RawResponse, StorageError> {
        self.send(Method::DELETE, path, None, None).await
    }

    async fn head(&self, path: &str) -> Result<RawResponse, StorageError> {
        self.send(Method::HEAD, path, None, None).await
    }

    fn name(&self) -> &'static str {
        "bunny"
    }
}

/// Pull-zone edge and management API client
#[derive(Debug, Clone)]
pub struct BunnyCdnClient {
    http: Client,
    api_base: String,
    api_key: Option<String>,
}

impl BunnyCdnClient {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            http: build_client(timeout)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl CdnTransport for BunnyCdnClient {
    async fn head(&self, url: &str) -> Result<RawResponse, StorageError> {
        let response = self.http.head(url).send().await?;
        into_raw(response).await
    }

    async fn purge(
        &self,
        pull_zone_id: &str,
        paths: &[String],
    ) -> Result<RawResponse, StorageError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            StorageError::Configuration("CDN API key is required for cache purge".to_string())
        })?;

        let url = format!("{}/pullzone/{}/purgeCache", self.api_base, pull_zone_id);
        let response = self
            .http
            .post(&url)
            .header(ACCESS_KEY_HEADER, api_key)
            .json(&serde_json::json!({ "urls": paths }))
            .send()
            .await?;
        into_raw(response).await
    }
}
