//! CDN cache inspection and purge

use std::sync::Arc;

use super::error::StorageError;
use super::paths::normalize_path;
use super::transport::CdnTransport;
use super::types::CacheStatus;
use crate::utils::time::parse_http_date_ms;

/// Edge cache status and purge for one pull zone
#[derive(Clone)]
pub struct CacheControl {
    cdn: Arc<dyn CdnTransport>,
    pull_zone_id: Option<String>,
}

impl CacheControl {
    pub fn new(cdn: Arc<dyn CdnTransport>, pull_zone_id: Option<String>) -> Self {
        Self {
            cdn,
            pull_zone_id: pull_zone_id.filter(|id| !id.trim().is_empty()),
        }
    }

    pub fn purge_enabled(&self) -> bool {
        self.pull_zone_id.is_some()
    }

    /// HEAD a public URL and read the edge cache headers
    pub async fn check_cache_status(&self, url: &str) -> Result<CacheStatus, StorageError> {
        let response = self.cdn.head(url).await?;
        if !response.is_success() {
            return Err(StorageError::from_status(
                url,
                response.status,
                &response.body,
            ));
        }

        let x_cache = response.header("x-cache").map(str::to_string);
        let cached = x_cache.as_deref().is_some_and(is_cache_hit);
        let age_seconds = response
            .header("age")
            .and_then(|v| v.trim().parse::<u64>().ok());
        let expires_at_ms = response.header("expires").and_then(parse_http_date_ms);

        tracing::debug!(url, cached, x_cache = ?x_cache, age_seconds, "Cache status");

        Ok(CacheStatus {
            url: url.to_string(),
            cached,
            age_seconds,
            expires_at_ms,
            cache_control_header: response.header("cache-control").map(str::to_string),
            x_cache,
        })
    }

    /// Ask the CDN to drop cached copies of a path. Never errors.
    pub async fn purge_cache(&self, path: &str) -> bool {
        let Some(zone_id) = self.pull_zone_id.as_deref() else {
            tracing::warn!(path, "Cache purge skipped, no pull zone configured");
            return false;
        };

        let url_path = format!("/{}", normalize_path(path));
        match self.cdn.purge(zone_id, std::slice::from_ref(&url_path)).await {
            Ok(response) if response.is_success() => {
                tracing::info!(path = %url_path, "Cache purged");
                true
            }
            Ok(response) => {
                tracing::warn!(
                    path = %url_path,
                    status = %response.status,
                    body = %super::error::truncate_body(&response.body),
                    "Cache purge rejected"
                );
                false
            }
            Err(e) => {
                tracing::warn!(path = %url_path, error = %e, "Cache purge failed");
                false
            }
        }
    }
}

/// Bunny reports `HIT` or a location-qualified value such as `BunnyCDN-DE1-HIT`
fn is_cache_hit(x_cache: &str) -> bool {
    x_cache.trim().to_ascii_uppercase().ends_with("HIT")
}
