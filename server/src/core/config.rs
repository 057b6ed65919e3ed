use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::storage::bunny::DEFAULT_API_BASE;
use crate::data::storage::verify::{DEFAULT_VERIFY_ATTEMPTS, DEFAULT_VERIFY_DELAY_MS};
use crate::data::storage::{CopyPolicy, storage_endpoint_for_region};

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_MEMORY_CDN_BASE, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS, ENV_CDN_BASE_URL, ENV_STORAGE_ACCESS_KEY, ENV_STORAGE_ZONE,
};

// =============================================================================
// Storage Backend Enum
// =============================================================================

/// Where file operations go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Bunny.net storage zone
    #[default]
    Bunny,
    /// In-process zone, contents are lost on exit
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Bunny => write!(f, "bunny"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Storage zone configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StorageFileConfig {
    pub backend: Option<StorageBackend>,
    pub access_key: Option<String>,
    pub zone: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

/// Pull zone configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CdnFileConfig {
    pub base_url: Option<String>,
    pub pull_zone_id: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

/// Timeouts, verification and copy behavior
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OperationsFileConfig {
    pub request_timeout_secs: Option<u64>,
    pub verify_attempts: Option<u32>,
    pub verify_delay_ms: Option<u64>,
    pub copy_policy: Option<CopyPolicy>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub storage: Option<StorageFileConfig>,
    pub cdn: Option<CdnFileConfig>,
    pub operations: Option<OperationsFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Replace `current` when `other` is set
fn overlay<T>(current: &mut Option<T>, other: Option<T>, field: &'static str) {
    if other.is_some() {
        tracing::trace!(field, "Merging config field");
        *current = other;
    }
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            overlay(&mut current.host, server.host, "server.host");
            overlay(&mut current.port, server.port, "server.port");
        }

        if let Some(storage) = other.storage {
            let current = self.storage.get_or_insert_with(StorageFileConfig::default);
            overlay(&mut current.backend, storage.backend, "storage.backend");
            overlay(&mut current.access_key, storage.access_key, "storage.access_key");
            overlay(&mut current.zone, storage.zone, "storage.zone");
            overlay(&mut current.region, storage.region, "storage.region");
            overlay(&mut current.endpoint, storage.endpoint, "storage.endpoint");
        }

        if let Some(cdn) = other.cdn {
            let current = self.cdn.get_or_insert_with(CdnFileConfig::default);
            overlay(&mut current.base_url, cdn.base_url, "cdn.base_url");
            overlay(&mut current.pull_zone_id, cdn.pull_zone_id, "cdn.pull_zone_id");
            overlay(&mut current.api_key, cdn.api_key, "cdn.api_key");
            overlay(&mut current.api_base, cdn.api_base, "cdn.api_base");
        }

        if let Some(ops) = other.operations {
            let current = self
                .operations
                .get_or_insert_with(OperationsFileConfig::default);
            overlay(
                &mut current.request_timeout_secs,
                ops.request_timeout_secs,
                "operations.request_timeout_secs",
            );
            overlay(
                &mut current.verify_attempts,
                ops.verify_attempts,
                "operations.verify_attempts",
            );
            overlay(
                &mut current.verify_delay_ms,
                ops.verify_delay_ms,
                "operations.verify_delay_ms",
            );
            overlay(
                &mut current.copy_policy,
                ops.copy_policy,
                "operations.copy_policy",
            );
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Storage zone configuration
#[derive(Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub access_key: String,
    pub zone: String,
    pub region: Option<String>,
    /// Resolved from `region` unless set explicitly
    pub endpoint: String,
}

/// Pull zone configuration
#[derive(Clone)]
pub struct CdnConfig {
    pub base_url: String,
    pub pull_zone_id: Option<String>,
    pub api_key: Option<String>,
    pub api_base: String,
}

/// Timeouts, verification and copy behavior
#[derive(Debug, Clone)]
pub struct OperationsConfig {
    pub request_timeout: Duration,
    pub verify_attempts: u32,
    pub verify_delay_ms: u64,
    pub copy_policy: CopyPolicy,
}

/// Final merged application configuration
#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cdn: CdnConfig,
    pub operations: OperationsConfig,
}

/// Trimmed value, `None` when blank
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.filedeck/filedeck.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.filedeck/filedeck.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_home(path);
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_sources(cli, file_config);
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            storage_backend = %config.storage.backend,
            storage_zone = %config.storage.zone,
            storage_endpoint = %config.storage.endpoint,
            cdn_base_url = %config.cdn.base_url,
            purge_enabled = config.cdn.pull_zone_id.is_some(),
            request_timeout_secs = config.operations.request_timeout.as_secs(),
            verify_attempts = config.operations.verify_attempts,
            verify_delay_ms = config.operations.verify_delay_ms,
            copy_policy = ?config.operations.copy_policy,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn from_sources(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_storage = file_config.storage.unwrap_or_default();
        let file_cdn = file_config.cdn.unwrap_or_default();
        let file_ops = file_config.operations.unwrap_or_default();

        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);

        let backend = cli
            .storage_backend
            .or(file_storage.backend)
            .unwrap_or_default();
        let region = non_blank(cli.storage_region.clone().or(file_storage.region));
        let endpoint = non_blank(cli.storage_endpoint.clone().or(file_storage.endpoint))
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| storage_endpoint_for_region(region.as_deref()));

        let storage = StorageConfig {
            backend,
            access_key: non_blank(cli.storage_access_key.clone().or(file_storage.access_key))
                .unwrap_or_default(),
            zone: non_blank(cli.storage_zone.clone().or(file_storage.zone)).unwrap_or_default(),
            region,
            endpoint,
        };

        let base_url = non_blank(cli.cdn_base_url.clone().or(file_cdn.base_url))
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| match backend {
                StorageBackend::Memory => DEFAULT_MEMORY_CDN_BASE.to_string(),
                StorageBackend::Bunny => String::new(),
            });
        let cdn = CdnConfig {
            base_url,
            pull_zone_id: non_blank(cli.cdn_pull_zone_id.clone().or(file_cdn.pull_zone_id)),
            api_key: non_blank(cli.cdn_api_key.clone().or(file_cdn.api_key)),
            api_base: non_blank(cli.cdn_api_base.clone().or(file_cdn.api_base))
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        };

        let operations = OperationsConfig {
            request_timeout: Duration::from_secs(
                cli.request_timeout_secs
                    .or(file_ops.request_timeout_secs)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            verify_attempts: cli
                .verify_attempts
                .or(file_ops.verify_attempts)
                .unwrap_or(DEFAULT_VERIFY_ATTEMPTS),
            verify_delay_ms: cli
                .verify_delay_ms
                .or(file_ops.verify_delay_ms)
                .unwrap_or(DEFAULT_VERIFY_DELAY_MS),
            copy_policy: cli
                .copy_policy
                .or(file_ops.copy_policy)
                .unwrap_or_default(),
        };

        Self {
            server: ServerConfig { host, port },
            storage,
            cdn,
            operations,
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }
        if self.operations.verify_attempts == 0 {
            anyhow::bail!("Configuration error: operations.verify_attempts must be at least 1");
        }
        if self.operations.request_timeout.is_zero() {
            anyhow::bail!(
                "Configuration error: operations.request_timeout_secs must be greater than 0"
            );
        }

        if self.storage.backend == StorageBackend::Bunny {
            if self.storage.access_key.is_empty() {
                anyhow::bail!(
                    "Configuration error: storage.access_key is required. \
                     Set via {} env var or storage.access_key in config file.",
                    ENV_STORAGE_ACCESS_KEY
                );
            }
            if self.storage.zone.is_empty() {
                anyhow::bail!(
                    "Configuration error: storage.zone is required. \
                     Set via {} env var or storage.zone in config file.",
                    ENV_STORAGE_ZONE
                );
            }
            if self.cdn.base_url.is_empty() {
                anyhow::bail!(
                    "Configuration error: cdn.base_url is required. \
                     Set via {} env var or cdn.base_url in config file.",
                    ENV_CDN_BASE_URL
                );
            }
            if !self.cdn.base_url.starts_with("http://")
                && !self.cdn.base_url.starts_with("https://")
            {
                anyhow::bail!(
                    "Configuration error: cdn.base_url must start with http:// or https://. Got: {}",
                    self.cdn.base_url
                );
            }
        }

        if self.cdn.pull_zone_id.is_some() && self.cdn.api_key.is_none() {
            tracing::warn!("cdn.pull_zone_id is set without cdn.api_key, cache purge will fail");
        }
        if self.cdn.pull_zone_id.is_none() {
            tracing::debug!("cdn.pull_zone_id not set, cache purge disabled");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.filedeck/filedeck.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Check if host binds to all network interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bunny_cli() -> CliConfig {
        CliConfig {
            storage_access_key: Some("zone-password".to_string()),
            storage_zone: Some("docs".to_string()),
            cdn_base_url: Some("https://docs.b-cdn.net/".to_string()),
            ..Default::default()
        }
    }

    fn memory_cli() -> CliConfig {
        CliConfig {
            storage_backend: Some(StorageBackend::Memory),
            ..Default::default()
        }
    }

    #[test]
    fn test_storage_backend_serde() {
        let backend: StorageBackend = serde_json::from_str(r#""bunny""#).unwrap();
        assert_eq!(backend, StorageBackend::Bunny);
        let backend: StorageBackend = serde_json::from_str(r#""memory""#).unwrap();
        assert_eq!(backend, StorageBackend::Memory);
        assert_eq!(StorageBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 8080 },
            "storage": { "backend": "bunny", "access_key": "k", "zone": "docs", "region": "ny" },
            "cdn": { "base_url": "https://docs.b-cdn.net", "pull_zone_id": "42" },
            "operations": { "verify_attempts": 5, "copy_policy": "strict" }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(server.port, Some(8080));
        let storage = config.storage.as_ref().unwrap();
        assert_eq!(storage.region.as_deref(), Some("ny"));
        assert_eq!(
            config.cdn.as_ref().unwrap().pull_zone_id.as_deref(),
            Some("42")
        );
        let ops = config.operations.as_ref().unwrap();
        assert_eq!(ops.verify_attempts, Some(5));
        assert_eq!(ops.copy_policy, Some(CopyPolicy::Strict));
    }

    #[test]
    fn test_file_config_parse_empty_and_extra_fields() {
        let config: FileConfig = serde_json::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.storage.is_none());

        let json = r#"{ "server": { "host": "localhost" }, "unknown_field": 123 }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.extra.get("unknown_field").unwrap(), 123);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{
                "server": { "host": "base.host", "port": 1000 },
                "storage": { "zone": "base-zone", "access_key": "base-key" }
            }"#,
        )
        .unwrap();
        let other: FileConfig = serde_json::from_str(
            r#"{
                "server": { "port": 2000 },
                "storage": { "zone": "other-zone" },
                "operations": { "verify_delay_ms": 10 }
            }"#,
        )
        .unwrap();

        base.merge(other);

        let server = base.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("base.host"));
        assert_eq!(server.port, Some(2000));
        let storage = base.storage.unwrap();
        assert_eq!(storage.zone.as_deref(), Some("other-zone"));
        assert_eq!(storage.access_key.as_deref(), Some("base-key"));
        assert_eq!(base.operations.unwrap().verify_delay_ms, Some(10));
    }

    #[test]
    fn test_defaults_for_memory_backend() {
        let config = AppConfig::from_sources(&memory_cli(), FileConfig::default());
        config.validate().unwrap();

        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.cdn.base_url, DEFAULT_MEMORY_CDN_BASE);
        assert_eq!(config.cdn.api_base, DEFAULT_API_BASE);
        assert_eq!(config.operations.verify_attempts, 3);
        assert_eq!(config.operations.verify_delay_ms, 1000);
        assert_eq!(config.operations.request_timeout, Duration::from_secs(30));
        assert_eq!(config.operations.copy_policy, CopyPolicy::Tolerant);
    }

    #[test]
    fn test_bunny_endpoint_and_base_url() {
        let config = AppConfig::from_sources(&bunny_cli(), FileConfig::default());
        config.validate().unwrap();
        assert_eq!(config.storage.endpoint, "https://storage.bunnycdn.com");
        assert_eq!(config.cdn.base_url, "https://docs.b-cdn.net");

        let cli = CliConfig {
            storage_region: Some("ny".to_string()),
            ..bunny_cli()
        };
        let config = AppConfig::from_sources(&cli, FileConfig::default());
        assert_eq!(config.storage.endpoint, "https://ny.storage.bunnycdn.com");

        let cli = CliConfig {
            storage_region: Some("ny".to_string()),
            storage_endpoint: Some("http://127.0.0.1:9000/".to_string()),
            ..bunny_cli()
        };
        let config = AppConfig::from_sources(&cli, FileConfig::default());
        assert_eq!(config.storage.endpoint, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{
                "server": { "host": "file.host", "port": 1000 },
                "storage": { "access_key": "file-key", "zone": "file-zone" },
                "cdn": { "base_url": "https://file.b-cdn.net" },
                "operations": { "copy_policy": "tolerant", "verify_attempts": 2 }
            }"#,
        )
        .unwrap();
        let cli = CliConfig {
            port: Some(3000),
            storage_zone: Some("cli-zone".to_string()),
            copy_policy: Some(CopyPolicy::Strict),
            ..Default::default()
        };

        let config = AppConfig::from_sources(&cli, file);
        config.validate().unwrap();
        assert_eq!(config.server.host, "file.host");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.zone, "cli-zone");
        assert_eq!(config.storage.access_key, "file-key");
        assert_eq!(config.operations.copy_policy, CopyPolicy::Strict);
        assert_eq!(config.operations.verify_attempts, 2);
    }

    #[test]
    fn test_validation_requires_bunny_credentials() {
        let missing_key = CliConfig {
            storage_access_key: None,
            ..bunny_cli()
        };
        let err = AppConfig::from_sources(&missing_key, FileConfig::default())
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("storage.access_key"));
        assert!(err.to_string().contains(ENV_STORAGE_ACCESS_KEY));

        let blank_zone = CliConfig {
            storage_zone: Some("  ".to_string()),
            ..bunny_cli()
        };
        let err = AppConfig::from_sources(&blank_zone, FileConfig::default())
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("storage.zone"));

        let no_cdn = CliConfig {
            cdn_base_url: None,
            ..bunny_cli()
        };
        let err = AppConfig::from_sources(&no_cdn, FileConfig::default())
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("cdn.base_url"));

        let bad_cdn = CliConfig {
            cdn_base_url: Some("docs.b-cdn.net".to_string()),
            ..bunny_cli()
        };
        assert!(
            AppConfig::from_sources(&bad_cdn, FileConfig::default())
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let cli = CliConfig {
            port: Some(0),
            ..memory_cli()
        };
        let err = AppConfig::from_sources(&cli, FileConfig::default())
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("server.port"));

        let cli = CliConfig {
            verify_attempts: Some(0),
            ..memory_cli()
        };
        let err = AppConfig::from_sources(&cli, FileConfig::default())
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("verify_attempts"));
    }

    #[test]
    fn test_blank_pull_zone_disables_purge() {
        let cli = CliConfig {
            cdn_pull_zone_id: Some(" ".to_string()),
            ..memory_cli()
        };
        let config = AppConfig::from_sources(&cli, FileConfig::default());
        assert!(config.cdn.pull_zone_id.is_none());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/filedeck.json")),
            ..memory_cli()
        };
        let Err(err) = AppConfig::load(&cli) else {
            panic!("expected a missing config file to fail");
        };
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(
            &path,
            r#"{ "storage": { "backend": "memory" }, "server": { "port": 6000 } }"#,
        )
        .unwrap();

        let cli = CliConfig {
            config: Some(path),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.server.port, 6000);
    }

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(!is_all_interfaces("127.0.0.1"));
    }
}
