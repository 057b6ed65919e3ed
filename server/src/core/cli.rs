use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::StorageBackend;
use super::constants::{
    ENV_CDN_API_BASE, ENV_CDN_API_KEY, ENV_CDN_BASE_URL, ENV_CDN_PULL_ZONE_ID, ENV_CONFIG,
    ENV_COPY_POLICY, ENV_HOST, ENV_PORT, ENV_REQUEST_TIMEOUT_SECS, ENV_STORAGE_ACCESS_KEY,
    ENV_STORAGE_BACKEND, ENV_STORAGE_ENDPOINT, ENV_STORAGE_REGION, ENV_STORAGE_ZONE,
    ENV_VERIFY_ATTEMPTS, ENV_VERIFY_DELAY_MS,
};
use crate::data::storage::CopyPolicy;

#[derive(Parser)]
#[command(name = "filedeck")]
#[command(
    version,
    about = "Filesystem operations over a Bunny.net storage zone",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Storage backend (bunny or memory)
    #[arg(long, global = true, env = ENV_STORAGE_BACKEND, value_parser = parse_storage_backend)]
    pub storage_backend: Option<StorageBackend>,

    /// Storage zone password
    #[arg(long, global = true, env = ENV_STORAGE_ACCESS_KEY, hide_env_values = true)]
    pub storage_access_key: Option<String>,

    /// Storage zone name
    #[arg(long, global = true, env = ENV_STORAGE_ZONE)]
    pub storage_zone: Option<String>,

    /// Storage region (de, ny, la, sg, syd, uk, se, br, jh)
    #[arg(long, global = true, env = ENV_STORAGE_REGION)]
    pub storage_region: Option<String>,

    /// Storage endpoint, overrides the region
    #[arg(long, global = true, env = ENV_STORAGE_ENDPOINT)]
    pub storage_endpoint: Option<String>,

    /// Public pull zone base URL
    #[arg(long, global = true, env = ENV_CDN_BASE_URL)]
    pub cdn_base_url: Option<String>,

    /// Pull zone id (enables cache purge)
    #[arg(long, global = true, env = ENV_CDN_PULL_ZONE_ID)]
    pub cdn_pull_zone_id: Option<String>,

    /// Account API key for cache purge
    #[arg(long, global = true, env = ENV_CDN_API_KEY, hide_env_values = true)]
    pub cdn_api_key: Option<String>,

    /// Account API base URL
    #[arg(long, global = true, env = ENV_CDN_API_BASE)]
    pub cdn_api_base: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = ENV_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: Option<u64>,

    /// Verification attempts after each write
    #[arg(long, global = true, env = ENV_VERIFY_ATTEMPTS)]
    pub verify_attempts: Option<u32>,

    /// Initial verification delay in milliseconds (doubles per attempt)
    #[arg(long, global = true, env = ENV_VERIFY_DELAY_MS)]
    pub verify_delay_ms: Option<u64>,

    /// Folder copy policy (tolerant or strict)
    #[arg(long, global = true, env = ENV_COPY_POLICY)]
    pub copy_policy: Option<CopyPolicy>,
}

/// Parse storage backend from CLI/env string
fn parse_storage_backend(s: &str) -> Result<StorageBackend, String> {
    match s.to_lowercase().as_str() {
        "bunny" => Ok(StorageBackend::Bunny),
        "memory" => Ok(StorageBackend::Memory),
        _ => Err(format!(
            "Invalid storage backend '{}'. Valid options: bunny, memory",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Validate configuration and list the storage root
    Check,
}

/// Configuration derived from CLI arguments
#[derive(Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub storage_backend: Option<StorageBackend>,
    pub storage_access_key: Option<String>,
    pub storage_zone: Option<String>,
    pub storage_region: Option<String>,
    pub storage_endpoint: Option<String>,
    pub cdn_base_url: Option<String>,
    pub cdn_pull_zone_id: Option<String>,
    pub cdn_api_key: Option<String>,
    pub cdn_api_base: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub verify_attempts: Option<u32>,
    pub verify_delay_ms: Option<u64>,
    pub copy_policy: Option<CopyPolicy>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        storage_backend: cli.storage_backend,
        storage_access_key: cli.storage_access_key,
        storage_zone: cli.storage_zone,
        storage_region: cli.storage_region,
        storage_endpoint: cli.storage_endpoint,
        cdn_base_url: cli.cdn_base_url,
        cdn_pull_zone_id: cli.cdn_pull_zone_id,
        cdn_api_key: cli.cdn_api_key,
        cdn_api_base: cli.cdn_api_base,
        request_timeout_secs: cli.request_timeout_secs,
        verify_attempts: cli.verify_attempts,
        verify_delay_ms: cli.verify_delay_ms,
        copy_policy: cli.copy_policy,
    };
    (config, cli.command)
}
