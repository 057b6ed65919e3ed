// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "Filedeck";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".filedeck";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "filedeck.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "FILEDECK_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "FILEDECK_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "FILEDECK_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "FILEDECK_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

/// Default log filter when neither FILEDECK_LOG nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "info,filedeck=info,filedeck_server=info";

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for JSON API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Body limit for raw uploads (256 MB)
pub const UPLOAD_BODY_LIMIT: usize = 256 * 1024 * 1024;

// =============================================================================
// Environment Variables - Storage Zone
// =============================================================================

/// Storage backend (bunny or memory)
pub const ENV_STORAGE_BACKEND: &str = "FILEDECK_STORAGE_BACKEND";

/// Storage zone password, sent as the `AccessKey` header
pub const ENV_STORAGE_ACCESS_KEY: &str = "FILEDECK_STORAGE_ACCESS_KEY";

/// Storage zone name
pub const ENV_STORAGE_ZONE: &str = "FILEDECK_STORAGE_ZONE";

/// Storage region code (de, ny, la, sg, syd, uk, se, br, jh)
pub const ENV_STORAGE_REGION: &str = "FILEDECK_STORAGE_REGION";

/// Explicit storage endpoint, overrides the region
pub const ENV_STORAGE_ENDPOINT: &str = "FILEDECK_STORAGE_ENDPOINT";

// =============================================================================
// Environment Variables - CDN
// =============================================================================

/// Public pull zone base URL
pub const ENV_CDN_BASE_URL: &str = "FILEDECK_CDN_BASE_URL";

/// Pull zone id, needed for purge
pub const ENV_CDN_PULL_ZONE_ID: &str = "FILEDECK_CDN_PULL_ZONE_ID";

/// Account API key, needed for purge
pub const ENV_CDN_API_KEY: &str = "FILEDECK_CDN_API_KEY";

/// Account API base URL
pub const ENV_CDN_API_BASE: &str = "FILEDECK_CDN_API_BASE";

// =============================================================================
// Environment Variables - Operations
// =============================================================================

/// Per-request timeout in seconds
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "FILEDECK_REQUEST_TIMEOUT_SECS";

/// Verification attempts after each write
pub const ENV_VERIFY_ATTEMPTS: &str = "FILEDECK_VERIFY_ATTEMPTS";

/// Delay before the second verification attempt; doubles afterwards
pub const ENV_VERIFY_DELAY_MS: &str = "FILEDECK_VERIFY_DELAY_MS";

/// Folder copy policy (tolerant or strict)
pub const ENV_COPY_POLICY: &str = "FILEDECK_COPY_POLICY";

// =============================================================================
// Operation Defaults
// =============================================================================

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Public URL base used with the memory backend when none is configured
pub const DEFAULT_MEMORY_CDN_BASE: &str = "http://localhost/cdn";
