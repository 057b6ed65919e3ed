//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::{AppConfig, StorageBackend};
use crate::core::constants::{APP_NAME, DEFAULT_LOG_FILTER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::files::FileService;
use crate::data::storage::{
    BackoffPolicy, BunnyCdnClient, BunnyStorageClient, CacheControl, CdnTransport, MemoryCdn,
    MemoryStorage, ObjectStore, StorageTransport, TokioSleeper, Verifier,
};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub files: Arc<FileService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config)?;

        match command {
            Some(Commands::Check) => app.check().await,
            Some(Commands::Start) | None => Self::start_server(app).await,
        }
    }

    fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let files = Arc::new(Self::build_file_service(&config)?);

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            files,
        })
    }

    /// Wire transports, verifier and cache control for the configured backend
    pub fn build_file_service(config: &AppConfig) -> Result<FileService> {
        let timeout = config.operations.request_timeout;

        let (storage, cdn): (Arc<dyn StorageTransport>, Arc<dyn CdnTransport>) =
            match config.storage.backend {
                StorageBackend::Bunny => {
                    let storage = BunnyStorageClient::new(
                        &config.storage.endpoint,
                        &config.storage.zone,
                        &config.storage.access_key,
                        timeout,
                    )
                    .context("Failed to initialize storage client")?;
                    let cdn = BunnyCdnClient::new(
                        &config.cdn.api_base,
                        config.cdn.api_key.clone(),
                        timeout,
                    )
                    .context("Failed to initialize CDN client")?;
                    (Arc::new(storage), Arc::new(cdn))
                }
                StorageBackend::Memory => {
                    tracing::warn!("Using in-memory storage, nothing will be persisted");
                    (Arc::new(MemoryStorage::new()), Arc::new(MemoryCdn::new()))
                }
            };

        let verifier = Verifier::new(
            storage.clone(),
            Arc::new(TokioSleeper),
            BackoffPolicy::new(
                config.operations.verify_attempts,
                config.operations.verify_delay_ms,
            ),
        );
        let store = ObjectStore::new(storage, verifier, &config.cdn.base_url);
        let cache = CacheControl::new(cdn, config.cdn.pull_zone_id.clone());

        Ok(FileService::new(
            store,
            cache,
            config.operations.copy_policy,
        ))
    }

    /// Validate configuration by listing the storage root
    async fn check(&self) -> Result<()> {
        let result = self.files.list_files("").await;
        if !result.success {
            anyhow::bail!(
                "Storage check failed: {}",
                result.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        println!(
            "{} can reach the {} storage backend",
            APP_NAME,
            self.files.backend_name()
        );
        for entry in result.data.map(|listing| listing.entries).unwrap_or_default() {
            let marker = if entry.is_directory { "/" } else { "" };
            println!("  {}{}", entry.name, marker);
        }
        Ok(())
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        app.shutdown.install_signal_handlers();

        tracing::info!(
            host = %app.config.server.host,
            port = app.config.server.port,
            backend = app.files.backend_name(),
            purge_enabled = app.config.cdn.pull_zone_id.is_some(),
            "{} starting",
            APP_NAME
        );

        let server = ApiServer::new(app);
        server.start().await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}
