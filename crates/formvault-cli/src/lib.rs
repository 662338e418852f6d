use std::sync::Arc;

use anyhow::Context;
use formvault_core::{AppError, Config, ErrorMetadata, IntegrityService, LogLevel};
use formvault_processing::{PlacementStrategy, ReconciliationEngine, UploadCleanup};
use formvault_storage::{create_file_store, FileStore, InMemoryReferenceRepository};
use serde::Serialize;

/// Engine components wired against the configured store.
///
/// References live in memory for the lifetime of one command; the CLI only
/// ever creates fresh files.
pub struct Runtime {
    pub integrity: IntegrityService,
    pub store: Arc<dyn FileStore>,
    pub engine: ReconciliationEngine,
    pub cleanup: UploadCleanup,
}

impl Runtime {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let integrity =
            IntegrityService::from_secret(&config.secret).context("Invalid FORMVAULT_SECRET")?;
        let store = create_file_store(config)
            .await
            .context("Failed to open file store")?;
        let placement = PlacementStrategy::new(integrity.clone(), store.clone());
        let engine = ReconciliationEngine::new(
            integrity.clone(),
            placement.clone(),
            store.clone(),
            Arc::new(InMemoryReferenceRepository::new()),
        );

        Ok(Self {
            integrity,
            cleanup: UploadCleanup::new(store.clone(), placement),
            store,
            engine,
        })
    }
}

/// Error body printed when a command fails with an [`AppError`].
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    /// Build the body for `error`; details are hidden in production.
    pub fn from_app_error(error: &AppError, production: bool) -> Self {
        Self {
            error: error.client_message(),
            details: (!production).then(|| error.detailed_message()),
            error_type: (!production).then(|| error.error_type().to_string()),
            code: error.error_code().to_string(),
            recoverable: error.is_recoverable(),
            suggested_action: error.suggested_action().map(String::from),
        }
    }
}

pub fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Command failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Command failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Command failed");
        }
    }
}

pub fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
