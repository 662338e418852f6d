//! Configuration module
//!
//! Process-wide settings for the upload engine, loaded from the environment.
//! Per-field options (seed, folder, validators) are built on top of these
//! defaults by the processing crate.

use std::env;
use std::path::PathBuf;

use crate::constants::DEFAULT_UPLOAD_FOLDER;
use crate::models::{ConflictMode, FolderPath};

const MIN_SECRET_LEN: usize = 32;
const DEFAULT_STORAGE_PATH: &str = "./var/formvault";

#[derive(Clone)]
pub struct Config {
    pub secret: String,
    pub storage_path: PathBuf,
    pub upload_folder: String,
    pub conflict_mode: ConflictMode,
    pub allow_removal: bool,
    /// Fall back to a random seed when a field has none; see `FieldOptions::resolve_seed`
    pub allow_random_seed: bool,
    pub environment: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("secret", &"<redacted>")
            .field("storage_path", &self.storage_path)
            .field("upload_folder", &self.upload_folder)
            .field("conflict_mode", &self.conflict_mode)
            .field("allow_removal", &self.allow_removal)
            .field("allow_random_seed", &self.allow_random_seed)
            .field("environment", &self.environment)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let conflict_mode = match env::var("FORMVAULT_CONFLICT_MODE") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => ConflictMode::default(),
        };

        let config = Config {
            secret: env::var("FORMVAULT_SECRET")
                .map_err(|_| anyhow::anyhow!("FORMVAULT_SECRET must be set for signed form state"))?,
            storage_path: env::var("FORMVAULT_STORAGE_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string())
                .into(),
            upload_folder: env::var("FORMVAULT_UPLOAD_FOLDER")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_UPLOAD_FOLDER.to_string()),
            conflict_mode,
            allow_removal: parse_bool("FORMVAULT_ALLOW_REMOVAL", false),
            allow_random_seed: parse_bool("FORMVAULT_ALLOW_RANDOM_SEED", false),
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "FORMVAULT_SECRET must be at least {} characters long",
                MIN_SECRET_LEN
            ));
        }

        FolderPath::parse(&self.upload_folder)
            .map_err(|e| anyhow::anyhow!("FORMVAULT_UPLOAD_FOLDER is invalid: {}", e))?;

        if self.is_production() && self.allow_random_seed {
            tracing::warn!(
                "FORMVAULT_ALLOW_RANDOM_SEED is enabled in production; replaced uploads will not be cleaned up across submissions"
            );
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            secret: "x".repeat(32),
            storage_path: PathBuf::from("/tmp/formvault"),
            upload_folder: DEFAULT_UPLOAD_FOLDER.to_string(),
            conflict_mode: ConflictMode::Rename,
            allow_removal: false,
            allow_random_seed: false,
            environment: "development".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut cfg = config();
        cfg.secret = "short".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_validate_rejects_traversing_upload_folder() {
        let mut cfg = config();
        cfg.upload_folder = "../outside".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", config());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&"x".repeat(32)));
    }

    #[test]
    fn test_is_production() {
        let mut cfg = config();
        assert!(!cfg.is_production());
        cfg.environment = "PROD".to_string();
        assert!(cfg.is_production());
    }
}
