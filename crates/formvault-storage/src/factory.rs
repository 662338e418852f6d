#[cfg(feature = "storage-local")]
use crate::LocalFileStore;
use crate::{FileStore, StorageResult};
use formvault_core::Config;
use std::sync::Arc;

/// Create the file store described by the configuration
pub async fn create_file_store(config: &Config) -> StorageResult<Arc<dyn FileStore>> {
    #[cfg(feature = "storage-local")]
    {
        let store = LocalFileStore::new(config.storage_path.clone()).await?;
        tracing::info!(
            base_path = %store.base_path().display(),
            "Local file store initialized"
        );
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "storage-local"))]
    {
        let _ = config;
        Err(crate::StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        ))
    }
}

/// Create a file store for testing (uses a fresh temporary directory)
#[cfg(all(test, feature = "storage-local"))]
pub async fn create_test_store() -> StorageResult<(tempfile::TempDir, Arc<dyn FileStore>)> {
    let dir = tempfile::tempdir().map_err(crate::StorageError::IoError)?;
    let store = LocalFileStore::new(dir.path()).await?;
    Ok((dir, Arc::new(store)))
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use formvault_core::models::FolderPath;

    #[tokio::test]
    async fn factory_builds_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            secret: "a".repeat(32),
            storage_path: dir.path().join("store"),
            upload_folder: "user_upload/".to_string(),
            conflict_mode: Default::default(),
            allow_removal: false,
            allow_random_seed: false,
            environment: "test".to_string(),
        };

        let store = create_file_store(&config).await.unwrap();
        assert!(store.folder_exists(&FolderPath::root()).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_starts_empty() {
        let (_dir, store) = create_test_store().await.unwrap();
        assert_eq!(store.count_folders(&FolderPath::root()).await.unwrap(), 0);
    }
}
