#![allow(dead_code)]

pub mod fixtures;

use formvault_core::models::FolderPath;
use formvault_core::IntegrityService;
use formvault_processing::{
    Conversion, FieldOptions, PlacementStrategy, ReconciliationEngine, TargetShape, UploadCleanup,
    ValidatorSet,
};
use formvault_storage::{FileStore, InMemoryReferenceRepository, LocalFileStore, ReferenceRepository};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const TEST_SEED: &str = "form-session-seed";

/// Test application state
pub struct TestApp {
    pub engine: ReconciliationEngine,
    pub integrity: IntegrityService,
    pub placement: PlacementStrategy,
    pub store: Arc<dyn FileStore>,
    pub references: Arc<InMemoryReferenceRepository>,
    pub _storage_dir: TempDir,
    pub uploads_dir: TempDir,
}

impl TestApp {
    /// Default options for a field bound to `property`.
    pub fn options(&self, property: &str) -> FieldOptions {
        FieldOptions {
            upload_folder: "user_upload/".to_string(),
            seed: Some(TEST_SEED.to_string()),
            conflict_mode: Default::default(),
            allow_removal: true,
            allow_random_seed: false,
            property: Some(property.to_string()),
            validators: ValidatorSet::new(),
        }
    }

    pub async fn convert(&self, raw: &Value, shape: TargetShape, options: &FieldOptions) -> Conversion {
        self.engine
            .convert(raw, shape, options)
            .await
            .expect("conversion should not fail")
    }

    pub fn cleanup(&self) -> UploadCleanup {
        UploadCleanup::new(self.store.clone(), self.placement.clone())
    }

    /// The session sub-folder uploads of `TEST_SEED` land in.
    pub fn session_folder(&self) -> FolderPath {
        FolderPath::parse("user_upload")
            .unwrap()
            .join(&self.placement.folder_name(TEST_SEED))
            .unwrap()
    }
}

/// Setup an engine on a fresh local store
pub async fn setup_test_app() -> TestApp {
    let storage_dir = tempfile::tempdir().expect("Failed to create storage dir");
    let uploads_dir = tempfile::tempdir().expect("Failed to create uploads dir");

    let store: Arc<dyn FileStore> = Arc::new(
        LocalFileStore::new(storage_dir.path())
            .await
            .expect("Failed to create local store"),
    );
    let references = Arc::new(InMemoryReferenceRepository::new());
    let integrity = IntegrityService::from_secret(TEST_SECRET).expect("valid secret");
    let placement = PlacementStrategy::new(integrity.clone(), store.clone());
    let engine = ReconciliationEngine::new(
        integrity.clone(),
        placement.clone(),
        store.clone(),
        references.clone() as Arc<dyn ReferenceRepository>,
    );

    TestApp {
        engine,
        integrity,
        placement,
        store,
        references,
        _storage_dir: storage_dir,
        uploads_dir,
    }
}
