//! Upload cleanup finisher: removes the files of a conversion once the form
//! has been processed and uploads must not be retained.

use formvault_core::models::FolderPath;
use formvault_storage::FileStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::upload::{Conversion, PlacementStrategy};

/// What a cleanup run removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted_files: usize,
    pub deleted_folders: usize,
    pub failed_files: usize,
}

#[derive(Clone)]
pub struct UploadCleanup {
    store: Arc<dyn FileStore>,
    placement: PlacementStrategy,
}

impl UploadCleanup {
    pub fn new(store: Arc<dyn FileStore>, placement: PlacementStrategy) -> Self {
        Self { store, placement }
    }

    /// Delete every stored file of `conversion`, then the engine-created
    /// folders that became empty.
    ///
    /// Failures are logged and counted; cleanup never aborts half way.
    #[tracing::instrument(skip(self, conversion), fields(cleanup.operation = "delete_uploads"))]
    pub async fn delete_uploads(&self, conversion: &Conversion) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut folders: BTreeSet<FolderPath> = BTreeSet::new();
        let mut seen = BTreeSet::new();

        for resource in conversion.resources() {
            if !seen.insert(resource.file.id) {
                continue;
            }
            match self.store.delete_file(resource.file.id).await {
                Ok(file) => {
                    report.deleted_files += 1;
                    folders.insert(file.folder);
                }
                Err(e) => {
                    report.failed_files += 1;
                    tracing::error!(
                        error = %e,
                        file_id = %resource.file.id,
                        "Failed to delete uploaded file"
                    );
                }
            }
        }

        for folder in folders {
            match self.placement.delete_if_empty(&folder).await {
                Ok(true) => report.deleted_folders += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, folder = %folder, "Failed to delete upload folder");
                }
            }
        }

        tracing::info!(
            deleted_files = report.deleted_files,
            deleted_folders = report.deleted_folders,
            failed_files = report.failed_files,
            "Upload cleanup completed"
        );
        report
    }
}
