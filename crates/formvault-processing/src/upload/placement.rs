//! Storage placement: upload folder provisioning, per-session sub-folders and
//! cleanup of the sub-folders the engine created.

use formvault_core::constants::{FOLDER_INDEX_FILE, FOLDER_NAME_SALT, UPLOAD_FOLDER_PREFIX};
use formvault_core::models::{ConflictMode, FolderPath, StoredFile, UploadItem};
use formvault_core::{AppError, IntegrityService};
use formvault_storage::FileStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct PlacementStrategy {
    integrity: IntegrityService,
    store: Arc<dyn FileStore>,
}

impl PlacementStrategy {
    pub fn new(integrity: IntegrityService, store: Arc<dyn FileStore>) -> Self {
        Self { integrity, store }
    }

    /// Name of the sub-folder for a session seed: `form_` followed by a
    /// keyed hash, so the same seed always lands in the same folder and the
    /// name reveals nothing about the seed.
    pub fn folder_name(&self, seed: &str) -> String {
        format!(
            "{}{}",
            UPLOAD_FOLDER_PREFIX,
            self.integrity.hmac(seed, FOLDER_NAME_SALT)
        )
    }

    /// Store an upload in the session sub-folder below `folder_identifier`.
    #[tracing::instrument(skip(self, upload, seed), fields(file_name = %upload.name))]
    pub async fn place(
        &self,
        upload: &UploadItem,
        folder_identifier: &str,
        seed: &str,
        conflict_mode: ConflictMode,
    ) -> Result<StoredFile, AppError> {
        let parent = self.provide_upload_folder(folder_identifier).await?;
        let target = self
            .provide_target_folder(&parent, &self.folder_name(seed))
            .await?;

        let stored = self
            .store
            .add_uploaded_file(&target, upload, conflict_mode)
            .await?;

        tracing::info!(
            file_id = %stored.id,
            folder = %target,
            stored_name = %stored.name,
            size_bytes = stored.size,
            conflict_mode = %conflict_mode,
            "Upload placed"
        );

        Ok(stored)
    }

    /// Resolve the configured parent folder, creating missing segments and
    /// an `index.html` placeholder against directory listings.
    pub async fn provide_upload_folder(&self, identifier: &str) -> Result<FolderPath, AppError> {
        let target = FolderPath::parse(identifier)?;
        if self.store.folder_exists(&target).await? {
            return Ok(target);
        }

        let mut current = FolderPath::root();
        for segment in target.segments() {
            current = self.provide_target_folder(&current, segment).await?;
        }

        if !self.store.has_file(&current, FOLDER_INDEX_FILE).await? {
            self.store.create_file(&current, FOLDER_INDEX_FILE).await?;
        }

        tracing::debug!(folder = %current, "Upload folder provisioned");
        Ok(current)
    }

    /// Return `parent/name`, creating it when absent.
    ///
    /// A failed creation is re-checked: if another request created the
    /// folder in the meantime, that counts as success.
    pub async fn provide_target_folder(
        &self,
        parent: &FolderPath,
        name: &str,
    ) -> Result<FolderPath, AppError> {
        let folder = parent.join(name)?;
        if self.store.folder_exists(&folder).await? {
            return Ok(folder);
        }

        match self.store.create_folder(&folder).await {
            Ok(()) => Ok(folder),
            Err(e) => {
                if self.store.folder_exists(&folder).await? {
                    tracing::debug!(folder = %folder, "Folder was created concurrently");
                    Ok(folder)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Delete `folder` when the engine created it and it holds nothing.
    ///
    /// Folders without the `form_` prefix are never touched. Returns whether
    /// the folder was deleted.
    pub async fn delete_if_empty(&self, folder: &FolderPath) -> Result<bool, AppError> {
        if !folder.is_engine_owned() {
            return Ok(false);
        }
        if !self.store.folder_exists(folder).await? {
            return Ok(false);
        }
        if self.store.count_files(folder).await? > 0 || self.store.count_folders(folder).await? > 0
        {
            return Ok(false);
        }

        self.store.delete_folder(folder).await?;
        tracing::info!(folder = %folder, "Empty upload folder deleted");
        Ok(true)
    }
}
