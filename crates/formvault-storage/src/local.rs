use crate::keys::{renamed_candidate, sanitize_file_name, MAX_RENAME_ATTEMPTS};
use crate::traits::{FileStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use formvault_core::models::{ConflictMode, FileId, FolderPath, StoredFile, UploadItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Directory below the base path holding the store's own bookkeeping.
const META_DIR: &str = ".formvault";
const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileIndex {
    next_id: u64,
    files: BTreeMap<FileId, StoredFile>,
}

impl FileIndex {
    fn allocate_id(&mut self) -> FileId {
        self.next_id += 1;
        FileId(self.next_id)
    }

    fn find_by_identifier(&self, identifier: &str) -> Option<FileId> {
        self.files
            .values()
            .find(|f| f.identifier == identifier)
            .map(|f| f.id)
    }
}

/// Local filesystem file store
///
/// Files live below `base_path` at their storage key; the numeric file index
/// is persisted as JSON under `.formvault/index.json` after every mutation.
///
/// The index is loaded once and guarded by an in-process mutex only. One
/// process at a time may open a given `base_path`; concurrent processes on
/// the same path overwrite each other's index and can hand out the same id.
pub struct LocalFileStore {
    base_path: PathBuf,
    index: Mutex<FileIndex>,
}

impl LocalFileStore {
    /// Create a new LocalFileStore instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/formvault")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(base_path.join(META_DIR))
            .await
            .map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;

        let index_path = base_path.join(META_DIR).join(INDEX_FILE);
        let index = match fs::read(&index_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::ConfigError(format!(
                    "Corrupt file index {}: {}",
                    index_path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => FileIndex::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(LocalFileStore {
            base_path,
            index: Mutex::new(index),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that could escape the base storage directory or reach
    /// the store's own bookkeeping directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.contains("..") && storage_key.split('/').any(|s| s == "..") {
            return Err(StorageError::InvalidKey(
                "Storage key contains path traversal".to_string(),
            ));
        }
        if storage_key.starts_with('/') || storage_key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        if storage_key.split('/').next() == Some(META_DIR) {
            return Err(StorageError::InvalidKey(
                "Storage key points into the store metadata".to_string(),
            ));
        }

        Ok(self.base_path.join(storage_key))
    }

    fn folder_path(&self, folder: &FolderPath) -> StorageResult<PathBuf> {
        if folder.is_root() {
            return Ok(self.base_path.clone());
        }
        self.key_to_path(folder.as_str())
    }

    async fn persist_index(&self, index: &FileIndex) -> StorageResult<()> {
        let data = serde_json::to_vec_pretty(index)
            .map_err(|e| StorageError::BackendError(format!("Failed to encode index: {}", e)))?;
        let meta = self.base_path.join(META_DIR);
        let tmp = meta.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, meta.join(INDEX_FILE)).await?;
        Ok(())
    }

    /// Resolve the target name for a new file under the conflict policy.
    async fn resolve_target_name(
        &self,
        folder_dir: &Path,
        file_name: &str,
        conflict_mode: ConflictMode,
    ) -> StorageResult<String> {
        if !fs::try_exists(folder_dir.join(file_name)).await? {
            return Ok(file_name.to_string());
        }
        match conflict_mode {
            ConflictMode::Replace => Ok(file_name.to_string()),
            ConflictMode::Cancel => Err(StorageError::AlreadyExists(file_name.to_string())),
            ConflictMode::Rename => {
                for attempt in 1..=MAX_RENAME_ATTEMPTS {
                    let candidate = renamed_candidate(file_name, attempt);
                    if !fs::try_exists(folder_dir.join(&candidate)).await? {
                        return Ok(candidate);
                    }
                }
                Err(StorageError::AlreadyExists(format!(
                    "{} (no free name after {} attempts)",
                    file_name, MAX_RENAME_ATTEMPTS
                )))
            }
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn folder_exists(&self, folder: &FolderPath) -> StorageResult<bool> {
        let path = self.folder_path(folder)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_folder(&self, folder: &FolderPath) -> StorageResult<()> {
        let path = self.folder_path(folder)?;
        match fs::create_dir(&path).await {
            Ok(()) => {
                tracing::debug!(folder = %folder, "Local storage folder created");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(folder.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(format!(
                "parent of {}",
                folder
            ))),
            Err(e) => Err(StorageError::BackendError(format!(
                "Failed to create folder {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn delete_folder(&self, folder: &FolderPath) -> StorageResult<()> {
        if folder.is_root() {
            return Err(StorageError::InvalidKey(
                "The root folder cannot be deleted".to_string(),
            ));
        }
        let path = self.folder_path(folder)?;
        fs::remove_dir(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete folder {}: {}", path.display(), e))
        })?;
        tracing::info!(folder = %folder, "Local storage folder deleted");
        Ok(())
    }

    async fn count_files(&self, folder: &FolderPath) -> StorageResult<usize> {
        let path = self.folder_path(folder)?;
        let mut entries = fs::read_dir(&path).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_folders(&self, folder: &FolderPath) -> StorageResult<usize> {
        let path = self.folder_path(folder)?;
        let mut entries = fs::read_dir(&path).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if folder.is_root() && entry.file_name() == META_DIR {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn has_file(&self, folder: &FolderPath, name: &str) -> StorageResult<bool> {
        let path = self.key_to_path(&folder.file_key(name))?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn create_file(&self, folder: &FolderPath, name: &str) -> StorageResult<()> {
        let path = self.key_to_path(&folder.file_key(name))?;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
            })?;
        Ok(())
    }

    async fn add_uploaded_file(
        &self,
        folder: &FolderPath,
        upload: &UploadItem,
        conflict_mode: ConflictMode,
    ) -> StorageResult<StoredFile> {
        let folder_dir = self.folder_path(folder)?;
        if !fs::try_exists(&upload.tmp_name).await.unwrap_or(false) {
            return Err(StorageError::UploadFailed(format!(
                "Temporary upload {} does not exist",
                upload.tmp_name.display()
            )));
        }

        let start = std::time::Instant::now();
        let mut index = self.index.lock().await;

        let safe_name = sanitize_file_name(&upload.name);
        let name = self
            .resolve_target_name(&folder_dir, &safe_name, conflict_mode)
            .await?;
        let identifier = folder.file_key(&name);
        let path = self.key_to_path(&identifier)?;

        let size = fs::copy(&upload.tmp_name, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                upload.tmp_name.display(),
                path.display(),
                e
            ))
        })?;

        let id = match index.find_by_identifier(&identifier) {
            Some(existing) => existing,
            None => index.allocate_id(),
        };
        let stored = StoredFile {
            id,
            name,
            folder: folder.clone(),
            identifier: identifier.clone(),
            size,
            media_type: upload.media_type.clone(),
            created_at: Utc::now(),
        };
        index.files.insert(id, stored.clone());
        self.persist_index(&index).await?;

        tracing::info!(
            path = %path.display(),
            key = %identifier,
            file_id = %id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(stored)
    }

    async fn get_file(&self, id: FileId) -> StorageResult<StoredFile> {
        let index = self.index.lock().await;
        index
            .files
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("file {}", id)))
    }

    async fn delete_file(&self, id: FileId) -> StorageResult<StoredFile> {
        let mut index = self.index.lock().await;
        let stored = index
            .files
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("file {}", id)))?;
        let path = self.key_to_path(&stored.identifier)?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            // Already gone on disk; still drop the stale index entry.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        index.files.remove(&id);
        self.persist_index(&index).await?;

        tracing::info!(
            path = %path.display(),
            key = %stored.identifier,
            file_id = %id,
            "Local storage delete successful"
        );

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formvault_core::models::TransportStatus;
    use tempfile::tempdir;

    fn temp_upload(dir: &Path, name: &str, content: &[u8]) -> UploadItem {
        let tmp_name = dir.join(format!("php{}", name.len()));
        std::fs::write(&tmp_name, content).unwrap();
        UploadItem {
            name: name.to_string(),
            tmp_name,
            size: content.len() as u64,
            media_type: Some("application/pdf".to_string()),
            status: TransportStatus::Ok,
        }
    }

    async fn store_with_folder(base: &Path, folder: &str) -> (LocalFileStore, FolderPath) {
        let store = LocalFileStore::new(base).await.unwrap();
        let folder = FolderPath::parse(folder).unwrap();
        store.create_folder(&folder).await.unwrap();
        (store, folder)
    }

    #[tokio::test]
    async fn test_upload_get_delete() {
        let dir = tempdir().unwrap();
        let uploads = tempdir().unwrap();
        let (store, folder) = store_with_folder(dir.path(), "docs").await;

        let upload = temp_upload(uploads.path(), "a.pdf", b"hello");
        let stored = store
            .add_uploaded_file(&folder, &upload, ConflictMode::Rename)
            .await
            .unwrap();

        assert_eq!(stored.name, "a.pdf");
        assert_eq!(stored.identifier, "docs/a.pdf");
        assert_eq!(stored.size, 5);
        assert_eq!(store.get_file(stored.id).await.unwrap(), stored);
        assert_eq!(store.count_files(&folder).await.unwrap(), 1);

        store.delete_file(stored.id).await.unwrap();
        assert!(matches!(
            store.get_file(stored.id).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!dir.path().join("docs/a.pdf").exists());
        assert_eq!(store.count_files(&folder).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_conflict_modes() {
        let dir = tempdir().unwrap();
        let uploads = tempdir().unwrap();
        let (store, folder) = store_with_folder(dir.path(), "docs").await;
        let upload = temp_upload(uploads.path(), "a.pdf", b"one");

        let first = store
            .add_uploaded_file(&folder, &upload, ConflictMode::Rename)
            .await
            .unwrap();
        let renamed = store
            .add_uploaded_file(&folder, &upload, ConflictMode::Rename)
            .await
            .unwrap();
        assert_eq!(renamed.name, "a_01.pdf");
        assert_ne!(renamed.id, first.id);

        let cancelled = store
            .add_uploaded_file(&folder, &upload, ConflictMode::Cancel)
            .await;
        assert!(matches!(cancelled, Err(StorageError::AlreadyExists(_))));

        let replaced = store
            .add_uploaded_file(&folder, &upload, ConflictMode::Replace)
            .await
            .unwrap();
        assert_eq!(replaced.name, "a.pdf");
        assert_eq!(replaced.id, first.id);
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = tempdir().unwrap();
        let uploads = tempdir().unwrap();
        let stored = {
            let (store, folder) = store_with_folder(dir.path(), "docs").await;
            let upload = temp_upload(uploads.path(), "keep.pdf", b"data");
            store
                .add_uploaded_file(&folder, &upload, ConflictMode::Rename)
                .await
                .unwrap()
        };

        let reopened = LocalFileStore::new(dir.path()).await.unwrap();
        assert_eq!(reopened.get_file(stored.id).await.unwrap(), stored);

        // A later process continues the id sequence instead of reusing ids.
        let folder = FolderPath::parse("docs").unwrap();
        let upload = temp_upload(uploads.path(), "next.pdf", b"next");
        let next = reopened
            .add_uploaded_file(&folder, &upload, ConflictMode::Rename)
            .await
            .unwrap();
        assert!(next.id > stored.id);
    }

    #[tokio::test]
    async fn test_create_folder_reports_existing() {
        let dir = tempdir().unwrap();
        let (store, folder) = store_with_folder(dir.path(), "docs").await;
        assert!(store.folder_exists(&folder).await.unwrap());
        assert!(matches!(
            store.create_folder(&folder).await,
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_counts_ignore_metadata_dir() {
        let dir = tempdir().unwrap();
        let (store, folder) = store_with_folder(dir.path(), "docs").await;
        let root = FolderPath::root();
        assert_eq!(store.count_folders(&root).await.unwrap(), 1);

        store.create_file(&folder, "index.html").await.unwrap();
        assert!(store.has_file(&folder, "index.html").await.unwrap());
        assert_eq!(store.count_files(&folder).await.unwrap(), 1);
        assert_eq!(store.count_folders(&folder).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_folder_requires_empty() {
        let dir = tempdir().unwrap();
        let (store, folder) = store_with_folder(dir.path(), "docs").await;
        store.create_file(&folder, "keep.txt").await.unwrap();
        assert!(matches!(
            store.delete_folder(&folder).await,
            Err(StorageError::DeleteFailed(_))
        ));
        assert!(matches!(
            store.delete_folder(&FolderPath::root()).await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_temp_file_fails_upload() {
        let dir = tempdir().unwrap();
        let (store, folder) = store_with_folder(dir.path(), "docs").await;
        let upload = UploadItem {
            name: "gone.pdf".to_string(),
            tmp_name: dir.path().join("does-not-exist"),
            size: 1,
            media_type: None,
            status: TransportStatus::Ok,
        };
        assert!(matches!(
            store
                .add_uploaded_file(&folder, &upload, ConflictMode::Rename)
                .await,
            Err(StorageError::UploadFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).await.unwrap();
        assert!(matches!(
            store.key_to_path("../etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.key_to_path("/etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.key_to_path(".formvault/index.json"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
