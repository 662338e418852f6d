//! Storage abstraction traits
//!
//! This module defines the folder/file store contract the upload engine
//! depends on, and the repository contract for persisted file references.

use async_trait::async_trait;
use formvault_core::models::{ConflictMode, FileId, FolderPath, ReferenceId, StoredFile, UploadItem};
use formvault_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::AlreadyExists(msg) => AppError::Conflict(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Folder/file store contract.
///
/// Files are addressed by the numeric id of the store's index, folders by
/// their storage-relative path. Implementations must make `create_folder`
/// report `AlreadyExists` instead of silently succeeding so callers can
/// tell a lost creation race from a real failure.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn folder_exists(&self, folder: &FolderPath) -> StorageResult<bool>;

    /// Create a single folder; the parent must exist.
    async fn create_folder(&self, folder: &FolderPath) -> StorageResult<()>;

    /// Delete an empty folder.
    async fn delete_folder(&self, folder: &FolderPath) -> StorageResult<()>;

    /// Number of files directly inside `folder`.
    async fn count_files(&self, folder: &FolderPath) -> StorageResult<usize>;

    /// Number of sub-folders directly inside `folder`.
    async fn count_folders(&self, folder: &FolderPath) -> StorageResult<usize>;

    async fn has_file(&self, folder: &FolderPath, name: &str) -> StorageResult<bool>;

    /// Create an empty, unindexed file (e.g. a directory-listing placeholder).
    async fn create_file(&self, folder: &FolderPath, name: &str) -> StorageResult<()>;

    /// Copy a transport temp file into `folder` and index it.
    async fn add_uploaded_file(
        &self,
        folder: &FolderPath,
        upload: &UploadItem,
        conflict_mode: ConflictMode,
    ) -> StorageResult<StoredFile>;

    async fn get_file(&self, id: FileId) -> StorageResult<StoredFile>;

    /// Delete a file and drop it from the index, returning what was removed.
    async fn delete_file(&self, id: FileId) -> StorageResult<StoredFile>;
}

/// A persisted reference record: the owning row that points at a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileReferenceRecord {
    pub id: ReferenceId,
    pub file_id: FileId,
}

/// Repository of persisted file reference records.
///
/// The engine reads records and re-points a record when an upload replaces
/// its file; creating records for new wrappers is up to the caller.
#[async_trait]
pub trait ReferenceRepository: Send + Sync {
    async fn find(&self, id: ReferenceId) -> StorageResult<Option<FileReferenceRecord>>;

    async fn insert(&self, file_id: FileId) -> StorageResult<FileReferenceRecord>;

    async fn update(&self, id: ReferenceId, file_id: FileId) -> StorageResult<FileReferenceRecord>;
}
