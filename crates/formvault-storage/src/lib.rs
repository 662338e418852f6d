//! FormVault Storage Library
//!
//! This crate provides the folder/file store abstraction used by the upload
//! engine, a local filesystem implementation, and an in-memory repository of
//! file reference records.
//!
//! # Storage key format
//!
//! A file's storage key is its folder path joined with its sanitized name,
//! e.g. `user_upload/form_3f2a.../invoice.pdf`. Keys must not contain `..`
//! or a leading `/`; name handling is centralized in the `keys` module.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod references;
pub mod traits;

// Re-export commonly used types
pub use factory::create_file_store;
#[cfg(feature = "storage-local")]
pub use local::LocalFileStore;
pub use references::InMemoryReferenceRepository;
pub use traits::{FileReferenceRecord, FileStore, ReferenceRepository, StorageError, StorageResult};
