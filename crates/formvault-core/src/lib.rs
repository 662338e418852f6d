//! formvault Core Library
//!
//! This crate provides the domain models, error types, configuration and the
//! integrity service shared by the storage and processing crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod integrity;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, IntegrityError, LogLevel, RejectionKind, UploadError};
pub use integrity::{HashScope, IntegrityService};
