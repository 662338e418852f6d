//! Data models for the application
//!
//! This module contains the data structures shared by the storage and
//! processing crates, organized by concern.

mod folder;
mod pointer;
mod resource;
mod upload;

// Re-export all models for convenient imports
pub use folder::*;
pub use pointer::*;
pub use resource::*;
pub use upload::*;
