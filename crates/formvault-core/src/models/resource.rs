use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::folder::FolderPath;
use super::pointer::{FileId, ReferenceId, ResourcePointer};
use super::upload::FileDescriptor;

/// Behavior when a new file's name collides with an existing one in the
/// destination folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    /// Abort the write
    Cancel,
    /// Overwrite the existing file
    Replace,
    /// Pick a free name by appending a counter
    #[default]
    Rename,
}

impl FromStr for ConflictMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cancel" => Ok(ConflictMode::Cancel),
            "replace" => Ok(ConflictMode::Replace),
            "rename" => Ok(ConflictMode::Rename),
            _ => Err(anyhow::anyhow!("Invalid conflict mode: {}", s)),
        }
    }
}

impl fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictMode::Cancel => write!(f, "cancel"),
            ConflictMode::Replace => write!(f, "replace"),
            ConflictMode::Rename => write!(f, "rename"),
        }
    }
}

/// A physical file known to the file store index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    pub folder: FolderPath,
    /// Storage key relative to the store root
    pub identifier: String,
    pub size: u64,
    pub media_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FileDescriptor for StoredFile {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }
}

/// Identity of the reference record wrapping a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum ReferenceKey {
    /// Wrapper created during this request; not persisted yet
    New(Uuid),
    /// Record loaded from the reference repository and updated in place
    Existing(ReferenceId),
}

/// Persisted file resource returned by a conversion: a stored file plus the
/// reference record that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResource {
    pub key: ReferenceKey,
    pub file: StoredFile,
}

impl FileResource {
    /// Wrap a stored file in a fresh, not yet persisted reference.
    pub fn wrap(file: StoredFile) -> Self {
        Self {
            key: ReferenceKey::New(Uuid::new_v4()),
            file,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self.key, ReferenceKey::New(_))
    }

    /// Pointer to render into hidden form state so the next submission can
    /// re-resolve this resource.
    pub fn pointer(&self) -> ResourcePointer {
        match self.key {
            ReferenceKey::New(_) => ResourcePointer::File(self.file.id),
            ReferenceKey::Existing(id) => ResourcePointer::Reference(id),
        }
    }
}

impl FileDescriptor for FileResource {
    fn file_name(&self) -> &str {
        &self.file.name
    }

    fn size(&self) -> u64 {
        self.file.size
    }

    fn media_type(&self) -> Option<&str> {
        self.file.media_type.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: u64) -> StoredFile {
        StoredFile {
            id: FileId(id),
            name: "a.pdf".to_string(),
            folder: FolderPath::parse("user_upload/form_x").unwrap(),
            identifier: "user_upload/form_x/a.pdf".to_string(),
            size: 10,
            media_type: Some("application/pdf".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn conflict_mode_parses_case_insensitively() {
        assert_eq!("Replace".parse::<ConflictMode>().unwrap(), ConflictMode::Replace);
        assert_eq!(ConflictMode::default(), ConflictMode::Rename);
        assert!("overwrite".parse::<ConflictMode>().is_err());
    }

    #[test]
    fn new_wrapper_points_at_file() {
        let resource = FileResource::wrap(stored(9));
        assert!(resource.is_new());
        assert_eq!(resource.pointer(), ResourcePointer::File(FileId(9)));
    }

    #[test]
    fn existing_wrapper_points_at_reference() {
        let resource = FileResource {
            key: ReferenceKey::Existing(ReferenceId(4)),
            file: stored(9),
        };
        assert!(!resource.is_new());
        assert_eq!(resource.pointer().to_string(), "4");
    }
}
