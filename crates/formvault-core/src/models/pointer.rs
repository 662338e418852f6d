use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::FILE_POINTER_PREFIX;
use crate::error::IntegrityError;

/// Identifier of a physical file in the file store index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted file reference record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(pub u64);

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a previously stored file, carried in hidden form state.
///
/// `File` points at a freshly indexed file that has not been wrapped by a
/// persisted reference record yet (`file:<id>`); `Reference` points at such a
/// record (bare `<id>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourcePointer {
    File(FileId),
    Reference(ReferenceId),
}

impl fmt::Display for ResourcePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePointer::File(id) => write!(f, "{}{}", FILE_POINTER_PREFIX, id),
            ResourcePointer::Reference(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for ResourcePointer {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IntegrityError::Malformed(format!("invalid resource pointer '{}'", s));
        match s.strip_prefix(FILE_POINTER_PREFIX) {
            Some(id) => id
                .parse::<u64>()
                .map(|id| ResourcePointer::File(FileId(id)))
                .map_err(|_| malformed()),
            None => s
                .parse::<u64>()
                .map(|id| ResourcePointer::Reference(ReferenceId(id)))
                .map_err(|_| malformed()),
        }
    }
}

/// Request to delete one already-submitted file of a field.
///
/// Rendered next to each redisplayed file and signed, so the index and file
/// cannot be swapped by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRequest {
    pub property: String,
    pub file_index: usize,
    pub file_uid: FileId,
}
