use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::UPLOAD_FOLDER_PREFIX;
use crate::error::AppError;

/// Storage-relative folder path, e.g. `user_upload/form_3f2a...`.
///
/// Always normalized: no leading or trailing slash, no empty, `.` or `..`
/// segments. The root folder is the empty path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub struct FolderPath(String);

impl FolderPath {
    pub fn root() -> Self {
        FolderPath(String::new())
    }

    /// Parse a folder identifier as configured on a field (`user_upload/`,
    /// `/forms/2024/`, ...).
    pub fn parse(identifier: &str) -> Result<Self, AppError> {
        let mut segments = Vec::new();
        for segment in identifier.split('/') {
            let segment = segment.trim();
            if segment.is_empty() || segment == "." {
                continue;
            }
            validate_segment(segment)?;
            segments.push(segment);
        }
        Ok(FolderPath(segments.join("/")))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last segment; empty for the root folder.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    pub fn parent(&self) -> Option<FolderPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((parent, _)) => Some(FolderPath(parent.to_string())),
            None => Some(FolderPath::root()),
        }
    }

    pub fn join(&self, name: &str) -> Result<FolderPath, AppError> {
        validate_segment(name)?;
        if self.is_root() {
            Ok(FolderPath(name.to_string()))
        } else {
            Ok(FolderPath(format!("{}/{}", self.0, name)))
        }
    }

    /// Storage key of a file inside this folder.
    pub fn file_key(&self, file_name: &str) -> String {
        if self.is_root() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.0, file_name)
        }
    }

    /// Whether the folder was created by the placement strategy and may be
    /// deleted automatically once empty.
    pub fn is_engine_owned(&self) -> bool {
        self.name().starts_with(UPLOAD_FOLDER_PREFIX)
    }
}

fn validate_segment(segment: &str) -> Result<(), AppError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains('\0')
    {
        return Err(AppError::InvalidInput(format!(
            "Invalid folder name: '{}'",
            segment
        )));
    }
    Ok(())
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl TryFrom<String> for FolderPath {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FolderPath::parse(&value)
    }
}

impl From<FolderPath> for String {
    fn from(path: FolderPath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_slashes() {
        let path = FolderPath::parse("/user_upload//forms/").unwrap();
        assert_eq!(path.as_str(), "user_upload/forms");
        assert_eq!(path.name(), "forms");
        assert_eq!(path.parent().unwrap().as_str(), "user_upload");
        assert_eq!(path.to_string(), "/user_upload/forms");
    }

    #[test]
    fn parse_rejects_traversal() {
        assert!(FolderPath::parse("user_upload/../etc").is_err());
        assert!(FolderPath::root().join("..").is_err());
        assert!(FolderPath::root().join("a/b").is_err());
    }

    #[test]
    fn root_has_no_parent() {
        let root = FolderPath::parse("/").unwrap();
        assert!(root.is_root());
        assert!(root.parent().is_none());
        assert_eq!(root.file_key("a.pdf"), "a.pdf");
        assert_eq!(
            FolderPath::parse("x").unwrap().parent(),
            Some(FolderPath::root())
        );
    }

    #[test]
    fn engine_ownership_is_decided_by_prefix() {
        let owned = FolderPath::parse("user_upload/form_abc").unwrap();
        let user = FolderPath::parse("user_upload/invoices").unwrap();
        assert!(owned.is_engine_owned());
        assert!(!user.is_engine_owned());
        assert!(!FolderPath::root().is_engine_owned());
    }
}
