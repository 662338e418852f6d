use std::fmt;
use std::path::PathBuf;

/// Status reported by the upload transport for a single file field.
///
/// Wire codes follow the conventional multipart upload numbering
/// (0 ok, 1/2 size exceeded, 3 partial, 4 no file, 6 no tmp dir,
/// 7 cannot write, 8 blocked by extension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportStatus {
    Ok,
    IniSizeExceeded,
    FormSizeExceeded,
    Partial,
    NoFile,
    NoTmpDir,
    CantWrite,
    ExtensionBlocked,
    Unknown(i64),
}

impl TransportStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => TransportStatus::Ok,
            1 => TransportStatus::IniSizeExceeded,
            2 => TransportStatus::FormSizeExceeded,
            3 => TransportStatus::Partial,
            4 => TransportStatus::NoFile,
            6 => TransportStatus::NoTmpDir,
            7 => TransportStatus::CantWrite,
            8 => TransportStatus::ExtensionBlocked,
            other => TransportStatus::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            TransportStatus::Ok => 0,
            TransportStatus::IniSizeExceeded => 1,
            TransportStatus::FormSizeExceeded => 2,
            TransportStatus::Partial => 3,
            TransportStatus::NoFile => 4,
            TransportStatus::NoTmpDir => 6,
            TransportStatus::CantWrite => 7,
            TransportStatus::ExtensionBlocked => 8,
            TransportStatus::Unknown(code) => *code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, TransportStatus::Ok)
    }

    /// Stable machine-readable code for the rejection built from this status.
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportStatus::Ok => "UPLOAD_OK",
            TransportStatus::IniSizeExceeded | TransportStatus::FormSizeExceeded => {
                "UPLOAD_SIZE_EXCEEDED"
            }
            TransportStatus::Partial => "UPLOAD_PARTIAL",
            TransportStatus::NoFile => "UPLOAD_NO_FILE",
            TransportStatus::NoTmpDir => "UPLOAD_NO_TMP_DIR",
            TransportStatus::CantWrite => "UPLOAD_CANT_WRITE",
            TransportStatus::ExtensionBlocked => "UPLOAD_EXTENSION_BLOCKED",
            TransportStatus::Unknown(_) => "UPLOAD_UNKNOWN_ERROR",
        }
    }

    /// Detailed operator-facing description, written to the log.
    pub fn log_message(&self) -> &'static str {
        match self {
            TransportStatus::Ok => "The file was uploaded successfully.",
            TransportStatus::IniSizeExceeded => {
                "The uploaded file exceeds the server-wide upload size limit."
            }
            TransportStatus::FormSizeExceeded => {
                "The uploaded file exceeds the size limit that was specified in the form."
            }
            TransportStatus::Partial => "The uploaded file was only partially uploaded.",
            TransportStatus::NoFile => "No file was uploaded.",
            TransportStatus::NoTmpDir => "Missing a temporary folder.",
            TransportStatus::CantWrite => "Failed to write file to disk.",
            TransportStatus::ExtensionBlocked => "File upload stopped by extension.",
            TransportStatus::Unknown(_) => "Unknown upload error.",
        }
    }

    /// Coarse user-facing message; internal causes are not disclosed.
    pub fn user_message(&self) -> &'static str {
        match self {
            TransportStatus::IniSizeExceeded | TransportStatus::FormSizeExceeded => {
                "The uploaded file is too large."
            }
            TransportStatus::Partial => "The file was only partially uploaded. Please try again.",
            TransportStatus::NoFile => "No file was uploaded.",
            _ => "The file could not be uploaded. Please try again.",
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStatus::Ok => write!(f, "ok"),
            TransportStatus::IniSizeExceeded => write!(f, "ini_size_exceeded"),
            TransportStatus::FormSizeExceeded => write!(f, "form_size_exceeded"),
            TransportStatus::Partial => write!(f, "partial"),
            TransportStatus::NoFile => write!(f, "no_file"),
            TransportStatus::NoTmpDir => write!(f, "no_tmp_dir"),
            TransportStatus::CantWrite => write!(f, "cant_write"),
            TransportStatus::ExtensionBlocked => write!(f, "extension_blocked"),
            TransportStatus::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// One raw uploaded file as handed over by the transport.
///
/// Consumed once by the reconciliation engine and never persisted itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub name: String,
    pub tmp_name: PathBuf,
    pub size: u64,
    pub media_type: Option<String>,
    pub status: TransportStatus,
}

/// Read-only facts about a file, shared by raw uploads and stored files so
/// validators can inspect either.
pub trait FileDescriptor {
    fn file_name(&self) -> &str;
    fn size(&self) -> u64;
    fn media_type(&self) -> Option<&str>;

    /// Lower-cased extension of the file name, if any.
    fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

impl FileDescriptor for UploadItem {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_codes_map_both_ways() {
        for code in [0, 1, 2, 3, 4, 6, 7, 8] {
            assert_eq!(TransportStatus::from_code(code).code(), code);
        }
        assert_eq!(TransportStatus::from_code(5), TransportStatus::Unknown(5));
        assert!(TransportStatus::from_code(0).is_ok());
    }

    #[test]
    fn extension_is_lowercased() {
        let item = UploadItem {
            name: "Report.PDF".to_string(),
            tmp_name: PathBuf::from("/tmp/x"),
            size: 10,
            media_type: Some("application/pdf".to_string()),
            status: TransportStatus::Ok,
        };
        assert_eq!(item.extension().as_deref(), Some("pdf"));
    }

    #[test]
    fn dotfiles_have_no_extension() {
        let item = UploadItem {
            name: ".htaccess".to_string(),
            tmp_name: PathBuf::from("/tmp/x"),
            size: 1,
            media_type: None,
            status: TransportStatus::Ok,
        };
        assert_eq!(item.extension(), None);
    }
}
