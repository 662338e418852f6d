//! Error types module
//!
//! This module provides the error taxonomy used throughout formvault.
//! Hard failures are unified under the `AppError` enum; soft failures that a
//! form must render back to the user (transport problems, validator
//! rejections) are carried by `UploadError`, which is returned as a value
//! instead of being propagated.

use std::fmt;
use std::io;

use serde::Serialize;

use crate::models::TransportStatus;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like forged tokens
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error reporting - lets the excluded web layer render a
/// message without re-deriving it from the variant.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "STORAGE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Signature verification failures of signed tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("Token is malformed: {0}")]
    Malformed(String),

    #[error("Token signature does not match its payload or scope")]
    SignatureMismatch,
}

/// Category of a soft upload failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Raised by the upload transport before the engine saw any bytes
    Transport,
    /// Raised by a validator or by the file name safety check
    Validation,
}

/// A non-fatal upload failure returned to the caller as a value.
///
/// The web layer binds it to the form field and re-renders the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadError {
    pub kind: RejectionKind,
    pub code: String,
    pub message: String,
}

impl UploadError {
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: RejectionKind::Validation,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build the rejection for a failed transport status.
    ///
    /// The detailed status is logged; the message handed back to the user is
    /// one of four coarse, translatable messages.
    pub fn transport(status: TransportStatus) -> Self {
        tracing::error!(
            status = %status,
            code = status.code(),
            "{}",
            status.log_message()
        );
        Self {
            kind: RejectionKind::Transport,
            code: status.error_code().to_string(),
            message: status.user_message().to_string(),
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for UploadError {}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Decoding failed: {0}")]
    Decode(String),

    #[error("Upload rejected: {0}")]
    Rejected(UploadError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(format!("JSON parsing error: {}", err))
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::Rejected(err)
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AppError::Integrity(_) => (
            "INTEGRITY_ERROR",
            false,
            Some("Reload the form and submit again"),
            LogLevel::Warn,
        ),
        AppError::Decode(_) => (
            "DECODE_ERROR",
            false,
            Some("Reload the form and submit again"),
            LogLevel::Warn,
        ),
        AppError::Rejected(_) => (
            "UPLOAD_REJECTED",
            false,
            Some("Choose a different file and try again"),
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::Configuration(_) => (
            "CONFIGURATION_ERROR",
            false,
            Some("Check the upload field configuration"),
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            "CONFLICT",
            false,
            Some("Rename the file or choose a different one"),
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Integrity(_) => "Integrity",
            AppError::Decode(_) => "Decode",
            AppError::Rejected(_) => "Rejected",
            AppError::Storage(_) => "Storage",
            AppError::Configuration(_) => "Configuration",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Integrity(_) | AppError::Decode(_) => {
                "The submitted form data could not be verified".to_string()
            }
            AppError::Rejected(ref err) => err.message.clone(),
            AppError::Storage(_) => "Failed to access file storage".to_string(),
            AppError::Configuration(_) => "File uploads are not configured correctly".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Conflict(_) => "A file with this name already exists".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self.kind {
            RejectionKind::Transport => "UPLOAD_TRANSPORT_ERROR",
            RejectionKind::Validation => "UPLOAD_VALIDATION_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        self.kind == RejectionKind::Transport
    }

    fn suggested_action(&self) -> Option<&'static str> {
        match self.kind {
            RejectionKind::Transport => Some("Upload the file again"),
            RejectionKind::Validation => Some("Choose a different file and try again"),
        }
    }

    fn client_message(&self) -> String {
        self.message.clone()
    }

    fn log_level(&self) -> LogLevel {
        match self.kind {
            RejectionKind::Transport => LogLevel::Warn,
            RejectionKind::Validation => LogLevel::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_storage() {
        let err = AppError::Storage("disk full".to_string());
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access file storage");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_integrity() {
        let err = AppError::from(IntegrityError::SignatureMismatch);
        assert_eq!(err.error_code(), "INTEGRITY_ERROR");
        assert!(!err.is_recoverable());
        assert_eq!(err.error_type(), "Integrity");
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_decode_is_distinct_from_integrity() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = AppError::from(json_err);
        assert!(matches!(err, AppError::Decode(_)));
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_rejected_keeps_upload_message() {
        let upload = UploadError::validation("FILE_TOO_LARGE", "The file is too large");
        let err = AppError::from(upload.clone());
        assert_eq!(err.client_message(), "The file is too large");
        assert_eq!(upload.error_code(), "UPLOAD_VALIDATION_ERROR");
        assert_eq!(upload.to_string(), "The file is too large (FILE_TOO_LARGE)");
    }

    #[test]
    fn test_transport_rejection_uses_coarse_message() {
        let err = UploadError::transport(TransportStatus::FormSizeExceeded);
        assert_eq!(err.kind, RejectionKind::Transport);
        assert_eq!(err.code, "UPLOAD_SIZE_EXCEEDED");
        assert_eq!(
            err.message,
            UploadError::transport(TransportStatus::IniSizeExceeded).message
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("root cause").context("while importing"));
        let details = err.detailed_message();
        assert!(details.contains("Internal error with source"));
        assert!(details.contains("while importing"));
    }
}
