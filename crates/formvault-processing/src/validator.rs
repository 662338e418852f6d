use formvault_core::models::{FileDescriptor, FileResource};
use formvault_core::{AppError, UploadError};
use std::fmt;
use std::sync::Arc;

/// Rejection raised by a validator for a file or a whole collection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<ValidationError> for UploadError {
    fn from(err: ValidationError) -> Self {
        UploadError::validation(err.code, err.message)
    }
}

/// Validator invoked once per file: every new upload before it is placed and
/// every re-resolved file.
pub trait ElementValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, file: &dyn FileDescriptor) -> Result<(), ValidationError>;
}

/// Validator invoked once with the complete multi-file result.
pub trait CollectionValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, files: &[FileResource]) -> Result<(), ValidationError>;
}

/// A configured validator, tagged by the capability it implements
#[derive(Clone)]
pub enum Validator {
    Element(Arc<dyn ElementValidator>),
    Collection(Arc<dyn CollectionValidator>),
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Element(v) => f.debug_tuple("Element").field(&v.name()).finish(),
            Validator::Collection(v) => f.debug_tuple("Collection").field(&v.name()).finish(),
        }
    }
}

/// Validators configured for one field
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, validator: impl ElementValidator + 'static) -> Self {
        self.validators.push(Validator::Element(Arc::new(validator)));
        self
    }

    pub fn with_collection(mut self, validator: impl CollectionValidator + 'static) -> Self {
        self.validators
            .push(Validator::Collection(Arc::new(validator)));
        self
    }

    pub fn push(&mut self, validator: Validator) {
        self.validators.push(validator);
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every element validator against one file; the first rejection wins.
    pub fn validate_element(&self, file: &dyn FileDescriptor) -> Result<(), ValidationError> {
        for validator in &self.validators {
            if let Validator::Element(v) = validator {
                v.validate(file).inspect_err(|e| {
                    tracing::info!(
                        validator = v.name(),
                        file_name = file.file_name(),
                        code = %e.code,
                        "File rejected by validator"
                    );
                })?;
            }
        }
        Ok(())
    }

    /// Run every collection validator against the final multi-file result.
    pub fn validate_collection(&self, files: &[FileResource]) -> Result<(), ValidationError> {
        for validator in &self.validators {
            if let Validator::Collection(v) = validator {
                v.validate(files).inspect_err(|e| {
                    tracing::info!(
                        validator = v.name(),
                        file_count = files.len(),
                        code = %e.code,
                        "File collection rejected by validator"
                    );
                })?;
            }
        }
        Ok(())
    }
}

/// Parse a size such as `0B`, `512K`, `10M` or `2G` into bytes.
///
/// A unit suffix is mandatory so `"10"` cannot be mistaken for megabytes.
pub fn parse_size(value: &str) -> Result<u64, AppError> {
    let value = value.trim();
    let invalid = || {
        AppError::Configuration(format!(
            "Invalid size '{}': expected a number followed by B, K, M or G",
            value
        ))
    };
    let unit = value.chars().last().ok_or_else(invalid)?;
    let multiplier: u64 = match unit.to_ascii_uppercase() {
        'B' => 1,
        'K' => 1024,
        'M' => 1024 * 1024,
        'G' => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };
    let number: u64 = value[..value.len() - unit.len_utf8()]
        .trim()
        .parse()
        .map_err(|_| invalid())?;
    number.checked_mul(multiplier).ok_or_else(invalid)
}

/// Rejects files outside a size range
#[derive(Debug, Clone)]
pub struct FileSizeValidator {
    minimum: u64,
    maximum: u64,
}

impl FileSizeValidator {
    /// Create a validator from suffixed sizes, e.g. `("0B", "10M")`.
    pub fn new(minimum: &str, maximum: &str) -> Result<Self, AppError> {
        let minimum = parse_size(minimum)?;
        let maximum = parse_size(maximum)?;
        if minimum > maximum {
            return Err(AppError::Configuration(format!(
                "File size minimum ({} bytes) exceeds maximum ({} bytes)",
                minimum, maximum
            )));
        }
        Ok(Self { minimum, maximum })
    }
}

impl ElementValidator for FileSizeValidator {
    fn name(&self) -> &str {
        "file_size"
    }

    fn validate(&self, file: &dyn FileDescriptor) -> Result<(), ValidationError> {
        let size = file.size();
        if size < self.minimum {
            return Err(ValidationError::new(
                "FILE_TOO_SMALL",
                format!(
                    "The file must be at least {} bytes (got {} bytes).",
                    self.minimum, size
                ),
            ));
        }
        if size > self.maximum {
            return Err(ValidationError::new(
                "FILE_TOO_LARGE",
                format!(
                    "The file must not exceed {} bytes (got {} bytes).",
                    self.maximum, size
                ),
            ));
        }
        Ok(())
    }
}

/// Rejects files whose declared media type is not allowed
#[derive(Debug, Clone)]
pub struct MimeTypeValidator {
    allowed: Vec<String>,
}

impl MimeTypeValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
        }
    }
}

impl ElementValidator for MimeTypeValidator {
    fn name(&self) -> &str {
        "mime_type"
    }

    fn validate(&self, file: &dyn FileDescriptor) -> Result<(), ValidationError> {
        let media_type = file.media_type().map(|m| m.to_lowercase());
        match media_type {
            Some(ref m) if self.allowed.iter().any(|a| a == m) => Ok(()),
            _ => Err(ValidationError::new(
                "MEDIA_TYPE_NOT_ALLOWED",
                format!(
                    "Files of type '{}' are not allowed (allowed: {}).",
                    media_type.as_deref().unwrap_or("unknown"),
                    self.allowed.join(", ")
                ),
            )),
        }
    }
}

/// Bounds the number of files in a collection
#[derive(Debug, Clone)]
pub struct CountValidator {
    minimum: usize,
    maximum: usize,
}

impl CountValidator {
    pub fn new(minimum: usize, maximum: usize) -> Result<Self, AppError> {
        if minimum > maximum {
            return Err(AppError::Configuration(format!(
                "Count minimum ({}) exceeds maximum ({})",
                minimum, maximum
            )));
        }
        Ok(Self { minimum, maximum })
    }
}

impl CollectionValidator for CountValidator {
    fn name(&self) -> &str {
        "count"
    }

    fn validate(&self, files: &[FileResource]) -> Result<(), ValidationError> {
        if files.len() < self.minimum {
            return Err(ValidationError::new(
                "TOO_FEW_FILES",
                format!("At least {} files are required.", self.minimum),
            ));
        }
        if files.len() > self.maximum {
            return Err(ValidationError::new(
                "TOO_MANY_FILES",
                format!("At most {} files are allowed.", self.maximum),
            ));
        }
        Ok(())
    }
}

/// Extensions the web server may execute when the file is requested.
const BLOCKED_EXTENSIONS: &[&str] = &[
    "php", "php3", "php4", "php5", "php7", "php8", "phtml", "pht", "phar", "phps", "shtml", "cgi",
    "pl",
];

/// Blocks server-side script files.
///
/// Always applied on import, before configured validators run. Every dotted
/// segment after the first is checked, so `shell.php.jpg` is rejected too.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameValidator;

impl FileNameValidator {
    pub fn is_valid(&self, file_name: &str) -> bool {
        let lower = file_name.trim().to_lowercase();
        if lower.is_empty() || lower == ".htaccess" {
            return false;
        }
        !lower
            .split('.')
            .skip(1)
            .any(|segment| BLOCKED_EXTENSIONS.contains(&segment.trim()))
    }
}

impl ElementValidator for FileNameValidator {
    fn name(&self) -> &str {
        "file_name"
    }

    fn validate(&self, file: &dyn FileDescriptor) -> Result<(), ValidationError> {
        if file.file_name().trim().is_empty() {
            Err(ValidationError::new(
                "FILE_NAME_EMPTY",
                "The uploaded file has no name.",
            ))
        } else if self.is_valid(file.file_name()) {
            Ok(())
        } else {
            Err(ValidationError::new(
                "FILE_EXTENSION_BLOCKED",
                "Uploading files with server-side script extensions is not allowed.",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formvault_core::models::{TransportStatus, UploadItem};
    use std::path::PathBuf;

    fn upload(name: &str, size: u64, media_type: Option<&str>) -> UploadItem {
        UploadItem {
            name: name.to_string(),
            tmp_name: PathBuf::from("/tmp/upload"),
            size,
            media_type: media_type.map(String::from),
            status: TransportStatus::Ok,
        }
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("0B").unwrap(), 0);
        assert_eq!(parse_size("512K").unwrap(), 512 * 1024);
        assert_eq!(parse_size("10m").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_size_requires_unit() {
        assert!(matches!(parse_size("10"), Err(AppError::Configuration(_))));
        assert!(matches!(parse_size(""), Err(AppError::Configuration(_))));
        assert!(matches!(parse_size("M"), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_file_size_too_small() {
        let validator = FileSizeValidator::new("1M", "10M").unwrap();
        let err = validator.validate(&upload("a.pdf", 1, None)).unwrap_err();
        assert_eq!(err.code, "FILE_TOO_SMALL");
    }

    #[test]
    fn test_file_size_too_large() {
        let validator = FileSizeValidator::new("1M", "1M").unwrap();
        let err = validator
            .validate(&upload("a.pdf", 1024 * 1024 + 1, None))
            .unwrap_err();
        assert_eq!(err.code, "FILE_TOO_LARGE");
        assert!(validator.validate(&upload("a.pdf", 1024 * 1024, None)).is_ok());
    }

    #[test]
    fn test_file_size_rejects_inverted_range() {
        assert!(FileSizeValidator::new("2M", "1M").is_err());
    }

    #[test]
    fn test_mime_type_validator() {
        let validator = MimeTypeValidator::new(["application/pdf", "image/png"]);
        assert!(validator
            .validate(&upload("a.pdf", 1, Some("Application/PDF")))
            .is_ok());
        assert_eq!(
            validator
                .validate(&upload("a.gif", 1, Some("image/gif")))
                .unwrap_err()
                .code,
            "MEDIA_TYPE_NOT_ALLOWED"
        );
        assert!(validator.validate(&upload("a", 1, None)).is_err());
    }

    #[test]
    fn test_file_name_validator_blocks_scripts() {
        let validator = FileNameValidator;
        assert!(validator.is_valid("report.pdf"));
        assert!(validator.is_valid("archive.tar.gz"));
        assert!(!validator.is_valid("shell.php"));
        assert!(!validator.is_valid("shell.PHTML"));
        assert!(!validator.is_valid("shell.php.jpg"));
        assert!(!validator.is_valid(".htaccess"));
        assert!(!validator.is_valid(""));
    }

    #[test]
    fn test_file_name_validator_codes() {
        let validator = FileNameValidator;
        assert_eq!(
            validator.validate(&upload("  ", 1, None)).unwrap_err().code,
            "FILE_NAME_EMPTY"
        );
        assert_eq!(
            validator.validate(&upload("shell.php", 1, None)).unwrap_err().code,
            "FILE_EXTENSION_BLOCKED"
        );
        assert!(validator.validate(&upload("a.pdf", 1, None)).is_ok());
    }

    #[test]
    fn test_validator_set_runs_only_element_validators_per_file() {
        let set = ValidatorSet::new()
            .with_element(FileSizeValidator::new("0B", "1K").unwrap())
            .with_collection(CountValidator::new(5, 10).unwrap());

        assert!(set.validate_element(&upload("a.pdf", 10, None)).is_ok());
        assert_eq!(
            set.validate_element(&upload("a.pdf", 4096, None))
                .unwrap_err()
                .code,
            "FILE_TOO_LARGE"
        );
        assert_eq!(
            set.validate_collection(&[]).unwrap_err().code,
            "TOO_FEW_FILES"
        );
    }

    #[test]
    fn test_validation_error_becomes_upload_error() {
        let err: UploadError = ValidationError::new("TOO_MANY_FILES", "At most 2 files").into();
        assert_eq!(err.kind, formvault_core::RejectionKind::Validation);
        assert_eq!(err.code, "TOO_MANY_FILES");
    }
}
