//! FormVault Processing Library
//!
//! Upload reconciliation for form fields: the classifier, the reconciliation
//! engine, storage placement, the validator boundary and the cleanup
//! finisher.

pub mod cleanup;
pub mod upload;
pub mod validator;

// Re-export commonly used types
pub use cleanup::{CleanupReport, UploadCleanup};
pub use upload::{
    Conversion, ConversionContext, FieldOptions, PlacementStrategy, ReconciliationEngine,
    TargetShape,
};
pub use validator::{
    CollectionValidator, CountValidator, ElementValidator, FileNameValidator, FileSizeValidator,
    MimeTypeValidator, ValidationError, Validator, ValidatorSet,
};
