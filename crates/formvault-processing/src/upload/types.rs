//! Types for the upload reconciliation flow.

use formvault_core::constants::RANDOM_SEED_HEX_LEN;
use formvault_core::models::{ConflictMode, FileResource};
use formvault_core::{AppError, Config, UploadError};
use rand::Rng;
use serde::Serialize;

use crate::validator::ValidatorSet;

/// Shape of the property a field is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetShape {
    /// Declared as a single file reference
    Single,
    /// Declared as a collection of file references
    Collection,
    /// Not declared; the classifier falls back to structural signals
    #[default]
    Unknown,
}

/// Per-field upload options.
///
/// Built from the process-wide [`Config`] and overridden by the caller for
/// the field being converted.
#[derive(Debug, Clone)]
pub struct FieldOptions {
    /// Parent folder identifier, e.g. `user_upload/`
    pub upload_folder: String,
    /// Per-session seed the upload sub-folder is derived from
    pub seed: Option<String>,
    pub conflict_mode: ConflictMode,
    pub allow_removal: bool,
    pub allow_random_seed: bool,
    /// Property path deletion requests must be addressed to; unchecked when `None`
    pub property: Option<String>,
    pub validators: ValidatorSet,
}

impl FieldOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_folder: config.upload_folder.clone(),
            seed: None,
            conflict_mode: config.conflict_mode,
            allow_removal: config.allow_removal,
            allow_random_seed: config.allow_random_seed,
            property: None,
            validators: ValidatorSet::new(),
        }
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_upload_folder(mut self, folder: impl Into<String>) -> Self {
        self.upload_folder = folder.into();
        self
    }

    pub fn with_conflict_mode(mut self, conflict_mode: ConflictMode) -> Self {
        self.conflict_mode = conflict_mode;
        self
    }

    pub fn with_allow_removal(mut self, allow_removal: bool) -> Self {
        self.allow_removal = allow_removal;
        self
    }

    pub fn with_validators(mut self, validators: ValidatorSet) -> Self {
        self.validators = validators;
        self
    }

    /// Seed for the upload sub-folder.
    ///
    /// A missing seed is a configuration error: a random seed lands every
    /// submission in a different folder, so a replaced upload is never found
    /// again. Only with `allow_random_seed` is a random seed generated.
    pub fn resolve_seed(&self) -> Result<String, AppError> {
        if let Some(seed) = self.seed.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(seed.to_string());
        }
        if !self.allow_random_seed {
            return Err(AppError::Configuration(
                "No upload seed configured for this field".to_string(),
            ));
        }

        let mut bytes = [0u8; RANDOM_SEED_HEX_LEN / 2];
        rand::rng().fill(&mut bytes);
        tracing::warn!(
            upload_folder = %self.upload_folder,
            "No upload seed configured; using a random seed for this submission"
        );
        Ok(hex::encode(bytes))
    }
}

/// Result of converting one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum Conversion {
    /// Nothing was uploaded and nothing is left from earlier submissions
    Empty,
    Single(FileResource),
    Multiple(Vec<FileResource>),
    /// A transport or validation failure the caller binds to the field
    Rejected(UploadError),
}

impl Conversion {
    /// Resources contained in the result, in order.
    pub fn resources(&self) -> Vec<&FileResource> {
        match self {
            Conversion::Single(resource) => vec![resource],
            Conversion::Multiple(resources) => resources.iter().collect(),
            Conversion::Empty | Conversion::Rejected(_) => Vec::new(),
        }
    }

    pub fn rejection(&self) -> Option<&UploadError> {
        match self {
            Conversion::Rejected(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resources().is_empty() && self.rejection().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> FieldOptions {
        FieldOptions {
            upload_folder: "user_upload/".to_string(),
            seed: None,
            conflict_mode: ConflictMode::Rename,
            allow_removal: false,
            allow_random_seed: false,
            property: None,
            validators: ValidatorSet::new(),
        }
    }

    #[test]
    fn test_configured_seed_is_used() {
        let opts = options().with_seed("session-1");
        assert_eq!(opts.resolve_seed().unwrap(), "session-1");
    }

    #[test]
    fn test_missing_seed_is_configuration_error() {
        assert!(matches!(
            options().resolve_seed(),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            options().with_seed("  ").resolve_seed(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_random_seed_fallback_when_allowed() {
        let mut opts = options();
        opts.allow_random_seed = true;
        let first = opts.resolve_seed().unwrap();
        let second = opts.resolve_seed().unwrap();
        assert_eq!(first.len(), RANDOM_SEED_HEX_LEN);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_conversion() {
        assert!(Conversion::Empty.is_empty());
        assert!(Conversion::Multiple(Vec::new()).is_empty());
        assert!(!Conversion::Rejected(UploadError::validation("X", "x")).is_empty());
    }
}
