//! Shared constants for payload keys, pointer formats and folder naming.

/// Payload key holding the already-submitted resource pointers of a field.
pub const SUBMITTED_FILES_KEY: &str = "__submittedFiles";

/// Payload key holding signed deletion requests of a field.
pub const DELETE_FILE_KEY: &str = "__deleteFile";

/// Key of the nested pointer object inside a submitted entry.
pub const SUBMITTED_FILE_KEY: &str = "submittedFile";

/// Key of the signed pointer inside `submittedFile`.
pub const RESOURCE_POINTER_KEY: &str = "resourcePointer";

/// Prefix of pointers that reference a freshly indexed file rather than a reference record.
pub const FILE_POINTER_PREFIX: &str = "file:";

/// Every session sub-folder created by the placement strategy starts with this prefix.
///
/// Only folders carrying it are ever deleted automatically; user-created folders never are.
pub const UPLOAD_FOLDER_PREFIX: &str = "form_";

/// Placeholder written into provisioned parent folders to suppress directory listings.
pub const FOLDER_INDEX_FILE: &str = "index.html";

/// Upload folder used when neither the field nor the environment configures one.
pub const DEFAULT_UPLOAD_FOLDER: &str = "user_upload/";

/// Additional secret mixed into the session seed when deriving sub-folder names.
pub const FOLDER_NAME_SALT: &str = "formvault.upload-folder";

/// Length in hex characters of a randomly generated fallback seed (160 bits).
pub const RANDOM_SEED_HEX_LEN: usize = 40;
