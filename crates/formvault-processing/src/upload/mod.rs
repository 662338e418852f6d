//! Upload reconciliation: classify a field payload, resolve kept files,
//! import new uploads and apply authorized deletions.

pub mod classifier;
pub mod placement;
pub mod reconcile;
pub mod state;
pub mod types;

pub use classifier::{classify, Classified, ClassifiedSource, UploadEntry};
pub use placement::PlacementStrategy;
pub use reconcile::{ConversionContext, ReconciliationEngine};
pub use state::{
    deletion_token, redisplay_entries, submitted_files_value, submitted_pointer, RedisplayEntry,
};
pub use types::{Conversion, FieldOptions, TargetShape};
