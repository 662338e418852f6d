use formvault_core::models::{FileResource, ResourcePointer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::TestApp;

static TMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Write a temp upload and return its transport entry.
pub fn upload_entry(app: &TestApp, name: &str, content: &[u8]) -> Value {
    let n = TMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    let tmp_name = app.uploads_dir.path().join(format!("php{n:04}"));
    std::fs::write(&tmp_name, content).expect("Failed to write temp upload");
    json!({
        "error": 0,
        "name": name,
        "tmp_name": tmp_name.to_string_lossy(),
        "size": content.len(),
        "type": "application/pdf",
    })
}

/// `{submittedFile: {resourcePointer}}` for a signed pointer.
pub fn submitted_entry(app: &TestApp, pointer: ResourcePointer) -> Value {
    json!({"submittedFile": {"resourcePointer": app.integrity.sign_pointer(pointer)}})
}

/// Signed deletion token for the file at `index`.
pub fn delete_token(app: &TestApp, property: &str, index: usize, resource: &FileResource) -> Value {
    Value::String(
        formvault_processing::upload::deletion_token(&app.integrity, property, index, resource)
            .expect("deletion token"),
    )
}

/// A "no file" transport entry, as browsers send for an untouched input.
pub fn no_file_entry() -> Value {
    json!({"error": 4, "name": "", "tmp_name": "", "size": 0, "type": ""})
}
