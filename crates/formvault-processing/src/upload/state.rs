//! Hidden form state rendered when a form is redisplayed, so the next
//! submission can find the files kept so far.

use formvault_core::constants::{RESOURCE_POINTER_KEY, SUBMITTED_FILES_KEY, SUBMITTED_FILE_KEY};
use formvault_core::models::{DeletionRequest, FileResource};
use formvault_core::{AppError, IntegrityService};
use serde::Serialize;
use serde_json::{json, Value};

use super::types::Conversion;

/// Signed pointer for the hidden `__submittedFiles` input.
pub fn submitted_pointer(integrity: &IntegrityService, resource: &FileResource) -> String {
    integrity.sign_pointer(resource.pointer())
}

/// Signed `__deleteFile` value offered next to the file at `index`.
pub fn deletion_token(
    integrity: &IntegrityService,
    property: &str,
    index: usize,
    resource: &FileResource,
) -> Result<String, AppError> {
    integrity.sign_deletion(&DeletionRequest {
        property: property.to_string(),
        file_index: index,
        file_uid: resource.file.id,
    })
}

/// Redisplay data for one kept file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisplayEntry {
    pub index: usize,
    pub file_name: String,
    pub resource_pointer: String,
    pub delete_token: String,
}

/// Redisplay entries for every file of a conversion, indexed the way the
/// next submission's `__submittedFiles` list will be.
pub fn redisplay_entries(
    integrity: &IntegrityService,
    property: &str,
    conversion: &Conversion,
) -> Result<Vec<RedisplayEntry>, AppError> {
    conversion
        .resources()
        .into_iter()
        .enumerate()
        .map(|(index, resource)| {
            Ok(RedisplayEntry {
                index,
                file_name: resource.file.name.clone(),
                resource_pointer: submitted_pointer(integrity, resource),
                delete_token: deletion_token(integrity, property, index, resource)?,
            })
        })
        .collect()
}

/// The `__submittedFiles` structure a browser re-posts for these entries.
pub fn submitted_files_value(entries: &[RedisplayEntry]) -> Value {
    let files: Vec<Value> = entries
        .iter()
        .map(|e| json!({ SUBMITTED_FILE_KEY: { RESOURCE_POINTER_KEY: e.resource_pointer } }))
        .collect();
    json!({ SUBMITTED_FILES_KEY: files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use formvault_core::models::{
        FileId, FolderPath, ReferenceId, ReferenceKey, ResourcePointer, StoredFile,
    };

    fn integrity() -> IntegrityService {
        IntegrityService::from_secret("state-test-secret-0123456789abcdef").unwrap()
    }

    fn resource(id: u64, key: ReferenceKey) -> FileResource {
        FileResource {
            key,
            file: StoredFile {
                id: FileId(id),
                name: format!("f{id}.pdf"),
                folder: FolderPath::root(),
                identifier: format!("f{id}.pdf"),
                size: 1,
                media_type: None,
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_submitted_pointer_for_new_and_existing() {
        let integrity = integrity();
        let fresh = FileResource::wrap(resource(5, ReferenceKey::Existing(ReferenceId(1))).file);
        assert_eq!(
            integrity.verify_pointer(&submitted_pointer(&integrity, &fresh)).unwrap(),
            ResourcePointer::File(FileId(5))
        );

        let existing = resource(5, ReferenceKey::Existing(ReferenceId(9)));
        assert_eq!(
            integrity.verify_pointer(&submitted_pointer(&integrity, &existing)).unwrap(),
            ResourcePointer::Reference(ReferenceId(9))
        );
    }

    #[test]
    fn test_deletion_token_round_trip() {
        let integrity = integrity();
        let token = deletion_token(
            &integrity,
            "attachments",
            2,
            &resource(7, ReferenceKey::Existing(ReferenceId(3))),
        )
        .unwrap();
        let request = integrity.verify_deletion(&token).unwrap();
        assert_eq!(request.property, "attachments");
        assert_eq!(request.file_index, 2);
        assert_eq!(request.file_uid, FileId(7));
        // Deletion tokens are not pointers.
        assert!(integrity.verify_pointer(&token).is_err());
    }

    #[test]
    fn test_redisplay_entries_follow_result_order() {
        let integrity = integrity();
        let conversion = Conversion::Multiple(vec![
            resource(1, ReferenceKey::Existing(ReferenceId(10))),
            resource(2, ReferenceKey::Existing(ReferenceId(11))),
        ]);
        let entries = redisplay_entries(&integrity, "files", &conversion).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].index, 1);
        assert_eq!(entries[1].file_name, "f2.pdf");

        let value = submitted_files_value(&entries);
        assert_eq!(
            value["__submittedFiles"][0]["submittedFile"]["resourcePointer"],
            Value::String(entries[0].resource_pointer.clone())
        );
    }
}
