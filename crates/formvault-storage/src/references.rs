use crate::traits::{FileReferenceRecord, ReferenceRepository, StorageError, StorageResult};
use async_trait::async_trait;
use formvault_core::models::{FileId, ReferenceId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Process-local reference repository.
///
/// Used by the CLI and tests; applications with a database provide their own
/// `ReferenceRepository`.
#[derive(Debug, Default)]
pub struct InMemoryReferenceRepository {
    next_id: AtomicU64,
    records: Mutex<HashMap<ReferenceId, FileReferenceRecord>>,
}

impl InMemoryReferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(
        &self,
    ) -> StorageResult<std::sync::MutexGuard<'_, HashMap<ReferenceId, FileReferenceRecord>>> {
        self.records
            .lock()
            .map_err(|_| StorageError::BackendError("reference repository lock poisoned".to_string()))
    }
}

#[async_trait]
impl ReferenceRepository for InMemoryReferenceRepository {
    async fn find(&self, id: ReferenceId) -> StorageResult<Option<FileReferenceRecord>> {
        Ok(self.records()?.get(&id).copied())
    }

    async fn insert(&self, file_id: FileId) -> StorageResult<FileReferenceRecord> {
        let id = ReferenceId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = FileReferenceRecord { id, file_id };
        self.records()?.insert(id, record);
        tracing::debug!(reference_id = %id, file_id = %file_id, "File reference inserted");
        Ok(record)
    }

    async fn update(&self, id: ReferenceId, file_id: FileId) -> StorageResult<FileReferenceRecord> {
        let mut records = self.records()?;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("reference {}", id)))?;
        record.file_id = file_id;
        Ok(*record)
    }
}
