//! Reconciliation engine: merges files kept from earlier submissions with new
//! uploads and authorized deletions into the final result of one field.
//!
//! Nothing is carried across invocations; every call re-derives its state
//! from the submitted payload.

use formvault_core::models::{
    FileId, FileResource, ReferenceId, ReferenceKey, ResourcePointer, TransportStatus, UploadItem,
};
use formvault_core::{AppError, IntegrityService, UploadError};
use formvault_storage::{FileStore, ReferenceRepository, StorageError};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use super::classifier::{classify, Classified, UploadEntry};
use super::placement::PlacementStrategy;
use super::types::{Conversion, FieldOptions, TargetShape};
use crate::validator::{ElementValidator, FileNameValidator};

/// Imports already performed in the current request, keyed by temp location.
///
/// Lives for one request only; converting several fields of the same request
/// with one context stores a temp upload referenced twice only once.
#[derive(Debug, Default)]
pub struct ConversionContext {
    converted: HashMap<PathBuf, FileResource>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.converted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converted.is_empty()
    }
}

/// Outcome of resolving or importing one item.
enum Outcome {
    Resolved(FileResource),
    /// Nothing to resolve: no pointer, an invalid one, or one to a vanished file
    Skipped,
    Rejected(UploadError),
}

pub struct ReconciliationEngine {
    integrity: IntegrityService,
    placement: PlacementStrategy,
    store: Arc<dyn FileStore>,
    references: Arc<dyn ReferenceRepository>,
}

impl ReconciliationEngine {
    pub fn new(
        integrity: IntegrityService,
        placement: PlacementStrategy,
        store: Arc<dyn FileStore>,
        references: Arc<dyn ReferenceRepository>,
    ) -> Self {
        Self {
            integrity,
            placement,
            store,
            references,
        }
    }

    /// Convert one field's raw payload with a fresh per-request context.
    pub async fn convert(
        &self,
        raw: &Value,
        shape: TargetShape,
        options: &FieldOptions,
    ) -> Result<Conversion, AppError> {
        let mut context = ConversionContext::new();
        self.convert_with_context(raw, shape, options, &mut context)
            .await
    }

    /// Convert one field's raw payload, sharing import results with other
    /// fields of the same request through `context`.
    ///
    /// Transport and validation failures come back as
    /// [`Conversion::Rejected`]; storage failures while importing and
    /// configuration errors are returned as `Err`.
    #[tracing::instrument(skip(self, raw, options, context), fields(shape = ?shape, property = ?options.property))]
    pub async fn convert_with_context(
        &self,
        raw: &Value,
        shape: TargetShape,
        options: &FieldOptions,
        context: &mut ConversionContext,
    ) -> Result<Conversion, AppError> {
        let source = classify(raw, shape)?;

        let deleted = if options.allow_removal && !source.deletions.is_empty() {
            self.apply_deletions(&source.deletions, &source.submitted_pointers(), options)
                .await
        } else {
            BTreeSet::new()
        };

        let conversion = match source.classified {
            Classified::Empty => Conversion::Empty,
            Classified::Single {
                upload,
                prior_pointer,
            } => {
                self.convert_single(upload, prior_pointer, &deleted, options, context)
                    .await?
            }
            Classified::Multi { submitted, uploads } => {
                self.convert_multi(submitted, uploads, &deleted, options, context)
                    .await?
            }
        };

        tracing::debug!(
            resources = conversion.resources().len(),
            rejected = conversion.rejection().is_some(),
            deleted = deleted.len(),
            "Field converted"
        );
        Ok(conversion)
    }

    async fn convert_single(
        &self,
        upload: Option<UploadItem>,
        prior_pointer: Option<String>,
        deleted: &BTreeSet<usize>,
        options: &FieldOptions,
        context: &mut ConversionContext,
    ) -> Result<Conversion, AppError> {
        // The kept file was removed on request; the field starts over empty.
        let prior_pointer = prior_pointer.filter(|_| !deleted.contains(&0));
        let upload = upload.filter(|u| u.status != TransportStatus::NoFile);

        let outcome = match upload {
            Some(item) if item.status.is_ok() => {
                // The prior pointer is discarded; the upload starts a new resource.
                if let Some(token) = prior_pointer.as_deref() {
                    self.delete_replaced(token).await;
                }
                self.import(&item, None, options, context).await?
            }
            Some(item) => Outcome::Rejected(UploadError::transport(item.status)),
            None => match prior_pointer.as_deref() {
                Some(token) => self.resolve_pointer(token, options).await?,
                None => Outcome::Skipped,
            },
        };

        Ok(match outcome {
            Outcome::Resolved(resource) => Conversion::Single(resource),
            Outcome::Skipped => Conversion::Empty,
            Outcome::Rejected(err) => Conversion::Rejected(err),
        })
    }

    async fn convert_multi(
        &self,
        submitted: Vec<Option<String>>,
        uploads: Vec<UploadEntry>,
        deleted: &BTreeSet<usize>,
        options: &FieldOptions,
        context: &mut ConversionContext,
    ) -> Result<Conversion, AppError> {
        let mut files: Vec<FileResource> = Vec::new();

        for (index, pointer) in submitted.iter().enumerate() {
            if deleted.contains(&index) {
                continue;
            }
            let Some(token) = pointer.as_deref() else {
                continue;
            };
            match self.resolve_pointer(token, options).await? {
                Outcome::Resolved(resource) => push_unique(&mut files, resource),
                Outcome::Skipped => {}
                Outcome::Rejected(err) => return Ok(Conversion::Rejected(err)),
            }
        }

        for entry in uploads {
            let outcome = match entry.upload {
                Some(item) if item.status.is_ok() => {
                    self.import(&item, entry.pointer.as_deref(), options, context)
                        .await?
                }
                Some(item) if item.status != TransportStatus::NoFile => {
                    Outcome::Rejected(UploadError::transport(item.status))
                }
                _ => match entry.pointer.as_deref() {
                    Some(token) => self.resolve_pointer(token, options).await?,
                    None => Outcome::Skipped,
                },
            };
            match outcome {
                Outcome::Resolved(resource) => push_unique(&mut files, resource),
                Outcome::Skipped => {}
                Outcome::Rejected(err) => return Ok(Conversion::Rejected(err)),
            }
        }

        if let Err(err) = options.validators.validate_collection(&files) {
            return Ok(Conversion::Rejected(err.into()));
        }

        Ok(Conversion::Multiple(files))
    }

    /// Verify deletion tokens and delete the files they address.
    ///
    /// Returns the `__submittedFiles` indices that were removed. A token is
    /// honored only when its index addresses a submitted pointer to the same
    /// file; anything else is logged and ignored.
    async fn apply_deletions(
        &self,
        tokens: &[String],
        submitted: &[Option<String>],
        options: &FieldOptions,
    ) -> BTreeSet<usize> {
        let mut deleted = BTreeSet::new();

        for token in tokens {
            let request = match self.integrity.verify_deletion(token) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid file deletion request discarded");
                    continue;
                }
            };

            if let Some(property) = options.property.as_deref() {
                if request.property != property {
                    tracing::warn!(
                        expected = property,
                        requested = %request.property,
                        "File deletion request for another property discarded"
                    );
                    continue;
                }
            }

            if deleted.contains(&request.file_index) {
                continue;
            }

            let Some(Some(pointer)) = submitted.get(request.file_index) else {
                tracing::debug!(
                    file_index = request.file_index,
                    "File deletion request addresses no submitted file"
                );
                continue;
            };

            if !self.pointer_targets(pointer, request.file_uid).await {
                tracing::warn!(
                    file_index = request.file_index,
                    file_id = %request.file_uid,
                    "File deletion request does not match the submitted file"
                );
                continue;
            }

            deleted.insert(request.file_index);
            self.delete_stored_file(request.file_uid).await;
        }

        deleted
    }

    /// Whether a signed pointer resolves to `file_id`.
    async fn pointer_targets(&self, token: &str, file_id: FileId) -> bool {
        match self.integrity.verify_pointer(token) {
            Ok(ResourcePointer::File(id)) => id == file_id,
            Ok(ResourcePointer::Reference(id)) => match self.references.find(id).await {
                Ok(Some(record)) => record.file_id == file_id,
                Ok(None) => false,
                Err(e) => {
                    tracing::warn!(error = %e, reference_id = %id, "Reference lookup failed");
                    false
                }
            },
            Err(_) => false,
        }
    }

    /// Delete the file a replaced single upload pointed at.
    ///
    /// Only fresh `file:` pointers are deleted; the file behind a reference
    /// record stays with that record.
    async fn delete_replaced(&self, token: &str) {
        match self.integrity.verify_pointer(token) {
            Ok(ResourcePointer::File(id)) => {
                tracing::info!(file_id = %id, "Replacing previously uploaded file");
                self.delete_stored_file(id).await;
            }
            Ok(ResourcePointer::Reference(_)) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Invalid resource pointer on replaced upload ignored");
            }
        }
    }

    /// Best-effort delete followed by a cleanup attempt on its folder.
    async fn delete_stored_file(&self, id: FileId) {
        match self.store.delete_file(id).await {
            Ok(file) => {
                tracing::info!(file_id = %id, key = %file.identifier, "Uploaded file deleted");
                if let Err(e) = self.placement.delete_if_empty(&file.folder).await {
                    tracing::warn!(error = %e, folder = %file.folder, "Upload folder cleanup failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, file_id = %id, "Could not delete uploaded file");
            }
        }
    }

    /// Re-resolve a pointer from an earlier submission.
    ///
    /// `file:<id>` gets a new wrapper; a bare reference id resolves to the
    /// existing record so the caller updates it in place.
    async fn resolve_pointer(
        &self,
        token: &str,
        options: &FieldOptions,
    ) -> Result<Outcome, AppError> {
        let pointer = match self.integrity.verify_pointer(token) {
            Ok(pointer) => pointer,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid resource pointer discarded");
                return Ok(Outcome::Skipped);
            }
        };

        let resource = match pointer {
            ResourcePointer::File(id) => match self.store.get_file(id).await {
                Ok(file) => FileResource::wrap(file),
                Err(StorageError::NotFound(_)) => {
                    tracing::warn!(file_id = %id, "Resource pointer references a missing file");
                    return Ok(Outcome::Skipped);
                }
                Err(e) => return Err(e.into()),
            },
            ResourcePointer::Reference(id) => {
                let Some(record) = self.references.find(id).await? else {
                    tracing::warn!(reference_id = %id, "Resource pointer references a missing record");
                    return Ok(Outcome::Skipped);
                };
                match self.store.get_file(record.file_id).await {
                    Ok(file) => FileResource {
                        key: ReferenceKey::Existing(id),
                        file,
                    },
                    Err(StorageError::NotFound(_)) => {
                        tracing::warn!(
                            reference_id = %id,
                            file_id = %record.file_id,
                            "File reference points at a missing file"
                        );
                        return Ok(Outcome::Skipped);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if let Err(err) = options.validators.validate_element(&resource) {
            return Ok(Outcome::Rejected(err.into()));
        }
        Ok(Outcome::Resolved(resource))
    }

    /// Import a new upload: name check, validators, placement, wrapper.
    ///
    /// `reuse_pointer` is a pointer carried by the same entry; a bare
    /// reference id there is re-pointed at the new file and kept.
    async fn import(
        &self,
        item: &UploadItem,
        reuse_pointer: Option<&str>,
        options: &FieldOptions,
        context: &mut ConversionContext,
    ) -> Result<Outcome, AppError> {
        if let Some(resource) = context.converted.get(&item.tmp_name) {
            tracing::debug!(tmp_name = %item.tmp_name.display(), "Upload already imported in this request");
            return Ok(Outcome::Resolved(resource.clone()));
        }

        if let Err(err) = FileNameValidator.validate(item) {
            tracing::warn!(file_name = %item.name, "Upload with blocked file name rejected");
            return Ok(Outcome::Rejected(err.into()));
        }
        if let Err(err) = options.validators.validate_element(item) {
            return Ok(Outcome::Rejected(err.into()));
        }

        let seed = options.resolve_seed()?;
        let stored = match self
            .placement
            .place(item, &options.upload_folder, &seed, options.conflict_mode)
            .await
        {
            Ok(stored) => stored,
            Err(AppError::Conflict(msg)) => {
                tracing::info!(file_name = %item.name, conflict = %msg, "Upload cancelled by name conflict");
                return Ok(Outcome::Rejected(UploadError::validation(
                    "FILE_ALREADY_EXISTS",
                    "A file with this name already exists.",
                )));
            }
            Err(e) => return Err(e),
        };

        let mut resource = FileResource::wrap(stored);
        if let Some(id) = self.reusable_reference(reuse_pointer).await? {
            let record = self.references.update(id, resource.file.id).await?;
            tracing::info!(
                reference_id = %record.id,
                file_id = %record.file_id,
                "File reference updated to the new upload"
            );
            resource.key = ReferenceKey::Existing(record.id);
        }

        context
            .converted
            .insert(item.tmp_name.clone(), resource.clone());
        Ok(Outcome::Resolved(resource))
    }
}

impl ReconciliationEngine {
    /// Existing reference record named by a pointer on an upload entry.
    async fn reusable_reference(
        &self,
        token: Option<&str>,
    ) -> Result<Option<ReferenceId>, AppError> {
        let Some(token) = token else {
            return Ok(None);
        };
        match self.integrity.verify_pointer(token) {
            Ok(ResourcePointer::Reference(id)) => {
                Ok(self.references.find(id).await?.map(|record| record.id))
            }
            Ok(ResourcePointer::File(_)) => Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid resource pointer on upload entry ignored");
                Ok(None)
            }
        }
    }
}

/// Append unless the same resource is already in the result.
fn push_unique(files: &mut Vec<FileResource>, resource: FileResource) {
    if !files.iter().any(|f| f.key == resource.key) {
        files.push(resource);
    }
}
