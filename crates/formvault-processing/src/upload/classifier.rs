//! Upload classifier: turns a raw field payload into a tagged shape once, so
//! the reconciliation engine never inspects raw structure again.

use formvault_core::constants::{
    DELETE_FILE_KEY, RESOURCE_POINTER_KEY, SUBMITTED_FILES_KEY, SUBMITTED_FILE_KEY,
};
use formvault_core::models::{TransportStatus, UploadItem};
use formvault_core::AppError;
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::types::TargetShape;

const ERROR_KEY: &str = "error";

/// One entry of a multi-file payload: a transported file, a pointer to an
/// earlier one, or both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadEntry {
    /// Present when the entry carries a transport status
    pub upload: Option<UploadItem>,
    /// Signed `submittedFile.resourcePointer`, if any
    pub pointer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Empty,
    Single {
        upload: Option<UploadItem>,
        /// Signed pointer to the file kept from an earlier submission
        prior_pointer: Option<String>,
    },
    Multi {
        /// `__submittedFiles` in index order; `None` where an entry holds no pointer
        submitted: Vec<Option<String>>,
        /// Remaining entries in submission order
        uploads: Vec<UploadEntry>,
    },
}

/// Classified payload plus the signed deletion tokens split off it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedSource {
    pub classified: Classified,
    pub deletions: Vec<String>,
}

impl ClassifiedSource {
    /// Pointers deletion indices address: the `__submittedFiles` list, or
    /// the single prior pointer at index 0.
    pub fn submitted_pointers(&self) -> Vec<Option<String>> {
        match &self.classified {
            Classified::Empty => Vec::new(),
            Classified::Single { prior_pointer, .. } => match prior_pointer {
                Some(pointer) => vec![Some(pointer.clone())],
                None => Vec::new(),
            },
            Classified::Multi { submitted, .. } => submitted.clone(),
        }
    }
}

/// Classify a raw field payload.
///
/// Rules, first match wins:
/// 1. `null`, `""`, `[]` or `{}` is empty
/// 2. a field declared as a collection is multi
/// 3. more than one `__submittedFiles` entry is multi
/// 4. a payload with none of `error`, `submittedFile` or `__submittedFiles`
///    is multi (bare indexed entries)
/// 5. anything else is single
pub fn classify(raw: &Value, shape: TargetShape) -> Result<ClassifiedSource, AppError> {
    let mut source = match raw {
        Value::Null => return Ok(empty()),
        Value::String(s) if s.is_empty() => return Ok(empty()),
        Value::Array(items) if items.is_empty() => return Ok(empty()),
        Value::Object(map) if map.is_empty() => return Ok(empty()),
        Value::Object(map) => map.clone(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        other => {
            return Err(AppError::InvalidInput(format!(
                "Upload payload must be an object or a list, got {}",
                json_type(other)
            )))
        }
    };

    let deletions = take_deletions(&mut source);
    let submitted = source.remove(SUBMITTED_FILES_KEY);
    let submitted_count = submitted.as_ref().map(entry_count).unwrap_or(0);

    let is_multi = shape == TargetShape::Collection
        || submitted_count > 1
        || (!source.contains_key(ERROR_KEY)
            && !source.contains_key(SUBMITTED_FILE_KEY)
            && submitted.is_none());

    let classified = if is_multi {
        Classified::Multi {
            submitted: submitted
                .as_ref()
                .map(|v| entries(v).map(pointer_of).collect())
                .unwrap_or_default(),
            uploads: source
                .iter()
                .filter_map(|(key, value)| match value.as_object() {
                    Some(entry) => Some(entry),
                    None => {
                        tracing::debug!(
                            key = %key,
                            kind = json_type(value),
                            "Skipping payload entry that is not an upload object"
                        );
                        None
                    }
                })
                .map(parse_entry)
                .collect::<Result<_, _>>()?,
        }
    } else {
        let prior_pointer = submitted
            .as_ref()
            .and_then(|v| entries(v).next())
            .and_then(pointer_of)
            .or_else(|| pointer_of(&Value::Object(source.clone())));
        Classified::Single {
            upload: parse_upload(&source)?,
            prior_pointer,
        }
    };

    Ok(ClassifiedSource {
        classified,
        deletions,
    })
}

fn empty() -> ClassifiedSource {
    ClassifiedSource {
        classified: Classified::Empty,
        deletions: Vec::new(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Values of an indexed list, whether it arrived as a JSON list or as an
/// object keyed by index.
fn entries(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

fn entry_count(value: &Value) -> usize {
    entries(value).count()
}

fn take_deletions(source: &mut Map<String, Value>) -> Vec<String> {
    match source.remove(DELETE_FILE_KEY) {
        Some(value) => entries(&value)
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        None => Vec::new(),
    }
}

/// `submittedFile.resourcePointer` of an entry.
fn pointer_of(value: &Value) -> Option<String> {
    value
        .get(SUBMITTED_FILE_KEY)?
        .get(RESOURCE_POINTER_KEY)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_entry(map: &Map<String, Value>) -> Result<UploadEntry, AppError> {
    Ok(UploadEntry {
        upload: parse_upload(map)?,
        pointer: pointer_of(&Value::Object(map.clone())),
    })
}

/// Build the transported file of an entry; `None` when it has no `error` key.
fn parse_upload(map: &Map<String, Value>) -> Result<Option<UploadItem>, AppError> {
    let Some(status) = map.get(ERROR_KEY) else {
        return Ok(None);
    };
    let status = TransportStatus::from_code(as_integer(status).ok_or_else(|| {
        AppError::InvalidInput(format!("Upload status must be an integer, got {}", status))
    })?);

    let tmp_name = map
        .get("tmp_name")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if status.is_ok() && tmp_name.is_empty() {
        return Err(AppError::InvalidInput(
            "Upload entry reports success but has no tmp_name".to_string(),
        ));
    }

    Ok(Some(UploadItem {
        name: map
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        tmp_name: PathBuf::from(tmp_name),
        size: map
            .get("size")
            .and_then(as_integer)
            .and_then(|s| u64::try_from(s).ok())
            .unwrap_or(0),
        media_type: map
            .get("type")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from),
        status,
    }))
}

/// Integers arrive as JSON numbers or as numeric strings from form encoding.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
