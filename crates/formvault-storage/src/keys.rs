//! Shared file name handling for storage backends.
//!
//! Uploaded names are reduced to a safe base name before they touch the
//! store, and collisions under the rename policy produce `name_01.ext`,
//! `name_02.ext`, ...

/// Maximum number of rename attempts before giving up.
pub const MAX_RENAME_ATTEMPTS: usize = 99;

const MAX_FILE_NAME_LEN: usize = 255;

/// Reduce a client-supplied name to a safe base name.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    if base.contains("..") && base.chars().all(|c| c == '.') {
        return "file".to_string();
    }
    let cleaned: String = base
        .chars()
        .take(MAX_FILE_NAME_LEN)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Candidate name for the `attempt`-th rename of `file_name`.
pub fn renamed_candidate(file_name: &str, attempt: usize) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{:02}.{}", stem, attempt, ext),
        _ => format!("{}_{:02}", file_name, attempt),
    }
}
