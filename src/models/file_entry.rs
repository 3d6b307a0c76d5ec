use crate::scope_path::RelativePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    pub fn from_metadata(path: &RelativePath, metadata: &Metadata) -> Self {
        let is_directory = metadata.is_dir();
        Self {
            name: path.file_name().unwrap_or_default().to_string(),
            path: path.to_string(),
            is_directory,
            size: if is_directory { 0 } else { metadata.len() },
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

/// Directories first, then case-insensitive by name. Names differing only in
/// case fall back to a byte-wise compare so the order is total.
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
}
