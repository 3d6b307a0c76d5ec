use crate::error::AppError;
use crate::models::file_entry::Breadcrumb;
use std::fmt;
use std::path::{Path, PathBuf};

/// A client path relative to the storage root, normalized to plain segments.
///
/// The empty path is the root itself. Segments never contain `/`, `\`, NUL,
/// or the special names `.` and `..`, so joining one onto the root can only
/// descend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RelativePath {
    segments: Vec<String>,
}

impl RelativePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalizes untrusted input. Accepts either separator, drops empty and
    /// `.` segments, and resolves `..` lexically. A `..` that would climb
    /// above the starting point is rejected rather than clamped.
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let mut segments: Vec<String> = Vec::new();

        for (index, segment) in input.split(['/', '\\']).enumerate() {
            match segment {
                "" | "." => continue,
                ".." => {
                    if segments.pop().is_none() {
                        return Err(AppError::PathEscape(input.to_string()));
                    }
                }
                _ => {
                    if segment.contains('\0') {
                        return Err(AppError::InvalidName(input.escape_default().to_string()));
                    }
                    if index == 0 && is_drive_prefix(segment) {
                        return Err(AppError::PathEscape(input.to_string()));
                    }
                    segments.push(segment.to_string());
                }
            }
        }

        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first_segment(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<RelativePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Appends a single validated name.
    pub fn join(&self, name: &str) -> Result<Self, AppError> {
        validate_name(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    pub fn join_relative(&self, other: &RelativePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(&self.segments);
        path
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let mut crumbs = vec![Breadcrumb {
            name: "Home".to_string(),
            path: String::new(),
        }];
        for depth in 1..=self.segments.len() {
            crumbs.push(Breadcrumb {
                name: self.segments[depth - 1].clone(),
                path: self.segments[..depth].join("/"),
            });
        }
        crumbs
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A name that may become one path segment under an existing directory.
pub fn validate_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        return Err(AppError::InvalidName("name is empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(AppError::InvalidName(name.to_string()));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(AppError::InvalidName(name.escape_default().to_string()));
    }
    Ok(())
}

pub fn is_within_scope(path: &Path, root: &Path) -> bool {
    path == root || path.starts_with(root)
}

/// Verifies that `target`, or its nearest existing ancestor, canonicalizes to
/// a location inside `canonical_root`. Catches symlinks inside the tree that
/// point elsewhere.
pub fn ensure_contained(
    canonical_root: &Path,
    target: &Path,
    relative: &RelativePath,
) -> Result<(), AppError> {
    let mut candidate = target;
    loop {
        match candidate.canonicalize() {
            Ok(canonical) => {
                if is_within_scope(&canonical, canonical_root) {
                    return Ok(());
                }
                return Err(AppError::PathEscape(relative.to_string()));
            }
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(AppError::from_io(err, &relative.to_string()));
            }
            // missing, or an ancestor is a plain file
            Err(_) => {
                candidate = match candidate.parent() {
                    Some(parent) => parent,
                    None => return Err(AppError::NotFound(relative.to_string())),
                };
            }
        }
    }
}

fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}
