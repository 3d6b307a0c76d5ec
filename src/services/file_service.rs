use crate::error::AppError;
use crate::models::file_entry::{sort_entries, FileEntry};
use crate::scope_path::{ensure_contained, RelativePath};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory under the root where uploads are assembled before being
/// renamed into place. Never listed and not addressable by clients.
pub const STAGING_DIR: &str = ".filedeck-staging";

/// A file read back out of the store for download.
#[derive(Debug)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Filesystem access confined to a single storage root.
///
/// The root is canonicalized once on open; every operation resolves its
/// relative path against it and checks containment before touching disk.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| AppError::from_io(e, ""))?;
        let root = root.canonicalize().map_err(|e| AppError::from_io(e, ""))?;
        let store = Self { root };
        store.initialize()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures the storage root exists. Idempotent.
    pub fn initialize(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(|e| AppError::from_io(e, ""))?;
        tracing::debug!(root = %self.root.display(), "storage root ready");
        Ok(())
    }

    fn resolve(&self, relative: &RelativePath) -> Result<PathBuf, AppError> {
        if relative.first_segment() == Some(STAGING_DIR) {
            return Err(AppError::NotFound(relative.to_string()));
        }
        let target = relative.to_fs_path(&self.root);
        ensure_contained(&self.root, &target, relative)?;
        Ok(target)
    }

    fn metadata(&self, relative: &RelativePath) -> Result<(PathBuf, fs::Metadata), AppError> {
        let target = self.resolve(relative)?;
        let metadata =
            fs::metadata(&target).map_err(|e| AppError::from_io(e, &relative.to_string()))?;
        Ok((target, metadata))
    }

    pub fn list(&self, relative: &RelativePath) -> Result<Vec<FileEntry>, AppError> {
        let (dir, metadata) = self.metadata(relative)?;
        if !metadata.is_dir() {
            return Err(AppError::NotADirectory(relative.to_string()));
        }

        let mut entries = Vec::new();
        let read_dir =
            fs::read_dir(&dir).map_err(|e| AppError::from_io(e, &relative.to_string()))?;
        for entry in read_dir {
            let entry = entry.map_err(|e| AppError::from_io(e, &relative.to_string()))?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(
                        parent = %relative,
                        name = ?raw,
                        "non-UTF-8 entry name, skipping"
                    );
                    continue;
                }
            };
            if relative.is_root() && name == STAGING_DIR {
                continue;
            }
            let Ok(child) = relative.join(&name) else {
                tracing::warn!(parent = %relative, %name, "unaddressable entry name, skipping");
                continue;
            };

            let metadata = match fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(path = %child, "entry vanished during listing, skipping");
                    continue;
                }
                Err(err) => return Err(AppError::from_io(err, &child.to_string())),
            };

            entries.push(FileEntry::from_metadata(&child, &metadata));
        }

        sort_entries(&mut entries);
        tracing::debug!(path = %relative, count = entries.len(), "listed directory");
        Ok(entries)
    }

    pub fn stat(&self, relative: &RelativePath) -> Result<FileEntry, AppError> {
        let (_, metadata) = self.metadata(relative)?;
        Ok(FileEntry::from_metadata(relative, &metadata))
    }

    pub fn create_directory(&self, relative: &RelativePath) -> Result<(), AppError> {
        if relative.is_root() {
            return Err(AppError::InvalidName("name is empty".to_string()));
        }
        let target = self.resolve(relative)?;
        if target.exists() && !target.is_dir() {
            return Err(AppError::NotADirectory(relative.to_string()));
        }
        fs::create_dir_all(&target).map_err(|e| AppError::from_io(e, &relative.to_string()))?;
        tracing::debug!(path = %relative, "created directory");
        Ok(())
    }

    /// Removes a file, or a directory with everything under it. Irreversible.
    pub fn delete(&self, relative: &RelativePath) -> Result<(), AppError> {
        if relative.is_root() {
            return Err(AppError::InvalidName(
                "storage root cannot be deleted".to_string(),
            ));
        }
        let target = self.resolve(relative)?;
        let metadata = fs::symlink_metadata(&target)
            .map_err(|e| AppError::from_io(e, &relative.to_string()))?;

        if metadata.is_dir() {
            self.remove_tree(&target, relative)?;
        } else {
            fs::remove_file(&target).map_err(|e| AppError::from_io(e, &relative.to_string()))?;
        }
        tracing::info!(path = %relative, directory = metadata.is_dir(), "deleted");
        Ok(())
    }

    // Children go before their parents. The first failure stops the walk and
    // is reported with the entry it concerns; whatever was removed stays removed.
    fn remove_tree(&self, dir: &Path, relative: &RelativePath) -> Result<(), AppError> {
        for entry in WalkDir::new(dir).contents_first(true) {
            let entry = entry.map_err(|e| {
                let shown = self.display_relative(e.path().unwrap_or(dir), relative);
                match e.into_io_error() {
                    Some(io) => AppError::from_io(io, &shown),
                    None => AppError::General(format!("cannot walk {shown}")),
                }
            })?;
            let removed = if entry.file_type().is_dir() {
                fs::remove_dir(entry.path())
            } else {
                fs::remove_file(entry.path())
            };
            removed.map_err(|e| {
                AppError::from_io(e, &self.display_relative(entry.path(), relative))
            })?;
        }
        Ok(())
    }

    fn display_relative(&self, path: &Path, fallback: &RelativePath) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| fallback.to_string())
    }

    pub fn read_file(&self, relative: &RelativePath) -> Result<Download, AppError> {
        let (target, metadata) = self.metadata(relative)?;
        if !metadata.is_file() {
            return Err(AppError::NotAFile(relative.to_string()));
        }
        let bytes = fs::read(&target).map_err(|e| AppError::from_io(e, &relative.to_string()))?;
        let file_name = relative.file_name().unwrap_or_default().to_string();
        Ok(Download { file_name, bytes })
    }

    /// Writes `bytes` to the target, creating missing parent directories and
    /// replacing any existing file. The data lands in the staging directory
    /// first and is renamed into place.
    pub fn write_file(
        &self,
        relative: &RelativePath,
        bytes: &[u8],
    ) -> Result<FileEntry, AppError> {
        let Some(parent) = relative.parent() else {
            return Err(AppError::InvalidName("file name is empty".to_string()));
        };
        let parent_dir = self.resolve(&parent)?;
        let target = self.resolve(relative)?;

        if parent_dir.exists() && !parent_dir.is_dir() {
            return Err(AppError::NotADirectory(parent.to_string()));
        }
        if target.is_dir() {
            return Err(AppError::NotAFile(relative.to_string()));
        }
        fs::create_dir_all(&parent_dir).map_err(|e| AppError::from_io(e, &parent.to_string()))?;

        let staging_dir = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging_dir).map_err(|e| AppError::from_io(e, STAGING_DIR))?;
        let staging = staging_dir.join(format!("{}.part", uuid::Uuid::new_v4()));
        let written = fs::File::create(&staging)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&staging, &target));
        if let Err(err) = written {
            let _ = fs::remove_file(&staging);
            return Err(AppError::from_io(err, &relative.to_string()));
        }

        tracing::debug!(path = %relative, size = bytes.len(), "wrote file");
        self.stat(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, DirectoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(dir.path().join("server-files")).unwrap();
        (dir, store)
    }

    fn rel(path: &str) -> RelativePath {
        RelativePath::parse(path).unwrap()
    }

    #[test]
    fn open_creates_missing_root_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/storage");
        let store = DirectoryStore::open(&root).unwrap();
        assert!(root.is_dir());
        store.initialize().unwrap();
        DirectoryStore::open(&root).unwrap();
    }

    #[test]
    fn empty_root_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list(&RelativePath::root()).unwrap().is_empty());
    }

    #[test]
    fn list_orders_directories_first_then_by_name() {
        let (_dir, store) = store();
        store.write_file(&rel("b.txt"), b"b").unwrap();
        store.write_file(&rel("A.txt"), b"a").unwrap();
        store.create_directory(&rel("zeta")).unwrap();
        store.create_directory(&rel("alpha")).unwrap();

        let first = store.list(&RelativePath::root()).unwrap();
        let names: Vec<&str> = first.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta", "A.txt", "b.txt"]);

        let second = store.list(&RelativePath::root()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn list_is_one_level_with_relative_paths() {
        let (_dir, store) = store();
        store.write_file(&rel("docs/deep/inner.txt"), b"x").unwrap();

        let entries = store.list(&rel("docs")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "deep");
        assert_eq!(entries[0].path, "docs/deep");
        assert!(entries[0].is_directory);
        assert_eq!(entries[0].size, 0);
    }

    #[test]
    fn list_missing_and_file_targets_fail() {
        let (_dir, store) = store();
        store.write_file(&rel("note.txt"), b"hi").unwrap();
        assert!(matches!(store.list(&rel("nope")), Err(AppError::NotFound(_))));
        assert!(matches!(
            store.list(&rel("note.txt")),
            Err(AppError::NotADirectory(_))
        ));
    }

    #[test]
    fn paths_below_a_file_are_not_found() {
        let (_dir, store) = store();
        store.write_file(&rel("a"), b"plain file").unwrap();
        assert!(matches!(store.stat(&rel("a/x.txt")), Err(AppError::NotFound(_))));
        assert!(matches!(store.list(&rel("a/x")), Err(AppError::NotFound(_))));
        assert!(matches!(store.read_file(&rel("a/x.txt")), Err(AppError::NotFound(_))));
        assert!(matches!(store.delete(&rel("a/x.txt")), Err(AppError::NotFound(_))));
    }

    #[test]
    fn long_file_names_can_be_written() {
        let (_dir, store) = store();
        let name = "a".repeat(230);
        let path = rel(&format!("sub/{name}"));

        let entry = store.write_file(&path, b"hello").unwrap();
        assert_eq!(entry.name, name);
        assert_eq!(store.read_file(&path).unwrap().bytes, b"hello");
    }

    #[test]
    fn staging_area_is_hidden_from_clients() {
        let (_dir, store) = store();
        store.write_file(&rel("kept.txt"), b"x").unwrap();
        // leftover from an interrupted write
        std::fs::write(store.root().join(STAGING_DIR).join("stale.part"), b"partial").unwrap();

        let names: Vec<String> = store
            .list(&RelativePath::root())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["kept.txt".to_string()]);

        let staging = rel(STAGING_DIR);
        assert!(matches!(store.stat(&staging), Err(AppError::NotFound(_))));
        assert!(matches!(store.delete(&staging), Err(AppError::NotFound(_))));
        assert!(matches!(
            store.read_file(&rel(&format!("{STAGING_DIR}/stale.part"))),
            Err(AppError::NotFound(_))
        ));
        assert!(store.root().join(STAGING_DIR).join("stale.part").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_left_out_of_listings() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_dir, store) = store();
        std::fs::write(store.root().join(OsStr::from_bytes(b"bad\xff.txt")), b"x").unwrap();
        store.write_file(&rel("good.txt"), b"y").unwrap();

        let entries = store.list(&RelativePath::root()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "good.txt");
    }

    #[test]
    fn create_directory_is_recursive_and_idempotent() {
        let (_dir, store) = store();
        store.create_directory(&rel("a/b/c")).unwrap();
        store.create_directory(&rel("a/b/c")).unwrap();
        assert!(store.stat(&rel("a/b/c")).unwrap().is_directory);
        assert!(store.stat(&rel("a/b")).unwrap().is_directory);
    }

    #[test]
    fn create_directory_rejects_root_and_existing_file() {
        let (_dir, store) = store();
        store.write_file(&rel("taken"), b"").unwrap();
        assert!(matches!(
            store.create_directory(&RelativePath::root()),
            Err(AppError::InvalidName(_))
        ));
        assert!(matches!(
            store.create_directory(&rel("taken")),
            Err(AppError::NotADirectory(_))
        ));
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, store) = store();
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let entry = store.write_file(&rel("bin/blob.dat"), &bytes).unwrap();
        assert_eq!(entry.size, 4096);
        assert_eq!(entry.path, "bin/blob.dat");

        let download = store.read_file(&rel("bin/blob.dat")).unwrap();
        assert_eq!(download.bytes, bytes);
        assert_eq!(download.file_name, "blob.dat");
        assert_eq!(store.stat(&rel("bin/blob.dat")).unwrap().size, 4096);
    }

    #[test]
    fn write_overwrites_and_leaves_no_staging_files() {
        let (_dir, store) = store();
        store.write_file(&rel("f.txt"), b"first version").unwrap();
        store.write_file(&rel("f.txt"), b"second").unwrap();
        assert_eq!(store.read_file(&rel("f.txt")).unwrap().bytes, b"second");

        let names: Vec<String> = store
            .list(&RelativePath::root())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["f.txt".to_string()]);
        let leftovers = std::fs::read_dir(store.root().join(STAGING_DIR)).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn write_onto_directory_fails() {
        let (_dir, store) = store();
        store.create_directory(&rel("d")).unwrap();
        assert!(matches!(
            store.write_file(&rel("d"), b"x"),
            Err(AppError::NotAFile(_))
        ));
        assert!(matches!(
            store.write_file(&RelativePath::root(), b"x"),
            Err(AppError::InvalidName(_))
        ));
    }

    #[test]
    fn read_file_rejects_directories_and_missing() {
        let (_dir, store) = store();
        store.create_directory(&rel("d")).unwrap();
        assert!(matches!(store.read_file(&rel("d")), Err(AppError::NotAFile(_))));
        assert!(matches!(
            store.read_file(&rel("ghost.txt")),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn delete_directory_removes_descendants() {
        let (_dir, store) = store();
        store.write_file(&rel("a/x.txt"), b"0123456789").unwrap();
        store.write_file(&rel("a/b/y.txt"), b"y").unwrap();
        store.create_directory(&rel("a/empty")).unwrap();
        store.create_directory(&rel("keep")).unwrap();

        store.delete(&rel("a")).unwrap();

        let names: Vec<String> = store
            .list(&RelativePath::root())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["keep".to_string()]);
        assert!(matches!(store.stat(&rel("a/x.txt")), Err(AppError::NotFound(_))));
        assert!(matches!(store.stat(&rel("a/b/y.txt")), Err(AppError::NotFound(_))));
    }

    #[test]
    fn delete_file_and_missing() {
        let (_dir, store) = store();
        store.write_file(&rel("gone.txt"), b"bye").unwrap();
        store.delete(&rel("gone.txt")).unwrap();
        assert!(matches!(store.delete(&rel("gone.txt")), Err(AppError::NotFound(_))));
        assert!(matches!(
            store.delete(&RelativePath::root()),
            Err(AppError::InvalidName(_))
        ));
        assert!(store.root().is_dir());
    }

    #[test]
    fn scenario_create_upload_delete() {
        let (_dir, store) = store();
        assert!(store.list(&RelativePath::root()).unwrap().is_empty());

        store.create_directory(&rel("a")).unwrap();
        let root = store.list(&RelativePath::root()).unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "a");
        assert!(root[0].is_directory);

        store.write_file(&rel("a/x.txt"), b"0123456789").unwrap();
        let inner = store.list(&rel("a")).unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].name, "x.txt");
        assert!(!inner[0].is_directory);
        assert_eq!(inner[0].size, 10);

        store.delete(&rel("a")).unwrap();
        assert!(store.list(&RelativePath::root()).unwrap().is_empty());
        assert!(matches!(store.stat(&rel("a/x.txt")), Err(AppError::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_escape_is_refused_everywhere() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"top secret").unwrap();
        let (_dir, store) = store();
        std::os::unix::fs::symlink(outside.path(), store.root().join("link")).unwrap();

        let secret = rel("link/secret.txt");
        assert!(matches!(store.read_file(&secret), Err(AppError::PathEscape(_))));
        assert!(matches!(store.stat(&secret), Err(AppError::PathEscape(_))));
        assert!(matches!(store.delete(&secret), Err(AppError::PathEscape(_))));
        assert!(matches!(
            store.write_file(&rel("link/new.txt"), b"x"),
            Err(AppError::PathEscape(_))
        ));
        assert!(matches!(
            store.create_directory(&rel("link/dir")),
            Err(AppError::PathEscape(_))
        ));
        assert!(outside.path().join("secret.txt").exists());
        assert!(!outside.path().join("new.txt").exists());
    }
}
