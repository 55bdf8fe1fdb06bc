//! Filesystem seam used by the sync engine
//!
//! [`FileSystem`] is the narrow set of operations the engine needs from the
//! host filesystem. [`LocalFileSystem`] implements it on top of `std::fs`.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Timelike, Utc};
use fs2::FileExt;
use serde::Serialize;
use tracing::debug;

use crate::{Error, Result};

/// What a filesystem path points at. Symlinks are not followed and count as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// Metadata for a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsMetadata {
    pub kind: EntryKind,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Modification time truncated to whole seconds
    pub mtime: DateTime<Utc>,
}

/// One item yielded by [`FileSystem::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub path: PathBuf,
    pub metadata: FsMetadata,
}

/// Lazy sequence of walked entries.
pub type WalkIter<'a> = Box<dyn Iterator<Item = Result<FsEntry>> + 'a>;

/// Operations the sync engine performs on the host filesystem.
pub trait FileSystem {
    /// Depth-first pre-order walk below `root`, children in name order.
    ///
    /// `root` itself is not yielded. The sequence cannot be restarted; call
    /// `walk` again to re-walk.
    fn walk(&self, root: &Path) -> Result<WalkIter<'_>>;

    fn read_all(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write `data` to `path`, creating missing parent directories.
    ///
    /// With `truncate == false` an existing target is an error.
    fn write_all(&self, path: &Path, data: &[u8], truncate: bool) -> Result<()>;

    fn set_mtime(&self, path: &Path, mtime: DateTime<Utc>) -> Result<()>;

    /// Create a directory and any missing ancestors.
    fn create_directory(&self, path: &Path) -> Result<()>;

    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Remove an empty directory.
    fn delete_directory(&self, path: &Path) -> Result<()>;

    /// Whether anything exists at `path`, without following symlinks.
    fn exists(&self, path: &Path) -> bool;

    /// Metadata for `path`, or `None` if nothing is there.
    fn stat(&self, path: &Path) -> Result<Option<FsMetadata>>;
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn truncate_to_seconds(time: SystemTime) -> DateTime<Utc> {
    let dt = DateTime::<Utc>::from(time);
    dt.with_nanosecond(0).unwrap_or(dt)
}

fn metadata_of(path: &Path, meta: &fs::Metadata) -> Result<FsMetadata> {
    let file_type = meta.file_type();
    let kind = if file_type.is_symlink() {
        EntryKind::Other
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };
    let modified = meta.modified().map_err(|e| Error::io(path, e))?;
    Ok(FsMetadata {
        kind,
        size: if kind == EntryKind::Directory { 0 } else { meta.len() },
        mtime: truncate_to_seconds(modified),
    })
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        children.push(entry.path());
    }
    children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(children)
}

/// Depth-first walker returned by [`LocalFileSystem::walk`].
struct Walk {
    stack: Vec<std::vec::IntoIter<PathBuf>>,
}

impl Iterator for Walk {
    type Item = Result<FsEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let Some(path) = top.next() else {
                self.stack.pop();
                continue;
            };

            let meta = match fs::symlink_metadata(&path) {
                Ok(meta) => meta,
                Err(e) => return Some(Err(Error::io(&path, e))),
            };
            let metadata = match metadata_of(&path, &meta) {
                Ok(metadata) => metadata,
                Err(e) => return Some(Err(e)),
            };
            if metadata.kind == EntryKind::Directory {
                match sorted_children(&path) {
                    Ok(children) => self.stack.push(children.into_iter()),
                    Err(e) => return Some(Err(e)),
                }
            }
            return Some(Ok(FsEntry { path, metadata }));
        }
    }
}

impl FileSystem for LocalFileSystem {
    fn walk(&self, root: &Path) -> Result<WalkIter<'_>> {
        match self.stat(root)? {
            Some(meta) if meta.kind == EntryKind::Directory => {}
            _ => {
                return Err(Error::NotADirectory {
                    path: root.to_path_buf(),
                });
            }
        }
        let children = sorted_children(root)?;
        Ok(Box::new(Walk {
            stack: vec![children.into_iter()],
        }))
    }

    fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| Error::io(path, e))
    }

    fn write_all(&self, path: &Path, data: &[u8], truncate: bool) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let mut options = OpenOptions::new();
        options.write(true);
        if truncate {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => Error::AlreadyExists {
                path: path.to_path_buf(),
            },
            _ => Error::io(path, e),
        })?;
        file.write_all(data).map_err(|e| Error::io(path, e))?;
        file.sync_all().map_err(|e| Error::io(path, e))?;
        debug!(path = %path.display(), bytes = data.len(), truncate, "Wrote file");
        Ok(())
    }

    fn set_mtime(&self, path: &Path, mtime: DateTime<Utc>) -> Result<()> {
        // Directories need a read handle; regular files need write access on some platforms.
        let file = if path.is_dir() {
            File::open(path)
        } else {
            OpenOptions::new().write(true).open(path)
        }
        .map_err(|e| Error::io(path, e))?;
        file.set_modified(SystemTime::from(mtime))
            .map_err(|e| Error::io(path, e))
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| Error::io(path, e))
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "Deleting file");
        fs::remove_file(path).map_err(|e| Error::io(path, e))
    }

    fn delete_directory(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "Deleting directory");
        fs::remove_dir(path).map_err(|e| Error::io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn stat(&self, path: &Path) -> Result<Option<FsMetadata>> {
        match fs::symlink_metadata(path) {
            Ok(meta) => metadata_of(path, &meta).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Replace `path` with `content` through a locked temp file in the same
/// directory, so readers see either the old or the new file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;
    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::io(path, e)
    })?;
    debug!(path = %path.display(), bytes = content.len(), "Wrote file atomically");
    Ok(())
}

/// Convert a path relative to a walk root into the `/`-separated form used
/// by container paths.
pub fn relative_to_slash(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| Error::PathUsage {
        path: path.display().to_string(),
        reason: format!("not below {}", root.display()),
    })?;
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| Error::NonUtf8 {
            path: path.to_path_buf(),
        })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}
