//! Session-based container adapter
//!
//! [`Container`] owns an encoded image and never keeps a codec handle open
//! between calls. Each public operation opens a session through the
//! [`ContainerStore`], works against the [`EntryIndex`], exports the new image
//! if it mutated anything, and closes the session. When the work fails the
//! handle is dropped unexported, so the image is exactly what it was before
//! the call.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use zipsync_fs::AbsolutePath;

use crate::index::EntryIndex;
use crate::store::{Compression, ContainerHandle, ContainerStore, EntryStat};
use crate::archive::ZipStore;
use crate::{Error, Result};

/// Byte transform applied to entry data on its way into or out of the container.
pub type Transform = Arc<dyn Fn(&AbsolutePath, &[u8]) -> Vec<u8> + Send + Sync>;

/// How [`Container::write_file`] treats an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The entry must not exist yet
    Create,
    /// The entry must already exist
    Replace,
}

/// Captured image plus the index that describes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    image: Vec<u8>,
    index: EntryIndex,
}

impl Snapshot {
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn index(&self) -> &EntryIndex {
        &self.index
    }
}

/// A zip (or other [`ContainerStore`]) image with path-level operations.
pub struct Container<S: ContainerStore = ZipStore> {
    store: S,
    image: Vec<u8>,
    index: EntryIndex,
    compression: Compression,
    encrypt_fn: Option<Transform>,
    decrypt_fn: Option<Transform>,
    encrypt: bool,
    decrypt: bool,
    checkpoint: Snapshot,
}

impl Container<ZipStore> {
    /// An empty zip container.
    pub fn new() -> Self {
        Self {
            store: ZipStore,
            image: Vec::new(),
            index: EntryIndex::new(),
            compression: Compression::default(),
            encrypt_fn: None,
            decrypt_fn: None,
            encrypt: false,
            decrypt: false,
            checkpoint: Snapshot::default(),
        }
    }

    /// Wrap an existing zip image. The image is decoded once to validate it.
    pub fn from_image(image: Vec<u8>) -> Result<Self> {
        Self::with_store(ZipStore, image)
    }
}

impl Default for Container<ZipStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ContainerStore> fmt::Debug for Container<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("image_len", &self.image.len())
            .field("compression", &self.compression)
            .field("encrypt", &(self.encrypt && self.encrypt_fn.is_some()))
            .field("decrypt", &(self.decrypt && self.decrypt_fn.is_some()))
            .finish()
    }
}

/// Open a handle, make sure the index describes it, run `f` and export on
/// success when `write` is set. The handle is dropped on every error path.
fn run_session<S, T, F>(
    store: &S,
    image: &[u8],
    index: &mut EntryIndex,
    write: bool,
    f: F,
) -> Result<(T, Option<Vec<u8>>)>
where
    S: ContainerStore,
    F: FnOnce(&mut S::Handle, &mut EntryIndex) -> Result<T>,
{
    let mut handle = store.open(image)?;
    if index.is_empty() {
        index.rebuild(&handle)?;
    } else {
        debug_assert!(index.verify(&handle), "restored index disagrees with image");
    }

    let value = f(&mut handle, index)?;
    let exported = if write { Some(handle.export()?) } else { None };
    Ok((value, exported))
}

/// Add a directory entry for every missing directory in `dirs`.
fn ensure_dirs<H: ContainerHandle>(
    handle: &mut H,
    index: &mut EntryIndex,
    dirs: Vec<AbsolutePath>,
    mtime: DateTime<Utc>,
) -> Result<usize> {
    let mut added = 0;
    for dir in dirs {
        if index.contains(&dir) {
            continue;
        }
        let raw = handle
            .add_entry(&dir.to_native(), Vec::new(), mtime)
            .map_err(|e| e.at(&dir))?;
        debug!(path = %dir, "Added directory entry");
        index.insert(dir, raw);
        added += 1;
    }
    Ok(added)
}

fn require_file(path: &AbsolutePath) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::usage(path, "expected a file path"))
    }
}

fn require_dir(path: &AbsolutePath) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::usage(path, "expected a directory path"))
    }
}

fn lookup(index: &EntryIndex, path: &AbsolutePath) -> Result<u64> {
    index
        .get(path)
        .ok_or_else(|| Error::usage(path, "no such entry"))
}

impl<S: ContainerStore> Container<S> {
    /// Wrap `image` using a custom store. The image is decoded once to validate it.
    pub fn with_store(store: S, image: Vec<u8>) -> Result<Self> {
        store.open(&image)?;
        Ok(Self {
            store,
            checkpoint: Snapshot {
                image: image.clone(),
                index: EntryIndex::new(),
            },
            image,
            index: EntryIndex::new(),
            compression: Compression::default(),
            encrypt_fn: None,
            decrypt_fn: None,
            encrypt: false,
            decrypt: false,
        })
    }

    fn with_session<T, F>(&mut self, write: bool, f: F) -> Result<T>
    where
        F: FnOnce(&mut S::Handle, &mut EntryIndex) -> Result<T>,
    {
        let outcome = run_session(&self.store, &self.image, &mut self.index, write, f);
        self.index.clear();
        let (value, exported) = outcome?;
        if let Some(image) = exported {
            self.image = image;
        }
        Ok(value)
    }

    fn active_encrypt(&self) -> Option<Transform> {
        self.encrypt.then(|| self.encrypt_fn.clone()).flatten()
    }

    fn active_decrypt(&self) -> Option<Transform> {
        self.decrypt.then(|| self.decrypt_fn.clone()).flatten()
    }

    // Queries

    /// Whether an entry exists at `path`. The root always exists.
    pub fn exists(&mut self, path: &AbsolutePath) -> Result<bool> {
        if path.is_root() {
            return Ok(true);
        }
        self.with_session(false, |_, index| Ok(index.contains(path)))
    }

    /// Metadata of the entry at `path`, or `None` if absent. The root has no entry.
    pub fn stat(&mut self, path: &AbsolutePath) -> Result<Option<EntryStat>> {
        if path.is_root() {
            return Ok(None);
        }
        self.with_session(false, |handle, index| match index.get(path) {
            Some(raw) => handle.stat_entry(raw).map(Some).map_err(|e| e.at(path)),
            None => Ok(None),
        })
    }

    pub fn num_entries(&mut self) -> Result<usize> {
        self.with_session(false, |_, index| Ok(index.len()))
    }

    /// Every entry at or under `dir` with its metadata, in path order.
    pub fn list(&mut self, dir: &AbsolutePath) -> Result<Vec<(AbsolutePath, EntryStat)>> {
        require_dir(dir)?;
        self.with_session(false, |handle, index| {
            index
                .under(dir)
                .map(|(path, raw)| {
                    let stat = handle.stat_entry(raw).map_err(|e| e.at(path))?;
                    Ok((path.clone(), stat))
                })
                .collect()
        })
    }

    /// Paths at or under `dir`, in path order.
    pub fn ls(&mut self, dir: &AbsolutePath) -> Result<Vec<AbsolutePath>> {
        require_dir(dir)?;
        self.with_session(false, |_, index| {
            Ok(index.under(dir).map(|(path, _)| path.clone()).collect())
        })
    }

    /// Contents of the file at `path`, passed through the decrypt transform when enabled.
    pub fn cat(&mut self, path: &AbsolutePath) -> Result<Vec<u8>> {
        require_file(path)?;
        let decrypt = self.active_decrypt();
        self.with_session(false, |handle, index| {
            let raw = lookup(index, path)?;
            let data = handle.read_entry(raw).map_err(|e| e.at(path))?;
            Ok(match decrypt {
                Some(transform) => transform(path, &data),
                None => data,
            })
        })
    }

    // Mutations

    /// Write a file entry, passing `data` through the encrypt transform when enabled.
    ///
    /// [`WriteMode::Create`] fails if the entry exists and adds any missing
    /// parent directories. [`WriteMode::Replace`] fails if it does not.
    pub fn write_file(
        &mut self,
        path: &AbsolutePath,
        data: &[u8],
        mtime: DateTime<Utc>,
        mode: WriteMode,
    ) -> Result<()> {
        require_file(path)?;
        let payload = match self.active_encrypt() {
            Some(transform) => transform(path, data),
            None => data.to_vec(),
        };
        let compression = self.compression;

        self.with_session(true, |handle, index| {
            let raw = match mode {
                WriteMode::Create => {
                    if index.contains(path) {
                        return Err(Error::usage(path, "entry already exists"));
                    }
                    ensure_dirs(handle, index, path.ancestors_inclusive(), mtime)?;
                    let raw = handle
                        .add_entry(&path.to_native(), payload, mtime)
                        .map_err(|e| e.at(path))?;
                    index.insert(path.clone(), raw);
                    raw
                }
                WriteMode::Replace => {
                    let raw = lookup(index, path)?;
                    handle
                        .replace_entry(raw, payload, mtime)
                        .map_err(|e| e.at(path))?;
                    raw
                }
            };
            handle
                .set_compression(raw, compression)
                .map_err(|e| e.at(path))?;
            debug!(path = %path, ?mode, "Wrote file entry");
            Ok(())
        })
    }

    /// Add a new file stamped with the current time.
    pub fn file_add(&mut self, path: &AbsolutePath, data: &[u8]) -> Result<()> {
        self.write_file(path, data, Utc::now(), WriteMode::Create)
    }

    /// Add or replace a file, stamped with the current time.
    pub fn file_add_replace(&mut self, path: &AbsolutePath, data: &[u8]) -> Result<()> {
        let mode = if self.exists(path)? {
            WriteMode::Replace
        } else {
            WriteMode::Create
        };
        self.write_file(path, data, Utc::now(), mode)
    }

    pub fn file_delete(&mut self, path: &AbsolutePath) -> Result<()> {
        require_file(path)?;
        self.with_session(true, |handle, index| {
            let raw = lookup(index, path)?;
            handle.delete_entry(raw).map_err(|e| e.at(path))?;
            index.remove(path);
            debug!(path = %path, "Deleted file entry");
            Ok(())
        })
    }

    /// Rename a file entry, adding missing parent directories of `new`.
    pub fn file_rename(&mut self, old: &AbsolutePath, new: &AbsolutePath) -> Result<()> {
        require_file(old)?;
        require_file(new)?;
        self.with_session(true, |handle, index| {
            let raw = lookup(index, old)?;
            if index.contains(new) {
                return Err(Error::usage(new, "entry already exists"));
            }
            ensure_dirs(handle, index, new.ancestors_inclusive(), Utc::now())?;
            handle
                .rename_entry(raw, &new.to_native())
                .map_err(|e| e.at(old))?;
            if !index.rename(old, new.clone()) {
                return Err(Error::invariant(format!(
                    "index lost '{}' while renaming to '{}'",
                    old, new
                )));
            }
            Ok(())
        })
    }

    /// Add a directory and every missing ancestor, stamped with the current time.
    pub fn dir_add(&mut self, path: &AbsolutePath) -> Result<()> {
        self.dir_add_at(path, Utc::now())
    }

    /// Add a directory and every missing ancestor. An existing directory is not an error.
    pub fn dir_add_at(&mut self, path: &AbsolutePath, mtime: DateTime<Utc>) -> Result<()> {
        require_dir(path)?;
        if path.is_root() {
            return Ok(());
        }
        self.with_session(true, |handle, index| {
            ensure_dirs(handle, index, path.ancestors_inclusive(), mtime).map(|_| ())
        })
    }

    /// Remove a directory and everything under it. Returns the number of
    /// entries removed. On the root this empties the container.
    pub fn dir_delete(&mut self, path: &AbsolutePath) -> Result<usize> {
        require_dir(path)?;
        self.with_session(true, |handle, index| {
            if !path.is_root() && !index.contains(path) {
                return Err(Error::usage(path, "no such entry"));
            }
            let doomed: Vec<(AbsolutePath, u64)> = index
                .under(path)
                .map(|(p, raw)| (p.clone(), raw))
                .collect();
            for (entry, raw) in &doomed {
                handle.delete_entry(*raw).map_err(|e| e.at(entry))?;
                index.remove(entry);
            }
            debug!(path = %path, removed = doomed.len(), "Deleted directory");
            Ok(doomed.len())
        })
    }

    /// Move a directory and everything under it to `new`.
    pub fn dir_rename(&mut self, old: &AbsolutePath, new: &AbsolutePath) -> Result<()> {
        require_dir(old)?;
        require_dir(new)?;
        if old.is_root() || new.is_root() {
            return Err(Error::usage(old, "the root cannot be renamed"));
        }
        if new.starts_with(old) {
            return Err(Error::usage(new, "cannot move a directory into itself"));
        }

        self.with_session(true, |handle, index| {
            if !index.contains(old) {
                return Err(Error::usage(old, "no such entry"));
            }
            let moves: Vec<(AbsolutePath, AbsolutePath, u64)> = index
                .under(old)
                .map(|(path, raw)| {
                    let suffix = path.strip_prefix(old).unwrap_or_default();
                    Ok((path.clone(), new.join(suffix)?, raw))
                })
                .collect::<Result<_>>()?;
            if let Some((_, target, _)) = moves.iter().find(|(_, target, _)| index.contains(target)) {
                return Err(Error::usage(target, "entry already exists"));
            }

            ensure_dirs(handle, index, new.parent().ancestors_inclusive(), Utc::now())?;
            for (from, to, raw) in moves {
                handle
                    .rename_entry(raw, &to.to_native())
                    .map_err(|e| e.at(&from))?;
                if !index.rename(&from, to) {
                    return Err(Error::invariant(format!(
                        "index lost '{}' during directory rename",
                        from
                    )));
                }
            }
            Ok(())
        })
    }

    pub fn set_mtime(&mut self, path: &AbsolutePath, mtime: DateTime<Utc>) -> Result<()> {
        self.with_session(true, |handle, index| {
            let raw = lookup(index, path)?;
            handle.set_mtime(raw, mtime).map_err(|e| e.at(path))
        })
    }

    // Settings

    /// Compression applied to entries written from now on.
    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn set_encrypt_fn(&mut self, transform: Option<Transform>) {
        self.encrypt_fn = transform;
    }

    pub fn set_decrypt_fn(&mut self, transform: Option<Transform>) {
        self.decrypt_fn = transform;
    }

    pub fn set_encrypt(&mut self, enabled: bool) {
        self.encrypt = enabled;
    }

    pub fn set_decrypt(&mut self, enabled: bool) {
        self.decrypt = enabled;
    }

    // Image API

    /// The current encoded image.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn into_image(self) -> Vec<u8> {
        self.image
    }

    /// Capture the current image together with a freshly built index.
    pub fn snapshot(&mut self) -> Result<Snapshot> {
        let index = self.with_session(false, |_, index| Ok(index.clone()))?;
        Ok(Snapshot {
            image: self.image.clone(),
            index,
        })
    }

    /// Put back a previously captured snapshot.
    pub fn restore(&mut self, snapshot: Snapshot) {
        debug!(image_len = snapshot.image.len(), "Restoring container snapshot");
        self.image = snapshot.image;
        self.index = snapshot.index;
    }

    /// Record the current image as the checkpoint.
    pub fn image_update(&mut self) -> Result<()> {
        self.checkpoint = self.snapshot()?;
        Ok(())
    }

    /// Whether the image differs from the last checkpoint.
    pub fn has_modifications(&self) -> bool {
        self.image != self.checkpoint.image
    }

    /// Discard everything since the last checkpoint.
    pub fn revert_to_image(&mut self) {
        self.restore(self.checkpoint.clone());
    }
}
