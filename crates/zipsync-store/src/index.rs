//! Path-to-index cache for an open container session

use std::collections::BTreeMap;

use tracing::debug;
use zipsync_fs::AbsolutePath;

use crate::store::ContainerHandle;
use crate::{Error, Result};

/// Ordered map from container path to the codec's raw entry index.
///
/// Only meaningful while a session is open: raw indices are not stable
/// across sessions, so the owning [`Container`](crate::Container) clears it
/// whenever a session closes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryIndex {
    entries: BTreeMap<AbsolutePath, u64>,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear and repopulate from a full listing of `handle`.
    pub fn rebuild<H: ContainerHandle>(&mut self, handle: &H) -> Result<()> {
        self.entries.clear();
        for (name, index) in handle.list() {
            let path = AbsolutePath::from_native(&name)?;
            if self.entries.insert(path, index).is_some() {
                return Err(Error::invariant(format!(
                    "duplicate container entry '{}'",
                    name
                )));
            }
        }
        debug!(entries = self.entries.len(), "Rebuilt entry index");
        debug_assert!(self.verify(handle), "rebuilt index disagrees with handle");
        Ok(())
    }

    /// Check that the index describes exactly the live entries of `handle`.
    pub fn verify<H: ContainerHandle>(&self, handle: &H) -> bool {
        let listing = handle.list();
        if listing.len() != self.entries.len() {
            return false;
        }
        listing.iter().all(|(name, index)| {
            AbsolutePath::from_native(name)
                .ok()
                .and_then(|path| self.entries.get(&path))
                .is_some_and(|known| known == index)
        })
    }

    /// Move `old` to `new`, keeping its index. Returns `false` if `old` is absent.
    pub fn rename(&mut self, old: &AbsolutePath, new: AbsolutePath) -> bool {
        match self.entries.remove(old) {
            Some(index) => {
                self.entries.insert(new, index);
                true
            }
            None => false,
        }
    }

    pub fn insert(&mut self, path: AbsolutePath, index: u64) {
        self.entries.insert(path, index);
    }

    pub fn remove(&mut self, path: &AbsolutePath) -> Option<u64> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &AbsolutePath) -> Option<u64> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &AbsolutePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries at or below `dir`, in path order.
    pub fn under<'a>(&'a self, dir: &'a AbsolutePath) -> impl Iterator<Item = (&'a AbsolutePath, u64)> + 'a {
        self.entries
            .range(dir.clone()..)
            .take_while(move |(path, _)| path.starts_with(dir))
            .map(|(path, index)| (path, *index))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AbsolutePath, u64)> {
        self.entries.iter().map(|(path, index)| (path, *index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContainerStore, ZipStore};
    use chrono::Utc;

    fn p(s: &str) -> AbsolutePath {
        AbsolutePath::new(s).unwrap()
    }

    fn handle_with(names: &[&str]) -> crate::ZipHandle {
        let mut handle = ZipStore.open(&[]).unwrap();
        for name in names {
            handle.add_entry(name, Vec::new(), Utc::now()).unwrap();
        }
        handle
    }

    #[test]
    fn rebuild_matches_listing() {
        let handle = handle_with(&["a/", "a/b.txt", "c"]);
        let mut index = EntryIndex::new();
        index.rebuild(&handle).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.get(&p("/a/b.txt")), Some(1));
        assert!(index.verify(&handle));

        let all: Vec<(&str, u64)> = index.iter().map(|(path, i)| (path.as_str(), i)).collect();
        assert_eq!(all, vec![("/a/", 0), ("/a/b.txt", 1), ("/c", 2)]);
    }

    #[test]
    fn verify_detects_drift() {
        let mut handle = handle_with(&["a", "b"]);
        let mut index = EntryIndex::new();
        index.rebuild(&handle).unwrap();

        handle.delete_entry(0).unwrap();
        assert!(!index.verify(&handle));

        index.remove(&p("/a"));
        assert!(index.verify(&handle));

        index.insert(p("/b"), 7);
        assert!(!index.verify(&handle));
    }

    #[test]
    fn rename_preserves_index() {
        let handle = handle_with(&["a", "b"]);
        let mut index = EntryIndex::new();
        index.rebuild(&handle).unwrap();

        assert!(index.rename(&p("/b"), p("/z")));
        assert_eq!(index.get(&p("/z")), Some(1));
        assert!(!index.contains(&p("/b")));
        assert!(!index.rename(&p("/missing"), p("/y")));
    }

    #[test]
    fn under_stops_at_subtree_boundary() {
        let handle = handle_with(&["a/", "a/x", "a/y/", "ab", "b/"]);
        let mut index = EntryIndex::new();
        index.rebuild(&handle).unwrap();

        let dir = p("/a/");
        let found: Vec<&str> = index.under(&dir).map(|(path, _)| path.as_str()).collect();
        assert_eq!(found, vec!["/a/", "/a/x", "/a/y/"]);
    }
}
