//! [`TestTree`] builder for directory-tree test scenarios.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use zipsync_fs::filesystem::relative_to_slash;
use zipsync_fs::{EntryKind, FileSystem, LocalFileSystem};

/// A temporary directory with helpers for building and inspecting a tree.
///
/// # Example
///
/// ```rust,no_run
/// use zipsync_test_utils::TestTree;
///
/// let tree = TestTree::new();
/// tree.file("a/b.txt", "hi").dir("empty");
/// tree.assert_file_contains("a/b.txt", "hi");
/// ```
pub struct TestTree {
    temp_dir: TempDir,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `relative` inside the tree.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a file, creating parent directories as needed.
    pub fn file(&self, relative: &str, content: impl AsRef<[u8]>) -> &Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        self
    }

    /// Create a directory and any missing ancestors.
    pub fn dir(&self, relative: &str) -> &Self {
        fs::create_dir_all(self.path(relative)).unwrap();
        self
    }

    /// Set the modification time of an existing file or directory.
    pub fn set_mtime(&self, relative: &str, mtime: DateTime<Utc>) -> &Self {
        let path = self.path(relative);
        let file = if path.is_dir() {
            File::open(&path)
        } else {
            OpenOptions::new().write(true).open(&path)
        }
        .unwrap_or_else(|e| panic!("Could not open {}: {}", path.display(), e));
        file.set_modified(SystemTime::from(mtime)).unwrap();
        self
    }

    /// Every path below the root as `/`-separated relative names mapped to
    /// file contents. Directories end with `/` and map to `None`.
    pub fn snapshot(&self) -> BTreeMap<String, Option<Vec<u8>>> {
        let fs_ = LocalFileSystem::new();
        let mut tree = BTreeMap::new();
        for entry in fs_.walk(self.root()).unwrap() {
            let entry = entry.unwrap();
            let relative = relative_to_slash(self.root(), &entry.path).unwrap();
            match entry.metadata.kind {
                EntryKind::Directory => {
                    tree.insert(format!("{}/", relative), None);
                }
                _ => {
                    tree.insert(relative, Some(fs::read(&entry.path).unwrap()));
                }
            }
        }
        tree
    }

    /// Assert that `relative` exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, relative: &str) {
        let full_path = self.path(relative);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `relative` does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, relative: &str) {
        let full_path = self.path(relative);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `relative` contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, relative: &str, content: &str) {
        let full_path = self.path(relative);
        let file_content = fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()));
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            full_path.display(),
            content,
            file_content
        );
    }
}
