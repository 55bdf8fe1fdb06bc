//! Absolute container path handling

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SEP: char = '/';

/// Shape of an [`AbsolutePath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    Root,
    Directory,
    File,
}

/// A normalized absolute path inside a container.
///
/// The internal representation always starts with a single `/`, uses forward
/// slashes only and carries no `.` or `..` segments. A trailing `/` marks a
/// directory, its absence a file; `/` alone is the root.
///
/// Equality and ordering compare the normalized string byte for byte, so a
/// sorted collection of paths lists every directory before its contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AbsolutePath {
    inner: String,
}

impl AbsolutePath {
    /// Parse and normalize an absolute path.
    ///
    /// Backslashes are accepted as separators and converted. Empty and `.`
    /// segments are dropped, `..` pops the previous segment and never climbs
    /// above the root.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        if !raw.starts_with(['/', '\\']) {
            return Err(Error::invalid(raw, "path must be absolute and start with '/'"));
        }
        if raw.contains('\0') {
            return Err(Error::invalid(raw, "path contains a NUL byte"));
        }

        let unified = raw.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        let mut last_raw = "";
        for segment in unified.split(SEP) {
            last_raw = segment;
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }

        let is_dir = unified.ends_with(SEP) || last_raw == "." || last_raw == "..";
        Ok(Self::from_segments(&segments, is_dir))
    }

    /// The root path `/`.
    pub fn root() -> Self {
        Self {
            inner: SEP.to_string(),
        }
    }

    fn from_segments(segments: &[&str], is_dir: bool) -> Self {
        if segments.is_empty() {
            return Self::root();
        }
        let mut inner = String::with_capacity(segments.iter().map(|s| s.len() + 1).sum::<usize>() + 1);
        for segment in segments {
            inner.push(SEP);
            inner.push_str(segment);
        }
        if is_dir {
            inner.push(SEP);
        }
        Self { inner }
    }

    /// Build a path from a container-native entry name (no leading separator).
    pub fn from_native(name: &str) -> Result<Self> {
        let path = Self::new(format!("/{}", name))?;
        if path.to_native() != name {
            return Err(Error::invalid(name, "entry name is not in normalized form"));
        }
        Ok(path)
    }

    /// The container-native entry name: no leading separator, directories
    /// keep their trailing one. The root maps to the empty string.
    pub fn to_native(&self) -> String {
        self.inner[1..].to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn kind(&self) -> PathKind {
        if self.inner.len() == 1 {
            PathKind::Root
        } else if self.inner.ends_with(SEP) {
            PathKind::Directory
        } else {
            PathKind::File
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind() == PathKind::Root
    }

    /// True for directory paths and for the root, which is directory-shaped.
    pub fn is_dir(&self) -> bool {
        self.kind() != PathKind::File
    }

    pub fn is_file(&self) -> bool {
        self.kind() == PathKind::File
    }

    /// Directory form of this path.
    pub fn to_dir(&self) -> Self {
        if self.is_dir() {
            return self.clone();
        }
        Self {
            inner: format!("{}{}", self.inner, SEP),
        }
    }

    /// File form of this path. The root has no file form and is returned unchanged.
    pub fn to_file(&self) -> Self {
        match self.kind() {
            PathKind::Directory => Self {
                inner: self.inner[..self.inner.len() - 1].to_string(),
            },
            _ => self.clone(),
        }
    }

    /// Ordered path components, without separators.
    pub fn segments(&self) -> Vec<&str> {
        self.inner.split(SEP).filter(|s| !s.is_empty()).collect()
    }

    /// Last component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last().copied()
    }

    /// The enclosing directory. The parent of the root is the root.
    pub fn parent(&self) -> Self {
        let segments = self.segments();
        match segments.split_last() {
            Some((_, rest)) => Self::from_segments(rest, true),
            None => Self::root(),
        }
    }

    /// Every directory from the root down to (and including) this path's
    /// directory form, root excluded.
    pub fn ancestors_inclusive(&self) -> Vec<Self> {
        let segments = self.segments();
        let depth = if self.is_file() {
            segments.len().saturating_sub(1)
        } else {
            segments.len()
        };
        (1..=depth)
            .map(|n| Self::from_segments(&segments[..n], true))
            .collect()
    }

    /// Append a relative suffix to a directory path.
    ///
    /// Appending to a file path, or appending an absolute suffix, is a usage
    /// error. An empty suffix yields the same path.
    pub fn join(&self, relative: &str) -> Result<Self> {
        if relative.is_empty() {
            return Ok(self.clone());
        }
        if self.is_file() {
            return Err(Error::usage(
                self.as_str(),
                format!("cannot append '{}' to a file path", relative),
            ));
        }
        if relative.starts_with(['/', '\\']) {
            return Err(Error::usage(
                self.as_str(),
                format!("appended path '{}' is not relative", relative),
            ));
        }
        Self::new(format!("{}{}", self.inner, relative))
    }

    /// Whether `self` equals `dir` or lies beneath it. `dir` must be a directory.
    pub fn starts_with(&self, dir: &AbsolutePath) -> bool {
        dir.is_dir() && self.inner.starts_with(dir.as_str())
    }

    /// The part of this path below `dir`, if this path lies beneath it.
    pub fn strip_prefix(&self, dir: &AbsolutePath) -> Option<&str> {
        if !self.starts_with(dir) {
            return None;
        }
        Some(&self.inner[dir.inner.len()..])
    }
}

impl std::fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::str::FromStr for AbsolutePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for AbsolutePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for AbsolutePath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<AbsolutePath> for String {
    fn from(p: AbsolutePath) -> Self {
        p.inner
    }
}

impl AsRef<str> for AbsolutePath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}
