//! Error types for zipsync-fs

use std::path::PathBuf;

/// Result type for zipsync-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in zipsync-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A string could not be turned into an [`AbsolutePath`](crate::AbsolutePath)
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A path operation was applied to a path of the wrong shape
    #[error("Path usage error on '{path}': {reason}")]
    PathUsage { path: String, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Target already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("Failed to lock {path}")]
    LockFailed { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Path is not valid UTF-8: {path}")]
    NonUtf8 { path: PathBuf },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Failed to serialize {format} config for {path}: {message}")]
    ConfigSerialize {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn usage(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathUsage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error was caused by the caller passing a malformed or
    /// wrongly shaped path, as opposed to an environment failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::InvalidPath { .. } | Self::PathUsage { .. })
    }

    /// The filesystem path this error refers to, if any.
    pub fn fs_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. }
            | Self::AlreadyExists { path }
            | Self::NotADirectory { path }
            | Self::NonUtf8 { path }
            | Self::ConfigParse { path, .. }
            | Self::ConfigSerialize { path, .. } => Some(path),
            _ => None,
        }
    }
}
