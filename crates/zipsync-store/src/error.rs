//! Error types for zipsync-store

use zipsync_fs::AbsolutePath;

/// Result type for zipsync-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while operating on a container
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller asked for something the path shape or container state forbids
    #[error("Usage error at {path}: {message}")]
    Usage { path: AbsolutePath, message: String },

    /// The codec reported a failure; no container path is attached yet
    #[error("Codec error: {message}")]
    Codec { message: String },

    /// A codec failure attributed to a container path
    #[error("Container error at {path}: {message}")]
    Store { path: AbsolutePath, message: String },

    /// An internal consistency check failed
    #[error("Invariant violated: {message}")]
    Invariant { message: String },

    #[error(transparent)]
    Path(#[from] zipsync_fs::Error),
}

impl Error {
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    pub fn usage(path: &AbsolutePath, message: impl Into<String>) -> Self {
        Self::Usage {
            path: path.clone(),
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Attach a container path to a bare codec error.
    pub fn at(self, path: &AbsolutePath) -> Self {
        match self {
            Self::Codec { message } => Self::Store {
                path: path.clone(),
                message,
            },
            other => other,
        }
    }

    /// The container path this error refers to, if any.
    pub fn container_path(&self) -> Option<&AbsolutePath> {
        match self {
            Self::Usage { path, .. } | Self::Store { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::codec(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::codec(err.to_string())
    }
}
