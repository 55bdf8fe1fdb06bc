//! Error types for zipsync-core

/// Result type for zipsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad path shape or violated precondition; raised before anything is mutated
    Usage,
    /// The container codec or the filesystem failed
    Store,
    /// Internal bookkeeping disagreed with itself
    Invariant,
}

/// Errors that can occur in zipsync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A sync call was given arguments it cannot work with
    #[error("Usage error: {message}")]
    Usage { message: String },

    /// Internal consistency check failed
    #[error("Invariant violated: {message}")]
    Invariant { message: String },

    /// Logging could not be initialized
    #[error("Failed to initialize logging: {message}")]
    Logging { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem or path error from zipsync-fs
    #[error(transparent)]
    Fs(#[from] zipsync_fs::Error),

    /// Container error from zipsync-store
    #[error(transparent)]
    Store(#[from] zipsync_store::Error),
}

impl Error {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Classify this error as usage, store or invariant.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage { .. } => ErrorKind::Usage,
            Self::Invariant { .. } => ErrorKind::Invariant,
            Self::Logging { .. } => ErrorKind::Store,
            Self::Fs(e) if e.is_usage() => ErrorKind::Usage,
            Self::Fs(_) => ErrorKind::Store,
            Self::Store(e) => match e {
                zipsync_store::Error::Usage { .. } => ErrorKind::Usage,
                zipsync_store::Error::Invariant { .. } => ErrorKind::Invariant,
                zipsync_store::Error::Path(inner) if inner.is_usage() => ErrorKind::Usage,
                _ => ErrorKind::Store,
            },
        }
    }
}
