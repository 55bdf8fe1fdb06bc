//! Path model and filesystem abstraction for zipsync
//!
//! Provides the normalized [`AbsolutePath`] used for container entries and the
//! [`FileSystem`] seam the sync engine drives.

pub mod config;
pub mod error;
pub mod filesystem;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use filesystem::{EntryKind, FileSystem, FsEntry, FsMetadata, LocalFileSystem, WalkIter};
pub use path::{AbsolutePath, PathKind};
