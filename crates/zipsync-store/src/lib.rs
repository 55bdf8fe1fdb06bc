//! Container side of zipsync
//!
//! The [`ContainerStore`] / [`ContainerHandle`] seam, its zip implementation
//! ([`ZipStore`]), the [`EntryIndex`] path cache and the session-based
//! [`Container`] adapter that the sync engine drives.

pub mod archive;
pub mod container;
pub mod error;
pub mod index;
pub mod store;

pub use archive::{ZipHandle, ZipStore};
pub use container::{Container, Snapshot, Transform, WriteMode};
pub use error::{Error, Result};
pub use index::EntryIndex;
pub use store::{Compression, CompressionMethod, ContainerHandle, ContainerStore, EntryStat};
