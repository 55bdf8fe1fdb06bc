//! Container codec seam
//!
//! The [`Container`](crate::Container) adapter never talks to a codec
//! directly; it opens a [`ContainerHandle`] through a [`ContainerStore`] for
//! each operation and either exports or drops it.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Compression method applied to newly written entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionMethod {
    Stored,
    #[default]
    Deflated,
    Zstd,
}

/// Compression method plus optional level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Compression {
    pub method: CompressionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,
}

impl Compression {
    pub fn new(method: CompressionMethod, level: Option<i32>) -> Self {
        Self { method, level }
    }

    /// Levels the encoder accepts for this method. `Stored` takes none.
    pub fn level_range(&self) -> Option<RangeInclusive<i32>> {
        match self.method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflated => Some(0..=9),
            CompressionMethod::Zstd => Some(-(1 << 17)..=22),
        }
    }

    /// Whether the encoder would accept this method and level at export.
    pub fn is_supported(&self) -> bool {
        match (self.level, self.level_range()) {
            (None, _) => true,
            (Some(level), Some(range)) => range.contains(&level),
            (Some(_), None) => false,
        }
    }
}

/// Metadata the codec keeps for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStat {
    /// Uncompressed size
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub crc: u32,
    /// Stored size, known only for entries that came from an encoded image
    pub compressed_size: Option<u64>,
    pub compression: CompressionMethod,
}

/// Opens handles onto a container image.
pub trait ContainerStore {
    type Handle: ContainerHandle;

    /// Decode `image` into a handle. An empty image is an empty container.
    fn open(&self, image: &[u8]) -> Result<Self::Handle>;
}

/// One open session on a container.
///
/// Indices are stable for the lifetime of the handle. Dropping the handle
/// without calling [`export`](ContainerHandle::export) discards every change
/// made through it.
pub trait ContainerHandle {
    /// Live entries as (native name, index) pairs.
    fn list(&self) -> Vec<(String, u64)>;

    fn read_entry(&self, index: u64) -> Result<Vec<u8>>;

    /// Add an entry; directory names end with `/` and carry no data.
    fn add_entry(&mut self, name: &str, data: Vec<u8>, mtime: DateTime<Utc>) -> Result<u64>;

    fn replace_entry(&mut self, index: u64, data: Vec<u8>, mtime: DateTime<Utc>) -> Result<()>;

    fn delete_entry(&mut self, index: u64) -> Result<()>;

    fn rename_entry(&mut self, index: u64, name: &str) -> Result<()>;

    fn stat_entry(&self, index: u64) -> Result<EntryStat>;

    fn set_mtime(&mut self, index: u64, mtime: DateTime<Utc>) -> Result<()>;

    fn set_compression(&mut self, index: u64, compression: Compression) -> Result<()>;

    /// Close the session and encode the resulting image.
    fn export(self) -> Result<Vec<u8>>;
}
