//! [`FlakyStore`]: failure injection for rollback tests.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use zipsync_store::{
    Compression, ContainerHandle, ContainerStore, EntryStat, Error, Result, ZipStore,
};

/// Wraps a store and fails the `fail_at`-th file write (1-based).
///
/// Adds and replaces of file entries are counted across every session opened
/// through the store and its clones; directory entries are not counted.
#[derive(Debug, Clone)]
pub struct FlakyStore<S: ContainerStore = ZipStore> {
    inner: S,
    fail_at: usize,
    writes: Rc<Cell<usize>>,
}

impl FlakyStore<ZipStore> {
    pub fn new(fail_at: usize) -> Self {
        Self::wrap(ZipStore, fail_at)
    }
}

impl<S: ContainerStore> FlakyStore<S> {
    pub fn wrap(inner: S, fail_at: usize) -> Self {
        Self {
            inner,
            fail_at,
            writes: Rc::new(Cell::new(0)),
        }
    }

    /// File writes attempted so far, including the failed one.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl<S: ContainerStore> ContainerStore for FlakyStore<S> {
    type Handle = FlakyHandle<S::Handle>;

    fn open(&self, image: &[u8]) -> Result<Self::Handle> {
        Ok(FlakyHandle {
            inner: self.inner.open(image)?,
            fail_at: self.fail_at,
            writes: Rc::clone(&self.writes),
        })
    }
}

/// Handle produced by [`FlakyStore`].
pub struct FlakyHandle<H> {
    inner: H,
    fail_at: usize,
    writes: Rc<Cell<usize>>,
}

impl<H> FlakyHandle<H> {
    fn count_write(&self) -> Result<()> {
        let n = self.writes.get() + 1;
        self.writes.set(n);
        if n == self.fail_at {
            return Err(Error::codec(format!("injected failure on write #{}", n)));
        }
        Ok(())
    }
}

impl<H: ContainerHandle> ContainerHandle for FlakyHandle<H> {
    fn list(&self) -> Vec<(String, u64)> {
        self.inner.list()
    }

    fn read_entry(&self, index: u64) -> Result<Vec<u8>> {
        self.inner.read_entry(index)
    }

    fn add_entry(&mut self, name: &str, data: Vec<u8>, mtime: DateTime<Utc>) -> Result<u64> {
        if !name.ends_with('/') {
            self.count_write()?;
        }
        self.inner.add_entry(name, data, mtime)
    }

    fn replace_entry(&mut self, index: u64, data: Vec<u8>, mtime: DateTime<Utc>) -> Result<()> {
        self.count_write()?;
        self.inner.replace_entry(index, data, mtime)
    }

    fn delete_entry(&mut self, index: u64) -> Result<()> {
        self.inner.delete_entry(index)
    }

    fn rename_entry(&mut self, index: u64, name: &str) -> Result<()> {
        self.inner.rename_entry(index, name)
    }

    fn stat_entry(&self, index: u64) -> Result<EntryStat> {
        self.inner.stat_entry(index)
    }

    fn set_mtime(&mut self, index: u64, mtime: DateTime<Utc>) -> Result<()> {
        self.inner.set_mtime(index, mtime)
    }

    fn set_compression(&mut self, index: u64, compression: Compression) -> Result<()> {
        self.inner.set_compression(index, compression)
    }

    fn export(self) -> Result<Vec<u8>> {
        self.inner.export()
    }
}
