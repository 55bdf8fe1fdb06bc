//! Rollback scope for container-mutating commits

use std::ops::{Deref, DerefMut};

use tracing::warn;
use zipsync_store::{Container, ContainerStore, Snapshot};

use crate::Result;

/// Snapshot a container on creation and put it back on drop unless committed.
///
/// While the guard is alive the container is reachable only through it.
pub struct TransactionalGuard<'a, S: ContainerStore> {
    container: &'a mut Container<S>,
    snapshot: Option<Snapshot>,
}

impl<'a, S: ContainerStore> TransactionalGuard<'a, S> {
    pub fn begin(container: &'a mut Container<S>) -> Result<Self> {
        let snapshot = container.snapshot()?;
        Ok(Self {
            container,
            snapshot: Some(snapshot),
        })
    }

    /// Keep every change made through the guard.
    pub fn commit(mut self) {
        self.snapshot = None;
    }

    pub fn container(&mut self) -> &mut Container<S> {
        &mut *self.container
    }
}

impl<S: ContainerStore> Deref for TransactionalGuard<'_, S> {
    type Target = Container<S>;

    fn deref(&self) -> &Container<S> {
        &*self.container
    }
}

impl<S: ContainerStore> DerefMut for TransactionalGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut Container<S> {
        &mut *self.container
    }
}

impl<S: ContainerStore> Drop for TransactionalGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            warn!(
                image_len = snapshot.image().len(),
                "Rolling back container to snapshot"
            );
            self.container.restore(snapshot);
        }
    }
}
