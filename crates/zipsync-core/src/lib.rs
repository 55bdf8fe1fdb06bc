//! Synchronization engine between zip containers and directory trees
//!
//! This crate provides:
//!
//! - **QueryEngine**: pure per-path classification ([`classify`]) under an
//!   [`OverwritePolicy`] and an [`OrphanPolicy`]
//! - **Plans**: the ordered [`ResultSet`] a query produces and a commit consumes
//! - **SyncEngine**: query, commit, pull and extract over a [`Container`] and a
//!   [`FileSystem`](zipsync_fs::FileSystem)
//! - **TransactionalGuard**: snapshot and rollback around container-mutating commits
//!
//! # Architecture
//!
//! ```text
//!                 zipsync-core
//!                      |
//!            +---------+---------+
//!            |                   |
//!      zipsync-store        zipsync-fs
//!            |
//!      zipsync-fs
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use zipsync_core::{AbsolutePath, Container, SyncEngine};
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = SyncEngine::local(Container::new());
//!     let plan = engine.query_pull(&AbsolutePath::root(), Path::new("./site"))?;
//!     println!("{}", plan);
//!     engine.commit(&plan)?;
//!     std::fs::write("site.zip", engine.container().image())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod logging;
pub mod plan;
pub mod query;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{Error, ErrorKind, Result};
pub use guard::TransactionalGuard;
pub use plan::{PlanEntry, ResultSet};
pub use query::{
    Candidate, Direction, OrphanPolicy, OverwritePolicy, QueryResult, SyncOptions, classify,
};

pub use zipsync_fs::AbsolutePath;
pub use zipsync_store::{Compression, CompressionMethod, Container};
