//! Query/commit synchronization between a container and a directory tree
//!
//! A sync call is split in two. [`SyncEngine::query`] inspects both sides and
//! returns a [`ResultSet`] without changing either. [`SyncEngine::commit`]
//! applies a previously computed plan as-is, never re-classifying. The
//! one-shot [`SyncEngine::pull`] and [`SyncEngine::extract`] do both.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use zipsync_fs::filesystem::relative_to_slash;
use zipsync_fs::{AbsolutePath, EntryKind, FileSystem, FsMetadata, LocalFileSystem};
use zipsync_store::{Container, ContainerStore, EntryStat, WriteMode, ZipStore};

use crate::config::SyncConfig;
use crate::guard::TransactionalGuard;
use crate::plan::{PlanEntry, ResultSet};
use crate::query::{
    Candidate, Direction, OrphanPolicy, OverwritePolicy, QueryResult, SyncOptions, classify,
};
use crate::{Error, Result};

/// Map a `/`-separated relative container path below `root`.
fn native_path(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// Whether every segment of a walked relative name survives normalization
/// into `path` unchanged. Names holding a `\` would otherwise collide with
/// real subdirectories.
fn maps_exactly(relative: &str, path: &AbsolutePath) -> bool {
    let raw: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
    path.segments().ends_with(&raw)
}

fn fs_mtime(entry: &PlanEntry) -> DateTime<Utc> {
    entry.fs_meta.as_ref().map(|m| m.mtime).unwrap_or_else(Utc::now)
}

/// Synchronizes one [`Container`] with one [`FileSystem`].
#[derive(Debug)]
pub struct SyncEngine<S: ContainerStore = ZipStore, F: FileSystem = LocalFileSystem> {
    container: Container<S>,
    fs: F,
    options: SyncOptions,
}

impl SyncEngine<ZipStore, LocalFileSystem> {
    /// Engine over a zip container and the local disk.
    pub fn local(container: Container) -> Self {
        Self::new(container, LocalFileSystem::new())
    }
}

impl<S: ContainerStore, F: FileSystem> SyncEngine<S, F> {
    pub fn new(container: Container<S>, fs: F) -> Self {
        Self {
            container,
            fs,
            options: SyncOptions::default(),
        }
    }

    /// Replace the default options used by [`pull`](Self::pull) and [`extract`](Self::extract).
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Apply a loaded configuration: default options and container compression.
    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.options = config.sync;
        self.container.set_compression(config.compression);
        self
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub fn set_options(&mut self, options: SyncOptions) {
        self.options = options;
    }

    pub fn container(&self) -> &Container<S> {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container<S> {
        &mut self.container
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    pub fn into_container(self) -> Container<S> {
        self.container
    }

    // Query

    /// Classify every path involved in syncing `container_dir` with `fs_dir`.
    ///
    /// Nothing is modified on either side.
    pub fn query(
        &mut self,
        direction: Direction,
        container_dir: &AbsolutePath,
        fs_dir: &Path,
        options: SyncOptions,
    ) -> Result<ResultSet> {
        if !container_dir.is_dir() {
            return Err(Error::usage(format!(
                "container path '{}' is not a directory path",
                container_dir
            )));
        }
        let root_meta = match self.fs.stat(fs_dir)? {
            Some(meta) if meta.kind == EntryKind::Directory => meta,
            _ => {
                return Err(Error::usage(format!(
                    "'{}' is not an existing directory",
                    fs_dir.display()
                )));
            }
        };

        let plan = match direction {
            Direction::Pull => self.query_pull_plan(container_dir, fs_dir, root_meta, options)?,
            Direction::Extract => self.query_extract_plan(container_dir, fs_dir, options)?,
        };

        info!(
            ?direction,
            container_dir = %container_dir,
            fs_dir = %fs_dir.display(),
            entries = plan.len(),
            mutations = plan.filter(QueryResult::is_mutation).count(),
            "Query complete"
        );
        Ok(plan)
    }

    pub fn query_pull(&mut self, container_dir: &AbsolutePath, fs_dir: &Path) -> Result<ResultSet> {
        self.query(Direction::Pull, container_dir, fs_dir, self.options)
    }

    pub fn query_extract(&mut self, container_dir: &AbsolutePath, fs_dir: &Path) -> Result<ResultSet> {
        self.query(Direction::Extract, container_dir, fs_dir, self.options)
    }

    fn query_pull_plan(
        &mut self,
        container_dir: &AbsolutePath,
        fs_dir: &Path,
        root_meta: FsMetadata,
        options: SyncOptions,
    ) -> Result<ResultSet> {
        let mut plan = ResultSet::new(Direction::Pull);

        // A destination below the root needs its own chain of directory entries
        // before anything can be written into it.
        for dir in container_dir.ancestors_inclusive() {
            if !self.container.exists(&dir)? {
                plan.push(PlanEntry {
                    result: QueryResult::DirAdd,
                    container_path: dir,
                    container_meta: None,
                    fs_path: fs_dir.to_path_buf(),
                    fs_meta: Some(root_meta.clone()),
                });
            }
        }

        let existing: BTreeMap<AbsolutePath, EntryStat> =
            self.container.list(container_dir)?.into_iter().collect();
        let mut seen = BTreeSet::new();

        for entry in self.fs.walk(fs_dir)? {
            let entry = entry?;
            let relative = relative_to_slash(fs_dir, &entry.path)?;
            let mut path = container_dir.join(&relative)?;
            if entry.metadata.kind == EntryKind::Directory {
                path = path.to_dir();
            }

            if !maps_exactly(&relative, &path) {
                debug!(
                    fs_path = %entry.path.display(),
                    container_path = %path,
                    "Name has no exact container form, discarded"
                );
                plan.push(PlanEntry {
                    result: QueryResult::Discard,
                    container_path: path,
                    container_meta: None,
                    fs_path: entry.path,
                    fs_meta: Some(entry.metadata),
                });
                continue;
            }

            let container_meta = existing.get(&path);
            let result = classify(
                Direction::Pull,
                options,
                Candidate {
                    container_path: &path,
                    container: container_meta,
                    fs: Some(&entry.metadata),
                },
            );
            seen.insert(path.clone());
            plan.push(PlanEntry {
                result,
                container_path: path,
                container_meta: container_meta.cloned(),
                fs_path: entry.path,
                fs_meta: Some(entry.metadata),
            });
        }

        for (path, stat) in &existing {
            if path == container_dir || seen.contains(path) {
                continue;
            }
            let result = classify(
                Direction::Pull,
                options,
                Candidate {
                    container_path: path,
                    container: Some(stat),
                    fs: None,
                },
            );
            let relative = path.strip_prefix(container_dir).unwrap_or_default();
            plan.push(PlanEntry {
                result,
                container_path: path.clone(),
                container_meta: Some(stat.clone()),
                fs_path: native_path(fs_dir, relative),
                fs_meta: None,
            });
        }

        Ok(plan)
    }

    fn query_extract_plan(
        &mut self,
        container_dir: &AbsolutePath,
        fs_dir: &Path,
        options: SyncOptions,
    ) -> Result<ResultSet> {
        if !self.container.exists(container_dir)? {
            return Err(Error::usage(format!(
                "container directory '{}' does not exist",
                container_dir
            )));
        }

        let mut plan = ResultSet::new(Direction::Extract);
        // Directories whose filesystem counterpart is not a directory. Nothing
        // below them is looked at or written.
        let mut conflicts: Vec<AbsolutePath> = Vec::new();
        for (path, stat) in self.container.list(container_dir)? {
            if path == *container_dir {
                continue;
            }
            let relative = path.strip_prefix(container_dir).unwrap_or_default();
            let fs_path = native_path(fs_dir, relative);

            if conflicts.iter().any(|dir| path.starts_with(dir)) {
                debug!(path = %path, "Below a conflicting directory, discarded");
                plan.push(PlanEntry {
                    result: QueryResult::Discard,
                    container_path: path,
                    container_meta: Some(stat),
                    fs_path,
                    fs_meta: None,
                });
                continue;
            }

            let fs_meta = self.fs.stat(&fs_path)?;
            let result = classify(
                Direction::Extract,
                options,
                Candidate {
                    container_path: &path,
                    container: Some(&stat),
                    fs: fs_meta.as_ref(),
                },
            );
            if result == QueryResult::DirConflict {
                conflicts.push(path.clone());
            }
            plan.push(PlanEntry {
                result,
                container_path: path,
                container_meta: Some(stat),
                fs_path,
                fs_meta,
            });
        }
        Ok(plan)
    }

    // Commit

    /// Apply a plan produced by [`query`](Self::query).
    ///
    /// Runs in four phases: directory creation in plan order, file writes,
    /// orphan file deletion, then orphan directory deletion in reverse plan
    /// order. The first failure stops the commit. A failed pull leaves the
    /// container exactly as it was; a failed extract leaves whatever was
    /// already written on disk.
    pub fn commit(&mut self, plan: &ResultSet) -> Result<()> {
        match plan.direction() {
            Direction::Pull => {
                let fs = &self.fs;
                let mut guard = TransactionalGuard::begin(&mut self.container)?;
                apply_pull(guard.container(), fs, plan)?;
                guard.commit();
            }
            Direction::Extract => apply_extract(&mut self.container, &self.fs, plan)?,
        }

        info!(
            direction = ?plan.direction(),
            dirs_added = plan.count(QueryResult::DirAdd),
            files_written = plan.count(QueryResult::FileWrite),
            files_overwritten = plan.count(QueryResult::FileOverwrite),
            files_deleted = plan.count(QueryResult::FileOrphanDelete),
            dirs_deleted = plan.count(QueryResult::DirOrphanDelete),
            "Commit complete"
        );
        Ok(())
    }

    /// Query and commit filesystem to container with the engine's default options.
    pub fn pull(&mut self, container_dir: &AbsolutePath, fs_dir: &Path) -> Result<ResultSet> {
        self.pull_with(container_dir, fs_dir, self.options)
    }

    pub fn pull_with(
        &mut self,
        container_dir: &AbsolutePath,
        fs_dir: &Path,
        options: SyncOptions,
    ) -> Result<ResultSet> {
        let plan = self.query(Direction::Pull, container_dir, fs_dir, options)?;
        self.commit(&plan)?;
        Ok(plan)
    }

    /// Query and commit container to filesystem with the engine's default options.
    pub fn extract(&mut self, container_dir: &AbsolutePath, fs_dir: &Path) -> Result<ResultSet> {
        self.extract_with(container_dir, fs_dir, self.options)
    }

    pub fn extract_with(
        &mut self,
        container_dir: &AbsolutePath,
        fs_dir: &Path,
        options: SyncOptions,
    ) -> Result<ResultSet> {
        let plan = self.query(Direction::Extract, container_dir, fs_dir, options)?;
        self.commit(&plan)?;
        Ok(plan)
    }

    // Single files

    /// Copy one filesystem file into the container.
    pub fn file_pull(
        &mut self,
        container_path: &AbsolutePath,
        fs_path: &Path,
        overwrite: OverwritePolicy,
    ) -> Result<QueryResult> {
        if !container_path.is_file() {
            return Err(Error::usage(format!("'{}' is not a file path", container_path)));
        }
        let fs_meta = match self.fs.stat(fs_path)? {
            Some(meta) if meta.kind == EntryKind::File => meta,
            _ => {
                return Err(Error::usage(format!(
                    "'{}' is not an existing regular file",
                    fs_path.display()
                )));
            }
        };

        let container_meta = self.container.stat(container_path)?;
        let result = classify(
            Direction::Pull,
            SyncOptions::new(overwrite, OrphanPolicy::Keep),
            Candidate {
                container_path,
                container: container_meta.as_ref(),
                fs: Some(&fs_meta),
            },
        );

        let mode = match result {
            QueryResult::FileWrite => WriteMode::Create,
            QueryResult::FileOverwrite => WriteMode::Replace,
            _ => return Ok(result),
        };
        let data = self.fs.read_all(fs_path)?;
        self.container
            .write_file(container_path, &data, fs_meta.mtime, mode)?;
        debug!(container_path = %container_path, %result, "Pulled file");
        Ok(result)
    }

    /// Copy one container file onto the filesystem.
    pub fn file_extract(
        &mut self,
        container_path: &AbsolutePath,
        fs_path: &Path,
        overwrite: OverwritePolicy,
    ) -> Result<QueryResult> {
        if !container_path.is_file() {
            return Err(Error::usage(format!("'{}' is not a file path", container_path)));
        }
        let Some(container_meta) = self.container.stat(container_path)? else {
            return Err(Error::usage(format!(
                "container entry '{}' does not exist",
                container_path
            )));
        };

        let fs_meta = self.fs.stat(fs_path)?;
        let result = classify(
            Direction::Extract,
            SyncOptions::new(overwrite, OrphanPolicy::Keep),
            Candidate {
                container_path,
                container: Some(&container_meta),
                fs: fs_meta.as_ref(),
            },
        );

        let truncate = match result {
            QueryResult::FileWrite => false,
            QueryResult::FileOverwrite => true,
            _ => return Ok(result),
        };
        let data = self.container.cat(container_path)?;
        self.fs.write_all(fs_path, &data, truncate)?;
        self.fs.set_mtime(fs_path, container_meta.mtime)?;
        debug!(container_path = %container_path, %result, "Extracted file");
        Ok(result)
    }
}

fn apply_pull<S: ContainerStore, F: FileSystem>(
    container: &mut Container<S>,
    fs: &F,
    plan: &ResultSet,
) -> Result<()> {
    for entry in plan.filter(|r| r == QueryResult::DirAdd) {
        debug!(path = %entry.container_path, "dir-add");
        container.dir_add_at(&entry.container_path, fs_mtime(entry))?;
    }

    for entry in plan.filter(|r| matches!(r, QueryResult::FileWrite | QueryResult::FileOverwrite)) {
        debug!(path = %entry.container_path, result = %entry.result, "write");
        let mode = if entry.result == QueryResult::FileWrite {
            WriteMode::Create
        } else {
            WriteMode::Replace
        };
        let data = fs.read_all(&entry.fs_path)?;
        container.write_file(&entry.container_path, &data, fs_mtime(entry), mode)?;
    }

    for entry in plan.filter(|r| r == QueryResult::FileOrphanDelete) {
        debug!(path = %entry.container_path, "file-orphan-delete");
        container.file_delete(&entry.container_path)?;
    }

    let orphan_dirs: Vec<&PlanEntry> = plan.filter(|r| r == QueryResult::DirOrphanDelete).collect();
    for entry in orphan_dirs.into_iter().rev() {
        debug!(path = %entry.container_path, "dir-orphan-delete");
        container.dir_delete(&entry.container_path)?;
    }
    Ok(())
}

fn apply_extract<S: ContainerStore, F: FileSystem>(
    container: &mut Container<S>,
    fs: &F,
    plan: &ResultSet,
) -> Result<()> {
    let created: Vec<&PlanEntry> = plan.filter(|r| r == QueryResult::DirAdd).collect();
    for entry in &created {
        debug!(path = %entry.fs_path.display(), "dir-add");
        fs.create_directory(&entry.fs_path)?;
    }

    for entry in plan.filter(|r| matches!(r, QueryResult::FileWrite | QueryResult::FileOverwrite)) {
        debug!(path = %entry.fs_path.display(), result = %entry.result, "write");
        let data = container.cat(&entry.container_path)?;
        fs.write_all(&entry.fs_path, &data, entry.result == QueryResult::FileOverwrite)?;
        if let Some(meta) = &entry.container_meta {
            fs.set_mtime(&entry.fs_path, meta.mtime)?;
        }
    }

    for entry in plan.filter(|r| r == QueryResult::FileOrphanDelete) {
        fs.delete_file(&entry.fs_path)?;
    }
    let orphan_dirs: Vec<&PlanEntry> = plan.filter(|r| r == QueryResult::DirOrphanDelete).collect();
    for entry in orphan_dirs.into_iter().rev() {
        fs.delete_directory(&entry.fs_path)?;
    }

    // Writing files bumps directory times, so directories are stamped last,
    // innermost first.
    for entry in created.into_iter().rev() {
        if let Some(meta) = &entry.container_meta {
            fs.set_mtime(&entry.fs_path, meta.mtime)?;
        }
    }
    Ok(())
}
