//! Per-path classification
//!
//! [`classify`] is a pure function: given one candidate path, what each side
//! knows about it and the active policies, it decides the [`QueryResult`].
//! It never touches the container or the filesystem.

use std::fmt;

use serde::{Deserialize, Serialize};
use zipsync_fs::{AbsolutePath, EntryKind, FsMetadata};
use zipsync_store::EntryStat;

/// Which side is the source of truth for a sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Filesystem to container
    Pull,
    /// Container to filesystem
    Extract,
}

/// When an existing destination file is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    Never,
    #[default]
    Always,
    IfDestinationOlder,
    IfSizeMismatch,
    IfOlderAndSizeMismatch,
}

/// What happens to destination entries with no source counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanPolicy {
    #[default]
    Keep,
    Delete,
}

/// Policy pair for one sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub overwrite: OverwritePolicy,
    pub orphan: OrphanPolicy,
}

impl SyncOptions {
    pub fn new(overwrite: OverwritePolicy, orphan: OrphanPolicy) -> Self {
        Self { overwrite, orphan }
    }
}

/// Classification of one candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryResult {
    FileWrite,
    FileOverwrite,
    FileSkip,
    FileOrphanKeep,
    FileOrphanDelete,
    FileConflict,
    DirAdd,
    DirExists,
    DirOrphanKeep,
    DirOrphanDelete,
    DirConflict,
    /// Source path that cannot be represented on the destination side
    Discard,
    None,
}

impl QueryResult {
    pub const ALL: [QueryResult; 13] = [
        Self::FileWrite,
        Self::FileOverwrite,
        Self::FileSkip,
        Self::FileOrphanKeep,
        Self::FileOrphanDelete,
        Self::FileConflict,
        Self::DirAdd,
        Self::DirExists,
        Self::DirOrphanKeep,
        Self::DirOrphanDelete,
        Self::DirConflict,
        Self::Discard,
        Self::None,
    ];

    /// Whether committing this result changes the destination.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::FileWrite
                | Self::FileOverwrite
                | Self::FileOrphanDelete
                | Self::DirAdd
                | Self::DirOrphanDelete
        )
    }

    pub fn is_file(self) -> bool {
        matches!(
            self,
            Self::FileWrite
                | Self::FileOverwrite
                | Self::FileSkip
                | Self::FileOrphanKeep
                | Self::FileOrphanDelete
                | Self::FileConflict
        )
    }

    pub fn is_dir(self) -> bool {
        matches!(
            self,
            Self::DirAdd
                | Self::DirExists
                | Self::DirOrphanKeep
                | Self::DirOrphanDelete
                | Self::DirConflict
        )
    }

    pub fn is_orphan(self) -> bool {
        matches!(
            self,
            Self::FileOrphanKeep | Self::FileOrphanDelete | Self::DirOrphanKeep | Self::DirOrphanDelete
        )
    }

    pub fn is_conflict(self) -> bool {
        matches!(self, Self::FileConflict | Self::DirConflict)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileWrite => "file-write",
            Self::FileOverwrite => "file-overwrite",
            Self::FileSkip => "file-skip",
            Self::FileOrphanKeep => "file-orphan-keep",
            Self::FileOrphanDelete => "file-orphan-delete",
            Self::FileConflict => "file-conflict",
            Self::DirAdd => "dir-add",
            Self::DirExists => "dir-exists",
            Self::DirOrphanKeep => "dir-orphan-keep",
            Self::DirOrphanDelete => "dir-orphan-delete",
            Self::DirConflict => "dir-conflict",
            Self::Discard => "discard",
            Self::None => "none",
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything [`classify`] needs to know about one path.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub container_path: &'a AbsolutePath,
    pub container: Option<&'a EntryStat>,
    pub fs: Option<&'a FsMetadata>,
}

/// Size and time of one side of a comparison.
#[derive(Debug, Clone, Copy)]
struct Side {
    size: u64,
    mtime: chrono::DateTime<chrono::Utc>,
}

fn should_overwrite(policy: OverwritePolicy, source: Side, destination: Side) -> bool {
    let older = destination.mtime < source.mtime;
    let size_differs = destination.size != source.size;
    match policy {
        OverwritePolicy::Never => false,
        OverwritePolicy::Always => true,
        OverwritePolicy::IfDestinationOlder => older,
        OverwritePolicy::IfSizeMismatch => size_differs,
        OverwritePolicy::IfOlderAndSizeMismatch => older && size_differs,
    }
}

fn overwrite_or_skip(policy: OverwritePolicy, source: Side, destination: Side) -> QueryResult {
    if should_overwrite(policy, source, destination) {
        QueryResult::FileOverwrite
    } else {
        QueryResult::FileSkip
    }
}

fn orphan(is_dir: bool, policy: OrphanPolicy) -> QueryResult {
    match (is_dir, policy) {
        (false, OrphanPolicy::Keep) => QueryResult::FileOrphanKeep,
        (false, OrphanPolicy::Delete) => QueryResult::FileOrphanDelete,
        (true, OrphanPolicy::Keep) => QueryResult::DirOrphanKeep,
        (true, OrphanPolicy::Delete) => QueryResult::DirOrphanDelete,
    }
}

/// Decide what a sync call should do with one path.
///
/// For [`Direction::Pull`] a candidate without filesystem metadata is an
/// orphan of the container. For [`Direction::Extract`] a candidate without
/// container metadata yields [`QueryResult::None`], since extraction never
/// looks at filesystem-only paths.
pub fn classify(direction: Direction, options: SyncOptions, candidate: Candidate<'_>) -> QueryResult {
    let is_dir = candidate.container_path.is_dir();
    match direction {
        Direction::Pull => classify_pull(options, is_dir, candidate),
        Direction::Extract => classify_extract(options.overwrite, is_dir, candidate),
    }
}

fn classify_pull(options: SyncOptions, is_dir: bool, candidate: Candidate<'_>) -> QueryResult {
    let Some(fs) = candidate.fs else {
        return match candidate.container {
            Some(_) => orphan(is_dir, options.orphan),
            None => QueryResult::None,
        };
    };

    match fs.kind {
        EntryKind::Directory => match candidate.container {
            Some(_) => QueryResult::DirExists,
            None => QueryResult::DirAdd,
        },
        EntryKind::File => match candidate.container {
            None => QueryResult::FileWrite,
            Some(stat) => overwrite_or_skip(
                options.overwrite,
                Side {
                    size: fs.size,
                    mtime: fs.mtime,
                },
                Side {
                    size: stat.size,
                    mtime: stat.mtime,
                },
            ),
        },
        EntryKind::Other => QueryResult::Discard,
    }
}

fn classify_extract(overwrite: OverwritePolicy, is_dir: bool, candidate: Candidate<'_>) -> QueryResult {
    let Some(stat) = candidate.container else {
        return QueryResult::None;
    };

    match (is_dir, candidate.fs) {
        (true, None) => QueryResult::DirAdd,
        (true, Some(fs)) if fs.kind == EntryKind::Directory => QueryResult::DirExists,
        (true, Some(_)) => QueryResult::DirConflict,
        (false, None) => QueryResult::FileWrite,
        (false, Some(fs)) if fs.kind == EntryKind::File => overwrite_or_skip(
            overwrite,
            Side {
                size: stat.size,
                mtime: stat.mtime,
            },
            Side {
                size: fs.size,
                mtime: fs.mtime,
            },
        ),
        (false, Some(_)) => QueryResult::FileConflict,
    }
}
