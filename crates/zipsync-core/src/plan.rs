//! Query output and commit input

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use zipsync_fs::{AbsolutePath, FsMetadata};
use zipsync_store::EntryStat;

use crate::query::{Direction, QueryResult};

/// One classified path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub result: QueryResult,
    pub container_path: AbsolutePath,
    pub container_meta: Option<EntryStat>,
    pub fs_path: PathBuf,
    pub fs_meta: Option<FsMetadata>,
}

/// Ordered classifications for one sync call.
///
/// Entries are in discovery order: a depth-first walk of the source side with
/// children in byte order, followed (on pull) by container orphans in path
/// order. Every directory therefore precedes everything beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    direction: Direction,
    entries: Vec<PlanEntry>,
}

impl ResultSet {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: PlanEntry) {
        self.entries.push(entry);
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanEntry> {
        self.entries.iter()
    }

    /// Entries whose result satisfies `predicate`, in plan order.
    pub fn filter<P>(&self, predicate: P) -> impl Iterator<Item = &PlanEntry>
    where
        P: Fn(QueryResult) -> bool,
    {
        self.entries.iter().filter(move |e| predicate(e.result))
    }

    pub fn count(&self, result: QueryResult) -> usize {
        self.entries.iter().filter(|e| e.result == result).count()
    }

    /// Container paths classified as `result`, in plan order.
    pub fn paths_with(&self, result: QueryResult) -> Vec<&AbsolutePath> {
        self.entries
            .iter()
            .filter(|e| e.result == result)
            .map(|e| &e.container_path)
            .collect()
    }

    /// Whether committing this plan would change anything.
    pub fn has_mutations(&self) -> bool {
        self.entries.iter().any(|e| e.result.is_mutation())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a PlanEntry;
    type IntoIter = std::slice::Iter<'a, PlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Pull => "pull",
            Direction::Extract => "extract",
        };
        writeln!(f, "{} plan ({} entries)", direction, self.entries.len())?;
        for entry in &self.entries {
            writeln!(
                f,
                "  {:<18} {}  [{}]",
                entry.result.as_str(),
                entry.container_path,
                entry.fs_path.display()
            )?;
        }
        Ok(())
    }
}
