//! Per-command record of touched entities.

use crate::entity::EntityHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How a command affected one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Created by the command.
    Created,
    /// Only the displayed shape changed.
    DisplayModified,
    /// Incidence, groups or association changed.
    OtherModified,
    /// Destroyed by the command.
    Deleted,
}

impl ChangeStatus {
    /// Returns the status an observer sees when the change is undone.
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::Created => Self::Deleted,
            Self::Deleted => Self::Created,
            other => other,
        }
    }

    /// Combines the recorded status with a new one.
    ///
    /// `Created` absorbs modifications, anything may become `Deleted`,
    /// `DisplayModified` may become `OtherModified`. Other requests are
    /// downgrades and leave the status unchanged.
    #[must_use]
    pub fn upgrade(self, requested: Self) -> Self {
        match (self, requested) {
            (_, Self::Deleted) => Self::Deleted,
            (Self::DisplayModified, Self::OtherModified) => Self::OtherModified,
            (current, _) => current,
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::DisplayModified => "display-modified",
            Self::OtherModified => "modified",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Map from touched entity to its status, in first-touch order.
///
/// The first [`record`](Self::record) for an entity returns `true`; that is
/// the signal to capture its snapshot before mutating it.
#[derive(Debug, Clone, Default)]
pub struct ChangeLedger {
    entries: Vec<(EntityHandle, ChangeStatus)>,
    index: HashMap<EntityHandle, usize>,
}

impl ChangeLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a status for `handle`. Returns true on the first record.
    pub fn record(&mut self, handle: EntityHandle, status: ChangeStatus) -> bool {
        match self.index.get(&handle) {
            Some(&pos) => {
                let entry = &mut self.entries[pos].1;
                *entry = entry.upgrade(status);
                false
            }
            None => {
                self.index.insert(handle, self.entries.len());
                self.entries.push((handle, status));
                true
            }
        }
    }

    /// Returns the recorded status of `handle`.
    #[must_use]
    pub fn status(&self, handle: EntityHandle) -> Option<ChangeStatus> {
        self.index.get(&handle).map(|&pos| self.entries[pos].1)
    }

    /// Iterates entries in first-touch order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, ChangeStatus)> + '_ {
        self.entries.iter().copied()
    }

    /// Iterates the entities currently recorded with `status`.
    pub fn with_status(&self, status: ChangeStatus) -> impl Iterator<Item = EntityHandle> + '_ {
        self.entries
            .iter()
            .filter(move |(_, s)| *s == status)
            .map(|(h, _)| *h)
    }

    /// Returns the number of touched entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
