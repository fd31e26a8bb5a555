//! Name allocation and legacy-name resolution.
//!
//! Names are a type tag followed by a zero-padded counter (`Pt0000`,
//! `Edg0012`). Counters are per entity kind, which fixes both the tag and the
//! dimension, and only ever increase within a transaction history: undo does
//! not give names back, so redo reproduces the same names.
//!
//! In shifting-id mode a script recorded against an empty session can be
//! replayed into a populated one: its names are translated by the counter
//! values captured when the mode was switched on.

use crate::entity::EntityKind;
use std::collections::{BTreeMap, HashMap};

/// Saved counter values, used to roll back a failed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCheckpoint(BTreeMap<EntityKind, u64>);

/// Allocates unique names and resolves aliases.
#[derive(Debug, Default)]
pub struct NameRegistry {
    counters: BTreeMap<EntityKind, u64>,
    /// Counter values captured when shifting was activated.
    shift: Option<BTreeMap<EntityKind, u64>>,
    /// Explicit old-name -> current-name table.
    aliases: HashMap<String, String>,
}

impl NameRegistry {
    /// Creates a registry with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next name for `kind`.
    pub fn allocate(&mut self, kind: EntityKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        let name = format_name(kind, *counter);
        *counter += 1;
        name
    }

    /// Returns the value the next allocation for `kind` will use.
    #[must_use]
    pub fn peek(&self, kind: EntityKind) -> u64 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    /// Captures the current counters.
    #[must_use]
    pub fn checkpoint(&self) -> NameCheckpoint {
        NameCheckpoint(self.counters.clone())
    }

    /// Restores counters captured by [`checkpoint`](Self::checkpoint).
    pub fn restore(&mut self, checkpoint: NameCheckpoint) {
        self.counters = checkpoint.0;
    }

    /// Turns on shifting-id mode, capturing the current counters as offsets.
    pub fn activate_shifting(&mut self) {
        self.shift = Some(self.counters.clone());
    }

    /// Turns off shifting-id mode and forgets explicit aliases.
    pub fn deactivate_shifting(&mut self) {
        self.shift = None;
        self.aliases.clear();
    }

    /// Returns true if shifting-id mode is active.
    #[must_use]
    pub fn is_shifting(&self) -> bool {
        self.shift.is_some()
    }

    /// Records that `old` now answers to `current`.
    pub fn register_alias(&mut self, old: impl Into<String>, current: impl Into<String>) {
        self.aliases.insert(old.into(), current.into());
    }

    /// Translates a caller-supplied name to the name valid in the store.
    ///
    /// Identity unless shifting-id mode is active. In that mode an explicit
    /// alias wins; otherwise a well-formed name has its counter shifted by
    /// the offset captured at activation.
    #[must_use]
    pub fn resolve_alias(&self, name: &str) -> String {
        let Some(shift) = &self.shift else {
            return name.to_string();
        };
        if let Some(current) = self.aliases.get(name) {
            return current.clone();
        }
        let Some(kind) = EntityKind::from_name(name) else {
            return name.to_string();
        };
        let digits = &name[kind.tag().len()..];
        let offset = shift.get(&kind).copied().unwrap_or(0);
        match digits.parse::<u64>().ok().and_then(|n| n.checked_add(offset)) {
            Some(shifted) => format_name(kind, shifted),
            None => name.to_string(),
        }
    }
}

fn format_name(kind: EntityKind, counter: u64) -> String {
    format!("{}{:04}", kind.tag(), counter)
}
