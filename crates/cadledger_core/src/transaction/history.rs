//! Undo and redo stacks.

use crate::command::{Command, Fate};
use crate::types::CommandId;
use crate::world::World;
use std::collections::VecDeque;

/// A command on one of the stacks.
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) id: CommandId,
    pub(crate) command: Box<dyn Command>,
}

/// The two stacks. A command is on at most one of them.
#[derive(Debug, Default)]
pub(crate) struct History {
    /// Executed commands, oldest first.
    pub(crate) undo: VecDeque<Entry>,
    /// Undone commands, most recently undone last.
    pub(crate) redo: Vec<Entry>,
    next_id: u64,
    /// Bumped by every commit, undo and redo.
    pub(crate) revision: u64,
}

impl History {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&mut self) -> CommandId {
        self.next_id += 1;
        CommandId::new(self.next_id)
    }

    /// Drops the whole redo stack. Returns the number of released entities.
    pub(crate) fn discard_redo(&mut self, world: &mut World) -> usize {
        std::mem::take(&mut self.redo)
            .into_iter()
            .map(|mut entry| entry.command.release(world, Fate::Discarded))
            .sum()
    }

    /// Pops commands from the bottom of the undo stack until at most
    /// `limit` remain. Returns (evicted commands, released entities).
    pub(crate) fn evict(&mut self, world: &mut World, limit: usize) -> (usize, usize) {
        let mut evicted = 0;
        let mut released = 0;
        while self.undo.len() > limit {
            let Some(mut entry) = self.undo.pop_front() else {
                break;
            };
            released += entry.command.release(world, Fate::Evicted);
            evicted += 1;
        }
        (evicted, released)
    }

    pub(crate) fn undo_description(&self) -> Option<String> {
        self.undo.back().map(|e| e.command.describe())
    }

    pub(crate) fn redo_description(&self) -> Option<String> {
        self.redo.last().map(|e| e.command.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut history = History::new();
        assert_eq!(history.next_id(), CommandId::new(1));
        assert_eq!(history.next_id(), CommandId::new(2));
    }

    #[test]
    fn empty_stacks() {
        let mut history = History::new();
        let mut world = World::new();
        assert_eq!(history.discard_redo(&mut world), 0);
        assert_eq!(history.evict(&mut world, 0), (0, 0));
        assert!(history.undo_description().is_none());
        assert!(history.redo_description().is_none());
    }
}
