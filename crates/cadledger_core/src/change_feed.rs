//! Change feed for observing committed, undone and redone commands.
//!
//! Every event carries the command's trace and the per-entity statuses of
//! its ledger, so observers (viewers, audit logs, script recorders) never
//! have to read the world to know what changed. Undo events carry the
//! inverse statuses: an entity created by the command is reported deleted.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cadledger_core::Session;
//!
//! let session = Session::open_default();
//! let receiver = session.subscribe();
//!
//! session.geometry().create_vertex(Point3::ORIGIN)?;
//!
//! while let Ok(event) = receiver.try_recv() {
//!     println!("{}: {}", event.kind, event.description);
//! }
//! ```

use crate::entity::EntityHandle;
use crate::ledger::ChangeStatus;
use crate::types::{CommandId, Domain};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

/// What happened to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// First successful execution.
    Committed,
    /// Undone.
    Undone,
    /// Redone.
    Redone,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Committed => "committed",
            Self::Undone => "undone",
            Self::Redone => "redone",
        })
    }
}

/// One entity touched by a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityChange {
    /// Handle of the entity at the time of the event.
    #[serde(skip)]
    pub handle: EntityHandle,
    /// Entity name.
    pub name: String,
    /// Entity domain.
    pub domain: Domain,
    /// Status as seen by observers.
    pub status: ChangeStatus,
}

/// A single change event.
///
/// Events are emitted only after the command's state transition succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Feed sequence number, starting at 1.
    pub sequence: u64,
    /// Command the event is about.
    #[serde(serialize_with = "serialize_command_id")]
    pub command: CommandId,
    /// Transition.
    pub kind: ChangeKind,
    /// The command's trace.
    pub description: String,
    /// Touched entities, in first-touch order.
    pub changes: Vec<EntityChange>,
}

fn serialize_command_id<S: serde::Serializer>(id: &CommandId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(id.as_u64())
}

/// Distributes change events to subscribers and keeps a bounded history
/// for polling.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    history: RwLock<VecDeque<ChangeEvent>>,
    max_history: usize,
    next_sequence: RwLock<u64>,
}

impl ChangeFeed {
    /// Creates a new change feed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a change feed with a specific history limit.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::new()),
            max_history,
            next_sequence: RwLock::new(1),
        }
    }

    /// Subscribes to the change feed.
    ///
    /// The receiver gets every event emitted after this call.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event, assigning it the next sequence number.
    pub fn emit(
        &self,
        command: CommandId,
        kind: ChangeKind,
        description: String,
        changes: Vec<EntityChange>,
    ) -> u64 {
        let sequence = {
            let mut next = self.next_sequence.write();
            let sequence = *next;
            *next += 1;
            sequence
        };
        let event = ChangeEvent {
            sequence,
            command,
            kind,
            description,
            changes,
        };

        {
            let mut history = self.history.write();
            history.push_back(event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        // disconnected subscribers are dropped
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        sequence
    }

    /// Returns events with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().back().map_or(0, |e| e.sequence)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .field("history", &self.history_len())
            .field("max_history", &self.max_history)
            .finish()
    }
}
