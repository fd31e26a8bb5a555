//! Commands: reversible units of work on a [`World`].
//!
//! There are exactly two kinds of command, [`LeafCommand`] and
//! [`CompositeCommand`], behind the sealed [`Command`] trait. New behavior
//! is added by writing an [`Operation`] and wrapping it in a leaf.
//!
//! ## State machine
//!
//! ```text
//! Unexecuted --execute--> Executed --undo--> Undone --execute (redo)--> Executed ...
//! ```
//!
//! Any other transition is an [`InternalInvariant`](crate::CoreError::InternalInvariant).

mod composite;
mod leaf;

pub use composite::CompositeCommand;
pub use leaf::{LeafCommand, Mutator, Operation};

use crate::associativity::AssociativityPolicy;
use crate::domain::Compensation;
use crate::entity::EntityHandle;
use crate::error::{CoreError, CoreResult};
use crate::kernel::GeometricKernel;
use crate::ledger::ChangeStatus;
use crate::world::World;
use std::collections::BTreeSet;
use std::fmt;

/// Execution state of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Never run, or rolled back after a failed first run.
    Unexecuted,
    /// Effects applied.
    Executed,
    /// Effects reverted; can be redone.
    Undone,
}

impl CommandState {
    /// Checks that `execute` may run from this state.
    pub(crate) fn check_executable(self, what: &str) -> CoreResult<()> {
        match self {
            Self::Unexecuted | Self::Undone => Ok(()),
            Self::Executed => Err(CoreError::invariant(format!(
                "execute of already executed command {what}"
            ))),
        }
    }

    /// Checks that `undo` may run from this state.
    pub(crate) fn check_undoable(self, what: &str) -> CoreResult<()> {
        match self {
            Self::Executed => Ok(()),
            other => Err(CoreError::invariant(format!(
                "undo of {other:?} command {what}"
            ))),
        }
    }
}

/// Why a command is leaving the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    /// Executed command dropped from the bottom of the undo stack.
    Evicted,
    /// Undone command dropped from the redo stack, or a failed command.
    Discarded,
}

/// What a command did, in handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Entities created and still live, in creation order.
    pub created: Vec<EntityHandle>,
    /// Entities destroyed.
    pub removed: Vec<EntityHandle>,
    /// Entities modified in place.
    pub modified: Vec<EntityHandle>,
    /// `(source, product)` pairs: which new entity replaces or copies which.
    pub derived: Vec<(EntityHandle, EntityHandle)>,
}

impl CommandOutput {
    /// Appends another output.
    pub fn extend(&mut self, other: &CommandOutput) {
        self.created.extend_from_slice(&other.created);
        self.removed.extend_from_slice(&other.removed);
        self.modified.extend_from_slice(&other.modified);
        self.derived.extend_from_slice(&other.derived);
    }

    /// Returns the first product derived from `source`.
    #[must_use]
    pub fn product_of(&self, source: EntityHandle) -> Option<EntityHandle> {
        self.derived
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, p)| *p)
    }
}

/// Everything a command may use while executing.
pub struct ExecContext<'a> {
    /// The world to mutate.
    pub world: &'a mut World,
    /// Construction service.
    pub kernel: &'a dyn GeometricKernel,
    /// Outputs of earlier siblings in the enclosing composite, oldest first.
    pub prior: &'a [CommandOutput],
    /// Policy a composite runs each child through on its first execution.
    pub(crate) policy: Option<&'a AssociativityPolicy>,
}

impl<'a> ExecContext<'a> {
    /// Creates a top-level context with no prior outputs.
    pub fn new(world: &'a mut World, kernel: &'a dyn GeometricKernel) -> Self {
        Self {
            world,
            kernel,
            prior: &[],
            policy: None,
        }
    }

    pub(crate) fn guarded(
        world: &'a mut World,
        kernel: &'a dyn GeometricKernel,
        policy: &'a AssociativityPolicy,
    ) -> Self {
        Self {
            policy: Some(policy),
            ..Self::new(world, kernel)
        }
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for super::LeafCommand {}
    impl Sealed for super::CompositeCommand {}
}

/// A reversible unit of work.
///
/// Sealed: the only implementors are [`LeafCommand`] and
/// [`CompositeCommand`].
pub trait Command: private::Sealed + Send + fmt::Debug {
    /// Short label (operation name or composite label).
    fn label(&self) -> &str;

    /// Current state.
    fn state(&self) -> CommandState;

    /// Runs read-only domain work (kernel construction) ahead of execution.
    ///
    /// May run on a worker thread while other readers hold the world. The
    /// result is cached and only reused if the inputs are unchanged when
    /// [`execute`](Self::execute) runs.
    fn prepare(&mut self, world: &World, kernel: &dyn GeometricKernel) -> CoreResult<()>;

    /// Executes, or redoes from [`CommandState::Undone`].
    ///
    /// On error the world is as it was before the call.
    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> CoreResult<()>;

    /// Reverts every effect of the last execution.
    fn undo(&mut self, world: &mut World) -> CoreResult<()>;

    /// Textual trace for logging and replay.
    fn describe(&self) -> String;

    /// Touched entities and their statuses, in first-touch order.
    fn changes(&self) -> Vec<(EntityHandle, ChangeStatus)>;

    /// What the last execution did.
    fn output(&self) -> CommandOutput;

    /// Entities the command declares it will read or write, for conflict
    /// detection between batched commands.
    fn targets(&self) -> Vec<EntityHandle>;

    /// Entities whose dependents must be compensated if this command runs.
    fn affected(&self, world: &World) -> CoreResult<BTreeSet<EntityHandle>>;

    /// Compensation the dependent domain needs after this command.
    fn compensation(&self) -> Option<Compensation>;

    /// Frees the entities only this command still refers to. Returns how
    /// many entities were released.
    fn release(&mut self, world: &mut World, fate: Fate) -> usize;
}
