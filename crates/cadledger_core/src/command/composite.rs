//! All-or-nothing sequences of commands.

use crate::associativity::AssociativityPolicy;
use crate::command::{Command, CommandOutput, CommandState, ExecContext, Fate};
use crate::domain::Compensation;
use crate::entity::EntityHandle;
use crate::error::CoreResult;
use crate::kernel::GeometricKernel;
use crate::ledger::ChangeStatus;
use crate::world::World;
use std::collections::BTreeSet;
use tracing::error;

/// An ordered sequence of commands that commits entirely or not at all.
///
/// Children run strictly in order; each one sees the outputs of the
/// children before it through [`ExecContext::prior`]. If child `k` fails,
/// children `k-1` down to the first are undone before the error is
/// returned. Undo runs children in reverse, redo in forward order.
///
/// When run by the transaction manager, a child whose effect the dependent
/// domain must follow is wrapped with its compensating command just before
/// its first execution.
#[derive(Debug)]
pub struct CompositeCommand {
    label: Option<String>,
    children: Vec<Box<dyn Command>>,
    state: CommandState,
    /// Children already carry their compensation.
    compensated: bool,
}

impl CompositeCommand {
    /// Creates a composite over `children`.
    #[must_use]
    pub fn new(children: Vec<Box<dyn Command>>) -> Self {
        Self {
            label: None,
            children,
            state: CommandState::Unexecuted,
            compensated: false,
        }
    }

    /// Creates a composite whose children are never guarded again.
    pub(crate) fn compensated(children: Vec<Box<dyn Command>>) -> Self {
        Self {
            compensated: true,
            ..Self::new(children)
        }
    }

    /// Sets a label that replaces the joined child traces in [`describe`](Command::describe).
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the children.
    #[must_use]
    pub fn children(&self) -> &[Box<dyn Command>] {
        &self.children
    }

    /// Wraps child `k` with the compensation `policy` asks for.
    fn guard_child(
        &mut self,
        k: usize,
        world: &World,
        policy: Option<&AssociativityPolicy>,
    ) -> CoreResult<()> {
        let Some(policy) = policy.filter(|_| !self.compensated) else {
            return Ok(());
        };
        if let Some(compensator) = policy.compensator_for(world, self.children[k].as_ref())? {
            let primary = self.children.remove(k);
            self.children
                .insert(k, Box::new(Self::compensated(vec![primary, compensator])));
        }
        Ok(())
    }

    /// Undoes `children[..k]` in reverse order.
    fn unwind(&mut self, k: usize, world: &mut World) -> CoreResult<()> {
        for child in self.children[..k].iter_mut().rev() {
            child.undo(world)?;
        }
        Ok(())
    }
}

impl Command for CompositeCommand {
    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("composite")
    }

    fn state(&self) -> CommandState {
        self.state
    }

    fn prepare(&mut self, world: &World, kernel: &dyn GeometricKernel) -> CoreResult<()> {
        // later children depend on what earlier ones produce
        match self.children.first_mut() {
            Some(first) => first.prepare(world, kernel),
            None => Ok(()),
        }
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> CoreResult<()> {
        self.state.check_executable(self.label())?;
        // redo replays the children as wrapped the first time
        let policy = ctx.policy.filter(|_| self.state == CommandState::Unexecuted);

        let mut outputs: Vec<CommandOutput> = ctx.prior.to_vec();
        for k in 0..self.children.len() {
            let result = self.guard_child(k, ctx.world, policy).and_then(|()| {
                let mut child_ctx = ExecContext {
                    world: &mut *ctx.world,
                    kernel: ctx.kernel,
                    prior: &outputs,
                    policy: ctx.policy,
                };
                self.children[k].execute(&mut child_ctx)
            });
            if let Err(err) = result {
                if let Err(unwind_err) = self.unwind(k, ctx.world) {
                    error!(label = self.label(), child = k, %unwind_err, "unwind failed");
                    return Err(unwind_err);
                }
                return Err(err);
            }
            outputs.push(self.children[k].output());
        }

        self.state = CommandState::Executed;
        Ok(())
    }

    fn undo(&mut self, world: &mut World) -> CoreResult<()> {
        self.state.check_undoable(self.label())?;
        let n = self.children.len();
        self.unwind(n, world)?;
        self.state = CommandState::Undone;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self
                .children
                .iter()
                .map(|c| c.describe())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    fn changes(&self) -> Vec<(EntityHandle, ChangeStatus)> {
        self.children.iter().flat_map(|c| c.changes()).collect()
    }

    fn output(&self) -> CommandOutput {
        let mut output = CommandOutput::default();
        for child in &self.children {
            output.extend(&child.output());
        }
        output
    }

    fn targets(&self) -> Vec<EntityHandle> {
        let set: BTreeSet<EntityHandle> = self.children.iter().flat_map(|c| c.targets()).collect();
        set.into_iter().collect()
    }

    fn affected(&self, world: &World) -> CoreResult<BTreeSet<EntityHandle>> {
        let mut set = BTreeSet::new();
        for child in &self.children {
            set.extend(child.affected(world)?);
        }
        Ok(set)
    }

    fn compensation(&self) -> Option<Compensation> {
        None
    }

    fn release(&mut self, world: &mut World, fate: Fate) -> usize {
        self.children
            .iter_mut()
            .map(|c| c.release(world, fate))
            .sum()
    }
}
