//! Leaf commands and the mutation primitives operations are written with.

use crate::command::{Command, CommandOutput, CommandState, ExecContext, Fate};
use crate::domain::Compensation;
use crate::entity::{Entity, EntityHandle, EntityKind, EntitySnapshot};
use crate::error::{CoreError, CoreResult};
use crate::kernel::{BuiltShape, GeometricKernel, KernelRequest};
use crate::ledger::{ChangeLedger, ChangeStatus};
use crate::shape::ShapeData;
use crate::types::Domain;
use crate::world::World;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, error, warn};

/// The domain work of a leaf command.
///
/// An operation describes *what* to do; [`LeafCommand`] takes care of
/// recording, snapshots, rollback, undo and redo. `apply` must only mutate
/// the world through the [`Mutator`] it is given.
pub trait Operation: Send + fmt::Debug {
    /// Short operation name.
    fn name(&self) -> &'static str;

    /// Entities the operation reads or writes directly.
    fn targets(&self) -> Vec<EntityHandle> {
        Vec::new()
    }

    /// Checks preconditions without mutating anything.
    ///
    /// The default requires every target to be live.
    fn validate(&self, world: &World) -> CoreResult<()> {
        for handle in self.targets() {
            world.live_entity(handle)?;
        }
        Ok(())
    }

    /// Kernel work the operation needs, if any.
    fn kernel_request(&self, _world: &World) -> CoreResult<Option<KernelRequest>> {
        Ok(None)
    }

    /// Applies the operation. `built` holds the result of the kernel request.
    fn apply(&self, m: &mut Mutator<'_>, built: Vec<BuiltShape>) -> CoreResult<()>;

    /// Trace of a successful application, given what it did.
    fn describe(&self, world: &World, output: &CommandOutput) -> String;

    /// Entities whose dependents are concerned by this operation.
    fn affected(&self, _world: &World) -> CoreResult<BTreeSet<EntityHandle>> {
        Ok(self.targets().into_iter().collect())
    }

    /// Compensation the dependent domain must run after this operation.
    fn compensation(&self) -> Option<Compensation> {
        None
    }
}

/// Mutation primitives available to [`Operation::apply`].
///
/// Every primitive records the entity in the command's ledger, capturing a
/// snapshot on the first touch, before changing it.
pub struct Mutator<'a> {
    world: &'a mut World,
    prior: &'a [CommandOutput],
    ledger: &'a mut ChangeLedger,
    snapshots: &'a mut Vec<EntitySnapshot>,
    created: &'a mut Vec<EntityHandle>,
    derived: &'a mut Vec<(EntityHandle, EntityHandle)>,
}

impl<'a> Mutator<'a> {
    /// Read access to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        self.world
    }

    /// Outputs of earlier siblings in the enclosing composite.
    #[must_use]
    pub fn prior(&self) -> &[CommandOutput] {
        self.prior
    }

    /// All earlier sibling outputs merged into one.
    #[must_use]
    pub fn prior_output(&self) -> CommandOutput {
        let mut merged = CommandOutput::default();
        for output in self.prior {
            merged.extend(output);
        }
        merged
    }

    /// Creates a live entity with a freshly allocated name.
    pub fn create(&mut self, kind: EntityKind, shape: ShapeData) -> CoreResult<EntityHandle> {
        let name = self.world.names_mut().allocate(kind);
        let handle = self
            .world
            .store_mut(kind.domain())
            .add(Entity::new(name, kind, shape))?;
        self.ledger.record(handle, ChangeStatus::Created);
        self.created.push(handle);
        Ok(handle)
    }

    fn touch(&mut self, handle: EntityHandle, status: ChangeStatus) -> CoreResult<&mut Entity> {
        let entity = self.world.entity(handle)?;
        if entity.is_destroyed() {
            return Err(CoreError::invariant(format!(
                "mutation of destroyed entity {}",
                entity.name()
            )));
        }
        if self.ledger.record(handle, status) {
            self.snapshots.push(EntitySnapshot::capture(handle, entity));
        }
        self.world.entity_mut(handle)
    }

    /// Destroys a live entity and detaches it from its neighbours.
    pub fn destroy(&mut self, handle: EntityHandle) -> CoreResult<()> {
        let entity = self.world.entity(handle)?;
        if entity.is_destroyed() {
            return Err(CoreError::invariant(format!(
                "double destroy of {}",
                entity.name()
            )));
        }
        let neighbours: Vec<EntityHandle> = entity.incident().iter().copied().collect();
        for neighbour in neighbours {
            self.touch(neighbour, ChangeStatus::OtherModified)?
                .state
                .incident
                .remove(&handle);
        }
        let entity = self.touch(handle, ChangeStatus::Deleted)?;
        entity.state.incident.clear();
        entity.state.destroyed = true;
        Ok(())
    }

    /// Replaces the shape of a live entity.
    pub fn set_shape(&mut self, handle: EntityHandle, shape: ShapeData) -> CoreResult<()> {
        self.touch(handle, ChangeStatus::DisplayModified)?.state.shape = shape;
        Ok(())
    }

    /// Sets or clears the geometry association of a topology entity.
    pub fn set_link(
        &mut self,
        handle: EntityHandle,
        link: Option<EntityHandle>,
    ) -> CoreResult<()> {
        if handle.domain() != Domain::Topology
            || link.is_some_and(|g| g.domain() != Domain::Geometry)
        {
            return Err(CoreError::invariant(format!(
                "association {handle} -> {link:?} crosses the wrong way"
            )));
        }
        self.touch(handle, ChangeStatus::OtherModified)?.state.domain_link = link;
        Ok(())
    }

    /// Makes two entities of the same domain incident to each other.
    pub fn connect(&mut self, a: EntityHandle, b: EntityHandle) -> CoreResult<()> {
        if a == b || a.domain() != b.domain() {
            return Err(CoreError::invariant(format!("cannot connect {a} and {b}")));
        }
        self.touch(a, ChangeStatus::OtherModified)?.state.incident.insert(b);
        self.touch(b, ChangeStatus::OtherModified)?.state.incident.insert(a);
        Ok(())
    }

    /// Adds a live entity to a named group.
    pub fn add_to_group(&mut self, handle: EntityHandle, group: &str) -> CoreResult<()> {
        self.touch(handle, ChangeStatus::OtherModified)?
            .state
            .groups
            .insert(group.to_string());
        Ok(())
    }

    /// Removes a live entity from a named group.
    pub fn remove_from_group(&mut self, handle: EntityHandle, group: &str) -> CoreResult<()> {
        self.touch(handle, ChangeStatus::OtherModified)?
            .state
            .groups
            .remove(group);
        Ok(())
    }

    /// Records that `product` replaces or copies `source`.
    pub fn derive(&mut self, source: EntityHandle, product: EntityHandle) {
        self.derived.push((source, product));
    }
}

#[derive(Debug)]
struct Prepared {
    request: KernelRequest,
    shapes: Vec<BuiltShape>,
}

/// A command running a single [`Operation`].
#[derive(Debug)]
pub struct LeafCommand {
    operation: Box<dyn Operation>,
    state: CommandState,
    ledger: ChangeLedger,
    snapshots: Vec<EntitySnapshot>,
    /// Creation order; kept after a rollback so the entities can be released.
    created: Vec<EntityHandle>,
    derived: Vec<(EntityHandle, EntityHandle)>,
    trace: Option<String>,
    prepared: Option<Prepared>,
}

impl LeafCommand {
    /// Wraps an operation.
    pub fn new(operation: impl Operation + 'static) -> Self {
        Self {
            operation: Box::new(operation),
            state: CommandState::Unexecuted,
            ledger: ChangeLedger::new(),
            snapshots: Vec::new(),
            created: Vec::new(),
            derived: Vec::new(),
            trace: None,
            prepared: None,
        }
    }

    /// Wraps an operation and boxes the command.
    pub fn boxed(operation: impl Operation + 'static) -> Box<dyn Command> {
        Box::new(Self::new(operation))
    }

    /// Returns the ledger of the last execution.
    #[must_use]
    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    /// Returns how many snapshots the command holds.
    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    fn construct(
        &mut self,
        world: &World,
        kernel: &dyn GeometricKernel,
    ) -> CoreResult<Vec<BuiltShape>> {
        let Some(request) = self.operation.kernel_request(world)? else {
            return Ok(Vec::new());
        };
        match self.prepared.take() {
            Some(prepared) if prepared.request == request => Ok(prepared.shapes),
            _ => request.run(kernel),
        }
    }

    /// Exchanges every snapshot, then destroys created entities in reverse
    /// creation order.
    fn revert(&mut self, world: &mut World) -> CoreResult<()> {
        for handle in &self.created {
            world.entity(*handle)?;
        }
        self.exchange_all(world)?;
        for handle in self.created.iter().rev() {
            world.entity_mut(*handle)?.state.destroyed = true;
        }
        Ok(())
    }

    /// Swaps every snapshot with the live state. If one entity cannot be
    /// reached, the swaps already made are taken back before returning.
    fn exchange_all(&mut self, world: &mut World) -> CoreResult<()> {
        for i in 0..self.snapshots.len() {
            let handle = self.snapshots[i].handle();
            let swapped = world
                .entity_mut(handle)
                .map(|entity| self.snapshots[i].exchange(entity));
            if let Err(err) = swapped {
                for done in self.snapshots[..i].iter_mut().rev() {
                    if let Ok(entity) = world.entity_mut(done.handle()) {
                        done.exchange(entity);
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn rollback(&mut self, world: &mut World) {
        if let Err(err) = self.revert(world) {
            error!(operation = self.operation.name(), %err, "rollback failed");
        }
        self.snapshots.clear();
        self.ledger.clear();
        self.derived.clear();
    }

    fn redo(&mut self, world: &mut World) -> CoreResult<()> {
        let revived: Vec<EntityHandle> = self
            .created
            .iter()
            .copied()
            .filter(|h| self.ledger.status(*h) == Some(ChangeStatus::Created))
            .collect();
        for (i, handle) in revived.iter().enumerate() {
            if let Err(err) = world.store_mut(handle.domain()).revive(*handle) {
                for done in revived[..i].iter().rev() {
                    world.entity_mut(*done)?.state.destroyed = true;
                }
                return Err(err);
            }
        }
        if let Err(err) = self.exchange_all(world) {
            for done in revived.iter().rev() {
                world.entity_mut(*done)?.state.destroyed = true;
            }
            return Err(err);
        }
        self.state = CommandState::Executed;
        debug!(operation = self.operation.name(), "redone");
        Ok(())
    }
}

impl Command for LeafCommand {
    fn label(&self) -> &str {
        self.operation.name()
    }

    fn state(&self) -> CommandState {
        self.state
    }

    fn prepare(&mut self, world: &World, kernel: &dyn GeometricKernel) -> CoreResult<()> {
        if self.state != CommandState::Unexecuted {
            return Ok(());
        }
        self.operation.validate(world)?;
        if let Some(request) = self.operation.kernel_request(world)? {
            let shapes = request.run(kernel)?;
            self.prepared = Some(Prepared { request, shapes });
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> CoreResult<()> {
        self.state.check_executable(self.operation.name())?;
        if self.state == CommandState::Undone {
            return self.redo(ctx.world);
        }

        self.operation.validate(ctx.world)?;
        let built = self.construct(ctx.world, ctx.kernel)?;

        let mut m = Mutator {
            world: &mut *ctx.world,
            prior: ctx.prior,
            ledger: &mut self.ledger,
            snapshots: &mut self.snapshots,
            created: &mut self.created,
            derived: &mut self.derived,
        };
        if let Err(err) = self.operation.apply(&mut m, built) {
            debug!(operation = self.operation.name(), %err, "rolling back");
            self.rollback(ctx.world);
            return Err(err);
        }

        let trace = self.operation.describe(ctx.world, &self.output());
        debug!(operation = self.operation.name(), trace = %trace, touched = self.ledger.len(), "executed");
        self.trace = Some(trace);
        self.state = CommandState::Executed;
        Ok(())
    }

    fn undo(&mut self, world: &mut World) -> CoreResult<()> {
        self.state.check_undoable(self.operation.name())?;
        self.revert(world)?;
        self.state = CommandState::Undone;
        debug!(operation = self.operation.name(), "undone");
        Ok(())
    }

    fn describe(&self) -> String {
        self.trace
            .clone()
            .unwrap_or_else(|| self.operation.name().to_string())
    }

    fn changes(&self) -> Vec<(EntityHandle, ChangeStatus)> {
        self.ledger.iter().collect()
    }

    fn output(&self) -> CommandOutput {
        let mut output = CommandOutput {
            derived: self.derived.clone(),
            ..CommandOutput::default()
        };
        for (handle, status) in self.ledger.iter() {
            match status {
                ChangeStatus::Created => output.created.push(handle),
                ChangeStatus::Deleted => output.removed.push(handle),
                ChangeStatus::DisplayModified | ChangeStatus::OtherModified => {
                    output.modified.push(handle);
                }
            }
        }
        output
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.operation.targets()
    }

    fn affected(&self, world: &World) -> CoreResult<BTreeSet<EntityHandle>> {
        self.operation.affected(world)
    }

    fn compensation(&self) -> Option<Compensation> {
        self.operation.compensation()
    }

    fn release(&mut self, world: &mut World, fate: Fate) -> usize {
        let doomed: Vec<EntityHandle> = match fate {
            Fate::Evicted => self.ledger.with_status(ChangeStatus::Deleted).collect(),
            Fate::Discarded => self.created.clone(),
        };
        let mut released = 0;
        for handle in doomed {
            let live = match world.entity(handle) {
                Ok(entity) => !entity.is_destroyed(),
                Err(err) => {
                    warn!(%handle, %err, "release of unknown entity");
                    continue;
                }
            };
            if live {
                warn!(%handle, ?fate, "entity still live, not released");
                continue;
            }
            match world.store_mut(handle.domain()).release(handle) {
                Ok(_) => released += 1,
                Err(err) => warn!(%handle, %err, "release failed"),
            }
        }
        self.snapshots.clear();
        self.created.clear();
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::ReferenceKernel;
    use crate::shape::Point3;
    use crate::types::Dimension;

    /// Creates two vertices, then fails if asked to.
    #[derive(Debug)]
    struct TwoVertices {
        fail: bool,
    }

    impl Operation for TwoVertices {
        fn name(&self) -> &'static str {
            "two vertices"
        }

        fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
            let a = m.create(EntityKind::GeomVertex, ShapeData::point(Point3::ORIGIN))?;
            let b = m.create(
                EntityKind::GeomVertex,
                ShapeData::point(Point3::new(1.0, 0.0, 0.0)),
            )?;
            m.connect(a, b)?;
            if self.fail {
                return Err(CoreError::kernel("injected"));
            }
            Ok(())
        }

        fn describe(&self, world: &World, output: &CommandOutput) -> String {
            format!("create {}", world.names_of(&output.created))
        }
    }

    #[derive(Debug)]
    struct Destroy(EntityHandle);

    impl Operation for Destroy {
        fn name(&self) -> &'static str {
            "destroy"
        }

        fn targets(&self) -> Vec<EntityHandle> {
            vec![self.0]
        }

        fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
            m.destroy(self.0)?;
            // touching it twice is a defect
            m.destroy(self.0)
        }

        fn describe(&self, _world: &World, _output: &CommandOutput) -> String {
            "destroy".to_string()
        }
    }

    /// Moves every target to the same point.
    #[derive(Debug)]
    struct Flatten(Vec<EntityHandle>);

    impl Operation for Flatten {
        fn name(&self) -> &'static str {
            "flatten"
        }

        fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
            for handle in &self.0 {
                m.set_shape(*handle, ShapeData::point(Point3::new(0.0, 0.0, 5.0)))?;
            }
            Ok(())
        }

        fn describe(&self, world: &World, _output: &CommandOutput) -> String {
            format!("flatten {}", world.names_of(&self.0))
        }
    }

    fn run(command: &mut LeafCommand, world: &mut World) -> CoreResult<()> {
        let kernel = ReferenceKernel::new();
        command.execute(&mut ExecContext::new(world, &kernel))
    }

    #[test]
    fn execute_undo_redo() {
        let mut world = World::new();
        let mut cmd = LeafCommand::new(TwoVertices { fail: false });
        run(&mut cmd, &mut world).unwrap();
        assert_eq!(cmd.describe(), "create Pt0000, Pt0001");
        assert_eq!(world.geometry().live_count(Dimension::D0), 2);
        assert_eq!(cmd.output().created.len(), 2);
        // created entities need no snapshot
        assert_eq!(cmd.snapshot_count(), 0);

        cmd.undo(&mut world).unwrap();
        assert_eq!(world.geometry().live_count(Dimension::D0), 0);
        assert_eq!(cmd.state(), CommandState::Undone);

        run(&mut cmd, &mut world).unwrap();
        let names: Vec<_> = world
            .geometry()
            .live(Dimension::D0)
            .map(|(_, e)| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["Pt0000", "Pt0001"]);
    }

    #[test]
    fn invalid_transitions_are_invariants() {
        let mut world = World::new();
        let mut cmd = LeafCommand::new(TwoVertices { fail: false });
        assert!(cmd.undo(&mut world).unwrap_err().is_internal());
        run(&mut cmd, &mut world).unwrap();
        assert!(run(&mut cmd, &mut world).unwrap_err().is_internal());
    }

    #[test]
    fn failed_apply_rolls_back_and_releases() {
        let mut world = World::new();
        let mut cmd = LeafCommand::new(TwoVertices { fail: true });
        assert!(run(&mut cmd, &mut world).is_err());
        assert_eq!(world.geometry().live_count(Dimension::D0), 0);
        assert_eq!(cmd.state(), CommandState::Unexecuted);
        assert_eq!(cmd.release(&mut world, Fate::Discarded), 2);
        assert_eq!(world.geometry().allocated(), 0);
    }

    #[test]
    fn double_destroy_is_invariant_and_restores() {
        let mut world = World::new();
        let mut create = LeafCommand::new(TwoVertices { fail: false });
        run(&mut create, &mut world).unwrap();
        let a = create.output().created[0];

        let mut destroy = LeafCommand::new(Destroy(a));
        let err = run(&mut destroy, &mut world).unwrap_err();
        assert!(err.is_internal());
        let entity = world.entity(a).unwrap();
        assert!(!entity.is_destroyed());
        assert_eq!(entity.incident().len(), 1);
    }

    #[test]
    fn failed_undo_takes_back_partial_exchange() {
        let mut world = World::new();
        let mut create = LeafCommand::new(TwoVertices { fail: false });
        run(&mut create, &mut world).unwrap();
        let (a, b) = (create.output().created[0], create.output().created[1]);

        let mut flatten = LeafCommand::new(Flatten(vec![a, b]));
        run(&mut flatten, &mut world).unwrap();
        assert_eq!(flatten.snapshot_count(), 2);
        let flattened = world.entity(a).unwrap().shape().clone();

        // b's slot goes away behind the command's back
        world.store_mut(Domain::Geometry).release(b).unwrap();
        assert!(flatten.undo(&mut world).is_err());
        assert_eq!(world.entity(a).unwrap().shape(), &flattened);
        assert_eq!(flatten.state(), CommandState::Executed);
    }

    #[test]
    fn failed_redo_takes_back_partial_exchange() {
        let mut world = World::new();
        let mut create = LeafCommand::new(TwoVertices { fail: false });
        run(&mut create, &mut world).unwrap();
        let (a, b) = (create.output().created[0], create.output().created[1]);
        let original = world.entity(a).unwrap().shape().clone();

        let mut flatten = LeafCommand::new(Flatten(vec![a, b]));
        run(&mut flatten, &mut world).unwrap();
        flatten.undo(&mut world).unwrap();

        world.store_mut(Domain::Geometry).release(b).unwrap();
        assert!(run(&mut flatten, &mut world).is_err());
        assert_eq!(world.entity(a).unwrap().shape(), &original);
        assert_eq!(flatten.state(), CommandState::Undone);
    }
}
