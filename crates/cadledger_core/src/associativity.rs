//! Cross-domain associativity.
//!
//! A geometry command that touches geometry referenced by the dependent
//! domain is wrapped, right before it executes, in a composite that runs
//! the domain's compensating command after it. Both then commit or fail
//! together. The transaction manager guards every command it commits and
//! composites guard each child in turn, so the decision is always made
//! against the world the command actually runs on.

use crate::command::{Command, CompositeCommand};
use crate::domain::{Compensation, DependentDomain};
use crate::entity::EntityHandle;
use crate::error::CoreResult;
use crate::types::Domain;
use crate::world::World;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Wraps primary commands with the dependent domain's compensations.
#[derive(Debug, Clone)]
pub struct AssociativityPolicy {
    domain: Arc<dyn DependentDomain>,
}

impl AssociativityPolicy {
    /// Creates a policy for `domain`.
    #[must_use]
    pub fn new(domain: Arc<dyn DependentDomain>) -> Self {
        Self { domain }
    }

    /// Returns the dependent domain.
    #[must_use]
    pub fn domain(&self) -> &Arc<dyn DependentDomain> {
        &self.domain
    }

    /// Returns true if any dependent entity references one of `entities`.
    #[must_use]
    pub fn referenced_by_dependent_domain(
        &self,
        world: &World,
        entities: &BTreeSet<EntityHandle>,
    ) -> bool {
        let geometry: BTreeSet<EntityHandle> = entities
            .iter()
            .copied()
            .filter(|h| h.domain() == Domain::Geometry)
            .collect();
        !geometry.is_empty() && !self.domain.dependent_entities(world, &geometry).is_empty()
    }

    /// Builds the compensating command for `compensation`.
    #[must_use]
    pub fn build_compensating_command(&self, compensation: Compensation) -> Box<dyn Command> {
        self.domain.compensator(compensation)
    }

    /// Returns the compensating command `primary` needs against `world`,
    /// `None` when it declares no compensation or touches nothing the
    /// dependent domain references.
    pub fn compensator_for(
        &self,
        world: &World,
        primary: &dyn Command,
    ) -> CoreResult<Option<Box<dyn Command>>> {
        let Some(compensation) = primary.compensation() else {
            return Ok(None);
        };
        let affected = primary.affected(world)?;
        if !self.referenced_by_dependent_domain(world, &affected) {
            return Ok(None);
        }
        debug!(
            command = primary.label(),
            domain = self.domain.name(),
            ?compensation,
            "wrapping with compensation"
        );
        Ok(Some(self.build_compensating_command(compensation)))
    }

    /// Returns `primary`, or the composite `[primary, compensator]` when its
    /// affected entities are referenced by the dependent domain.
    ///
    /// A composite is returned as is; its children are guarded one by one
    /// when it executes, each against the world its earlier siblings left.
    pub fn guard(&self, world: &World, primary: Box<dyn Command>) -> CoreResult<Box<dyn Command>> {
        Ok(match self.compensator_for(world, primary.as_ref())? {
            Some(compensator) => {
                Box::new(CompositeCommand::compensated(vec![primary, compensator]))
            }
            None => primary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ExecContext, LeafCommand};
    use crate::domain::{Associate, CreateTopology, TopologyDomain};
    use crate::geometry::{CreateBounded, CreateVertex, DestroyGeometry};
    use crate::kernel::ReferenceKernel;
    use crate::shape::Point3;
    use crate::types::Dimension;

    fn run(world: &mut World, mut cmd: Box<dyn Command>) -> Box<dyn Command> {
        let kernel = ReferenceKernel::new();
        cmd.execute(&mut ExecContext::new(world, &kernel)).unwrap();
        cmd
    }

    fn run_guarded(
        world: &mut World,
        policy: &AssociativityPolicy,
        mut cmd: Box<dyn Command>,
    ) -> Box<dyn Command> {
        let kernel = ReferenceKernel::new();
        cmd.execute(&mut ExecContext::guarded(world, &kernel, policy)).unwrap();
        cmd
    }

    fn policy() -> AssociativityPolicy {
        AssociativityPolicy::new(Arc::new(TopologyDomain::new()))
    }

    fn segment_with_edge(world: &mut World) -> (EntityHandle, EntityHandle, EntityHandle) {
        let a = run(world, LeafCommand::boxed(CreateVertex::new(Point3::ORIGIN))).output().created[0];
        let b = run(
            world,
            LeafCommand::boxed(CreateVertex::new(Point3::new(1.0, 0.0, 0.0))),
        )
        .output()
        .created[0];
        let ab = run(world, LeafCommand::boxed(CreateBounded::new(Dimension::D1, vec![a, b])))
            .output()
            .created[0];
        let edge = run(
            world,
            LeafCommand::boxed(CreateTopology::new(Dimension::D1, Some(ab), Vec::new())),
        )
        .output()
        .created[0];
        (a, ab, edge)
    }

    #[test]
    fn unreferenced_primary_passes_through() {
        let mut world = World::new();
        let a = run(&mut world, LeafCommand::boxed(CreateVertex::new(Point3::ORIGIN)))
            .output()
            .created[0];
        let guarded = policy()
            .guard(&world, LeafCommand::boxed(DestroyGeometry::new(vec![a], false)))
            .unwrap();
        assert_eq!(guarded.label(), "destroy");
    }

    #[test]
    fn destroy_of_vertex_reaches_edge_through_closure() {
        let mut world = World::new();
        let (a, _, edge) = segment_with_edge(&mut world);
        let policy = policy();
        let primary = LeafCommand::boxed(DestroyGeometry::new(vec![a], false));
        let guarded = policy.guard(&world, primary).unwrap();
        assert_eq!(guarded.label(), "composite");

        let mut guarded = run(&mut world, guarded);
        assert_eq!(world.entity(edge).unwrap().domain_link(), None);
        assert_eq!(
            guarded.describe(),
            "destroy Pt0000; clear association of Edg0000"
        );

        guarded.undo(&mut world).unwrap();
        assert!(world.entity(edge).unwrap().domain_link().is_some());
    }

    #[test]
    fn destroy_with_topology_removes_dependents() {
        let mut world = World::new();
        let (a, _, edge) = segment_with_edge(&mut world);
        let primary = LeafCommand::boxed(DestroyGeometry::new(vec![a], false).with_dependents());
        let guarded = policy().guard(&world, primary).unwrap();
        run(&mut world, guarded);
        assert!(world.entity(edge).unwrap().is_destroyed());
        assert_eq!(world.topology().live_count(Dimension::D1), 0);
    }

    #[test]
    fn referenced_ignores_topology_handles() {
        let mut world = World::new();
        let (_, ab, edge) = segment_with_edge(&mut world);
        let policy = policy();
        assert!(policy.referenced_by_dependent_domain(&world, &[ab].into_iter().collect()));
        assert!(!policy.referenced_by_dependent_domain(&world, &[edge].into_iter().collect()));
    }

    #[test]
    fn wrapped_primary_is_not_wrapped_twice() {
        let mut world = World::new();
        let (a, _, _) = segment_with_edge(&mut world);
        let policy = policy();
        let guarded = policy
            .guard(&world, LeafCommand::boxed(DestroyGeometry::new(vec![a], false)))
            .unwrap();
        let guarded = run_guarded(&mut world, &policy, guarded);
        assert_eq!(
            guarded.describe(),
            "destroy Pt0000; clear association of Edg0000"
        );
    }

    #[test]
    fn composite_children_are_guarded_in_turn() {
        let mut world = World::new();
        let (_, ab, linked) = segment_with_edge(&mut world);
        // a second edge, associated only by the composite itself
        let edge = run(
            &mut world,
            LeafCommand::boxed(CreateTopology::new(Dimension::D1, None, Vec::new())),
        )
        .output()
        .created[0];
        let policy = policy();

        let composite: Box<dyn Command> = Box::new(CompositeCommand::new(vec![
            LeafCommand::boxed(Associate::new(vec![edge], Some(ab))),
            LeafCommand::boxed(DestroyGeometry::new(vec![ab], false)),
        ]));
        // a composite declares no compensation of its own
        let composite = policy.guard(&world, composite).unwrap();
        assert_eq!(composite.label(), "composite");

        let mut composite = run_guarded(&mut world, &policy, composite);
        assert!(world.entity(ab).unwrap().is_destroyed());
        assert_eq!(world.entity(edge).unwrap().domain_link(), None);
        assert_eq!(world.entity(linked).unwrap().domain_link(), None);
        assert!(composite
            .describe()
            .contains("destroy Crv0000; clear association of"));

        composite.undo(&mut world).unwrap();
        assert!(!world.entity(ab).unwrap().is_destroyed());
        assert_eq!(world.entity(edge).unwrap().domain_link(), None);
        assert_eq!(world.entity(linked).unwrap().domain_link(), Some(ab));
    }
}
