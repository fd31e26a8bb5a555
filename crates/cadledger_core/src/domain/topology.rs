//! The topology domain: blocking entities associated with geometry.

use crate::command::{Command, CommandOutput, LeafCommand, Mutator, Operation};
use crate::domain::compensate::{
    ClearAssociation, DestroyDependents, DuplicateDependents, ExtrudeDependents,
    ReassociateDependents, TransformDependents,
};
use crate::domain::{Compensation, DependentDomain};
use crate::entity::{EntityHandle, EntityKind};
use crate::error::{CoreError, CoreResult};
use crate::kernel::BuiltShape;
use crate::shape::{ShapeData, Transform};
use crate::types::{Dimension, Domain};
use crate::world::World;
use std::collections::BTreeSet;

/// In-tree dependent domain: topology entities whose `domain_link` points
/// at their supporting geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyDomain;

impl TopologyDomain {
    /// Creates the domain.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DependentDomain for TopologyDomain {
    fn name(&self) -> &str {
        "topology"
    }

    fn dependent_entities(
        &self,
        world: &World,
        geometry: &BTreeSet<EntityHandle>,
    ) -> Vec<EntityHandle> {
        world.linked_topology(geometry)
    }

    fn compensator(&self, compensation: Compensation) -> Box<dyn Command> {
        match compensation {
            Compensation::Duplicate => LeafCommand::boxed(DuplicateDependents),
            Compensation::ClearAssociation => LeafCommand::boxed(ClearAssociation),
            Compensation::DestroyDependents => LeafCommand::boxed(DestroyDependents),
            Compensation::Transform(transform) => {
                LeafCommand::boxed(TransformDependents::new(transform))
            }
            Compensation::Reassociate => LeafCommand::boxed(ReassociateDependents),
            Compensation::Extrude(vector) => LeafCommand::boxed(ExtrudeDependents::new(vector)),
        }
    }
}

/// Checks that topology of dimension `dim` may be associated with `geometry`.
pub(crate) fn check_association(
    world: &World,
    dim: Dimension,
    geometry: EntityHandle,
) -> CoreResult<()> {
    let geom = world.live_entity(geometry)?;
    if geom.domain() != Domain::Geometry {
        return Err(CoreError::invalid_operation(format!(
            "{} is not a geometric entity",
            geom.name()
        )));
    }
    if geom.dimension() < dim {
        return Err(CoreError::invalid_operation(format!(
            "cannot associate a dimension {dim} entity with {} of dimension {}",
            geom.name(),
            geom.dimension()
        )));
    }
    Ok(())
}

/// Creates one topology entity, optionally associated and bounded.
#[derive(Debug, Clone)]
pub struct CreateTopology {
    dimension: Dimension,
    link: Option<EntityHandle>,
    bounds: Vec<EntityHandle>,
}

impl CreateTopology {
    /// Creates the operation. `bounds` are lower-dimension topology entities
    /// the new entity is incident to.
    #[must_use]
    pub fn new(dimension: Dimension, link: Option<EntityHandle>, bounds: Vec<EntityHandle>) -> Self {
        Self {
            dimension,
            link,
            bounds,
        }
    }
}

impl Operation for CreateTopology {
    fn name(&self) -> &'static str {
        "create topology"
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.link.iter().chain(&self.bounds).copied().collect()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        if let Some(link) = self.link {
            check_association(world, self.dimension, link)?;
        }
        for bound in &self.bounds {
            let entity = world.live_entity(*bound)?;
            if entity.domain() != Domain::Topology || entity.dimension() >= self.dimension {
                return Err(CoreError::invalid_operation(format!(
                    "{} cannot bound a dimension {} topology entity",
                    entity.name(),
                    self.dimension
                )));
            }
        }
        Ok(())
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let shape = match self.link {
            Some(link) => m.world().entity(link)?.shape().clone(),
            None => {
                let mut shape = ShapeData::default();
                for bound in &self.bounds {
                    shape.merge(m.world().entity(*bound)?.shape());
                }
                shape
            }
        };
        let kind = EntityKind::of(Domain::Topology, self.dimension);
        let created = m.create(kind, shape)?;
        for bound in &self.bounds {
            m.connect(created, *bound)?;
        }
        if self.link.is_some() {
            m.set_link(created, self.link)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        let mut trace = format!("create topology {}", world.names_of(&output.created));
        if !self.bounds.is_empty() {
            trace.push_str(&format!(" bounded by {}", world.names_of(&self.bounds)));
        }
        if let Some(link) = self.link {
            trace.push_str(&format!(" on {}", world.names_of(&[link])));
        }
        trace
    }
}

/// Sets (or clears) the geometry association of topology entities.
#[derive(Debug, Clone)]
pub struct Associate {
    topology: Vec<EntityHandle>,
    geometry: Option<EntityHandle>,
}

impl Associate {
    /// Associates `topology` with `geometry`, or clears it with `None`.
    #[must_use]
    pub fn new(topology: Vec<EntityHandle>, geometry: Option<EntityHandle>) -> Self {
        Self { topology, geometry }
    }
}

impl Operation for Associate {
    fn name(&self) -> &'static str {
        "associate"
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.topology.iter().chain(&self.geometry).copied().collect()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        if self.topology.is_empty() {
            return Err(CoreError::empty_selection(self.name()));
        }
        for handle in &self.topology {
            let entity = world.live_entity(*handle)?;
            if entity.domain() != Domain::Topology {
                return Err(CoreError::invalid_operation(format!(
                    "{} is not a topological entity",
                    entity.name()
                )));
            }
            if let Some(geometry) = self.geometry {
                check_association(world, entity.dimension(), geometry)?;
            }
        }
        Ok(())
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        for handle in &self.topology {
            m.set_link(*handle, self.geometry)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, _output: &CommandOutput) -> String {
        match self.geometry {
            Some(geometry) => format!(
                "associate {} with {}",
                world.names_of(&self.topology),
                world.names_of(&[geometry])
            ),
            None => format!("clear association of {}", world.names_of(&self.topology)),
        }
    }
}

/// Destroys topology entities and everything built on them.
#[derive(Debug, Clone)]
pub struct DestroyTopology {
    targets: Vec<EntityHandle>,
}

impl DestroyTopology {
    /// Creates the operation.
    #[must_use]
    pub fn new(targets: Vec<EntityHandle>) -> Self {
        Self { targets }
    }
}

impl Operation for DestroyTopology {
    fn name(&self) -> &'static str {
        "destroy topology"
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        if self.targets.is_empty() {
            return Err(CoreError::empty_selection(self.name()));
        }
        for handle in &self.targets {
            if world.live_entity(*handle)?.domain() != Domain::Topology {
                return Err(CoreError::invalid_operation(format!(
                    "{} is not a topological entity",
                    world.names_of(&[*handle])
                )));
            }
        }
        Ok(())
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let closure = m.world().upward_closure(&self.targets)?;
        for handle in m.world().by_descending_dimension(closure)? {
            m.destroy(handle)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, _output: &CommandOutput) -> String {
        format!("destroy topology {}", world.names_of(&self.targets))
    }
}

/// Applies a transform to topology entities in place.
#[derive(Debug, Clone)]
pub struct TransformTopology {
    targets: Vec<EntityHandle>,
    transform: Transform,
}

impl TransformTopology {
    /// Creates the operation.
    #[must_use]
    pub fn new(targets: Vec<EntityHandle>, transform: Transform) -> Self {
        Self { targets, transform }
    }
}

impl Operation for TransformTopology {
    fn name(&self) -> &'static str {
        "transform topology"
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        if let Some(reason) = self.transform.degeneracy() {
            return Err(CoreError::invalid_operation(reason));
        }
        for handle in &self.targets {
            world.live_entity(*handle)?;
        }
        Ok(())
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        for handle in &self.targets {
            let shape = m.world().entity(*handle)?.shape().transformed(&self.transform);
            m.set_shape(*handle, shape)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, _output: &CommandOutput) -> String {
        format!("{} topology {}", self.transform.verb(), world.names_of(&self.targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ExecContext;
    use crate::entity::Entity;
    use crate::kernel::ReferenceKernel;
    use crate::shape::Point3;

    fn geometry(world: &mut World, kind: EntityKind) -> EntityHandle {
        let name = world.names_mut().allocate(kind);
        world
            .store_mut(Domain::Geometry)
            .add(Entity::new(name, kind, ShapeData::point(Point3::ORIGIN)))
            .unwrap()
    }

    fn run(world: &mut World, op: impl Operation + 'static) -> CoreResult<LeafCommand> {
        let kernel = ReferenceKernel::new();
        let mut cmd = LeafCommand::new(op);
        cmd.execute(&mut ExecContext::new(world, &kernel))?;
        Ok(cmd)
    }

    #[test]
    fn create_edge_on_curve() {
        let mut world = World::new();
        let curve = geometry(&mut world, EntityKind::GeomCurve);
        let cmd = run(&mut world, CreateTopology::new(Dimension::D1, Some(curve), vec![])).unwrap();
        let edge = cmd.output().created[0];
        assert_eq!(world.entity(edge).unwrap().domain_link(), Some(curve));
        assert_eq!(cmd.describe(), "create topology Edg0000 on Crv0000");
    }

    #[test]
    fn association_dimension_rule() {
        let mut world = World::new();
        let vertex = geometry(&mut world, EntityKind::GeomVertex);
        let err = run(&mut world, CreateTopology::new(Dimension::D1, Some(vertex), vec![]))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));

        // an edge may sit on a surface
        let surface = geometry(&mut world, EntityKind::GeomSurface);
        assert!(run(&mut world, CreateTopology::new(Dimension::D1, Some(surface), vec![])).is_ok());
    }

    #[test]
    fn destroy_topology_takes_upward_closure() {
        let mut world = World::new();
        let v = run(&mut world, CreateTopology::new(Dimension::D0, None, vec![]))
            .unwrap()
            .output()
            .created[0];
        let e = run(&mut world, CreateTopology::new(Dimension::D1, None, vec![v]))
            .unwrap()
            .output()
            .created[0];
        let mut cmd = run(&mut world, DestroyTopology::new(vec![v])).unwrap();
        assert!(world.entity(e).unwrap().is_destroyed());

        cmd.undo(&mut world).unwrap();
        assert!(world.entity(e).unwrap().incident().contains(&v));
    }

    #[test]
    fn clear_association() {
        let mut world = World::new();
        let curve = geometry(&mut world, EntityKind::GeomCurve);
        let edge = run(&mut world, CreateTopology::new(Dimension::D1, Some(curve), vec![]))
            .unwrap()
            .output()
            .created[0];
        let cmd = run(&mut world, Associate::new(vec![edge], None)).unwrap();
        assert_eq!(world.entity(edge).unwrap().domain_link(), None);
        assert_eq!(cmd.describe(), "clear association of Edg0000");
    }
}
