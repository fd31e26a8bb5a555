//! Compensating operations run by the topology domain after a geometry
//! command, inside the same composite.
//!
//! Each reads what the geometry command did from the prior sibling outputs,
//! so it works on the state the primary actually produced.

use crate::command::{CommandOutput, Mutator, Operation};
use crate::entity::{EntityHandle, EntityKind};
use crate::error::CoreResult;
use crate::kernel::BuiltShape;
use crate::shape::{Point3, Transform};
use crate::types::Domain;
use crate::world::World;
use std::collections::{BTreeMap, BTreeSet};

fn describe_touched(verb: &str, world: &World, handles: &[EntityHandle]) -> String {
    if handles.is_empty() {
        format!("{verb} (nothing)")
    } else {
        format!("{verb} {}", world.names_of(handles))
    }
}

fn topology_only(handles: &[EntityHandle]) -> Vec<EntityHandle> {
    handles
        .iter()
        .copied()
        .filter(|h| h.domain() == Domain::Topology)
        .collect()
}

/// Clears associations pointing at geometry destroyed by the primary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearAssociation;

impl Operation for ClearAssociation {
    fn name(&self) -> &'static str {
        "clear association"
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let removed: BTreeSet<EntityHandle> = m.prior_output().removed.into_iter().collect();
        for dependent in m.world().linked_topology(&removed) {
            m.set_link(dependent, None)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        describe_touched("clear association of", world, &output.modified)
    }
}

/// Destroys dependents of destroyed geometry, with what is built on them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyDependents;

impl Operation for DestroyDependents {
    fn name(&self) -> &'static str {
        "destroy dependents"
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let removed: BTreeSet<EntityHandle> = m.prior_output().removed.into_iter().collect();
        let dependents = m.world().linked_topology(&removed);
        let closure = m.world().upward_closure(&dependents)?;
        for handle in m.world().by_descending_dimension(closure)? {
            m.destroy(handle)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        describe_touched("destroy topology", world, &topology_only(&output.removed))
    }
}

/// Duplicates dependents of copied geometry onto the copies.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateDependents;

impl Operation for DuplicateDependents {
    fn name(&self) -> &'static str {
        "duplicate dependents"
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let derived = m.prior_output().derived;
        let mut copies: BTreeMap<EntityHandle, EntityHandle> = BTreeMap::new();
        for (source, product) in derived {
            let single: BTreeSet<EntityHandle> = [source].into_iter().collect();
            for dependent in m.world().linked_topology(&single) {
                if copies.contains_key(&dependent) {
                    continue;
                }
                let original = m.world().entity(dependent)?;
                let (kind, shape) = (original.kind(), original.shape().clone());
                let copy = m.create(kind, shape)?;
                m.set_link(copy, Some(product))?;
                copies.insert(dependent, copy);
            }
        }
        // mirror the incidences among duplicated entities
        for (original, copy) in &copies {
            let neighbours: Vec<EntityHandle> =
                m.world().entity(*original)?.incident().iter().copied().collect();
            for neighbour in neighbours {
                if let Some(other) = copies.get(&neighbour) {
                    if original < &neighbour {
                        m.connect(*copy, *other)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        describe_touched("duplicate topology as", world, &output.created)
    }
}

/// Moves dependents of transformed geometry in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct TransformDependents {
    transform: Transform,
}

impl TransformDependents {
    /// Creates the operation.
    #[must_use]
    pub fn new(transform: Transform) -> Self {
        Self { transform }
    }
}

impl Operation for TransformDependents {
    fn name(&self) -> &'static str {
        "transform dependents"
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let modified: BTreeSet<EntityHandle> = m
            .prior_output()
            .modified
            .into_iter()
            .filter(|h| h.domain() == Domain::Geometry)
            .collect();
        for dependent in m.world().linked_topology(&modified) {
            let shape = m.world().entity(dependent)?.shape().transformed(&self.transform);
            m.set_shape(dependent, shape)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        describe_touched(
            &format!("{} topology", self.transform.verb()),
            world,
            &output.modified,
        )
    }
}

/// Points dependents of replaced geometry at the replacement, or clears
/// the association when no replacement of a high enough dimension exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReassociateDependents;

impl Operation for ReassociateDependents {
    fn name(&self) -> &'static str {
        "reassociate dependents"
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let prior = m.prior_output();
        let removed: BTreeSet<EntityHandle> = prior.removed.iter().copied().collect();
        for dependent in m.world().linked_topology(&removed) {
            let entity = m.world().entity(dependent)?;
            let dim = entity.dimension();
            let Some(source) = entity.domain_link() else {
                continue;
            };
            let mut replacement = None;
            for (s, product) in &prior.derived {
                if *s != source {
                    continue;
                }
                let candidate = m.world().entity(*product)?;
                if !candidate.is_destroyed() && candidate.dimension() >= dim {
                    replacement = Some(*product);
                    break;
                }
            }
            m.set_link(dependent, replacement)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        describe_touched("reassociate", world, &output.modified)
    }
}

/// Extrudes dependents of extruded geometry, associating the new
/// topology with the extruded geometry.
#[derive(Debug, Clone, Copy)]
pub struct ExtrudeDependents {
    vector: Point3,
}

impl ExtrudeDependents {
    /// Creates the operation.
    #[must_use]
    pub fn new(vector: Point3) -> Self {
        Self { vector }
    }
}

impl Operation for ExtrudeDependents {
    fn name(&self) -> &'static str {
        "extrude dependents"
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        let translate = Transform::Translate {
            vector: self.vector,
        };
        for (source, product) in m.prior_output().derived {
            let single: BTreeSet<EntityHandle> = [source].into_iter().collect();
            for dependent in m.world().linked_topology(&single) {
                let entity = m.world().entity(dependent)?;
                let Some(dim) = entity.dimension().up() else {
                    continue;
                };
                let mut shape = entity.shape().clone();
                shape.merge(&entity.shape().transformed(&translate));
                let swept = m.create(EntityKind::of(Domain::Topology, dim), shape)?;
                m.connect(swept, dependent)?;
                m.set_link(swept, Some(product))?;
            }
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        describe_touched("extrude topology as", world, &output.created)
    }
}
