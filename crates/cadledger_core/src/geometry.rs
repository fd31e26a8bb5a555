//! Geometry operations.
//!
//! Every operation here is wrapped in a [`LeafCommand`](crate::LeafCommand)
//! and, when it modifies existing geometry, guarded by the
//! [`AssociativityPolicy`](crate::AssociativityPolicy) so the topology built
//! on it follows.

use crate::command::{CommandOutput, Mutator, Operation};
use crate::domain::Compensation;
use crate::entity::{EntityHandle, EntityKind};
use crate::error::{CoreError, CoreResult};
use crate::kernel::{BuiltShape, KernelInput, KernelOp, KernelRequest};
use crate::shape::{Plane, Point3, ShapeData, Transform, EPSILON};
use crate::types::{Dimension, Domain};
use crate::world::World;
use std::collections::{BTreeMap, BTreeSet};

fn require_geometry(name: &str, targets: &[EntityHandle], world: &World) -> CoreResult<()> {
    if targets.is_empty() {
        return Err(CoreError::empty_selection(name));
    }
    for handle in targets {
        let entity = world.live_entity(*handle)?;
        if entity.domain() != Domain::Geometry {
            return Err(CoreError::invalid_operation(format!(
                "{name}: {} is not a geometric entity",
                entity.name()
            )));
        }
    }
    Ok(())
}

fn kernel_inputs(world: &World, handles: &[EntityHandle]) -> CoreResult<Vec<KernelInput>> {
    handles
        .iter()
        .map(|h| {
            let entity = world.entity(*h)?;
            Ok(KernelInput {
                dimension: entity.dimension(),
                shape: entity.shape().clone(),
            })
        })
        .collect()
}

/// Downward closure of `targets`, lowest dimension first.
fn ascending_closure(world: &World, targets: &[EntityHandle]) -> CoreResult<Vec<EntityHandle>> {
    let mut keyed = world
        .downward_closure(targets)?
        .into_iter()
        .map(|h| Ok((world.entity(h)?.dimension(), h)))
        .collect::<CoreResult<Vec<_>>>()?;
    keyed.sort_by_key(|(dim, _)| *dim);
    Ok(keyed.into_iter().map(|(_, h)| h).collect())
}

fn expect_shapes(name: &str, built: &[BuiltShape], count: usize) -> CoreResult<()> {
    if built.len() != count {
        return Err(CoreError::invariant(format!(
            "{name}: kernel returned {} shapes, expected {count}",
            built.len()
        )));
    }
    Ok(())
}

fn geometry_kind(dim: Dimension) -> EntityKind {
    EntityKind::of(Domain::Geometry, dim)
}

/// Creates a geometric vertex.
#[derive(Debug, Clone, Copy)]
pub struct CreateVertex {
    point: Point3,
}

impl CreateVertex {
    /// Creates the operation.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self { point }
    }
}

impl Operation for CreateVertex {
    fn name(&self) -> &'static str {
        "create vertex"
    }

    fn kernel_request(&self, _world: &World) -> CoreResult<Option<KernelRequest>> {
        Ok(Some(KernelRequest::new(KernelOp::Vertex(self.point), Vec::new())))
    }

    fn apply(&self, m: &mut Mutator<'_>, built: Vec<BuiltShape>) -> CoreResult<()> {
        expect_shapes(self.name(), &built, 1)?;
        for shape in built {
            m.create(EntityKind::GeomVertex, shape.shape)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        format!(
            "create vertex {} at {}",
            world.names_of(&output.created),
            self.point
        )
    }
}

/// Creates a curve, surface or volume from entities one dimension down.
#[derive(Debug, Clone)]
pub struct CreateBounded {
    dimension: Dimension,
    bounds: Vec<EntityHandle>,
}

impl CreateBounded {
    /// Creates the operation.
    #[must_use]
    pub fn new(dimension: Dimension, bounds: Vec<EntityHandle>) -> Self {
        Self { dimension, bounds }
    }
}

impl Operation for CreateBounded {
    fn name(&self) -> &'static str {
        match self.dimension.as_u8() {
            1 => "create curve",
            2 => "create surface",
            _ => "create volume",
        }
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.bounds.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        let Some(below) = self.dimension.down() else {
            return Err(CoreError::invalid_operation("vertices are not bounded"));
        };
        require_geometry(self.name(), &self.bounds, world)?;
        for handle in &self.bounds {
            let entity = world.entity(*handle)?;
            if entity.dimension() != below {
                return Err(CoreError::invalid_operation(format!(
                    "{}: {} has dimension {}, expected {below}",
                    self.name(),
                    entity.name(),
                    entity.dimension()
                )));
            }
        }
        let distinct: BTreeSet<&EntityHandle> = self.bounds.iter().collect();
        if self.dimension == Dimension::D1 && (self.bounds.len() != 2 || distinct.len() != 2) {
            return Err(CoreError::invalid_operation(
                "a curve needs two distinct vertices",
            ));
        }
        Ok(())
    }

    fn kernel_request(&self, world: &World) -> CoreResult<Option<KernelRequest>> {
        let op = match self.dimension.as_u8() {
            1 => KernelOp::Segment,
            2 => KernelOp::Surface,
            _ => KernelOp::Volume,
        };
        Ok(Some(KernelRequest::new(op, kernel_inputs(world, &self.bounds)?)))
    }

    fn apply(&self, m: &mut Mutator<'_>, built: Vec<BuiltShape>) -> CoreResult<()> {
        expect_shapes(self.name(), &built, 1)?;
        for shape in built {
            let created = m.create(geometry_kind(shape.dimension), shape.shape)?;
            let bounds: BTreeSet<EntityHandle> = self.bounds.iter().copied().collect();
            for bound in bounds {
                m.connect(created, bound)?;
            }
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        format!(
            "{} {} from {}",
            self.name(),
            world.names_of(&output.created),
            world.names_of(&self.bounds)
        )
    }
}

/// Copies entities together with everything below them.
#[derive(Debug, Clone)]
pub struct CopyGeometry {
    targets: Vec<EntityHandle>,
}

impl CopyGeometry {
    /// Creates the operation.
    #[must_use]
    pub fn new(targets: Vec<EntityHandle>) -> Self {
        Self { targets }
    }
}

impl Operation for CopyGeometry {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        require_geometry(self.name(), &self.targets, world)
    }

    fn kernel_request(&self, world: &World) -> CoreResult<Option<KernelRequest>> {
        let closure = ascending_closure(world, &self.targets)?;
        Ok(Some(KernelRequest::new(
            KernelOp::Copy,
            kernel_inputs(world, &closure)?,
        )))
    }

    fn apply(&self, m: &mut Mutator<'_>, built: Vec<BuiltShape>) -> CoreResult<()> {
        let closure = ascending_closure(m.world(), &self.targets)?;
        expect_shapes(self.name(), &built, closure.len())?;

        let mut copies = BTreeMap::new();
        for (original, shape) in closure.iter().zip(built) {
            let copy = m.create(geometry_kind(shape.dimension), shape.shape)?;
            m.derive(*original, copy);
            copies.insert(*original, copy);
        }
        for original in &closure {
            let neighbours: Vec<EntityHandle> =
                m.world().entity(*original)?.incident().iter().copied().collect();
            for neighbour in neighbours {
                if let (Some(a), Some(b)) = (copies.get(original), copies.get(&neighbour)) {
                    if *original < neighbour {
                        m.connect(*a, *b)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        format!(
            "copy {} as {}",
            world.names_of(&self.targets),
            world.names_of(&output.created)
        )
    }

    fn affected(&self, world: &World) -> CoreResult<BTreeSet<EntityHandle>> {
        world.downward_closure(&self.targets)
    }

    fn compensation(&self) -> Option<Compensation> {
        Some(Compensation::Duplicate)
    }
}

/// Destroys entities and everything built on them.
///
/// With `propagate_down`, lower-dimension entities left without any live
/// entity above them are destroyed too.
#[derive(Debug, Clone)]
pub struct DestroyGeometry {
    targets: Vec<EntityHandle>,
    propagate_down: bool,
    with_dependents: bool,
}

impl DestroyGeometry {
    /// Creates the operation. Dependents get their association cleared.
    #[must_use]
    pub fn new(targets: Vec<EntityHandle>, propagate_down: bool) -> Self {
        Self {
            targets,
            propagate_down,
            with_dependents: false,
        }
    }

    /// Destroys dependents instead of clearing their association.
    #[must_use]
    pub fn with_dependents(mut self) -> Self {
        self.with_dependents = true;
        self
    }

    /// Every entity the operation will destroy, highest dimension first.
    pub fn doomed(&self, world: &World) -> CoreResult<Vec<EntityHandle>> {
        let mut doomed = world.upward_closure(&self.targets)?;
        if self.propagate_down {
            let seeds: Vec<EntityHandle> = doomed.iter().copied().collect();
            let below: Vec<EntityHandle> = world
                .by_descending_dimension(world.downward_closure(&seeds)?)?
                .into_iter()
                .filter(|h| !doomed.contains(h))
                .collect();
            for candidate in below {
                let entity = world.entity(candidate)?;
                let orphaned = entity.incident().iter().all(|n| {
                    doomed.contains(n)
                        || world
                            .entity(*n)
                            .map(|e| e.dimension() < entity.dimension())
                            .unwrap_or(true)
                });
                if orphaned {
                    doomed.insert(candidate);
                }
            }
        }
        world.by_descending_dimension(doomed)
    }
}

impl Operation for DestroyGeometry {
    fn name(&self) -> &'static str {
        if self.with_dependents {
            "destroy with topology"
        } else {
            "destroy"
        }
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        require_geometry(self.name(), &self.targets, world)
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        for handle in self.doomed(m.world())? {
            m.destroy(handle)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, _output: &CommandOutput) -> String {
        format!("{} {}", self.name(), world.names_of(&self.targets))
    }

    fn affected(&self, world: &World) -> CoreResult<BTreeSet<EntityHandle>> {
        Ok(self.doomed(world)?.into_iter().collect())
    }

    fn compensation(&self) -> Option<Compensation> {
        if self.with_dependents {
            Some(Compensation::DestroyDependents)
        } else {
            Some(Compensation::ClearAssociation)
        }
    }
}

/// Translates, rotates, scales or mirrors entities and everything below them.
#[derive(Debug, Clone)]
pub struct TransformGeometry {
    targets: Vec<EntityHandle>,
    transform: Transform,
}

impl TransformGeometry {
    /// Creates the operation.
    #[must_use]
    pub fn new(targets: Vec<EntityHandle>, transform: Transform) -> Self {
        Self { targets, transform }
    }
}

impl Operation for TransformGeometry {
    fn name(&self) -> &'static str {
        self.transform.verb()
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        if let Some(reason) = self.transform.degeneracy() {
            return Err(CoreError::invalid_operation(reason));
        }
        require_geometry(self.name(), &self.targets, world)
    }

    fn kernel_request(&self, world: &World) -> CoreResult<Option<KernelRequest>> {
        let closure = ascending_closure(world, &self.targets)?;
        Ok(Some(KernelRequest::new(
            KernelOp::Transform(self.transform),
            kernel_inputs(world, &closure)?,
        )))
    }

    fn apply(&self, m: &mut Mutator<'_>, built: Vec<BuiltShape>) -> CoreResult<()> {
        let closure = ascending_closure(m.world(), &self.targets)?;
        expect_shapes(self.name(), &built, closure.len())?;
        for (handle, shape) in closure.into_iter().zip(built) {
            m.set_shape(handle, shape.shape)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, _output: &CommandOutput) -> String {
        let names = world.names_of(&self.targets);
        match self.transform {
            Transform::Translate { vector } => format!("translate {names} by {vector}"),
            Transform::Rotate {
                origin,
                axis,
                degrees,
            } => format!("rotate {names} by {degrees} degrees around {axis} through {origin}"),
            Transform::Scale { center, factor } => {
                format!("scale {names} by {factor} about {center}")
            }
            Transform::Mirror { plane } => format!(
                "mirror {names} through plane {} normal {}",
                plane.origin, plane.normal
            ),
        }
    }

    fn affected(&self, world: &World) -> CoreResult<BTreeSet<EntityHandle>> {
        world.downward_closure(&self.targets)
    }

    fn compensation(&self) -> Option<Compensation> {
        Some(Compensation::Transform(self.transform))
    }
}

/// Operations that replace their inputs by kernel products.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Replacement {
    /// Union of all inputs.
    Fuse,
    /// First input minus the others.
    Cut,
    /// Common part of all inputs.
    Intersect,
    /// Each input split by a plane.
    Section(Plane),
    /// Curves joined into one.
    Join,
    /// One curve split into equal parts.
    Split {
        /// Number of parts.
        parts: usize,
    },
}

impl Replacement {
    /// Operation name used in traces.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fuse => "fuse",
            Self::Cut => "cut",
            Self::Intersect => "intersect",
            Self::Section(_) => "section",
            Self::Join => "join",
            Self::Split { .. } => "split",
        }
    }

    fn kernel_op(&self) -> KernelOp {
        match *self {
            Self::Fuse => KernelOp::Fuse,
            Self::Cut => KernelOp::Cut,
            Self::Intersect => KernelOp::Intersect,
            Self::Section(plane) => KernelOp::Section(plane),
            Self::Join => KernelOp::Join,
            Self::Split { parts } => KernelOp::Split { parts },
        }
    }
}

/// Replaces entities by what the kernel builds from them.
///
/// Products take over the neighbours of their sources: every entity above
/// a source, and every entity below a source that lies on the product.
#[derive(Debug, Clone)]
pub struct ReplaceGeometry {
    replacement: Replacement,
    targets: Vec<EntityHandle>,
}

impl ReplaceGeometry {
    /// Creates the operation.
    #[must_use]
    pub fn new(replacement: Replacement, targets: Vec<EntityHandle>) -> Self {
        Self {
            replacement,
            targets,
        }
    }
}

fn lies_on(inner: &ShapeData, outer: &ShapeData) -> bool {
    !inner.is_empty() && inner.points.iter().all(|p| outer.contains(*p))
}

impl Operation for ReplaceGeometry {
    fn name(&self) -> &'static str {
        self.replacement.name()
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        require_geometry(self.name(), &self.targets, world)?;
        let distinct: BTreeSet<&EntityHandle> = self.targets.iter().collect();
        if distinct.len() != self.targets.len() {
            return Err(CoreError::invalid_operation(format!(
                "{}: repeated input",
                self.name()
            )));
        }
        let curves_only = || {
            self.targets.iter().all(|h| {
                world
                    .entity(*h)
                    .map(|e| e.dimension() == Dimension::D1)
                    .unwrap_or(false)
            })
        };
        let ok = match self.replacement {
            Replacement::Fuse | Replacement::Cut | Replacement::Intersect => {
                self.targets.len() >= 2
            }
            Replacement::Section(plane) => plane.normal.norm() >= EPSILON,
            Replacement::Join => self.targets.len() >= 2 && curves_only(),
            Replacement::Split { parts } => self.targets.len() == 1 && curves_only() && parts >= 2,
        };
        if !ok {
            return Err(CoreError::invalid_operation(format!(
                "{}: unsupported selection",
                self.name()
            )));
        }
        Ok(())
    }

    fn kernel_request(&self, world: &World) -> CoreResult<Option<KernelRequest>> {
        Ok(Some(KernelRequest::new(
            self.replacement.kernel_op(),
            kernel_inputs(world, &self.targets)?,
        )))
    }

    fn apply(&self, m: &mut Mutator<'_>, built: Vec<BuiltShape>) -> CoreResult<()> {
        if built.is_empty() {
            return Err(CoreError::invariant(format!(
                "{}: kernel returned nothing",
                self.name()
            )));
        }
        let inputs: BTreeSet<EntityHandle> = self.targets.iter().copied().collect();

        let mut products = Vec::with_capacity(built.len());
        for shape in built {
            let product = m.create(geometry_kind(shape.dimension), shape.shape.clone())?;
            for source in &shape.sources {
                let source = self.targets.get(*source).copied().ok_or_else(|| {
                    CoreError::invariant(format!("{}: bad source index", self.name()))
                })?;
                m.derive(source, product);
            }
            products.push((product, shape));
        }

        for (product, shape) in &products {
            // neighbours of the sources this product was built from
            let mut inherited = BTreeSet::new();
            for source in &shape.sources {
                let entity = m.world().entity(self.targets[*source])?;
                inherited.extend(entity.incident().iter().copied().filter(|h| !inputs.contains(h)));
            }
            for neighbour in inherited {
                let entity = m.world().entity(neighbour)?;
                let takes = entity.dimension() > shape.dimension
                    || (entity.dimension() < shape.dimension && lies_on(entity.shape(), &shape.shape));
                if takes {
                    m.connect(*product, neighbour)?;
                }
            }
            // joints created alongside (split)
            for (other, other_shape) in &products {
                if other_shape.dimension < shape.dimension && lies_on(&other_shape.shape, &shape.shape) {
                    m.connect(*product, *other)?;
                }
            }
        }

        for handle in m.world().by_descending_dimension(self.targets.iter().copied())? {
            m.destroy(handle)?;
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        let mut trace = format!("{} {}", self.name(), world.names_of(&self.targets));
        match self.replacement {
            Replacement::Section(plane) => {
                trace.push_str(&format!(" by plane {} normal {}", plane.origin, plane.normal));
            }
            Replacement::Split { parts } => trace.push_str(&format!(" in {parts}")),
            _ => {}
        }
        format!("{trace} -> {}", world.names_of(&output.created))
    }

    fn compensation(&self) -> Option<Compensation> {
        Some(Compensation::Reassociate)
    }
}

/// Merges coincident points of entities in place.
///
/// Nothing is removed and every entity keeps its handle, so associations
/// stay valid and no compensation is needed.
#[derive(Debug, Clone)]
pub struct GlueGeometry {
    targets: Vec<EntityHandle>,
}

impl GlueGeometry {
    /// Creates the operation.
    #[must_use]
    pub fn new(targets: Vec<EntityHandle>) -> Self {
        Self { targets }
    }
}

impl Operation for GlueGeometry {
    fn name(&self) -> &'static str {
        "glue"
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        require_geometry(self.name(), &self.targets, world)?;
        if self.targets.len() < 2 {
            return Err(CoreError::invalid_operation("glue needs at least two entities"));
        }
        Ok(())
    }

    fn kernel_request(&self, world: &World) -> CoreResult<Option<KernelRequest>> {
        Ok(Some(KernelRequest::new(
            KernelOp::Glue,
            kernel_inputs(world, &self.targets)?,
        )))
    }

    fn apply(&self, m: &mut Mutator<'_>, built: Vec<BuiltShape>) -> CoreResult<()> {
        expect_shapes(self.name(), &built, self.targets.len())?;
        for (handle, shape) in self.targets.iter().zip(built) {
            if m.world().entity(*handle)?.shape() != &shape.shape {
                m.set_shape(*handle, shape.shape)?;
            }
        }
        Ok(())
    }

    fn describe(&self, world: &World, _output: &CommandOutput) -> String {
        format!("glue {}", world.names_of(&self.targets))
    }
}

/// Sweeps entities along a vector, creating one entity a dimension up for
/// each.
#[derive(Debug, Clone)]
pub struct ExtrudeGeometry {
    targets: Vec<EntityHandle>,
    vector: Point3,
}

impl ExtrudeGeometry {
    /// Creates the operation.
    #[must_use]
    pub fn new(targets: Vec<EntityHandle>, vector: Point3) -> Self {
        Self { targets, vector }
    }
}

impl Operation for ExtrudeGeometry {
    fn name(&self) -> &'static str {
        "extrude"
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        require_geometry(self.name(), &self.targets, world)?;
        if self.vector.norm() < EPSILON {
            return Err(CoreError::invalid_operation("zero extrusion vector"));
        }
        for handle in &self.targets {
            let entity = world.entity(*handle)?;
            if entity.dimension() == Dimension::D3 {
                return Err(CoreError::invalid_operation(format!(
                    "cannot extrude volume {}",
                    entity.name()
                )));
            }
        }
        Ok(())
    }

    fn kernel_request(&self, world: &World) -> CoreResult<Option<KernelRequest>> {
        Ok(Some(KernelRequest::new(
            KernelOp::Extrude(self.vector),
            kernel_inputs(world, &self.targets)?,
        )))
    }

    fn apply(&self, m: &mut Mutator<'_>, built: Vec<BuiltShape>) -> CoreResult<()> {
        expect_shapes(self.name(), &built, self.targets.len())?;
        for (source, shape) in self.targets.iter().zip(built) {
            let product = m.create(geometry_kind(shape.dimension), shape.shape)?;
            m.connect(product, *source)?;
            m.derive(*source, product);
        }
        Ok(())
    }

    fn describe(&self, world: &World, output: &CommandOutput) -> String {
        format!(
            "extrude {} by {} -> {}",
            world.names_of(&self.targets),
            self.vector,
            world.names_of(&output.created)
        )
    }

    fn compensation(&self) -> Option<Compensation> {
        Some(Compensation::Extrude(self.vector))
    }
}

/// Adds entities to, or removes them from, a named group.
#[derive(Debug, Clone)]
pub struct EditGroup {
    targets: Vec<EntityHandle>,
    group: String,
    add: bool,
}

impl EditGroup {
    /// Adds `targets` to `group`.
    #[must_use]
    pub fn add(targets: Vec<EntityHandle>, group: impl Into<String>) -> Self {
        Self {
            targets,
            group: group.into(),
            add: true,
        }
    }

    /// Removes `targets` from `group`.
    #[must_use]
    pub fn remove(targets: Vec<EntityHandle>, group: impl Into<String>) -> Self {
        Self {
            targets,
            group: group.into(),
            add: false,
        }
    }
}

impl Operation for EditGroup {
    fn name(&self) -> &'static str {
        if self.add {
            "add to group"
        } else {
            "remove from group"
        }
    }

    fn targets(&self) -> Vec<EntityHandle> {
        self.targets.clone()
    }

    fn validate(&self, world: &World) -> CoreResult<()> {
        if self.targets.is_empty() {
            return Err(CoreError::empty_selection(self.name()));
        }
        if self.group.trim().is_empty() {
            return Err(CoreError::invalid_operation("empty group name"));
        }
        for handle in &self.targets {
            world.live_entity(*handle)?;
        }
        Ok(())
    }

    fn apply(&self, m: &mut Mutator<'_>, _built: Vec<BuiltShape>) -> CoreResult<()> {
        for handle in &self.targets {
            if self.add {
                m.add_to_group(*handle, &self.group)?;
            } else {
                m.remove_from_group(*handle, &self.group)?;
            }
        }
        Ok(())
    }

    fn describe(&self, world: &World, _output: &CommandOutput) -> String {
        let names = world.names_of(&self.targets);
        if self.add {
            format!("add {names} to group {}", self.group)
        } else {
            format!("remove {names} from group {}", self.group)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, ExecContext, LeafCommand};
    use crate::kernel::ReferenceKernel;

    fn run(world: &mut World, op: impl Operation + 'static) -> CoreResult<LeafCommand> {
        let kernel = ReferenceKernel::new();
        let mut cmd = LeafCommand::new(op);
        cmd.execute(&mut ExecContext::new(world, &kernel))?;
        Ok(cmd)
    }

    fn vertex(world: &mut World, x: f64, y: f64) -> EntityHandle {
        run(world, CreateVertex::new(Point3::new(x, y, 0.0)))
            .unwrap()
            .output()
            .created[0]
    }

    fn segment(world: &mut World, a: EntityHandle, b: EntityHandle) -> EntityHandle {
        run(world, CreateBounded::new(Dimension::D1, vec![a, b]))
            .unwrap()
            .output()
            .created[0]
    }

    fn names(world: &World, dim: Dimension) -> Vec<String> {
        world
            .geometry()
            .live(dim)
            .map(|(_, e)| e.name().to_string())
            .collect()
    }

    #[test]
    fn create_segment_connects_vertices() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let b = vertex(&mut world, 1.0, 0.0);
        let ab = segment(&mut world, a, b);
        assert!(world.entity(a).unwrap().incident().contains(&ab));
        assert_eq!(world.entity(ab).unwrap().incident().len(), 2);
    }

    #[test]
    fn segment_needs_two_distinct_vertices() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let err = run(&mut world, CreateBounded::new(Dimension::D1, vec![a, a])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        let err = run(&mut world, CreateBounded::new(Dimension::D1, vec![])).unwrap_err();
        assert!(matches!(err, CoreError::EmptySelection { .. }));
    }

    #[test]
    fn destroy_takes_upward_closure() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let b = vertex(&mut world, 1.0, 0.0);
        segment(&mut world, a, b);
        let mut cmd = run(&mut world, DestroyGeometry::new(vec![a], false)).unwrap();
        assert_eq!(names(&world, Dimension::D0), vec!["Pt0001"]);
        assert!(names(&world, Dimension::D1).is_empty());
        assert_eq!(cmd.describe(), "destroy Pt0000");

        cmd.undo(&mut world).unwrap();
        assert_eq!(names(&world, Dimension::D1), vec!["Crv0000"]);
        assert_eq!(world.entity(a).unwrap().incident().len(), 1);
    }

    #[test]
    fn destroy_can_propagate_down() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let b = vertex(&mut world, 1.0, 0.0);
        let c = vertex(&mut world, 2.0, 0.0);
        let ab = segment(&mut world, a, b);
        segment(&mut world, b, c);
        run(&mut world, DestroyGeometry::new(vec![ab], true)).unwrap();
        // b is still used by the second segment
        assert_eq!(names(&world, Dimension::D0), vec!["Pt0001", "Pt0002"]);
    }

    #[test]
    fn copy_duplicates_closure() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let b = vertex(&mut world, 1.0, 0.0);
        let ab = segment(&mut world, a, b);
        let cmd = run(&mut world, CopyGeometry::new(vec![ab])).unwrap();
        let out = cmd.output();
        assert_eq!(out.created.len(), 3);
        assert_eq!(out.derived.len(), 3);
        let copy = out.product_of(ab).unwrap();
        assert_eq!(world.entity(copy).unwrap().incident().len(), 2);
        assert_eq!(cmd.describe(), "copy Crv0000 as Pt0002, Pt0003, Crv0001");
    }

    #[test]
    fn translate_moves_closure() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let b = vertex(&mut world, 1.0, 0.0);
        let ab = segment(&mut world, a, b);
        let t = Transform::Translate {
            vector: Point3::new(0.0, 2.0, 0.0),
        };
        run(&mut world, TransformGeometry::new(vec![ab], t)).unwrap();
        assert_eq!(world.entity(a).unwrap().shape().points[0], Point3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn degenerate_transform_is_rejected() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let t = Transform::Scale {
            center: Point3::ORIGIN,
            factor: 0.0,
        };
        let err = run(&mut world, TransformGeometry::new(vec![a], t)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn split_inherits_end_vertices() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let b = vertex(&mut world, 2.0, 0.0);
        let ab = segment(&mut world, a, b);
        let cmd = run(&mut world, ReplaceGeometry::new(Replacement::Split { parts: 2 }, vec![ab]))
            .unwrap();
        assert_eq!(names(&world, Dimension::D1), vec!["Crv0001", "Crv0002"]);
        assert_eq!(names(&world, Dimension::D0).len(), 3);
        let first = cmd.output().product_of(ab).unwrap();
        let incident = world.entity(first).unwrap().incident().clone();
        assert!(incident.contains(&a));
        assert!(!incident.contains(&b));
        assert_eq!(incident.len(), 2);
    }

    #[test]
    fn fuse_replaces_inputs() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let b = vertex(&mut world, 1.0, 0.0);
        let c = vertex(&mut world, 2.0, 0.0);
        let ab = segment(&mut world, a, b);
        let bc = segment(&mut world, b, c);
        let cmd = run(&mut world, ReplaceGeometry::new(Replacement::Fuse, vec![ab, bc])).unwrap();
        assert_eq!(names(&world, Dimension::D1), vec!["Crv0002"]);
        let fused = cmd.output().created[0];
        assert_eq!(world.entity(fused).unwrap().incident().len(), 3);
        assert_eq!(cmd.describe(), "fuse Crv0000, Crv0001 -> Crv0002");
    }

    #[test]
    fn extrude_vertex_makes_curve() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        let cmd = run(&mut world, ExtrudeGeometry::new(vec![a], Point3::new(1.0, 0.0, 0.0))).unwrap();
        let curve = cmd.output().created[0];
        assert_eq!(world.entity(curve).unwrap().kind(), EntityKind::GeomCurve);
        assert!(world.entity(curve).unwrap().incident().contains(&a));
    }

    #[test]
    fn groups() {
        let mut world = World::new();
        let a = vertex(&mut world, 0.0, 0.0);
        run(&mut world, EditGroup::add(vec![a], "hull")).unwrap();
        assert!(world.entity(a).unwrap().groups().contains("hull"));
        let mut cmd = run(&mut world, EditGroup::remove(vec![a], "hull")).unwrap();
        assert!(world.entity(a).unwrap().groups().is_empty());
        cmd.undo(&mut world).unwrap();
        assert!(world.entity(a).unwrap().groups().contains("hull"));
    }
}
