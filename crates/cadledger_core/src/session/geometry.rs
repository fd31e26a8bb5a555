//! Name-based geometry operations.

use crate::command::{Command, LeafCommand, Operation};
use crate::entity::EntityHandle;
use crate::error::CoreResult;
use crate::geometry::{
    CopyGeometry, CreateBounded, CreateVertex, DestroyGeometry, EditGroup, ExtrudeGeometry,
    GlueGeometry, ReplaceGeometry, Replacement, TransformGeometry,
};
use crate::session::{resolve_all, Session};
use crate::shape::{Plane, Point3, Transform};
use crate::transaction::CommandReport;
use crate::types::{Dimension, Domain};

/// Geometry operations of a [`Session`], addressed by entity name.
///
/// Every operation is guarded by the session's associativity policy, like
/// any other submitted command.
#[derive(Debug, Clone, Copy)]
pub struct GeometryService<'s> {
    session: &'s Session,
}

impl<'s> GeometryService<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    fn leaf(op: impl Operation + 'static) -> CoreResult<Box<dyn Command>> {
        Ok(LeafCommand::boxed(op))
    }

    fn on_names<S, F, O>(&self, operation: &str, names: &[S], make: F) -> CoreResult<CommandReport>
    where
        S: AsRef<str>,
        F: FnOnce(Vec<EntityHandle>) -> O,
        O: Operation + 'static,
    {
        self.session.run(|world| {
            let targets = resolve_all(world, Domain::Geometry, operation, names)?;
            Self::leaf(make(targets))
        })
    }

    /// Creates a vertex.
    pub fn create_vertex(&self, point: Point3) -> CoreResult<CommandReport> {
        self.session.run(|_| Self::leaf(CreateVertex::new(point)))
    }

    /// Creates a segment between two vertices.
    pub fn create_segment(&self, a: &str, b: &str) -> CoreResult<CommandReport> {
        self.on_names("create curve", &[a, b], |bounds| {
            CreateBounded::new(Dimension::D1, bounds)
        })
    }

    /// Creates a surface bounded by curves.
    pub fn create_surface<S: AsRef<str>>(&self, curves: &[S]) -> CoreResult<CommandReport> {
        self.on_names("create surface", curves, |bounds| {
            CreateBounded::new(Dimension::D2, bounds)
        })
    }

    /// Creates a volume bounded by surfaces.
    pub fn create_volume<S: AsRef<str>>(&self, surfaces: &[S]) -> CoreResult<CommandReport> {
        self.on_names("create volume", surfaces, |bounds| {
            CreateBounded::new(Dimension::D3, bounds)
        })
    }

    /// Copies entities with everything below them.
    pub fn copy<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<CommandReport> {
        self.on_names("copy", names, CopyGeometry::new)
    }

    /// Destroys entities and everything built on them. Dependent topology
    /// loses its association.
    pub fn destroy<S: AsRef<str>>(
        &self,
        names: &[S],
        propagate_down: bool,
    ) -> CoreResult<CommandReport> {
        self.on_names("destroy", names, |targets| {
            DestroyGeometry::new(targets, propagate_down)
        })
    }

    /// Destroys entities, everything built on them and the dependent
    /// topology.
    pub fn destroy_with_topology<S: AsRef<str>>(
        &self,
        names: &[S],
        propagate_down: bool,
    ) -> CoreResult<CommandReport> {
        self.on_names("destroy with topology", names, |targets| {
            DestroyGeometry::new(targets, propagate_down).with_dependents()
        })
    }

    /// Applies an affine transform.
    pub fn transform<S: AsRef<str>>(
        &self,
        names: &[S],
        transform: Transform,
    ) -> CoreResult<CommandReport> {
        self.on_names(transform.verb(), names, |targets| {
            TransformGeometry::new(targets, transform)
        })
    }

    /// Translates entities.
    pub fn translate<S: AsRef<str>>(&self, names: &[S], vector: Point3) -> CoreResult<CommandReport> {
        self.transform(names, Transform::Translate { vector })
    }

    /// Rotates entities around an axis through `origin`.
    pub fn rotate<S: AsRef<str>>(
        &self,
        names: &[S],
        origin: Point3,
        axis: Point3,
        degrees: f64,
    ) -> CoreResult<CommandReport> {
        self.transform(
            names,
            Transform::Rotate {
                origin,
                axis,
                degrees,
            },
        )
    }

    /// Scales entities about `center`.
    pub fn scale<S: AsRef<str>>(
        &self,
        names: &[S],
        center: Point3,
        factor: f64,
    ) -> CoreResult<CommandReport> {
        self.transform(names, Transform::Scale { center, factor })
    }

    /// Mirrors entities through a plane.
    pub fn mirror<S: AsRef<str>>(&self, names: &[S], plane: Plane) -> CoreResult<CommandReport> {
        self.transform(names, Transform::Mirror { plane })
    }

    /// Runs a replacing operation.
    pub fn replace<S: AsRef<str>>(
        &self,
        replacement: Replacement,
        names: &[S],
    ) -> CoreResult<CommandReport> {
        self.on_names(replacement.name(), names, |targets| {
            ReplaceGeometry::new(replacement, targets)
        })
    }

    /// Fuses entities into one.
    pub fn fuse<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<CommandReport> {
        self.replace(Replacement::Fuse, names)
    }

    /// Cuts the other entities out of the first.
    pub fn cut<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<CommandReport> {
        self.replace(Replacement::Cut, names)
    }

    /// Keeps the common part of the entities.
    pub fn intersect<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<CommandReport> {
        self.replace(Replacement::Intersect, names)
    }

    /// Splits entities by a plane.
    pub fn section<S: AsRef<str>>(&self, names: &[S], plane: Plane) -> CoreResult<CommandReport> {
        self.replace(Replacement::Section(plane), names)
    }

    /// Joins curves into one.
    pub fn join<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<CommandReport> {
        self.replace(Replacement::Join, names)
    }

    /// Splits a curve into `parts` equal parts.
    pub fn split(&self, name: &str, parts: usize) -> CoreResult<CommandReport> {
        self.replace(Replacement::Split { parts }, &[name])
    }

    /// Merges coincident points of entities.
    pub fn glue<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<CommandReport> {
        self.on_names("glue", names, GlueGeometry::new)
    }

    /// Sweeps entities along a vector.
    pub fn extrude<S: AsRef<str>>(&self, names: &[S], vector: Point3) -> CoreResult<CommandReport> {
        self.on_names("extrude", names, |targets| {
            ExtrudeGeometry::new(targets, vector)
        })
    }

    /// Adds entities to a group.
    pub fn add_to_group<S: AsRef<str>>(&self, names: &[S], group: &str) -> CoreResult<CommandReport> {
        self.on_names("add to group", names, |targets| EditGroup::add(targets, group))
    }

    /// Removes entities from a group.
    pub fn remove_from_group<S: AsRef<str>>(
        &self,
        names: &[S],
        group: &str,
    ) -> CoreResult<CommandReport> {
        self.on_names("remove from group", names, |targets| {
            EditGroup::remove(targets, group)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::ledger::ChangeStatus;

    fn line() -> Session {
        let session = Session::open_default().unwrap();
        let geometry = session.geometry();
        geometry.create_vertex(Point3::ORIGIN).unwrap();
        geometry.create_vertex(Point3::new(2.0, 0.0, 0.0)).unwrap();
        geometry.create_segment("Pt0000", "Pt0001").unwrap();
        session
    }

    #[test]
    fn empty_selection() {
        let session = line();
        let err = session.geometry().fuse(&[] as &[&str]).unwrap_err();
        assert!(matches!(err, CoreError::EmptySelection { .. }));
        let err = session.geometry().destroy(&[] as &[&str], false).unwrap_err();
        assert!(matches!(err, CoreError::EmptySelection { .. }));
    }

    #[test]
    fn split_then_undo_restores_curve() {
        let session = line();
        let report = session.geometry().split("Crv0000", 2).unwrap();
        assert_eq!(report.description, "split Crv0000 in 2 -> Crv0001, Crv0002, Pt0002");
        assert_eq!(session.live_names(Domain::Geometry, Dimension::D1), ["Crv0001", "Crv0002"]);

        let undone = session.undo().unwrap().unwrap();
        assert!(undone
            .changes
            .iter()
            .any(|(_, status)| *status == ChangeStatus::Deleted));
        assert_eq!(session.live_names(Domain::Geometry, Dimension::D1), ["Crv0000"]);
    }

    #[test]
    fn destroyed_name_is_reported() {
        let session = line();
        session.geometry().destroy(&["Crv0000"], false).unwrap();
        let err = session.geometry().copy(&["Crv0000"]).unwrap_err();
        assert!(matches!(err, CoreError::DestroyedEntity { .. }));
    }

    #[test]
    fn groups_by_name() {
        let session = line();
        session.geometry().add_to_group(&["Pt0000", "Pt0001"], "ends").unwrap();
        let report = session.geometry().remove_from_group(&["Pt0000"], "ends").unwrap();
        assert_eq!(report.description, "remove Pt0000 from group ends");
    }

    #[test]
    fn glue_of_referenced_geometry_commits_alone() {
        let session = line();
        session
            .geometry()
            .create_vertex(Point3::new(2.0, 1e-9, 0.0))
            .unwrap();
        session.topology().create_vertex(Some("Pt0001")).unwrap();

        let report = session.geometry().glue(&["Pt0001", "Pt0002"]).unwrap();
        assert_eq!(report.description, "glue Pt0001, Pt0002");
        let world = session.world();
        let vertex = world.resolve(Domain::Topology, "Vtx0000").unwrap();
        let point = world.resolve(Domain::Geometry, "Pt0001").unwrap();
        assert_eq!(world.entity(vertex).unwrap().domain_link(), Some(point));
    }
}
