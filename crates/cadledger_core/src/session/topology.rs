//! Name-based topology operations.

use crate::command::LeafCommand;
use crate::domain::{Associate, CreateTopology, DestroyTopology, TransformTopology};
use crate::error::CoreResult;
use crate::session::{resolve_all, Session};
use crate::shape::Transform;
use crate::transaction::CommandReport;
use crate::types::{Dimension, Domain};

/// Topology operations of a [`Session`], addressed by entity name.
///
/// Topology commands never need compensation: geometry does not depend on
/// topology.
#[derive(Debug, Clone, Copy)]
pub struct TopologyService<'s> {
    session: &'s Session,
}

impl<'s> TopologyService<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Creates a topology entity of `dimension`, optionally associated with
    /// a geometric entity and bounded by lower-dimension topology.
    pub fn create<S: AsRef<str>>(
        &self,
        dimension: Dimension,
        geometry: Option<&str>,
        bounds: &[S],
    ) -> CoreResult<CommandReport> {
        self.session.run(|world| {
            let link = geometry
                .map(|name| world.resolve(Domain::Geometry, name))
                .transpose()?;
            let bounds = bounds
                .iter()
                .map(|name| world.resolve(Domain::Topology, name.as_ref()))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(LeafCommand::boxed(CreateTopology::new(dimension, link, bounds)))
        })
    }

    /// Creates a topology vertex.
    pub fn create_vertex(&self, geometry: Option<&str>) -> CoreResult<CommandReport> {
        self.create(Dimension::D0, geometry, &[] as &[&str])
    }

    /// Creates an edge between topology vertices.
    pub fn create_edge<S: AsRef<str>>(
        &self,
        vertices: &[S],
        geometry: Option<&str>,
    ) -> CoreResult<CommandReport> {
        self.create(Dimension::D1, geometry, vertices)
    }

    /// Associates topology entities with a geometric entity.
    pub fn associate<S: AsRef<str>>(&self, names: &[S], geometry: &str) -> CoreResult<CommandReport> {
        self.session.run(|world| {
            let topology = resolve_all(world, Domain::Topology, "associate", names)?;
            let geometry = world.resolve(Domain::Geometry, geometry)?;
            Ok(LeafCommand::boxed(Associate::new(topology, Some(geometry))))
        })
    }

    /// Clears the association of topology entities.
    pub fn clear_association<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<CommandReport> {
        self.session.run(|world| {
            let topology = resolve_all(world, Domain::Topology, "clear association", names)?;
            Ok(LeafCommand::boxed(Associate::new(topology, None)))
        })
    }

    /// Destroys topology entities and everything built on them.
    pub fn destroy<S: AsRef<str>>(&self, names: &[S]) -> CoreResult<CommandReport> {
        self.session.run(|world| {
            let targets = resolve_all(world, Domain::Topology, "destroy topology", names)?;
            Ok(LeafCommand::boxed(DestroyTopology::new(targets)))
        })
    }

    /// Transforms topology entities in place.
    pub fn transform<S: AsRef<str>>(
        &self,
        names: &[S],
        transform: Transform,
    ) -> CoreResult<CommandReport> {
        self.session.run(|world| {
            let targets = resolve_all(world, Domain::Topology, "transform topology", names)?;
            Ok(LeafCommand::boxed(TransformTopology::new(targets, transform)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::shape::Point3;

    fn session_with_curve() -> Session {
        let session = Session::open_default().unwrap();
        let geometry = session.geometry();
        geometry.create_vertex(Point3::ORIGIN).unwrap();
        geometry.create_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();
        geometry.create_segment("Pt0000", "Pt0001").unwrap();
        session
    }

    #[test]
    fn edge_between_vertices() {
        let session = session_with_curve();
        let topology = session.topology();
        topology.create_vertex(Some("Pt0000")).unwrap();
        topology.create_vertex(Some("Pt0001")).unwrap();
        let report = topology.create_edge(&["Vtx0000", "Vtx0001"], Some("Crv0000")).unwrap();
        assert_eq!(
            report.description,
            "create topology Edg0000 bounded by Vtx0000, Vtx0001 on Crv0000"
        );
    }

    #[test]
    fn association_dimension_is_checked() {
        let session = session_with_curve();
        session.topology().create_edge(&[] as &[&str], None).unwrap();
        let err = session.topology().associate(&["Edg0000"], "Pt0000").unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        session.topology().associate(&["Edg0000"], "Crv0000").unwrap();
        let report = session.topology().clear_association(&["Edg0000"]).unwrap();
        assert_eq!(report.description, "clear association of Edg0000");
    }

    #[test]
    fn destroy_topology_by_name() {
        let session = session_with_curve();
        session.topology().create_vertex(None).unwrap();
        session.topology().destroy(&["Vtx0000"]).unwrap();
        assert!(session.live_names(Domain::Topology, Dimension::D0).is_empty());
    }
}
