//! Test fixtures and session helpers.
//!
//! Provides convenience functions for opening test sessions and building
//! common models.

use crate::faults::FaultyKernel;
use cadledger_core::{Config, ExecutionMode, Session, TopologyDomain};
use std::sync::Arc;

/// A test session that knows how it was configured.
pub struct TestSession {
    /// The session instance.
    pub session: Session,
}

impl TestSession {
    /// Opens a session with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Opens a session with `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            session: Session::open(config).expect("Failed to open session"),
        }
    }

    /// Opens a session that prepares commands on the worker pool.
    pub fn pooled() -> Self {
        Self::with_config(Config::default().execution_mode(ExecutionMode::Pooled))
    }

    /// Opens a session with a bounded history.
    pub fn with_history_limit(limit: usize) -> Self {
        Self::with_config(Config::default().history_limit(limit))
    }

    /// Opens a session over a fault-injecting kernel.
    pub fn with_kernel(kernel: FaultyKernel) -> Self {
        Self {
            session: Session::open_with(
                Config::default(),
                Arc::new(kernel),
                Arc::new(TopologyDomain::new()),
            )
            .expect("Failed to open session"),
        }
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

/// Runs a test with a fresh default session.
///
/// # Example
///
/// ```rust,ignore
/// use cadledger_testkit::with_session;
///
/// #[test]
/// fn my_test() {
///     with_session(|session| {
///         session.geometry().create_vertex(Point3::ORIGIN).unwrap();
///     });
/// }
/// ```
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&Session) -> R,
{
    let test = TestSession::new();
    f(&test.session)
}

/// Runs a test in both execution modes.
pub fn with_each_mode<F>(mut f: F)
where
    F: FnMut(&Session, ExecutionMode),
{
    for mode in [ExecutionMode::Sync, ExecutionMode::Pooled] {
        let test = TestSession::with_config(Config::default().execution_mode(mode));
        f(&test.session, mode);
    }
}

/// Model builders.
pub mod scenarios {
    use super::*;
    use cadledger_core::{Dimension, Domain, Point3};

    /// Names in the two-vertex scenario.
    #[derive(Debug, Clone, Copy)]
    pub struct SegmentScenario {
        /// First vertex.
        pub a: &'static str,
        /// Second vertex.
        pub b: &'static str,
        /// Segment between them.
        pub ab: &'static str,
        /// Topology vertex on `a`.
        pub va: &'static str,
        /// Topology vertex on `b`.
        pub vb: &'static str,
        /// Topology edge on `ab`, bounded by `va` and `vb`.
        pub edge: &'static str,
    }

    /// The classic scenario on an empty session: vertices A and B, segment
    /// AB, and a topology edge associated with AB whose vertices sit on A
    /// and B.
    pub fn segment_with_edge(session: &Session) -> SegmentScenario {
        let geometry = session.geometry();
        geometry
            .create_vertex(Point3::ORIGIN)
            .expect("Failed to create A");
        geometry
            .create_vertex(Point3::new(1.0, 0.0, 0.0))
            .expect("Failed to create B");
        geometry
            .create_segment("Pt0000", "Pt0001")
            .expect("Failed to create AB");

        let topology = session.topology();
        topology
            .create_vertex(Some("Pt0000"))
            .expect("Failed to create topology vertex on A");
        topology
            .create_vertex(Some("Pt0001"))
            .expect("Failed to create topology vertex on B");
        topology
            .create_edge(&["Vtx0000", "Vtx0001"], Some("Crv0000"))
            .expect("Failed to create edge");

        SegmentScenario {
            a: "Pt0000",
            b: "Pt0001",
            ab: "Crv0000",
            va: "Vtx0000",
            vb: "Vtx0001",
            edge: "Edg0000",
        }
    }

    fn new_vertices(session: &Session, points: &[Point3]) -> Vec<String> {
        let known = session.live_names(Domain::Geometry, Dimension::D0).len();
        for p in points {
            session
                .geometry()
                .create_vertex(*p)
                .expect("Failed to create vertex");
        }
        session.live_names(Domain::Geometry, Dimension::D0)[known..].to_vec()
    }

    fn segment(session: &Session, a: &str, b: &str) -> String {
        let report = session
            .geometry()
            .create_segment(a, b)
            .expect("Failed to create segment");
        session.names_of(&report.output.created).remove(0)
    }

    /// A polyline through `points`. Returns the curve names in order.
    pub fn polyline(session: &Session, points: &[Point3]) -> Vec<String> {
        let vertices = new_vertices(session, points);
        vertices
            .windows(2)
            .map(|pair| segment(session, &pair[0], &pair[1]))
            .collect()
    }

    /// A unit square surface with an associated topology face.
    /// Returns the surface name.
    pub fn square_with_face(session: &Session) -> String {
        let vertices = new_vertices(
            session,
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
        );
        let curves: Vec<String> = (0..vertices.len())
            .map(|i| segment(session, &vertices[i], &vertices[(i + 1) % vertices.len()]))
            .collect();
        let report = session
            .geometry()
            .create_surface(&curves)
            .expect("Failed to create surface");
        let surface = session.names_of(&report.output.created).remove(0);
        session
            .topology()
            .create(Dimension::D2, Some(&surface), &[] as &[&str])
            .expect("Failed to create face");
        surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadledger_core::{Dimension, Domain, Point3};

    #[test]
    fn test_default_session() {
        let test = TestSession::new();
        assert!(!test.can_undo());
    }

    #[test]
    fn test_segment_scenario() {
        with_session(|session| {
            let names = scenarios::segment_with_edge(session);
            let edge = session.resolve(Domain::Topology, names.edge).unwrap();
            let ab = session.resolve(Domain::Geometry, names.ab).unwrap();
            assert_eq!(session.world().entity(edge).unwrap().domain_link(), Some(ab));
        });
    }

    #[test]
    fn test_polyline_and_square() {
        with_session(|session| {
            let curves = scenarios::polyline(
                session,
                &[
                    Point3::ORIGIN,
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(2.0, 0.0, 0.0),
                ],
            );
            assert_eq!(curves, ["Crv0000", "Crv0001"]);

            let surface = scenarios::square_with_face(session);
            assert_eq!(surface, "Srf0000");
            assert_eq!(session.live_names(Domain::Topology, Dimension::D2), ["Fac0000"]);
        });
    }
}
