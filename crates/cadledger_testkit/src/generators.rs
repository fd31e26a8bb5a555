//! Property-based test generators using proptest.
//!
//! Provides strategies for random editing sessions. Steps address entities
//! by index into the live names at the time they run, so any generated
//! sequence can be applied to any session.

use cadledger_core::{
    CommandReport, CoreError, CoreResult, Dimension, Domain, Point3, Session, Transform,
};
use proptest::prelude::*;

/// One user action in a generated session.
#[derive(Debug, Clone)]
pub enum EditStep {
    /// Create a geometric vertex.
    Vertex {
        /// Point on a small integer grid.
        point: Point3,
    },
    /// Create a segment between two live vertices.
    Segment {
        /// Index of the first vertex.
        a: usize,
        /// Index of the second vertex.
        b: usize,
    },
    /// Translate a live geometric entity.
    Translate {
        /// Index into live geometry.
        target: usize,
        /// Translation vector.
        vector: Point3,
    },
    /// Copy a live geometric entity.
    Copy {
        /// Index into live geometry.
        target: usize,
    },
    /// Destroy a live geometric entity.
    Destroy {
        /// Index into live geometry.
        target: usize,
        /// Also destroy the dependent topology.
        with_topology: bool,
    },
    /// Split a live curve in two.
    Split {
        /// Index into live curves.
        target: usize,
    },
    /// Create topology associated with a live geometric entity.
    Associate {
        /// Index into live geometry.
        target: usize,
    },
    /// Undo the last command.
    Undo,
    /// Redo the last undone command.
    Redo,
}

/// What applying a step did.
#[derive(Debug)]
pub enum StepOutcome {
    /// A command was committed.
    Committed(CommandReport),
    /// The command was rejected; the world must be unchanged.
    Rejected(CoreError),
    /// A command was undone.
    Undone,
    /// A command was redone.
    Redone,
    /// Nothing to do: no candidate target, or empty history.
    Skipped,
}

impl StepOutcome {
    fn from_result(result: CoreResult<CommandReport>) -> Self {
        match result {
            Ok(report) => Self::Committed(report),
            Err(err) => Self::Rejected(err),
        }
    }

    /// Returns true if the world changed.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Committed(_) | Self::Undone | Self::Redone)
    }
}

fn pick(names: &[String], index: usize) -> Option<&str> {
    if names.is_empty() {
        None
    } else {
        Some(&names[index % names.len()])
    }
}

fn live_geometry(session: &Session) -> Vec<String> {
    Dimension::ALL
        .into_iter()
        .flat_map(|dim| session.live_names(Domain::Geometry, dim))
        .collect()
}

impl EditStep {
    /// Applies the step to `session`.
    ///
    /// Rejections are outcomes, not errors: generated steps are allowed to
    /// be invalid. Internal invariant violations panic.
    pub fn apply(&self, session: &Session) -> StepOutcome {
        let outcome = self.run(session);
        if let StepOutcome::Rejected(err) = &outcome {
            assert!(!err.is_internal(), "{self:?} broke an invariant: {err}");
        }
        outcome
    }

    fn run(&self, session: &Session) -> StepOutcome {
        let geometry = session.geometry();
        match self {
            Self::Vertex { point } => StepOutcome::from_result(geometry.create_vertex(*point)),
            Self::Segment { a, b } => {
                let vertices = session.live_names(Domain::Geometry, Dimension::D0);
                match (pick(&vertices, *a), pick(&vertices, *b)) {
                    (Some(a), Some(b)) => StepOutcome::from_result(geometry.create_segment(a, b)),
                    _ => StepOutcome::Skipped,
                }
            }
            Self::Translate { target, vector } => match pick(&live_geometry(session), *target) {
                Some(name) => StepOutcome::from_result(geometry.translate(&[name], *vector)),
                None => StepOutcome::Skipped,
            },
            Self::Copy { target } => match pick(&live_geometry(session), *target) {
                Some(name) => StepOutcome::from_result(geometry.copy(&[name])),
                None => StepOutcome::Skipped,
            },
            Self::Destroy {
                target,
                with_topology,
            } => match pick(&live_geometry(session), *target) {
                Some(name) if *with_topology => {
                    StepOutcome::from_result(geometry.destroy_with_topology(&[name], false))
                }
                Some(name) => StepOutcome::from_result(geometry.destroy(&[name], false)),
                None => StepOutcome::Skipped,
            },
            Self::Split { target } => {
                let curves = session.live_names(Domain::Geometry, Dimension::D1);
                match pick(&curves, *target) {
                    Some(name) => StepOutcome::from_result(geometry.split(name, 2)),
                    None => StepOutcome::Skipped,
                }
            }
            Self::Associate { target } => {
                let live = live_geometry(session);
                let Some(name) = pick(&live, *target) else {
                    return StepOutcome::Skipped;
                };
                let Ok(handle) = session.resolve(Domain::Geometry, name) else {
                    return StepOutcome::Skipped;
                };
                let dim = match session.world().entity(handle) {
                    Ok(entity) => entity.dimension(),
                    Err(err) => return StepOutcome::Rejected(err),
                };
                StepOutcome::from_result(session.topology().create(dim, Some(name), &[] as &[&str]))
            }
            Self::Undo => match session.undo() {
                Ok(Some(_)) => StepOutcome::Undone,
                Ok(None) => StepOutcome::Skipped,
                Err(err) => StepOutcome::Rejected(err),
            },
            Self::Redo => match session.redo() {
                Ok(Some(_)) => StepOutcome::Redone,
                Ok(None) => StepOutcome::Skipped,
                Err(err) => StepOutcome::Rejected(err),
            },
        }
    }
}

/// Strategy for points on a small integer grid.
pub fn point_strategy() -> impl Strategy<Value = Point3> {
    (-4i8..=4, -4i8..=4, -4i8..=4)
        .prop_map(|(x, y, z)| Point3::new(f64::from(x), f64::from(y), f64::from(z)))
}

/// Strategy for non-degenerate transforms.
pub fn transform_strategy() -> impl Strategy<Value = Transform> {
    prop_oneof![
        point_strategy().prop_map(|vector| Transform::Translate { vector }),
        (point_strategy(), 1i32..4).prop_map(|(origin, quarter)| Transform::Rotate {
            origin,
            axis: Point3::new(0.0, 0.0, 1.0),
            degrees: f64::from(quarter) * 90.0,
        }),
        (point_strategy(), 1i32..4).prop_map(|(center, factor)| Transform::Scale {
            center,
            factor: f64::from(factor),
        }),
    ]
}

/// Strategy for generating model-building steps (no history moves).
pub fn build_step_strategy() -> impl Strategy<Value = EditStep> {
    prop_oneof![
        4 => point_strategy().prop_map(|point| EditStep::Vertex { point }),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| EditStep::Segment { a, b }),
        1 => (any::<usize>(), point_strategy())
            .prop_map(|(target, vector)| EditStep::Translate { target, vector }),
        1 => any::<usize>().prop_map(|target| EditStep::Copy { target }),
        1 => (any::<usize>(), any::<bool>())
            .prop_map(|(target, with_topology)| EditStep::Destroy { target, with_topology }),
        1 => any::<usize>().prop_map(|target| EditStep::Split { target }),
        2 => any::<usize>().prop_map(|target| EditStep::Associate { target }),
    ]
}

/// Strategy for generating steps, history moves included.
pub fn edit_step_strategy() -> impl Strategy<Value = EditStep> {
    prop_oneof![
        6 => build_step_strategy(),
        1 => Just(EditStep::Undo),
        1 => Just(EditStep::Redo),
    ]
}

/// Strategy for generating a sequence of steps.
pub fn edit_sequence_strategy(min_steps: usize, max_steps: usize) -> impl Strategy<Value = Vec<EditStep>> {
    prop::collection::vec(edit_step_strategy(), min_steps..max_steps)
}

/// Strategy for generating a sequence of model-building steps.
pub fn build_sequence_strategy(
    min_steps: usize,
    max_steps: usize,
) -> impl Strategy<Value = Vec<EditStep>> {
    prop::collection::vec(build_step_strategy(), min_steps..max_steps)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
