//! Edit script format.
//!
//! A script is a JSON document with a `steps` array. Each step is an object
//! tagged by `op`; entities are addressed by name and points are written as
//! `[x, y, z]`:
//!
//! ```json
//! {
//!   "steps": [
//!     { "op": "vertex", "at": [0, 0, 0] },
//!     { "op": "vertex", "at": [1, 0, 0] },
//!     { "op": "segment", "a": "Pt0000", "b": "Pt0001" },
//!     { "op": "topology", "dimension": 1, "geometry": "Crv0000" },
//!     { "op": "destroy", "names": ["Pt0000"] },
//!     { "op": "undo" }
//!   ]
//! }
//! ```

use crate::error::{CliError, CliResult};
use cadledger_core::{
    CommandReport, CoreError, CoreResult, Dimension, Plane, Point3, Session, Transform,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A parsed edit script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

impl Script {
    /// Reads and parses a script file.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| CliError::io(path, err))?;
        Self::parse(&text).map_err(|err| CliError::parse(path, err))
    }

    /// Parses a script from JSON text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// One script step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Create a geometric vertex.
    Vertex { at: Point3 },
    /// Create a segment between two vertices.
    Segment { a: String, b: String },
    /// Create a surface bounded by curves.
    Surface { curves: Vec<String> },
    /// Create a volume bounded by surfaces.
    Volume { surfaces: Vec<String> },
    /// Copy geometry.
    Copy { names: Vec<String> },
    /// Destroy geometry.
    Destroy {
        names: Vec<String>,
        #[serde(default)]
        with_topology: bool,
        #[serde(default)]
        propagate_down: bool,
    },
    /// Translate geometry.
    Translate { names: Vec<String>, vector: Point3 },
    /// Rotate geometry around an axis.
    Rotate {
        names: Vec<String>,
        origin: Point3,
        axis: Point3,
        degrees: f64,
    },
    /// Scale geometry about a center.
    Scale {
        names: Vec<String>,
        center: Point3,
        factor: f64,
    },
    /// Mirror geometry through a plane.
    Mirror { names: Vec<String>, plane: Plane },
    /// Fuse geometry into one entity.
    Fuse { names: Vec<String> },
    /// Cut the other entities out of the first.
    Cut { names: Vec<String> },
    /// Keep the common part.
    Intersect { names: Vec<String> },
    /// Split by a plane.
    Section { names: Vec<String>, plane: Plane },
    /// Join curves.
    Join { names: Vec<String> },
    /// Split a curve into equal parts.
    Split { name: String, parts: usize },
    /// Merge coincident points.
    Glue { names: Vec<String> },
    /// Sweep along a vector.
    Extrude { names: Vec<String>, vector: Point3 },
    /// Add geometry to a group.
    AddToGroup { names: Vec<String>, group: String },
    /// Remove geometry from a group.
    RemoveFromGroup { names: Vec<String>, group: String },
    /// Transform the whole model.
    TransformAll { transform: Transform },
    /// Create a topology entity.
    Topology {
        dimension: u8,
        #[serde(default)]
        geometry: Option<String>,
        #[serde(default)]
        bounds: Vec<String>,
    },
    /// Associate topology with geometry.
    Associate { names: Vec<String>, geometry: String },
    /// Clear the association of topology.
    ClearAssociation { names: Vec<String> },
    /// Destroy topology.
    DestroyTopology { names: Vec<String> },
    /// Toggle shifting-id name resolution.
    ShiftingId { on: bool },
    /// Map a legacy name to a current one.
    Alias { old: String, current: String },
    /// Undo the last command.
    Undo,
    /// Redo the last undone command.
    Redo,
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepOutcome {
    /// A command was committed.
    Committed {
        /// Command trace.
        description: String,
        /// History revision afterwards.
        revision: u64,
    },
    /// A command was undone.
    Undone {
        /// Trace of the undone command.
        description: String,
        /// History revision afterwards.
        revision: u64,
    },
    /// A command was redone.
    Redone {
        /// Trace of the redone command.
        description: String,
        /// History revision afterwards.
        revision: u64,
    },
    /// Undo or redo had nothing to do.
    Idle,
    /// A session setting changed; nothing was recorded in history.
    Setting {
        /// What changed.
        description: String,
    },
}

impl StepOutcome {
    fn committed(report: CommandReport) -> Self {
        Self::Committed {
            description: report.description,
            revision: report.revision,
        }
    }
}

impl Step {
    /// Operation name, as written in the script.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Vertex { .. } => "vertex",
            Self::Segment { .. } => "segment",
            Self::Surface { .. } => "surface",
            Self::Volume { .. } => "volume",
            Self::Copy { .. } => "copy",
            Self::Destroy { .. } => "destroy",
            Self::Translate { .. } => "translate",
            Self::Rotate { .. } => "rotate",
            Self::Scale { .. } => "scale",
            Self::Mirror { .. } => "mirror",
            Self::Fuse { .. } => "fuse",
            Self::Cut { .. } => "cut",
            Self::Intersect { .. } => "intersect",
            Self::Section { .. } => "section",
            Self::Join { .. } => "join",
            Self::Split { .. } => "split",
            Self::Glue { .. } => "glue",
            Self::Extrude { .. } => "extrude",
            Self::AddToGroup { .. } => "add_to_group",
            Self::RemoveFromGroup { .. } => "remove_from_group",
            Self::TransformAll { .. } => "transform_all",
            Self::Topology { .. } => "topology",
            Self::Associate { .. } => "associate",
            Self::ClearAssociation { .. } => "clear_association",
            Self::DestroyTopology { .. } => "destroy_topology",
            Self::ShiftingId { .. } => "shifting_id",
            Self::Alias { .. } => "alias",
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }

    /// Applies the step to `session`.
    pub fn apply(&self, session: &Session) -> CoreResult<StepOutcome> {
        let geometry = session.geometry();
        let topology = session.topology();
        let report = match self {
            Self::Vertex { at } => geometry.create_vertex(*at)?,
            Self::Segment { a, b } => geometry.create_segment(a, b)?,
            Self::Surface { curves } => geometry.create_surface(curves)?,
            Self::Volume { surfaces } => geometry.create_volume(surfaces)?,
            Self::Copy { names } => geometry.copy(names)?,
            Self::Destroy {
                names,
                with_topology: true,
                propagate_down,
            } => geometry.destroy_with_topology(names, *propagate_down)?,
            Self::Destroy {
                names,
                propagate_down,
                ..
            } => geometry.destroy(names, *propagate_down)?,
            Self::Translate { names, vector } => geometry.translate(names, *vector)?,
            Self::Rotate {
                names,
                origin,
                axis,
                degrees,
            } => geometry.rotate(names, *origin, *axis, *degrees)?,
            Self::Scale {
                names,
                center,
                factor,
            } => geometry.scale(names, *center, *factor)?,
            Self::Mirror { names, plane } => geometry.mirror(names, *plane)?,
            Self::Fuse { names } => geometry.fuse(names)?,
            Self::Cut { names } => geometry.cut(names)?,
            Self::Intersect { names } => geometry.intersect(names)?,
            Self::Section { names, plane } => geometry.section(names, *plane)?,
            Self::Join { names } => geometry.join(names)?,
            Self::Split { name, parts } => geometry.split(name, *parts)?,
            Self::Glue { names } => geometry.glue(names)?,
            Self::Extrude { names, vector } => geometry.extrude(names, *vector)?,
            Self::AddToGroup { names, group } => geometry.add_to_group(names, group)?,
            Self::RemoveFromGroup { names, group } => geometry.remove_from_group(names, group)?,
            Self::TransformAll { transform } => session.transform_all(*transform)?,
            Self::Topology {
                dimension,
                geometry: link,
                bounds,
            } => {
                let dimension = Dimension::new(*dimension).map_err(|_| {
                    CoreError::invalid_operation(format!("dimension {dimension} is out of range"))
                })?;
                topology.create(dimension, link.as_deref(), bounds)?
            }
            Self::Associate {
                names,
                geometry: link,
            } => topology.associate(names, link)?,
            Self::ClearAssociation { names } => topology.clear_association(names)?,
            Self::DestroyTopology { names } => topology.destroy(names)?,
            Self::ShiftingId { on } => {
                session.set_shifting_id(*on);
                let state = if *on { "on" } else { "off" };
                return Ok(StepOutcome::Setting {
                    description: format!("shifting id {state}"),
                });
            }
            Self::Alias { old, current } => {
                session.register_alias(old, current);
                return Ok(StepOutcome::Setting {
                    description: format!("alias {old} -> {current}"),
                });
            }
            Self::Undo => {
                return Ok(session
                    .undo()?
                    .map_or(StepOutcome::Idle, |report| StepOutcome::Undone {
                        description: report.description,
                        revision: report.revision,
                    }));
            }
            Self::Redo => {
                return Ok(session
                    .redo()?
                    .map_or(StepOutcome::Idle, |report| StepOutcome::Redone {
                        description: report.description,
                        revision: report.revision,
                    }));
            }
        };
        Ok(StepOutcome::committed(report))
    }
}
