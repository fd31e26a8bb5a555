//! Collaborating domains.
//!
//! The *dependent* domain (topology) builds entities on top of the geometry
//! and must stay consistent with it inside the same transaction. The
//! *secondary* domain (the mesh) only follows whole-model transforms, best
//! effort.

mod compensate;
mod topology;

pub use compensate::{
    ClearAssociation, DestroyDependents, DuplicateDependents, ExtrudeDependents,
    ReassociateDependents, TransformDependents,
};
pub use topology::{Associate, CreateTopology, DestroyTopology, TopologyDomain, TransformTopology};

use crate::command::Command;
use crate::entity::EntityHandle;
use crate::shape::{Point3, Transform};
use crate::world::World;
use std::collections::BTreeSet;
use std::fmt;

/// What the dependent domain must do after a geometry command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compensation {
    /// Duplicate dependents onto the copies of their geometry.
    Duplicate,
    /// Clear associations pointing at destroyed geometry.
    ClearAssociation,
    /// Destroy dependents of destroyed geometry.
    DestroyDependents,
    /// Apply the same transform to dependents.
    Transform(Transform),
    /// Point dependents of replaced geometry at the replacement.
    Reassociate,
    /// Extrude dependents along with their geometry.
    Extrude(Point3),
}

/// A domain whose entities reference geometry.
pub trait DependentDomain: Send + Sync + fmt::Debug {
    /// Domain name, for traces.
    fn name(&self) -> &str;

    /// Live dependent entities referencing any of `geometry`.
    fn dependent_entities(
        &self,
        world: &World,
        geometry: &BTreeSet<EntityHandle>,
    ) -> Vec<EntityHandle>;

    /// Builds the command that restores consistency after a geometry command.
    ///
    /// The compensator runs after the primary inside a composite and reads
    /// what to fix from the primary's output.
    fn compensator(&self, compensation: Compensation) -> Box<dyn Command>;
}

/// A domain that only follows whole-model transforms.
///
/// Failures are tolerated: they are logged and never roll back the
/// geometry and topology changes.
pub trait SecondaryDomain: Send + Sync {
    /// Domain name, for traces.
    fn name(&self) -> &str;

    /// Applies `transform` to everything the domain holds.
    fn transform_all(&self, transform: &Transform) -> Result<(), String>;
}
