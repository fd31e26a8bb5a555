//! Entity model: kinds, mutable state and snapshots.

use crate::entity::EntityHandle;
use crate::shape::ShapeData;
use crate::types::{Dimension, Domain};
use std::collections::BTreeSet;
use std::fmt;

/// Type of an entity, fixing its domain, dimension and name tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// Geometric vertex.
    GeomVertex,
    /// Geometric curve.
    GeomCurve,
    /// Geometric surface.
    GeomSurface,
    /// Geometric volume.
    GeomVolume,
    /// Topological vertex.
    TopoVertex,
    /// Topological edge.
    TopoEdge,
    /// Topological face.
    TopoFace,
    /// Topological block.
    TopoBlock,
}

impl EntityKind {
    /// Every kind, geometry first, by ascending dimension.
    pub const ALL: [Self; 8] = [
        Self::GeomVertex,
        Self::GeomCurve,
        Self::GeomSurface,
        Self::GeomVolume,
        Self::TopoVertex,
        Self::TopoEdge,
        Self::TopoFace,
        Self::TopoBlock,
    ];

    /// Returns the kind for a domain and dimension.
    #[must_use]
    pub fn of(domain: Domain, dimension: Dimension) -> Self {
        let base = match domain {
            Domain::Geometry => 0,
            Domain::Topology => 4,
        };
        Self::ALL[base + dimension.index()]
    }

    /// Returns the owning domain.
    #[must_use]
    pub fn domain(self) -> Domain {
        match self {
            Self::GeomVertex | Self::GeomCurve | Self::GeomSurface | Self::GeomVolume => {
                Domain::Geometry
            }
            _ => Domain::Topology,
        }
    }

    /// Returns the dimension.
    #[must_use]
    pub fn dimension(self) -> Dimension {
        match self {
            Self::GeomVertex | Self::TopoVertex => Dimension::D0,
            Self::GeomCurve | Self::TopoEdge => Dimension::D1,
            Self::GeomSurface | Self::TopoFace => Dimension::D2,
            Self::GeomVolume | Self::TopoBlock => Dimension::D3,
        }
    }

    /// Name prefix used by the name registry.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::GeomVertex => "Pt",
            Self::GeomCurve => "Crv",
            Self::GeomSurface => "Srf",
            Self::GeomVolume => "Vol",
            Self::TopoVertex => "Vtx",
            Self::TopoEdge => "Edg",
            Self::TopoFace => "Fac",
            Self::TopoBlock => "Blk",
        }
    }

    /// Finds the kind whose tag prefixes `name`, followed only by digits.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            name.strip_prefix(kind.tag())
                .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Mutable attributes of an entity; what snapshots capture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityState {
    /// Soft-delete marker.
    pub destroyed: bool,
    /// Geometric payload.
    pub shape: ShapeData,
    /// Adjacent entities of the same domain, kept symmetric.
    pub incident: BTreeSet<EntityHandle>,
    /// Named groups this entity belongs to.
    pub groups: BTreeSet<String>,
    /// Cross-domain reference; for topology, the supporting geometry.
    pub domain_link: Option<EntityHandle>,
}

/// One geometric or topological object.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    kind: EntityKind,
    pub(crate) state: EntityState,
}

impl Entity {
    /// Creates a live entity.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: EntityKind, shape: ShapeData) -> Self {
        Self {
            name: name.into(),
            kind,
            state: EntityState {
                shape,
                ..EntityState::default()
            },
        }
    }

    /// Returns the entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the entity kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the dimension.
    #[must_use]
    pub fn dimension(&self) -> Dimension {
        self.kind.dimension()
    }

    /// Returns the domain.
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.kind.domain()
    }

    /// Returns true if the entity is soft-deleted.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.state.destroyed
    }

    /// Returns the geometric payload.
    #[must_use]
    pub fn shape(&self) -> &ShapeData {
        &self.state.shape
    }

    /// Returns the adjacent entities.
    #[must_use]
    pub fn incident(&self) -> &BTreeSet<EntityHandle> {
        &self.state.incident
    }

    /// Returns the group names.
    #[must_use]
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.state.groups
    }

    /// Returns the cross-domain link.
    #[must_use]
    pub fn domain_link(&self) -> Option<EntityHandle> {
        self.state.domain_link
    }

    /// Returns the full mutable state.
    #[must_use]
    pub fn state(&self) -> &EntityState {
        &self.state
    }
}

/// Copy of an entity's mutable state, owned by the command that took it.
///
/// Restoring exchanges the copy with the live state, so the snapshot then
/// holds the state it replaced. Undo and redo are the same exchange.
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    handle: EntityHandle,
    state: EntityState,
}

impl EntitySnapshot {
    /// Captures the current state of `entity`.
    #[must_use]
    pub fn capture(handle: EntityHandle, entity: &Entity) -> Self {
        Self {
            handle,
            state: entity.state.clone(),
        }
    }

    /// Returns the handle of the captured entity.
    #[must_use]
    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    /// Returns the captured state.
    #[must_use]
    pub fn state(&self) -> &EntityState {
        &self.state
    }

    /// Swaps the captured state with the entity's live state.
    pub(crate) fn exchange(&mut self, entity: &mut Entity) {
        std::mem::swap(&mut self.state, &mut entity.state);
    }
}
