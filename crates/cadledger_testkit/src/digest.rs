//! Handle-free digests of a world, for state comparisons.
//!
//! Two worlds have equal digests when the same names are live with the same
//! shape, adjacency, groups and association. Handles and destroyed entities
//! are left out, so a digest taken before a command equals the one taken
//! after the command is undone.

use cadledger_core::{Domain, EntityHandle, Point3, Session, World};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Live state of one entity, addressed by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDigest {
    /// Name tag and counter, e.g. `Crv0003`.
    pub name: String,
    /// Defining points.
    pub points: Vec<Point3>,
    /// Names of adjacent entities.
    pub incident: BTreeSet<String>,
    /// Group names.
    pub groups: BTreeSet<String>,
    /// Name of the associated geometry, for topology.
    pub link: Option<String>,
}

/// Digest of every live entity of a world.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WorldDigest {
    /// Live geometry, by name.
    pub geometry: BTreeMap<String, EntityDigest>,
    /// Live topology, by name.
    pub topology: BTreeMap<String, EntityDigest>,
}

impl WorldDigest {
    /// Digests a world.
    pub fn of(world: &World) -> Self {
        Self {
            geometry: digest_domain(world, Domain::Geometry),
            topology: digest_domain(world, Domain::Topology),
        }
    }

    /// Digests the world of a session.
    pub fn of_session(session: &Session) -> Self {
        Self::of(&session.world())
    }

    /// Number of live entities in both domains.
    pub fn len(&self) -> usize {
        self.geometry.len() + self.topology.len()
    }

    /// Returns true if nothing is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Digest of a named entity in `domain`.
    pub fn get(&self, domain: Domain, name: &str) -> Option<&EntityDigest> {
        match domain {
            Domain::Geometry => self.geometry.get(name),
            Domain::Topology => self.topology.get(name),
        }
    }

    /// Pretty JSON, for assertion messages.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("digest serializes")
    }
}

fn digest_domain(world: &World, domain: Domain) -> BTreeMap<String, EntityDigest> {
    let label = |handle: EntityHandle| -> String {
        world
            .name_of(handle)
            .map_or_else(|_| format!("<{handle}>"), str::to_string)
    };
    world
        .store(domain)
        .live_all()
        .map(|(_, entity)| {
            let digest = EntityDigest {
                name: entity.name().to_string(),
                points: entity.shape().points.clone(),
                incident: entity.incident().iter().map(|h| label(*h)).collect(),
                groups: entity.groups().clone(),
                link: entity.domain_link().map(label),
            };
            (digest.name.clone(), digest)
        })
        .collect()
}

/// Asserts that two digests are equal, printing both on failure.
#[track_caller]
pub fn assert_same_world(expected: &WorldDigest, actual: &WorldDigest) {
    assert!(
        expected == actual,
        "worlds differ\nexpected: {}\nactual: {}",
        expected.to_json(),
        actual.to_json()
    );
}
