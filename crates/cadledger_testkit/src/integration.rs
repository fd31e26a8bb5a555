//! Cross-module integration checks.
//!
//! Each check drives a session through the public API and asserts one of
//! the engine's guarantees. They panic on violation, so they can be used
//! directly from tests and from property bodies.

use crate::digest::{assert_same_world, WorldDigest};
use cadledger_core::{CommandReport, CoreResult, Domain, Session, World};
use std::collections::BTreeSet;

/// Structural checks on a world.
pub mod structure {
    use super::*;

    /// Live names are unique per domain and dimension.
    pub fn check_unique_names(world: &World) {
        for domain in [Domain::Geometry, Domain::Topology] {
            let mut seen = BTreeSet::new();
            for (_, entity) in world.store(domain).live_all() {
                assert!(
                    seen.insert((entity.dimension(), entity.name().to_string())),
                    "duplicate live name {}",
                    entity.name()
                );
            }
        }
    }

    /// Incidence is symmetric and only links live entities of one domain.
    pub fn check_incidence(world: &World) {
        for domain in [Domain::Geometry, Domain::Topology] {
            for (handle, entity) in world.store(domain).live_all() {
                for neighbour in entity.incident() {
                    let other = world
                        .live_entity(*neighbour)
                        .unwrap_or_else(|err| panic!("{} is incident to {err}", entity.name()));
                    assert_eq!(other.domain(), domain, "cross-domain incidence");
                    assert!(
                        other.incident().contains(&handle),
                        "{} -> {} is one-sided",
                        entity.name(),
                        other.name()
                    );
                }
            }
        }
    }

    /// Every live topology association points to live geometry of at
    /// least the same dimension.
    pub fn check_associations(world: &World) {
        for (_, entity) in world.topology().live_all() {
            let Some(link) = entity.domain_link() else {
                continue;
            };
            let geometry = world.live_entity(link).unwrap_or_else(|err| {
                panic!("{} is associated with {err}", entity.name())
            });
            assert!(
                geometry.dimension() >= entity.dimension(),
                "{} is associated with lower-dimension {}",
                entity.name(),
                geometry.name()
            );
        }
    }

    /// Runs every structural check.
    pub fn check_world(world: &World) {
        check_unique_names(world);
        check_incidence(world);
        check_associations(world);
    }
}

/// History checks.
pub mod history {
    use super::*;

    /// Runs `edit`, then checks that undo restores the prior world and redo
    /// the posterior one. Returns the edit's report, or `None` if the edit
    /// was rejected (in which case the world must be unchanged).
    pub fn check_round_trip<F>(session: &Session, edit: F) -> Option<CommandReport>
    where
        F: FnOnce(&Session) -> CoreResult<CommandReport>,
    {
        let before = WorldDigest::of_session(session);
        let report = match edit(session) {
            Ok(report) => report,
            Err(err) => {
                assert!(!err.is_internal(), "edit broke an invariant: {err}");
                assert_same_world(&before, &WorldDigest::of_session(session));
                return None;
            }
        };
        let after = WorldDigest::of_session(session);

        session
            .undo()
            .expect("Failed to undo")
            .expect("Nothing to undo");
        assert_same_world(&before, &WorldDigest::of_session(session));
        structure::check_world(&session.world());

        session
            .redo()
            .expect("Failed to redo")
            .expect("Nothing to redo");
        assert_same_world(&after, &WorldDigest::of_session(session));
        structure::check_world(&session.world());
        Some(report)
    }

    /// Undoes everything, checking each digest in `trail` in reverse, then
    /// redoes everything, checking them forward again.
    ///
    /// `trail[0]` is the world before the first command, `trail[i]` the
    /// world after the i-th.
    pub fn check_unwind(session: &Session, trail: &[WorldDigest]) {
        for expected in trail.iter().rev().skip(1) {
            session
                .undo()
                .expect("Failed to undo")
                .expect("History shorter than trail");
            assert_same_world(expected, &WorldDigest::of_session(session));
        }
        assert!(!session.can_undo(), "history longer than trail");
        for expected in trail.iter().skip(1) {
            session
                .redo()
                .expect("Failed to redo")
                .expect("Redo stack shorter than trail");
            assert_same_world(expected, &WorldDigest::of_session(session));
        }
        assert!(!session.can_redo());
    }
}

/// Associativity checks.
pub mod associativity {
    use super::*;

    /// Asserts that no live topology entity is associated with `geometry`
    /// (resolved before the edit).
    pub fn check_no_links_to(session: &Session, geometry: &[&str]) {
        let world = session.world();
        for (_, entity) in world.topology().live_all() {
            if let Some(link) = entity.domain_link() {
                let name = world.name_of(link).unwrap_or("?");
                assert!(
                    !geometry.contains(&name),
                    "{} still associated with {name}",
                    entity.name()
                );
            }
        }
    }
}
