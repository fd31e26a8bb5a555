//! Entity handle.

use crate::types::Domain;
use std::fmt;

/// Generation-checked reference to an entity slot.
///
/// Handles are:
/// - Scoped to one domain's arena
/// - Cheap to copy and compare
/// - Invalidated when the slot is released, even if the slot is reused
///
/// A stale handle never aliases a newer entity: lookups compare the
/// generation and fail instead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityHandle {
    domain: Domain,
    index: u32,
    generation: u32,
}

impl EntityHandle {
    /// Creates a handle from its parts.
    #[inline]
    #[must_use]
    pub const fn new(domain: Domain, index: u32, generation: u32) -> Self {
        Self {
            domain,
            index,
            generation,
        }
    }

    /// Returns the domain of the referenced entity.
    #[inline]
    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    /// Returns the arena slot index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the slot generation this handle was issued for.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityHandle({}#{}v{})",
            self.domain, self.index, self.generation
        )
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}v{}", self.domain, self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_groups_by_domain() {
        let g = EntityHandle::new(Domain::Geometry, 9, 0);
        let t = EntityHandle::new(Domain::Topology, 0, 0);
        assert!(g < t);
    }

    #[test]
    fn generation_distinguishes_handles() {
        let a = EntityHandle::new(Domain::Geometry, 1, 0);
        let b = EntityHandle::new(Domain::Geometry, 1, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn display() {
        let h = EntityHandle::new(Domain::Topology, 4, 2);
        assert_eq!(format!("{h}"), "topology#4v2");
    }
}
