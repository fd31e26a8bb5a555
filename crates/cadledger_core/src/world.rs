//! The mutable state of a session: both entity stores and the name registry.

use crate::entity::{Entity, EntityHandle, EntityStore};
use crate::error::{CoreError, CoreResult};
use crate::names::NameRegistry;
use crate::types::{Dimension, Domain};
use std::collections::BTreeSet;

/// Geometry store, topology store and name registry.
///
/// Only commands mutate a `World`, and only while the transaction manager
/// holds the write lock.
#[derive(Debug)]
pub struct World {
    geometry: EntityStore,
    topology: EntityStore,
    names: NameRegistry,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            geometry: EntityStore::new(Domain::Geometry),
            topology: EntityStore::new(Domain::Topology),
            names: NameRegistry::new(),
        }
    }

    /// Returns the store of `domain`.
    #[must_use]
    pub fn store(&self, domain: Domain) -> &EntityStore {
        match domain {
            Domain::Geometry => &self.geometry,
            Domain::Topology => &self.topology,
        }
    }

    /// Returns the mutable store of `domain`.
    pub fn store_mut(&mut self, domain: Domain) -> &mut EntityStore {
        match domain {
            Domain::Geometry => &mut self.geometry,
            Domain::Topology => &mut self.topology,
        }
    }

    /// Returns the geometry store.
    #[must_use]
    pub fn geometry(&self) -> &EntityStore {
        &self.geometry
    }

    /// Returns the topology store.
    #[must_use]
    pub fn topology(&self) -> &EntityStore {
        &self.topology
    }

    /// Returns the name registry.
    #[must_use]
    pub fn names(&self) -> &NameRegistry {
        &self.names
    }

    /// Returns the mutable name registry.
    pub fn names_mut(&mut self) -> &mut NameRegistry {
        &mut self.names
    }

    /// Gets an entity by handle in either domain.
    pub fn entity(&self, handle: EntityHandle) -> CoreResult<&Entity> {
        self.store(handle.domain()).get(handle)
    }

    pub(crate) fn entity_mut(&mut self, handle: EntityHandle) -> CoreResult<&mut Entity> {
        self.store_mut(handle.domain()).get_mut(handle)
    }

    /// Returns the handle's entity if it is live.
    pub fn live_entity(&self, handle: EntityHandle) -> CoreResult<&Entity> {
        let entity = self.entity(handle)?;
        if entity.is_destroyed() {
            return Err(CoreError::destroyed(entity.name()));
        }
        Ok(entity)
    }

    /// Resolves a name (any dimension) that must denote a live entity.
    pub fn resolve(&self, domain: Domain, name: &str) -> CoreResult<EntityHandle> {
        self.store(domain)
            .find_any(name, true, &self.names)?
            .ok_or_else(|| CoreError::not_found(name))
    }

    /// Looks a name up in one dimension.
    pub fn find(
        &self,
        domain: Domain,
        dim: Dimension,
        name: &str,
        must_exist: bool,
    ) -> CoreResult<Option<EntityHandle>> {
        self.store(domain).find(dim, name, must_exist, &self.names)
    }

    /// Returns the name of a handle's entity.
    pub fn name_of(&self, handle: EntityHandle) -> CoreResult<&str> {
        Ok(self.entity(handle)?.name())
    }

    /// Returns the names of `handles`, comma separated.
    #[must_use]
    pub fn names_of(&self, handles: &[EntityHandle]) -> String {
        handles
            .iter()
            .map(|h| self.name_of(*h).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns `seeds` plus every live entity reachable through incidences
    /// to higher dimensions.
    pub fn upward_closure(&self, seeds: &[EntityHandle]) -> CoreResult<BTreeSet<EntityHandle>> {
        self.closure(seeds, |from, to| to > from)
    }

    /// Returns `seeds` plus every live entity reachable through incidences
    /// to lower dimensions.
    pub fn downward_closure(&self, seeds: &[EntityHandle]) -> CoreResult<BTreeSet<EntityHandle>> {
        self.closure(seeds, |from, to| to < from)
    }

    fn closure(
        &self,
        seeds: &[EntityHandle],
        follow: impl Fn(Dimension, Dimension) -> bool,
    ) -> CoreResult<BTreeSet<EntityHandle>> {
        let mut seen: BTreeSet<EntityHandle> = seeds.iter().copied().collect();
        let mut stack: Vec<EntityHandle> = seeds.to_vec();
        while let Some(handle) = stack.pop() {
            let entity = self.entity(handle)?;
            for next in entity.incident() {
                let other = self.entity(*next)?;
                if other.is_destroyed() || !follow(entity.dimension(), other.dimension()) {
                    continue;
                }
                if seen.insert(*next) {
                    stack.push(*next);
                }
            }
        }
        Ok(seen)
    }

    /// Sorts handles by descending dimension, keeping the relative order.
    pub fn by_descending_dimension(
        &self,
        handles: impl IntoIterator<Item = EntityHandle>,
    ) -> CoreResult<Vec<EntityHandle>> {
        let mut keyed = handles
            .into_iter()
            .map(|h| Ok((self.entity(h)?.dimension(), h)))
            .collect::<CoreResult<Vec<_>>>()?;
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(keyed.into_iter().map(|(_, h)| h).collect())
    }

    /// Live topology entities whose association points into `geometry`.
    #[must_use]
    pub fn linked_topology(&self, geometry: &BTreeSet<EntityHandle>) -> Vec<EntityHandle> {
        self.topology
            .live_all()
            .filter(|(_, e)| e.domain_link().is_some_and(|g| geometry.contains(&g)))
            .map(|(h, _)| h)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::shape::ShapeData;

    fn add(world: &mut World, kind: EntityKind) -> EntityHandle {
        let name = world.names_mut().allocate(kind);
        world
            .store_mut(kind.domain())
            .add(Entity::new(name, kind, ShapeData::default()))
            .unwrap()
    }

    fn connect(world: &mut World, a: EntityHandle, b: EntityHandle) {
        world.entity_mut(a).unwrap().state.incident.insert(b);
        world.entity_mut(b).unwrap().state.incident.insert(a);
    }

    #[test]
    fn closures_follow_dimension() {
        let mut world = World::new();
        let a = add(&mut world, EntityKind::GeomVertex);
        let b = add(&mut world, EntityKind::GeomVertex);
        let ab = add(&mut world, EntityKind::GeomCurve);
        let s = add(&mut world, EntityKind::GeomSurface);
        connect(&mut world, a, ab);
        connect(&mut world, b, ab);
        connect(&mut world, ab, s);

        let up = world.upward_closure(&[a]).unwrap();
        assert_eq!(up, [a, ab, s].into_iter().collect());

        let down = world.downward_closure(&[s]).unwrap();
        assert_eq!(down, [a, b, ab, s].into_iter().collect());

        let ordered = world.by_descending_dimension(down).unwrap();
        assert_eq!(ordered.first(), Some(&s));
    }

    #[test]
    fn resolve_by_name() {
        let mut world = World::new();
        let a = add(&mut world, EntityKind::GeomVertex);
        assert_eq!(world.resolve(Domain::Geometry, "Pt0000").unwrap(), a);
        assert!(matches!(
            world.resolve(Domain::Topology, "Pt0000"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn resolve_huge_counter_while_shifting() {
        let mut world = World::new();
        add(&mut world, EntityKind::GeomVertex);
        world.names_mut().activate_shifting();
        assert!(matches!(
            world.resolve(Domain::Geometry, "Pt18446744073709551615"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn linked_topology_scans_live_links() {
        let mut world = World::new();
        let g = add(&mut world, EntityKind::GeomCurve);
        let t = add(&mut world, EntityKind::TopoEdge);
        world.entity_mut(t).unwrap().state.domain_link = Some(g);
        let set = [g].into_iter().collect();
        assert_eq!(world.linked_topology(&set), vec![t]);
        world.entity_mut(t).unwrap().state.destroyed = true;
        assert!(world.linked_topology(&set).is_empty());
    }
}
