//! Entity store for one domain.

use crate::entity::arena::Arena;
use crate::entity::{Entity, EntityHandle, EntityKind};
use crate::error::{CoreError, CoreResult};
use crate::names::NameRegistry;
use crate::types::{Dimension, Domain};

/// Per-dimension collections of one domain's entities.
///
/// The `EntityStore` owns entity memory through a generational arena and
/// keeps, for each dimension, the insertion-ordered list of attached
/// handles. Destroyed entities stay attached (and findable, to report
/// [`CoreError::DestroyedEntity`]) until a command leaving the history
/// releases them.
///
/// No notifications are emitted from this layer.
pub struct EntityStore {
    domain: Domain,
    arena: Arena<Entity>,
    by_dim: [Vec<EntityHandle>; 4],
}

impl EntityStore {
    /// Creates an empty store for `domain`.
    #[must_use]
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            arena: Arena::new(),
            by_dim: Default::default(),
        }
    }

    /// Returns the domain of this store.
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Inserts an entity.
    ///
    /// Fails with [`CoreError::DuplicateName`] if a live entity of the same
    /// dimension already carries the name.
    pub fn add(&mut self, entity: Entity) -> CoreResult<EntityHandle> {
        if entity.domain() != self.domain {
            return Err(CoreError::invariant(format!(
                "{} entity {} added to {} store",
                entity.domain(),
                entity.name(),
                self.domain
            )));
        }
        let dim = entity.dimension();
        if self.live_named(dim, entity.name()).is_some() {
            return Err(CoreError::duplicate_name(entity.name(), dim));
        }
        let (index, generation) = self.arena.insert(entity);
        let handle = EntityHandle::new(self.domain, index, generation);
        self.by_dim[dim.index()].push(handle);
        Ok(handle)
    }

    /// Detaches an entity from its collection without freeing it.
    pub fn remove(&mut self, handle: EntityHandle) -> CoreResult<()> {
        let dim = self.get(handle)?.dimension();
        let list = &mut self.by_dim[dim.index()];
        match list.iter().position(|h| *h == handle) {
            Some(pos) => {
                list.remove(pos);
                Ok(())
            }
            None => Err(CoreError::invariant(format!(
                "remove of detached entity {handle}"
            ))),
        }
    }

    /// Detaches (if attached) and frees an entity. The handle goes stale.
    pub fn release(&mut self, handle: EntityHandle) -> CoreResult<Entity> {
        let dim = self.get(handle)?.dimension();
        self.by_dim[dim.index()].retain(|h| *h != handle);
        self.arena
            .free(handle.index(), handle.generation())
            .ok_or_else(|| CoreError::invariant(format!("release of stale handle {handle}")))
    }

    /// Returns true if the handle is attached to its dimension collection.
    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.get(handle)
            .map(|e| self.by_dim[e.dimension().index()].contains(&handle))
            .unwrap_or(false)
    }

    /// Gets an entity by handle.
    ///
    /// A stale handle (released slot, possibly reused since) is an
    /// [`CoreError::InternalInvariant`].
    pub fn get(&self, handle: EntityHandle) -> CoreResult<&Entity> {
        if handle.domain() != self.domain {
            return Err(CoreError::invariant(format!(
                "{handle} looked up in {} store",
                self.domain
            )));
        }
        self.arena
            .get(handle.index(), handle.generation())
            .ok_or_else(|| CoreError::invariant(format!("stale handle {handle}")))
    }

    /// Gets a mutable entity by handle.
    pub fn get_mut(&mut self, handle: EntityHandle) -> CoreResult<&mut Entity> {
        if handle.domain() != self.domain {
            return Err(CoreError::invariant(format!(
                "{handle} looked up in {} store",
                self.domain
            )));
        }
        self.arena
            .get_mut(handle.index(), handle.generation())
            .ok_or_else(|| CoreError::invariant(format!("stale handle {handle}")))
    }

    /// Clears the destroyed flag of an attached entity.
    ///
    /// Fails with [`CoreError::DuplicateName`] if a live entity of the same
    /// dimension took the name in the meantime.
    pub(crate) fn revive(&mut self, handle: EntityHandle) -> CoreResult<()> {
        let entity = self.get(handle)?;
        let dim = entity.dimension();
        if !entity.is_destroyed() {
            return Err(CoreError::invariant(format!(
                "revive of live entity {}",
                entity.name()
            )));
        }
        if self.live_named(dim, entity.name()).is_some() {
            return Err(CoreError::duplicate_name(entity.name(), dim));
        }
        self.get_mut(handle)?.state.destroyed = false;
        Ok(())
    }

    /// Finds an entity by name in one dimension.
    ///
    /// In shifting-id mode the name is first translated through `names`.
    /// A live match wins over a destroyed one; a destroyed-only match fails
    /// with [`CoreError::DestroyedEntity`]. Without any match the call fails
    /// with [`CoreError::NotFound`] if `must_exist`, else returns `None`.
    pub fn find(
        &self,
        dim: Dimension,
        name: &str,
        must_exist: bool,
        names: &NameRegistry,
    ) -> CoreResult<Option<EntityHandle>> {
        let resolved = names.resolve_alias(name);
        self.find_resolved(dim, &resolved, must_exist)
    }

    /// Finds an entity by name in any dimension, using its type tag.
    pub fn find_any(
        &self,
        name: &str,
        must_exist: bool,
        names: &NameRegistry,
    ) -> CoreResult<Option<EntityHandle>> {
        let resolved = names.resolve_alias(name);
        match EntityKind::from_name(&resolved) {
            Some(kind) if kind.domain() == self.domain => {
                self.find_resolved(kind.dimension(), &resolved, must_exist)
            }
            _ if must_exist => Err(CoreError::not_found(resolved)),
            _ => Ok(None),
        }
    }

    fn find_resolved(
        &self,
        dim: Dimension,
        name: &str,
        must_exist: bool,
    ) -> CoreResult<Option<EntityHandle>> {
        let mut destroyed = false;
        for handle in &self.by_dim[dim.index()] {
            let entity = self.get(*handle)?;
            if entity.name() == name {
                if !entity.is_destroyed() {
                    return Ok(Some(*handle));
                }
                destroyed = true;
            }
        }
        if destroyed {
            Err(CoreError::destroyed(name))
        } else if must_exist {
            Err(CoreError::not_found(name))
        } else {
            Ok(None)
        }
    }

    fn live_named(&self, dim: Dimension, name: &str) -> Option<EntityHandle> {
        self.live(dim).find(|(_, e)| e.name() == name).map(|(h, _)| h)
    }

    /// Iterates live entities of one dimension in insertion order.
    pub fn live(&self, dim: Dimension) -> impl Iterator<Item = (EntityHandle, &Entity)> + '_ {
        self.by_dim[dim.index()].iter().filter_map(move |h| {
            self.arena
                .get(h.index(), h.generation())
                .filter(|e| !e.is_destroyed())
                .map(|e| (*h, e))
        })
    }

    /// Iterates live entities of every dimension, lowest dimension first.
    pub fn live_all(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> + '_ {
        Dimension::ALL.into_iter().flat_map(move |d| self.live(d))
    }

    /// Returns the most recently inserted live entity of one dimension.
    #[must_use]
    pub fn last_live(&self, dim: Dimension) -> Option<EntityHandle> {
        self.by_dim[dim.index()].iter().rev().copied().find(|h| {
            self.arena
                .get(h.index(), h.generation())
                .is_some_and(|e| !e.is_destroyed())
        })
    }

    /// Returns all attached handles of one dimension, destroyed included.
    #[must_use]
    pub fn attached(&self, dim: Dimension) -> &[EntityHandle] {
        &self.by_dim[dim.index()]
    }

    /// Returns the number of live entities of one dimension.
    #[must_use]
    pub fn live_count(&self, dim: Dimension) -> usize {
        self.live(dim).count()
    }

    /// Returns the number of allocated entities, attached or not.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.arena.len()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("domain", &self.domain)
            .field("allocated", &self.arena.len())
            .finish()
    }
}
