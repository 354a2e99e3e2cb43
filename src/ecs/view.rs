//! Read-only iteration over finalized entities and components.
//!
//! Views capture the structural stamp of the system when they are taken. An
//! iterator can only be started from an up-to-date view, and it stops as soon
//! as a structural edit lands while it is running.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::errors::*;

use super::component::Component;
use super::entity::EntityData;
use super::id::{ComponentFamily, ComponentId, EntityId};
use super::system::EntitySystem;

type Families = SmallVec<[ComponentFamily; 4]>;

type Predicate<'a, T> = Arc<dyn Fn(&EntitySystem, T) -> bool + Send + Sync + 'a>;

type Filters<'a, T> = SmallVec<[Predicate<'a, T>; 2]>;

/// How the families of an `EntityView` are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Entities holding every family.
    All,
    /// Entities holding at least one family.
    Any,
}

impl Match {
    fn accepts(self, data: &EntityData, families: &[ComponentFamily]) -> bool {
        match self {
            Match::All => families.iter().all(|&f| data.has_family(f)),
            Match::Any => families.is_empty() || families.iter().any(|&f| data.has_family(f)),
        }
    }
}

/// A view of the finalized entities matching a family filter and a chain of
/// predicates.
pub struct EntityView<'a> {
    system: &'a EntitySystem,
    families: Families,
    matching: Match,
    filters: Filters<'a, EntityId>,
    stamp: u64,
}

impl<'a> EntityView<'a> {
    /// Returns true if a structural edit has been applied since the view was
    /// taken.
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.system.stamp() != self.stamp
    }

    /// Only reports the entities accepted by `predicate`. Predicates run
    /// unlocked, and may use the read-only queries of the system.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EntitySystem, EntityId) -> bool + Send + Sync + 'a,
    {
        self.filters.push(Arc::new(predicate));
        self
    }

    /// Starts a new pass over the view.
    pub fn iter(&self) -> Result<EntityIter<'a>> {
        if self.is_stale() {
            return Err(Error::StaleView);
        }

        Ok(EntityIter {
            system: self.system,
            families: self.families.clone(),
            matching: self.matching,
            filters: self.filters.clone(),
            stamp: self.stamp,
            cursor: 0,
            stale: false,
        })
    }

    /// Calls `func` with every entity of one pass.
    pub fn for_each<F>(&self, mut func: F) -> Result<()>
    where
        F: FnMut(EntityId),
    {
        for id in self.iter()? {
            func(id);
        }

        Ok(())
    }
}

pub struct EntityIter<'a> {
    system: &'a EntitySystem,
    families: Families,
    matching: Match,
    filters: Filters<'a, EntityId>,
    stamp: u64,
    cursor: usize,
    stale: bool,
}

impl<'a> EntityIter<'a> {
    /// Returns true if the iteration ended because of a structural edit.
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn advance(&mut self) -> Option<EntityId> {
        let world = self.system.world.read();
        while self.cursor < world.entities.slots() {
            let index = self.cursor;
            self.cursor += 1;

            if let Some(id) = world.entities.id_at(index) {
                if let Some(data) = world.entities.get(id) {
                    if data.finalized && self.matching.accepts(data, &self.families) {
                        return Some(id);
                    }
                }
            }
        }

        None
    }
}

impl<'a> Iterator for EntityIter<'a> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        loop {
            if self.stale || self.system.stamp() != self.stamp {
                self.stale = true;
                return None;
            }

            let id = self.advance()?;
            if self.filters.iter().all(|f| f(self.system, id)) {
                return Some(id);
            }
        }
    }
}

/// A view of the live components of one family, owned by finalized entities
/// or detached.
pub struct ComponentView<'a> {
    system: &'a EntitySystem,
    family: ComponentFamily,
    filters: Filters<'a, ComponentId>,
    stamp: u64,
}

impl<'a> ComponentView<'a> {
    #[inline]
    pub fn family(&self) -> ComponentFamily {
        self.family
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.system.stamp() != self.stamp
    }

    /// Only reports the components accepted by `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EntitySystem, ComponentId) -> bool + Send + Sync + 'a,
    {
        self.filters.push(Arc::new(predicate));
        self
    }

    pub fn iter(&self) -> Result<ComponentIter<'a>> {
        if self.is_stale() {
            return Err(Error::StaleView);
        }

        Ok(ComponentIter {
            system: self.system,
            family: self.family,
            filters: self.filters.clone(),
            stamp: self.stamp,
            cursor: 0,
            stale: false,
        })
    }

    /// Calls `func` with the mutable payload of every component of one pass.
    /// The system is locked while `func` runs, so it must not call back into
    /// the system.
    pub fn for_each<T, F>(&self, mut func: F) -> Result<()>
    where
        T: Component,
        F: FnMut(ComponentId, &mut T),
    {
        for id in self.iter()? {
            self.system
                .with_component_mut::<T, _, _>(id, |v| func(id, v))?;
        }

        Ok(())
    }
}

pub struct ComponentIter<'a> {
    system: &'a EntitySystem,
    family: ComponentFamily,
    filters: Filters<'a, ComponentId>,
    stamp: u64,
    cursor: usize,
    stale: bool,
}

impl<'a> ComponentIter<'a> {
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn advance(&mut self) -> Option<ComponentId> {
        let world = self.system.world.read();
        let pool = world.pool(self.family).ok()?;

        while self.cursor < pool.slots() {
            let index = self.cursor;
            self.cursor += 1;

            if let Some(id) = pool.id_at(index) {
                let owner = pool.get(id).and_then(|v| v.owner);
                if world.is_visible(owner) {
                    return Some(id);
                }
            }
        }

        None
    }
}

impl<'a> Iterator for ComponentIter<'a> {
    type Item = ComponentId;

    fn next(&mut self) -> Option<ComponentId> {
        loop {
            if self.stale || self.system.stamp() != self.stamp {
                self.stale = true;
                return None;
            }

            let id = self.advance()?;
            if self.filters.iter().all(|f| f(self.system, id)) {
                return Some(id);
            }
        }
    }
}

impl EntitySystem {
    /// Returns a view of all the finalized entities.
    pub fn entities(&self) -> EntityView {
        EntityView {
            system: self,
            families: Families::new(),
            matching: Match::All,
            filters: Filters::new(),
            stamp: self.stamp(),
        }
    }

    /// Returns a view of the finalized entities holding all of `families`.
    pub fn entities_with(&self, families: &[ComponentFamily]) -> Result<EntityView> {
        self.entities_matching(families, Match::All)
    }

    /// Returns a view of the finalized entities holding all or any of
    /// `families`. An empty list matches every finalized entity.
    pub fn entities_matching(&self, families: &[ComponentFamily], matching: Match) -> Result<EntityView> {
        {
            let world = self.world.read();
            for &v in families {
                world.family_info(v)?;
            }
        }

        Ok(EntityView {
            system: self,
            families: families.iter().cloned().collect(),
            matching,
            filters: Filters::new(),
            stamp: self.stamp(),
        })
    }

    /// Returns a view of the components of `family`.
    pub fn components(&self, family: ComponentFamily) -> Result<ComponentView> {
        self.world.read().family_info(family)?;

        Ok(ComponentView {
            system: self,
            family,
            filters: Filters::new(),
            stamp: self.stamp(),
        })
    }

    pub fn components_of<T: Component>(&self) -> Result<ComponentView> {
        self.components(self.family::<T>()?)
    }
}
