use smallvec::SmallVec;

use crate::utils::handle_pool::HandlePool;

use super::id::{ComponentFamily, ComponentId, EntityId};

pub type ComponentList = SmallVec<[ComponentId; 8]>;

/// Per-entity record, the attached components are kept in attachment order.
#[derive(Debug, Default, Clone)]
pub struct EntityData {
    pub components: ComponentList,
    pub finalized: bool,
}

impl EntityData {
    /// Returns the attached components of `family`.
    pub fn of_family<'a>(&'a self, family: ComponentFamily) -> impl Iterator<Item = ComponentId> + 'a {
        self.components
            .iter()
            .cloned()
            .filter(move |v| v.family() == family)
    }

    #[inline]
    pub fn has_family(&self, family: ComponentFamily) -> bool {
        self.components.iter().any(|v| v.family() == family)
    }

    pub(crate) fn remove(&mut self, component: ComponentId) -> bool {
        match self.components.iter().position(|&v| v == component) {
            Some(pos) => {
                self.components.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// The `EntityTable` owns the entity generations and the attached component
/// sets.
pub struct EntityTable {
    handles: HandlePool,
    data: Vec<EntityData>,
    finalized: usize,
}

impl EntityTable {
    pub fn new(capacity: usize) -> Self {
        EntityTable {
            handles: HandlePool::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
            finalized: 0,
        }
    }

    /// Creates a provisional entity, reusing the lowest free index.
    pub fn create(&mut self) -> EntityId {
        let handle = self.handles.create();
        self.reset(handle.index() as usize);
        handle.into()
    }

    /// Reserves the lowest free slot, the entity stays dead until `commit`.
    pub fn reserve(&mut self) -> EntityId {
        self.handles.reserve().into()
    }

    pub fn commit(&mut self, id: EntityId) -> bool {
        if !self.handles.commit(id.handle()) {
            return false;
        }

        self.reset(id.index() as usize);
        true
    }

    fn reset(&mut self, index: usize) {
        if self.data.len() <= index {
            self.data.resize_with(index + 1, EntityData::default);
        }

        self.data[index] = EntityData::default();
    }

    #[inline]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.handles.is_alive(id.handle())
    }

    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&EntityData> {
        if self.is_alive(id) {
            self.data.get(id.index() as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityData> {
        if self.is_alive(id) {
            self.data.get_mut(id.index() as usize)
        } else {
            None
        }
    }

    /// Marks a provisional entity as finalized. Returns false if it was
    /// finalized already.
    pub fn finalize(&mut self, id: EntityId) -> Option<bool> {
        let data = self.data.get_mut(id.index() as usize)?;
        if !self.handles.is_alive(id.handle()) {
            return None;
        }

        if data.finalized {
            Some(false)
        } else {
            data.finalized = true;
            self.finalized += 1;
            Some(true)
        }
    }

    /// Frees the entity slot and hands back whatever was still attached.
    pub fn destroy(&mut self, id: EntityId) -> Option<EntityData> {
        if !self.handles.free(id.handle()) {
            return None;
        }

        let data = ::std::mem::replace(&mut self.data[id.index() as usize], EntityData::default());
        if data.finalized {
            self.finalized -= 1;
        }

        Some(data)
    }

    /// Returns the live entity at `index` if any.
    #[inline]
    pub fn id_at(&self, index: usize) -> Option<EntityId> {
        self.handles.get(index).map(EntityId::from)
    }

    /// Returns the number of alive entities, provisional ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Returns the number of finalized entities.
    #[inline]
    pub fn num_finalized(&self) -> usize {
        self.finalized
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.handles.slots()
    }
}
