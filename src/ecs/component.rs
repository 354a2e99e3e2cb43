//! Abstract `Component` trait and the per-family pool that stores them.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::utils::handle_pool::HandlePool;

use super::id::{ComponentFamily, ComponentId, EntityId, COMPONENT_GENERATION_BITS};

/// Helper trait to reach the concrete type behind a `dyn Component`.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Abstract component trait. Payloads are opaque to the system except for the
/// attach/detach hooks and a human readable description.
///
/// The hooks are called while the system is locked, so they only receive the
/// owner id.
pub trait Component: AsAny + Send + Sync {
    /// Called after the component has been attached to `owner`.
    fn on_attach(&mut self, _owner: EntityId) {}

    /// Called before the component is detached from `owner`.
    fn on_detach(&mut self, _owner: EntityId) {}

    /// Describes this component for debugging purposes.
    fn describe(&self) -> String {
        ::std::any::type_name::<Self>().to_owned()
    }
}

/// How many components of one family an entity may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    Single,
    Multiple,
}

pub type Factory = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// Registration record of a component family.
#[derive(Clone)]
pub struct FamilyInfo {
    pub name: String,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub multiplicity: Multiplicity,
    pub factory: Option<Factory>,
}

/// A pool slot.
pub struct ComponentData {
    pub payload: Box<dyn Component>,
    pub owner: Option<EntityId>,
}

impl ComponentData {
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        let payload: &dyn Component = &*self.payload;
        payload.as_any().downcast_ref::<T>()
    }

    #[inline]
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        let payload: &mut dyn Component = &mut *self.payload;
        payload.as_any_mut().downcast_mut::<T>()
    }
}

/// Per-family storage of components, keyed by the index of `ComponentId`.
/// Slot generations and liveness live in an internal `HandlePool` with
/// 24-bits versions.
pub struct ComponentPool {
    family: ComponentFamily,
    handles: HandlePool,
    slots: Vec<Option<ComponentData>>,
}

impl ComponentPool {
    pub fn new(family: ComponentFamily, capacity: usize) -> Self {
        ComponentPool {
            family,
            handles: HandlePool::with_version_bits(COMPONENT_GENERATION_BITS),
            slots: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn family(&self) -> ComponentFamily {
        self.family
    }

    /// Stores `payload` into a free slot, the created component is detached.
    pub fn create(&mut self, payload: Box<dyn Component>) -> ComponentId {
        let handle = self.handles.create();
        self.place(handle.index() as usize, payload);
        ComponentId::from_handle(handle, self.family)
    }

    /// Reserves a slot whose component will be created with `commit`.
    pub fn reserve(&mut self) -> ComponentId {
        let handle = self.handles.reserve();
        ComponentId::from_handle(handle, self.family)
    }

    /// Creates the component at a slot reserved before. Gives the payload back
    /// if `id` is not a pending reservation.
    pub fn commit(
        &mut self,
        id: ComponentId,
        payload: Box<dyn Component>,
    ) -> ::std::result::Result<(), Box<dyn Component>> {
        if id.family() != self.family || !self.handles.commit(id.handle()) {
            return Err(payload);
        }

        self.place(id.index() as usize, payload);
        Ok(())
    }

    /// Abandons a pending reservation.
    pub fn release(&mut self, id: ComponentId) -> bool {
        id.family() == self.family && self.handles.release(id.handle())
    }

    fn place(&mut self, index: usize, payload: Box<dyn Component>) {
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }

        self.slots[index] = Some(ComponentData {
            payload,
            owner: None,
        });
    }

    /// Returns true if `id` refers to a live component of this pool.
    #[inline]
    pub fn is_alive(&self, id: ComponentId) -> bool {
        id.family() == self.family && self.handles.is_alive(id.handle())
    }

    #[inline]
    pub fn get(&self, id: ComponentId) -> Option<&ComponentData> {
        if self.is_alive(id) {
            self.slots[id.index() as usize].as_ref()
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut ComponentData> {
        if self.is_alive(id) {
            self.slots[id.index() as usize].as_mut()
        } else {
            None
        }
    }

    /// Returns the live component at `index` if any.
    pub fn id_at(&self, index: usize) -> Option<ComponentId> {
        self.handles
            .get(index)
            .map(|handle| ComponentId::from_handle(handle, self.family))
    }

    /// Attaches a detached component to `owner`, and calls its `on_attach` hook.
    pub fn attach(&mut self, id: ComponentId, owner: EntityId) -> bool {
        match self.get_mut(id) {
            Some(ref mut data) if data.owner.is_none() => {
                data.owner = Some(owner);
                data.payload.on_attach(owner);
                true
            }
            _ => false,
        }
    }

    /// Detaches a component, and returns its previous owner.
    pub fn detach(&mut self, id: ComponentId) -> Option<EntityId> {
        let data = self.get_mut(id)?;
        let owner = data.owner.take()?;
        data.payload.on_detach(owner);
        Some(owner)
    }

    /// Destroys a detached component and returns its payload. The slot version
    /// is bumped so `id` becomes stale.
    pub fn destroy(&mut self, id: ComponentId) -> Option<Box<dyn Component>> {
        if !self.handles.free(id.handle()) {
            return None;
        }

        self.slots[id.index() as usize]
            .take()
            .map(|data| data.payload)
    }

    /// Returns the number of live components.
    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Returns the number of slots ever allocated.
    #[inline]
    pub fn slots(&self) -> usize {
        self.handles.slots()
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = ComponentId> + 'a {
        let family = self.family;
        self.handles
            .iter()
            .map(move |handle| ComponentId::from_handle(handle, family))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Default)]
    struct Position {
        x: i32,
        y: i32,
        attached: Option<EntityId>,
    }

    impl Component for Position {
        fn on_attach(&mut self, owner: EntityId) {
            self.attached = Some(owner);
        }

        fn on_detach(&mut self, _: EntityId) {
            self.attached = None;
        }
    }

    fn position(data: &ComponentData) -> &Position {
        data.downcast_ref::<Position>().unwrap()
    }

    #[test]
    fn basic() {
        let mut pool = ComponentPool::new(3, 4);
        let c1 = pool.create(Box::new(Position { x: 1, y: 2, attached: None }));
        assert_eq!(c1.family(), 3);
        assert!(pool.is_alive(c1));
        assert_eq!(position(pool.get(c1).unwrap()).x, 1);
        assert_eq!(position(pool.get(c1).unwrap()).y, 2);

        let e = EntityId::new(0, 1);
        assert!(pool.attach(c1, e));
        assert!(!pool.attach(c1, e));
        assert_eq!(position(pool.get(c1).unwrap()).attached, Some(e));
        assert_eq!(pool.detach(c1), Some(e));
        assert_eq!(position(pool.get(c1).unwrap()).attached, None);

        assert!(pool.destroy(c1).is_some());
        assert!(!pool.is_alive(c1));
        assert!(pool.get(c1).is_none());
        assert!(pool.destroy(c1).is_none());

        let c2 = pool.create(Box::new(Position::default()));
        assert_eq!(c2.index(), c1.index());
        assert!(c2.generation() > c1.generation());
    }

    #[test]
    fn foreign_family() {
        let mut pool = ComponentPool::new(0, 0);
        let c1 = pool.create(Box::new(Position::default()));
        let forged = ComponentId::new(c1.index(), c1.generation(), 1);
        assert!(!pool.is_alive(forged));
    }

    #[test]
    fn reservation() {
        let mut pool = ComponentPool::new(0, 0);
        let r = pool.reserve();
        assert!(!pool.is_alive(r));
        assert!(pool.commit(r, Box::new(Position::default())).is_ok());
        assert!(pool.is_alive(r));
        assert!(pool.commit(r, Box::new(Position::default())).is_err());
        assert_eq!(pool.iter().collect::<Vec<_>>(), vec![r]);
    }
}
