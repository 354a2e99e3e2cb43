//! Lifecycle events emitted synchronously on structural transitions.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::utils::handle_pool::HandlePool;

use super::id::{ComponentFamily, ComponentId, EntityId};
use super::system::EntitySystem;

/// Anything that can be sent through the event bus.
pub trait Event: Any + Send + Sync {}

/// A finalized entity became visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCreated {
    pub entity: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDestroyed {
    pub entity: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentCreated {
    pub component: ComponentId,
    pub family: ComponentFamily,
    /// The owner if the component was created attached.
    pub entity: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentAttached {
    pub component: ComponentId,
    pub family: ComponentFamily,
    pub entity: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDetached {
    pub component: ComponentId,
    pub family: ComponentFamily,
    pub entity: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDestroyed {
    pub component: ComponentId,
    pub family: ComponentFamily,
}

impl Event for EntityCreated {}
impl Event for EntityDestroyed {}
impl Event for ComponentCreated {}
impl Event for ComponentAttached {}
impl Event for ComponentDetached {}
impl Event for ComponentDestroyed {}

impl_handle!(ListenerId);

pub(crate) type Listener = Arc<dyn Fn(&EntitySystem, &dyn Any) + Send + Sync>;

/// Listeners grouped by event type, in subscription order. Listeners owned
/// by a component are also indexed by their owner.
#[derive(Default)]
pub struct EventBus {
    handles: HandlePool,
    listeners: HashMap<TypeId, Vec<(ListenerId, Listener)>>,
    types: HashMap<ListenerId, (TypeId, Option<ComponentId>)>,
    owned: HashMap<ComponentId, Vec<ListenerId>>,
}

impl EventBus {
    pub fn subscribe<E, F>(&mut self, handler: F) -> ListenerId
    where
        E: Event,
        F: Fn(&EntitySystem, &E) + Send + Sync + 'static,
    {
        self.subscribe_with::<E, F>(None, handler)
    }

    /// Subscribes `handler` on behalf of `owner`, see `unsubscribe_owned_by`.
    pub fn subscribe_owned<E, F>(&mut self, owner: ComponentId, handler: F) -> ListenerId
    where
        E: Event,
        F: Fn(&EntitySystem, &E) + Send + Sync + 'static,
    {
        let id = self.subscribe_with::<E, F>(Some(owner), handler);
        self.owned.entry(owner).or_default().push(id);
        id
    }

    fn subscribe_with<E, F>(&mut self, owner: Option<ComponentId>, handler: F) -> ListenerId
    where
        E: Event,
        F: Fn(&EntitySystem, &E) + Send + Sync + 'static,
    {
        let id: ListenerId = self.handles.create().into();
        let listener: Listener = Arc::new(move |system: &EntitySystem, event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(system, event);
            }
        });

        let tid = TypeId::of::<E>();
        self.listeners.entry(tid).or_default().push((id, listener));
        self.types.insert(id, (tid, owner));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let (tid, owner) = match self.types.remove(&id) {
            Some(v) => v,
            None => return false,
        };

        if let Some(v) = self.listeners.get_mut(&tid) {
            v.retain(|&(lid, _)| lid != id);
        }

        if let Some(owner) = owner {
            if let Some(v) = self.owned.get_mut(&owner) {
                v.retain(|&lid| lid != id);
                if v.is_empty() {
                    self.owned.remove(&owner);
                }
            }
        }

        self.handles.free(id)
    }

    /// Unsubscribes every listener owned by `owner`, returns how many were
    /// removed.
    pub fn unsubscribe_owned_by(&mut self, owner: ComponentId) -> usize {
        let ids = match self.owned.remove(&owner) {
            Some(ids) => ids,
            None => return 0,
        };

        ids.into_iter().filter(|&id| self.unsubscribe(id)).count()
    }

    /// Clones the listeners of `E`, so they can be invoked without holding
    /// the bus.
    pub(crate) fn snapshot<E: Event>(&self) -> Vec<Listener> {
        self.listeners
            .get(&TypeId::of::<E>())
            .map(|v| v.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
