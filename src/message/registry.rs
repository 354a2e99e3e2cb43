use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use inlinable_string::InlinableString;

use crate::ecs::ComponentId;
use crate::errors::*;
use crate::utils::handle_pool::HandlePool;

use super::{Callback, Locality, MessageId, RequestId};

/// A registered request.
pub struct Request {
    pub id: RequestId,
    pub message: MessageId,
    pub locality: Locality,
    pub owner: Option<ComponentId>,
    callback: Callback,
    active: AtomicBool,
}

impl Request {
    /// Removed requests stay reachable from dispatch snapshots, but are
    /// skipped.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn callback(&self) -> &Callback {
        &self.callback
    }
}

struct Entry {
    priority: i32,
    seq: u64,
    request: Arc<Request>,
}

impl Entry {
    #[inline]
    fn key(&self) -> (i32, u64) {
        (self.priority, self.seq)
    }
}

struct MessageSlot {
    name: InlinableString,
    global: Vec<Entry>,
    local: Vec<Entry>,
}

impl MessageSlot {
    fn entries(&mut self, locality: Locality) -> &mut Vec<Entry> {
        match locality {
            Locality::Global => &mut self.global,
            Locality::Local(_) => &mut self.local,
        }
    }
}

/// Interned message names and their ordered requests. Ordering key is
/// `(priority, registration sequence)`, lower first.
#[derive(Default)]
pub struct RequestRegistry {
    names: HashMap<InlinableString, MessageId>,
    messages: Vec<MessageSlot>,
    handles: HandlePool,
    requests: HashMap<RequestId, (MessageId, Locality)>,
    owned: HashMap<ComponentId, Vec<RequestId>>,
    seq: u64,
}

impl RequestRegistry {
    /// Returns the id of `name`, creating it if absent.
    pub fn intern(&mut self, name: &str) -> MessageId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }

        let id = MessageId::new(self.messages.len());
        let name = InlinableString::from(name);
        self.names.insert(name.clone(), id);
        self.messages.push(MessageSlot {
            name,
            global: Vec::new(),
            local: Vec::new(),
        });

        id
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<MessageId> {
        self.names.get(name).cloned()
    }

    #[inline]
    pub fn name(&self, id: MessageId) -> Option<&str> {
        self.messages.get(id.index()).map(|v| &*v.name)
    }

    #[inline]
    pub fn contains(&self, id: MessageId) -> bool {
        id.index() < self.messages.len()
    }

    pub fn register(
        &mut self,
        message: MessageId,
        locality: Locality,
        owner: Option<ComponentId>,
        priority: i32,
        callback: Callback,
    ) -> Result<RequestId> {
        if !self.contains(message) {
            return Err(Error::UnknownMessage(message));
        }

        let id: RequestId = self.handles.create().into();
        self.seq += 1;

        let entry = Entry {
            priority,
            seq: self.seq,
            request: Arc::new(Request {
                id,
                message,
                locality,
                owner,
                callback,
                active: AtomicBool::new(true),
            }),
        };

        let entries = self.messages[message.index()].entries(locality);
        let key = entry.key();
        let pos = entries.partition_point(|v| v.key() < key);
        entries.insert(pos, entry);

        self.requests.insert(id, (message, locality));
        if let Some(owner) = owner {
            self.owned.entry(owner).or_default().push(id);
        }

        Ok(id)
    }

    /// Moves the request to its new position. The registration sequence is
    /// kept, so untouched requests never change their relative order.
    pub fn reprioritize(&mut self, id: RequestId, priority: i32) -> Result<()> {
        let (message, locality) = self.locate(id)?;
        let entries = self.messages[message.index()].entries(locality);

        if let Some(pos) = entries.iter().position(|v| v.request.id == id) {
            let mut entry = entries.remove(pos);
            entry.priority = priority;

            let key = entry.key();
            let pos = entries.partition_point(|v| v.key() < key);
            entries.insert(pos, entry);
        }

        Ok(())
    }

    #[inline]
    pub fn locality(&self, id: RequestId) -> Result<Locality> {
        self.locate(id).map(|(_, locality)| locality)
    }

    fn locate(&self, id: RequestId) -> Result<(MessageId, Locality)> {
        self.requests
            .get(&id)
            .cloned()
            .ok_or(Error::RequestHandleInvalid(id))
    }

    pub fn remove(&mut self, id: RequestId) -> Result<()> {
        let (message, locality) = self.locate(id)?;
        self.requests.remove(&id);
        self.handles.free(id);

        let entries = self.messages[message.index()].entries(locality);
        if let Some(pos) = entries.iter().position(|v| v.request.id == id) {
            let entry = entries.remove(pos);
            entry.request.active.store(false, Ordering::Release);

            if let Some(owner) = entry.request.owner {
                if let Some(v) = self.owned.get_mut(&owner) {
                    v.retain(|&r| r != id);
                    if v.is_empty() {
                        self.owned.remove(&owner);
                    }
                }
            }
        }

        Ok(())
    }

    /// Removes every request owned by `owner`, returns how many were removed.
    pub fn remove_owned_by(&mut self, owner: ComponentId) -> usize {
        let ids = match self.owned.remove(&owner) {
            Some(ids) => ids,
            None => return 0,
        };

        ids.into_iter().filter(|&id| self.remove(id).is_ok()).count()
    }

    /// Returns the requests of `message` listening at `locality`, in
    /// dispatch order.
    pub fn order(&self, message: MessageId, locality: Locality) -> Vec<RequestId> {
        let slot = match self.messages.get(message.index()) {
            Some(slot) => slot,
            None => return Vec::new(),
        };

        match locality {
            Locality::Global => slot.global.iter().map(|v| v.request.id).collect(),
            Locality::Local(family) => slot
                .local
                .iter()
                .filter(|v| v.request.locality == Locality::Local(family))
                .map(|v| v.request.id)
                .collect(),
        }
    }

    /// Clones the ordered requests of `message`, so that they can be invoked
    /// without holding the registry.
    pub fn snapshot(&self, message: MessageId, global: bool) -> Vec<Arc<Request>> {
        match self.messages.get(message.index()) {
            Some(slot) => {
                let entries = if global { &slot.global } else { &slot.local };
                entries.iter().map(|v| v.request.clone()).collect()
            }
            None => Vec::new(),
        }
    }

    /// Clones the requests of `message` owned by `owner`, global and local
    /// ones merged in dispatch order.
    pub fn owned_snapshot(&self, message: MessageId, owner: ComponentId) -> Vec<Arc<Request>> {
        let slot = match self.messages.get(message.index()) {
            Some(slot) => slot,
            None => return Vec::new(),
        };

        let mut entries: Vec<_> = slot
            .global
            .iter()
            .chain(slot.local.iter())
            .filter(|v| v.request.owner == Some(owner))
            .collect();

        entries.sort_by_key(|v| v.key());
        entries.into_iter().map(|v| v.request.clone()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::super::{Flow, Message, Outcome};
    use super::*;
    use crate::ecs::EntitySystem;

    fn noop() -> Callback {
        Arc::new(|_: &EntitySystem, _: &Message| -> Outcome { Ok(Flow::Continue) })
    }

    #[test]
    fn interning() {
        let mut registry = RequestRegistry::default();
        let tick = registry.intern("tick");
        assert_eq!(registry.intern("tick"), tick);
        assert_eq!(registry.lookup("tick"), Some(tick));
        assert_eq!(registry.lookup("tock"), None);
        assert_eq!(registry.name(tick), Some("tick"));
        assert!(!registry.contains(MessageId::new(1)));
    }

    #[test]
    fn ordering() {
        let mut registry = RequestRegistry::default();
        let msg = registry.intern("update");

        let r1 = registry.register(msg, Locality::Global, None, 5, noop()).unwrap();
        let r2 = registry.register(msg, Locality::Global, None, 1, noop()).unwrap();
        let r3 = registry.register(msg, Locality::Global, None, 5, noop()).unwrap();
        assert_eq!(registry.order(msg, Locality::Global), vec![r2, r1, r3]);

        registry.reprioritize(r1, 0).unwrap();
        assert_eq!(registry.order(msg, Locality::Global), vec![r1, r2, r3]);

        registry.reprioritize(r1, 5).unwrap();
        assert_eq!(registry.order(msg, Locality::Global), vec![r2, r1, r3]);

        registry.remove(r2).unwrap();
        assert_eq!(registry.order(msg, Locality::Global), vec![r1, r3]);
        assert!(registry.remove(r2).is_err());
        assert!(registry.reprioritize(r2, 3).is_err());
    }

    #[test]
    fn owned() {
        let mut registry = RequestRegistry::default();
        let msg = registry.intern("hit");
        let owner = ComponentId::new(0, 1, 2);

        let r1 = registry.register(msg, Locality::Local(2), Some(owner), 0, noop()).unwrap();
        let r2 = registry.register(msg, Locality::Global, Some(owner), 0, noop()).unwrap();
        let r3 = registry.register(msg, Locality::Global, None, 0, noop()).unwrap();

        let snapshot = registry.snapshot(msg, true);
        assert_eq!(registry.remove_owned_by(owner), 2);
        assert!(registry.locality(r1).is_err());
        assert!(registry.locality(r2).is_err());
        assert_eq!(registry.order(msg, Locality::Global), vec![r3]);

        assert!(!snapshot[0].is_active());
        assert!(snapshot[1].is_active());
    }

    #[test]
    fn owned_order() {
        let mut registry = RequestRegistry::default();
        let msg = registry.intern("hit");
        let owner = ComponentId::new(0, 1, 2);
        let other = ComponentId::new(1, 1, 2);

        let r1 = registry.register(msg, Locality::Global, Some(owner), 3, noop()).unwrap();
        let r2 = registry.register(msg, Locality::Local(2), Some(owner), 1, noop()).unwrap();
        registry.register(msg, Locality::Local(2), Some(other), 0, noop()).unwrap();
        registry.register(msg, Locality::Global, None, 0, noop()).unwrap();
        let r3 = registry.register(msg, Locality::Global, Some(owner), 1, noop()).unwrap();

        let ids: Vec<_> = registry.owned_snapshot(msg, owner).iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![r2, r3, r1]);
        assert!(registry.owned_snapshot(msg, ComponentId::new(5, 1, 2)).is_empty());
    }
}
