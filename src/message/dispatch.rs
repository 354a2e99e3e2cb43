use std::any::Any;
use std::sync::Arc;

use crate::ecs::{ComponentFamily, ComponentId, EntityId, EntitySystem};
use crate::errors::*;

use super::registry::Request;
use super::{Callback, Delivery, Flow, Locality, Message, MessageId, Outcome, RequestId};

impl EntitySystem {
    /// Returns the id of the message `name`, interning the name if absent.
    pub fn message_id(&self, name: &str) -> MessageId {
        self.requests.write().intern(name)
    }

    /// Returns the id of the message `name` if it has been interned.
    pub fn existing_message_id(&self, name: &str) -> Option<MessageId> {
        self.requests.read().lookup(name)
    }

    pub fn message_name(&self, id: MessageId) -> Option<String> {
        self.requests.read().name(id).map(|v| v.to_owned())
    }

    /// Subscribes `callback` to every global send of `name`.
    pub fn register_global_request<F>(&self, name: &str, priority: i32, callback: F) -> Result<RequestId>
    where
        F: Fn(&EntitySystem, &Message) -> Outcome + Send + Sync + 'static,
    {
        self.register_request(name, Locality::Global, None, priority, Arc::new(callback))
    }

    /// Subscribes `callback` to local sends of `name` targeting entities that
    /// hold a component of `family`. The callback is invoked once per matching
    /// component.
    pub fn register_local_request<F>(
        &self,
        family: ComponentFamily,
        name: &str,
        priority: i32,
        callback: F,
    ) -> Result<RequestId>
    where
        F: Fn(&EntitySystem, &Message) -> Outcome + Send + Sync + 'static,
    {
        self.world.read().family_info(family)?;
        self.register_request(name, Locality::Local(family), None, priority, Arc::new(callback))
    }

    /// Subscribes `callback` on behalf of the component `owner`. The request is
    /// removed when the owner is destroyed. A local owned request only fires
    /// for local sends targeting the owner's entity.
    pub fn register_owned_request<F>(
        &self,
        owner: ComponentId,
        locality: Locality,
        name: &str,
        priority: i32,
        callback: F,
    ) -> Result<RequestId>
    where
        F: Fn(&EntitySystem, &Message) -> Outcome + Send + Sync + 'static,
    {
        if !self.is_component_valid(owner) {
            return Err(Error::ComponentHandleInvalid(owner));
        }

        let locality = match locality {
            Locality::Global => Locality::Global,
            Locality::Local(_) => Locality::Local(owner.family()),
        };

        self.register_request(name, locality, Some(owner), priority, Arc::new(callback))
    }

    fn register_request(
        &self,
        name: &str,
        locality: Locality,
        owner: Option<ComponentId>,
        priority: i32,
        callback: Callback,
    ) -> Result<RequestId> {
        let mut requests = self.requests.write();
        let message = requests.intern(name);
        let id = requests.register(message, locality, owner, priority, callback)?;

        debug!(
            "[EntitySystem] registers {} on {} ({:?}, priority {}).",
            id, name, locality, priority
        );

        Ok(id)
    }

    /// Moves a request among the requests of its message.
    pub fn reprioritize_request(&self, id: RequestId, priority: i32) -> Result<()> {
        self.requests.write().reprioritize(id, priority)
    }

    pub fn remove_global_request(&self, id: RequestId) -> Result<()> {
        self.remove_request(id, true)
    }

    pub fn remove_local_request(&self, id: RequestId) -> Result<()> {
        self.remove_request(id, false)
    }

    fn remove_request(&self, id: RequestId, global: bool) -> Result<()> {
        let mut requests = self.requests.write();
        if requests.locality(id)?.is_global() != global {
            return Err(Error::RequestHandleInvalid(id));
        }

        requests.remove(id)?;
        debug!("[EntitySystem] removes {}.", id);
        Ok(())
    }

    /// Returns the requests of `name` at `locality` in dispatch order.
    pub fn request_order(&self, name: &str, locality: Locality) -> Vec<RequestId> {
        let requests = self.requests.read();
        match requests.lookup(name) {
            Some(message) => requests.order(message, locality),
            None => Vec::new(),
        }
    }

    /// Sends `name` to every global request in priority order. Sending a name
    /// that was never interned delivers nothing.
    pub fn send_global_message<A: Any>(&self, name: &str, args: &A) -> Result<Delivery> {
        match self.existing_message_id(name) {
            Some(id) => self.send_global_message_id(id, args),
            None => Ok(Delivery::default()),
        }
    }

    pub fn send_global_message_id<A: Any>(&self, id: MessageId, args: &A) -> Result<Delivery> {
        let snapshot = self.snapshot(id, true)?;
        let _scope = self.frozen();

        let mut delivery = Delivery::default();
        for request in snapshot {
            let message = Message {
                id,
                request: request.id,
                entity: None,
                component: request.owner,
                args,
            };

            if self.invoke(&request, &message, &mut delivery)? == Flow::Stop {
                break;
            }
        }

        Ok(delivery)
    }

    /// Sends `name` to the local requests matching the components of
    /// `entity`, which must be finalized.
    pub fn send_local_message<A: Any>(&self, entity: EntityId, name: &str, args: &A) -> Result<Delivery> {
        self.world.read().finalized(entity)?;

        match self.existing_message_id(name) {
            Some(id) => self.send_local_message_id(entity, id, args),
            None => Ok(Delivery::default()),
        }
    }

    pub fn send_local_message_id<A: Any>(
        &self,
        entity: EntityId,
        id: MessageId,
        args: &A,
    ) -> Result<Delivery> {
        let snapshot = self.snapshot(id, false)?;
        let components = self.world.read().finalized(entity)?.components.clone();
        let _scope = self.frozen();

        let mut delivery = Delivery::default();
        for request in snapshot {
            let family = match request.locality {
                Locality::Local(family) => family,
                Locality::Global => continue,
            };

            for &component in components.iter().filter(|v| v.family() == family) {
                if let Some(owner) = request.owner {
                    if owner != component {
                        continue;
                    }
                }

                let message = Message {
                    id,
                    request: request.id,
                    entity: Some(entity),
                    component: Some(component),
                    args,
                };

                if self.invoke(&request, &message, &mut delivery)? == Flow::Stop {
                    return Ok(delivery);
                }
            }
        }

        Ok(delivery)
    }

    /// Sends `name` straight to the requests owned by `component`, global and
    /// local ones alike, in priority order.
    pub fn send_component_message<A: Any>(
        &self,
        component: ComponentId,
        name: &str,
        args: &A,
    ) -> Result<Delivery> {
        self.component_target(component)?;

        match self.existing_message_id(name) {
            Some(id) => self.send_component_message_id(component, id, args),
            None => Ok(Delivery::default()),
        }
    }

    pub fn send_component_message_id<A: Any>(
        &self,
        component: ComponentId,
        id: MessageId,
        args: &A,
    ) -> Result<Delivery> {
        let snapshot = {
            let requests = self.requests.read();
            if !requests.contains(id) {
                return Err(Error::UnknownMessage(id));
            }

            requests.owned_snapshot(id, component)
        };

        let entity = self.component_target(component)?;
        let _scope = self.frozen();

        let mut delivery = Delivery::default();
        for request in snapshot {
            let message = Message {
                id,
                request: request.id,
                entity,
                component: Some(component),
                args,
            };

            if self.invoke(&request, &message, &mut delivery)? == Flow::Stop {
                break;
            }
        }

        Ok(delivery)
    }

    /// Returns the owner of a component that may receive messages.
    fn component_target(&self, component: ComponentId) -> Result<Option<EntityId>> {
        let world = self.world.read();
        let owner = world.component(component)?.owner;
        if let Some(entity) = owner {
            world.finalized(entity)?;
        }

        Ok(owner)
    }

    fn snapshot(&self, id: MessageId, global: bool) -> Result<Vec<Arc<Request>>> {
        let requests = self.requests.read();
        if !requests.contains(id) {
            return Err(Error::UnknownMessage(id));
        }

        Ok(requests.snapshot(id, global))
    }

    fn invoke(&self, request: &Request, message: &Message, delivery: &mut Delivery) -> Result<Flow> {
        // Removed by an earlier subscriber of this very dispatch.
        if !request.is_active() {
            return Ok(Flow::Continue);
        }

        trace!("[EntitySystem] dispatches {} to {}.", message.id, request.id);
        delivery.invoked += 1;

        match (request.callback())(self, message) {
            Ok(Flow::Continue) => Ok(Flow::Continue),
            Ok(Flow::Stop) => {
                delivery.stopped_by = Some(request.id);
                Ok(Flow::Stop)
            }
            Err(err) => Err(Error::Subscriber(request.id, err)),
        }
    }
}
