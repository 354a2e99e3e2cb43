pub use crate::ecs::events::{
    ComponentAttached, ComponentCreated, ComponentDestroyed, ComponentDetached, EntityCreated,
    EntityDestroyed, Event, ListenerId,
};
pub use crate::ecs::{
    Component, ComponentFamily, ComponentId, ComponentView, EntityId, EntitySystem, EntityView,
    FrozenScope, Match, Multiplicity,
};
pub use crate::errors::{Error, Result};
pub use crate::message::{Delivery, Flow, Locality, Message, MessageId, RequestId};
pub use crate::sched::JobQueue;
pub use crate::settings::SystemParams;
