//! Prioritized, name-routed messages between components.
//!
//! Requests subscribe a callback to a message name, either globally or locally
//! to a component family. Requests of one message are dispatched by ascending
//! priority, ties are broken by registration order.

pub mod dispatch;
pub mod registry;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ecs::{ComponentFamily, ComponentId, EntityId, EntitySystem};

impl_handle!(RequestId);

/// An interned message name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub struct MessageId(u32);

impl MessageId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        MessageId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MessageId ({})", self.0)
    }
}

/// Where a request listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locality {
    /// Fires on every `send_global_message`.
    Global,
    /// Fires on `send_local_message` to entities holding the family.
    Local(ComponentFamily),
}

impl Locality {
    #[inline]
    pub fn is_global(self) -> bool {
        self == Locality::Global
    }
}

/// Returned by request callbacks to continue or stop the propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub type Outcome = ::std::result::Result<Flow, failure::Error>;

pub type Callback = Arc<dyn Fn(&EntitySystem, &Message) -> Outcome + Send + Sync>;

/// The report of a single send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// The number of callback invocations.
    pub invoked: usize,
    /// The request that returned `Flow::Stop`, if any.
    pub stopped_by: Option<RequestId>,
}

impl Delivery {
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped_by.is_some()
    }
}

/// A message as seen by a request callback.
pub struct Message<'a> {
    pub id: MessageId,
    pub request: RequestId,
    /// The target of a local send.
    pub entity: Option<EntityId>,
    /// The receiving component of a local request, or the owner of an owned
    /// request.
    pub component: Option<ComponentId>,
    args: &'a dyn Any,
}

impl<'a> Message<'a> {
    /// Returns the arguments if they are of type `T`.
    #[inline]
    pub fn args<T: Any>(&self) -> Option<&T> {
        self.args.downcast_ref::<T>()
    }
}

impl<'a> fmt::Debug for Message<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("entity", &self.entity)
            .field("component", &self.component)
            .finish()
    }
}
