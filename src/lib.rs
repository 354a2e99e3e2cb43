//! A small entity-component-system whose components talk to each other with
//! prioritized, name-routed messages.
//!
//! Every structural edit (creating, attaching, detaching or destroying
//! entities and components) made while the system is frozen is queued and
//! replayed once the outermost freeze is released. Message dispatch and
//! lifecycle event emission always run frozen, so subscribers may freely
//! destroy the very entity they are notified about.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

#[macro_use]
pub mod utils;

pub mod ecs;
pub mod errors;
pub mod message;
pub mod sched;
pub mod settings;

pub mod prelude;
