//! A small pool of worker threads that runs detached jobs.
//!
//! The entity system hands the construction of template components to this
//! queue in threaded mode, and waits on a `CountLatch` before publishing the
//! entity.

pub mod latch;
pub mod unwind;

mod scheduler;

pub use self::scheduler::JobQueue;
