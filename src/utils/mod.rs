//! Commonly used utilities like handles and handle pools.

#[macro_use]
pub mod handle;
pub mod handle_pool;

pub use self::handle::{Handle, HandleIndex, HandleLike};
pub use self::handle_pool::{HandleIter, HandlePool};
