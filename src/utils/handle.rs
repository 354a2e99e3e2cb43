use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Slot indices and versions are 32-bits, so a `Handle` fits in one 64-bits
/// word.
pub type HandleIndex = u32;

/// A slot `index` paired with the `version` the slot had when the handle was
/// issued. Indices are recycled, versions tell the generations apart.
///
/// Versions handed out by a `HandlePool` are odd while the slot is alive and
/// even once it has been freed, so the nil handle `(0, 0)` is never alive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub struct Handle {
    index: HandleIndex,
    version: HandleIndex,
}

impl Handle {
    #[inline]
    pub fn new(index: HandleIndex, version: HandleIndex) -> Self {
        Handle { index, version }
    }

    #[inline]
    pub fn nil() -> Self {
        Handle::default()
    }

    /// Returns true if this `Handle` is not nil. It says nothing about the
    /// liveness of the slot.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.index > 0 || self.version > 0
    }

    #[inline]
    pub fn invalidate(&mut self) {
        *self = Handle::nil();
    }

    #[inline]
    pub fn index(self) -> HandleIndex {
        self.index
    }

    #[inline]
    pub fn version(self) -> HandleIndex {
        self.version
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handle ({}, {})", self.index, self.version)
    }
}

/// Anything a `HandlePool` can check for liveness.
pub trait HandleLike: Debug + Copy + Hash + Eq + Send + Sync {
    fn index(&self) -> HandleIndex;
    fn version(&self) -> HandleIndex;
}

impl HandleLike for Handle {
    #[inline]
    fn index(&self) -> HandleIndex {
        self.index
    }

    #[inline]
    fn version(&self) -> HandleIndex {
        self.version
    }
}

/// Declares an opaque id type backed by a `Handle`, for ids issued from a
/// `HandlePool` such as requests and listeners.
#[macro_export]
macro_rules! impl_handle {
    ($name:ident) => {
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(::serde::Serialize, ::serde::Deserialize)]
        pub struct $name($crate::utils::handle::Handle);

        impl $name {
            /// Returns the underlying `Handle`.
            #[inline]
            pub fn handle(self) -> $crate::utils::handle::Handle {
                self.0
            }
        }

        impl From<$crate::utils::handle::Handle> for $name {
            fn from(handle: $crate::utils::handle::Handle) -> Self {
                $name(handle)
            }
        }

        impl $crate::utils::handle::HandleLike for $name {
            #[inline]
            fn index(&self) -> $crate::utils::handle::HandleIndex {
                self.0.index()
            }

            #[inline]
            fn version(&self) -> $crate::utils::handle::HandleIndex {
                self.0.version()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(
                    f,
                    "{} ({}, {})",
                    stringify!($name),
                    self.0.index(),
                    self.0.version()
                )
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nil() {
        let mut h = Handle::new(2, 3);
        assert!(h.is_valid());
        assert_eq!(h.index(), 2);
        assert_eq!(h.version(), 3);

        h.invalidate();
        assert_eq!(h, Handle::nil());
        assert!(!h.is_valid());
    }

    impl_handle!(ProbeId);

    #[test]
    fn typed_ids() {
        let id: ProbeId = Handle::new(3, 5).into();
        assert_eq!(id.handle(), Handle::new(3, 5));
        assert_eq!(HandleLike::version(&id), 5);
        assert_eq!(format!("{}", id), "ProbeId (3, 5)");
        assert_eq!(ProbeId::default().handle(), Handle::nil());
    }
}
