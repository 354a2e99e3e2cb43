//! Packed identifiers of entities and components.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::handle::{Handle, HandleIndex};

/// The runtime type tag of a component kind, assigned in registration order.
pub type ComponentFamily = u8;

/// The number of bits used by the generation of a `ComponentId`.
pub const COMPONENT_GENERATION_BITS: u32 = 24;

const COMPONENT_GENERATION_MASK: u64 = (1 << COMPONENT_GENERATION_BITS) - 1;

/// `EntityId` packs a 32-bits slot index and a 32-bits generation into a single
/// comparable word. An `EntityId` is valid as long as the generation stored in the
/// entity table at `index` equals its own generation.
///
/// Generations are odd while alive. A recycled index comes back with a
/// generation larger by 2, so only "strictly larger" may be relied upon.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(index: HandleIndex, generation: HandleIndex) -> Self {
        EntityId(u64::from(index) | (u64::from(generation) << 32))
    }

    /// Constructs a nil `EntityId` which is never valid.
    #[inline]
    pub fn nil() -> Self {
        EntityId(0)
    }

    #[inline]
    pub fn index(self) -> HandleIndex {
        self.0 as HandleIndex
    }

    #[inline]
    pub fn generation(self) -> HandleIndex {
        (self.0 >> 32) as HandleIndex
    }

    /// Returns the packed representation.
    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn handle(self) -> Handle {
        Handle::new(self.index(), self.generation())
    }
}

impl From<Handle> for EntityId {
    fn from(handle: Handle) -> Self {
        EntityId::new(handle.index(), handle.version())
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EntityId({}, {})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EntityId ({}, {})", self.index(), self.generation())
    }
}

/// `ComponentId` packs a 32-bits slot index, a 24-bits generation and the 8-bits
/// family of the pool that owns the slot. Equality and ordering compare the
/// packed value.
///
/// As for `EntityId`, a recycled slot steps its generation by 2, wrapping
/// around inside 24 bits.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Constructs a new `ComponentId`, the generation is truncated to 24 bits.
    #[inline]
    pub fn new(index: HandleIndex, generation: HandleIndex, family: ComponentFamily) -> Self {
        let generation = u64::from(generation) & COMPONENT_GENERATION_MASK;
        ComponentId(u64::from(index) | (generation << 32) | (u64::from(family) << 56))
    }

    #[inline]
    pub fn nil() -> Self {
        ComponentId(0)
    }

    #[inline]
    pub fn index(self) -> HandleIndex {
        self.0 as HandleIndex
    }

    #[inline]
    pub fn generation(self) -> HandleIndex {
        ((self.0 >> 32) & COMPONENT_GENERATION_MASK) as HandleIndex
    }

    #[inline]
    pub fn family(self) -> ComponentFamily {
        (self.0 >> 56) as ComponentFamily
    }

    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn handle(self) -> Handle {
        Handle::new(self.index(), self.generation())
    }

    #[inline]
    pub(crate) fn from_handle(handle: Handle, family: ComponentFamily) -> Self {
        ComponentId::new(handle.index(), handle.version(), family)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ComponentId({}, {}, #{})",
            self.index(),
            self.generation(),
            self.family()
        )
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ComponentId ({}, {}, #{})",
            self.index(),
            self.generation(),
            self.family()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn entity_packing() {
        let e = EntityId::new(7, 0xFFFF_FFFF);
        assert_eq!(e.index(), 7);
        assert_eq!(e.generation(), 0xFFFF_FFFF);
        assert_eq!(e.handle(), Handle::new(7, 0xFFFF_FFFF));
        assert_eq!(EntityId::from(e.handle()), e);
        assert!(EntityId::new(1, 1) < EntityId::new(1, 3));
    }

    #[test]
    fn component_packing() {
        let c = ComponentId::new(42, 0x1FF_FFFF, 255);
        assert_eq!(c.index(), 42);
        assert_eq!(c.generation(), 0xFF_FFFF);
        assert_eq!(c.family(), 255);

        let c2 = ComponentId::new(42, 3, 1);
        assert_ne!(c2, ComponentId::new(42, 3, 2));
        assert_eq!(format!("{}", c2), "ComponentId (42, 3, #1)");
    }
}
