use std::cmp::Ordering;
use std::collections::binary_heap::BinaryHeap;

use super::handle::{Handle, HandleIndex, HandleLike};

#[derive(PartialEq, Eq)]
struct InverseHandleIndex(HandleIndex);

impl PartialOrd for InverseHandleIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InverseHandleIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

/// `HandlePool` manages the manipulations of a `Handle` collection, which are
/// created with a continuous `index` field. It also have the ability to find
/// out the current status of a specified `Handle`.
///
/// The version of a slot is bumped on every create and every free, so it is
/// odd while the slot is alive and even once it has been recycled. Versions
/// wrap around inside `version_bits`, which must be even to keep the parity.
pub struct HandlePool {
    versions: Vec<HandleIndex>,
    frees: BinaryHeap<InverseHandleIndex>,
    mask: HandleIndex,
    alive: usize,
}

impl Default for HandlePool {
    fn default() -> Self {
        HandlePool::new()
    }
}

impl HandlePool {
    /// Constructs a new, empty `HandlePool` with 32-bits versions.
    pub fn new() -> HandlePool {
        HandlePool::with_version_bits(32)
    }

    /// Constructs a new `HandlePool` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> HandlePool {
        let mut pool = HandlePool::new();
        pool.versions.reserve(capacity);
        pool
    }

    /// Constructs a new, empty `HandlePool` whose versions wrap around after
    /// `bits` bits.
    ///
    /// # Panics
    ///
    /// Panics if `bits` is odd, zero or larger than 32.
    pub fn with_version_bits(bits: u32) -> HandlePool {
        assert!(
            bits > 0 && bits <= 32 && bits % 2 == 0,
            "version width must be an even number of bits in 2..=32."
        );

        let mask = if bits == 32 {
            HandleIndex::max_value()
        } else {
            (1 << bits) - 1
        };

        HandlePool {
            versions: Vec::new(),
            frees: BinaryHeap::new(),
            mask,
            alive: 0,
        }
    }

    #[inline]
    fn bump(&self, version: HandleIndex) -> HandleIndex {
        version.wrapping_add(1) & self.mask
    }

    /// Creates a unused `Handle`, recycling the lowest free index if any.
    pub fn create(&mut self) -> Handle {
        self.alive += 1;

        if let Some(InverseHandleIndex(index)) = self.frees.pop() {
            // If we have available free slots.
            let index = index as usize;
            self.versions[index] = self.bump(self.versions[index]);
            Handle::new(index as HandleIndex, self.versions[index])
        } else {
            // Or we just spawn a new index and corresponding version.
            self.versions.push(1);
            Handle::new(self.versions.len() as HandleIndex - 1, 1)
        }
    }

    /// Reserves a slot without making it alive, taking the lowest free index
    /// or a new one at the tail. The slot keeps its dead version and leaves
    /// the free list, so neither `create` nor another `reserve` hands it out
    /// until the returned `Handle` is passed to `commit` or `release`.
    pub fn reserve(&mut self) -> Handle {
        if let Some(InverseHandleIndex(index)) = self.frees.pop() {
            let version = self.bump(self.versions[index as usize]);
            Handle::new(index, version)
        } else {
            self.versions.push(0);
            Handle::new(self.versions.len() as HandleIndex - 1, 1)
        }
    }

    /// Makes a reserved `Handle` alive. Returns false if the handle was not
    /// produced by `reserve` or has already been committed.
    pub fn commit<T>(&mut self, handle: T) -> bool
    where
        T: HandleLike,
    {
        let index = handle.index() as usize;
        if index >= self.versions.len() || self.versions[index] & 0x1 == 1 {
            return false;
        }

        if self.bump(self.versions[index]) != handle.version() {
            return false;
        }

        self.versions[index] = handle.version();
        self.alive += 1;
        true
    }

    /// Gives up a reserved `Handle` that will never be committed. The slot is
    /// recycled with a version past the reserved one, so the abandoned handle
    /// can never become alive.
    pub fn release<T>(&mut self, handle: T) -> bool
    where
        T: HandleLike,
    {
        let index = handle.index() as usize;
        if index >= self.versions.len() || self.versions[index] & 0x1 == 1 {
            return false;
        }

        if self.bump(self.versions[index]) != handle.version() {
            return false;
        }

        self.versions[index] = self.bump(handle.version());
        self.frees.push(InverseHandleIndex(index as HandleIndex));
        true
    }

    /// Returns true if this `Handle` was created by `HandlePool`, and has not been
    /// freed yet.
    pub fn is_alive<T>(&self, handle: T) -> bool
    where
        T: HandleLike,
    {
        let index = handle.index() as usize;
        self.is_alive_at(index) && (self.versions[index] == handle.version())
    }

    #[inline]
    fn is_alive_at(&self, index: usize) -> bool {
        (index < self.versions.len()) && ((self.versions[index] & 0x1) == 1)
    }

    /// Returns the alive `Handle` at `index` if any.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Handle> {
        if self.is_alive_at(index) {
            Some(Handle::new(index as HandleIndex, self.versions[index]))
        } else {
            None
        }
    }

    /// Recycles the `Handle` index, and mark its version as dead.
    pub fn free<T>(&mut self, handle: T) -> bool
    where
        T: HandleLike,
    {
        if !self.is_alive(handle) {
            false
        } else {
            self.free_at(handle.index() as usize);
            true
        }
    }

    /// Recycles the `Handle` index, and mark its version as dead.
    pub fn free_at(&mut self, index: usize) -> Option<Handle> {
        if !self.is_alive_at(index) {
            None
        } else {
            let version = self.versions[index];
            self.versions[index] = self.bump(version);
            self.frees.push(InverseHandleIndex(index as HandleIndex));
            self.alive -= 1;
            Some(Handle::new(index as HandleIndex, version))
        }
    }

    /// Returns the total number of alive handle in this `HandlePool`.
    #[inline]
    pub fn len(&self) -> usize {
        self.alive
    }

    /// Returns true if there is no alive handle in this `HandlePool`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Returns the number of slots ever allocated, alive or not.
    #[inline]
    pub fn slots(&self) -> usize {
        self.versions.len()
    }

    /// Returns an iterator over the `HandlePool`.
    #[inline]
    pub fn iter(&self) -> HandleIter {
        HandleIter {
            versions: &self.versions,
            start: 0,
            end: self.versions.len() as HandleIndex,
        }
    }
}

impl<'a> IntoIterator for &'a HandlePool {
    type Item = Handle;
    type IntoIter = HandleIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Immutable `HandlePool` iterator, this struct is created by `iter` method on `HandlePool`.
#[derive(Copy, Clone)]
pub struct HandleIter<'a> {
    versions: &'a [HandleIndex],
    start: HandleIndex,
    end: HandleIndex,
}

impl<'a> Iterator for HandleIter<'a> {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        for i in self.start..self.end {
            let v = self.versions[i as usize];
            if v & 0x1 == 1 {
                self.start = i + 1;
                return Some(Handle::new(i, v));
            }
        }

        self.start = self.end;
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowest_index_first() {
        let mut pool = HandlePool::new();
        let handles: Vec<_> = (0..4).map(|_| pool.create()).collect();

        pool.free(handles[2]);
        pool.free(handles[1]);

        assert_eq!(pool.create().index(), 1);
        assert_eq!(pool.create().index(), 2);
        assert_eq!(pool.create().index(), 4);
    }

    #[test]
    fn version_wrap_keeps_parity() {
        let mut pool = HandlePool::with_version_bits(2);

        let mut last = pool.create();
        for _ in 0..8 {
            assert!(pool.is_alive(last));
            assert_eq!(last.version() & 0x1, 1);
            pool.free(last);
            assert!(!pool.is_alive(last));

            last = pool.create();
            assert_eq!(last.index(), 0);
        }
    }

    #[test]
    fn reserve_and_commit() {
        let mut pool = HandlePool::new();
        let e1 = pool.create();
        pool.free(e1);

        let r = pool.reserve();
        assert_eq!(r.index(), e1.index());
        assert!(r.version() > e1.version());
        assert!(!pool.is_alive(r));
        assert!(!pool.is_alive(e1));
        assert_eq!(pool.len(), 0);

        // A pending reservation is out of the free list.
        let h = pool.create();
        assert_eq!(h.index(), 1);
        assert_eq!(pool.reserve().index(), 2);

        assert!(pool.commit(r));
        assert!(pool.is_alive(r));
        assert!(!pool.commit(r));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.slots(), 3);
    }

    #[test]
    fn churn_stays_bounded() {
        let mut pool = HandlePool::new();
        let mut last = pool.create();

        for _ in 0..1000 {
            pool.free(last);
            let r = pool.reserve();
            assert!(pool.commit(r));
            assert!(!pool.is_alive(last));
            last = r;
        }

        assert_eq!(pool.slots(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn released_reservation_never_alive() {
        let mut pool = HandlePool::new();
        let r = pool.reserve();
        assert!(pool.release(r));
        assert!(!pool.commit(r));

        let h = pool.create();
        assert_eq!(h.index(), r.index());
        assert!(h.version() > r.version());
        assert!(!pool.is_alive(r));
    }
}
