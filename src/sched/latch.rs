use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

/// A latch starts as false. Eventually someone calls `set()` and it becomes
/// true.
pub trait Latch {
    /// Sets the latch, signalling others.
    fn set(&self);
    /// Tests if the latch is set.
    fn is_set(&self) -> bool;
}

/// A latch you can block on until it becomes true.
pub struct LockLatch {
    m: Mutex<bool>,
    v: Condvar,
}

impl LockLatch {
    #[inline]
    pub fn new() -> LockLatch {
        LockLatch {
            m: Mutex::new(false),
            v: Condvar::new(),
        }
    }

    /// Blocks until the latch is set.
    pub fn wait(&self) {
        let mut guard = self.m.lock();
        while !*guard {
            self.v.wait(&mut guard);
        }
    }
}

impl Default for LockLatch {
    fn default() -> Self {
        LockLatch::new()
    }
}

impl Latch for LockLatch {
    #[inline]
    fn set(&self) {
        let mut guard = self.m.lock();
        *guard = true;
        self.v.notify_all();
    }

    #[inline]
    fn is_set(&self) -> bool {
        *self.m.lock()
    }
}

/// Counting latches track a counter which starts at one. Calling `set()`
/// decrements the counter, and the latch is only considered set once the
/// counter reaches zero.
#[derive(Debug)]
pub struct CountLatch {
    counter: AtomicUsize,
    m: Mutex<()>,
    v: Condvar,
}

impl CountLatch {
    #[inline]
    pub fn new() -> CountLatch {
        CountLatch {
            counter: AtomicUsize::new(1),
            m: Mutex::new(()),
            v: Condvar::new(),
        }
    }

    #[inline]
    pub fn increment(&self) {
        debug_assert!(!self.is_set());
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Blocks until the counter reaches zero.
    pub fn wait(&self) {
        let mut guard = self.m.lock();
        while !self.is_set() {
            self.v.wait(&mut guard);
        }
    }
}

impl Default for CountLatch {
    fn default() -> Self {
        CountLatch::new()
    }
}

impl Latch for CountLatch {
    #[inline]
    fn is_set(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == 0
    }

    #[inline]
    fn set(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Waiters check the counter under the lock.
            let _guard = self.m.lock();
            self.v.notify_all();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn count() {
        let latch = Arc::new(CountLatch::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            latch.increment();
            let latch = latch.clone();
            handles.push(thread::spawn(move || latch.set()));
        }

        assert!(!latch.is_set());
        latch.set();
        latch.wait();
        assert!(latch.is_set());

        for v in handles {
            v.join().unwrap();
        }
    }

    #[test]
    fn lock() {
        let latch = Arc::new(LockLatch::new());
        let handle = {
            let latch = latch.clone();
            thread::spawn(move || latch.set())
        };

        latch.wait();
        assert!(latch.is_set());
        handle.join().unwrap();
    }
}
