//! Reusable object pools.
//!
//! [`ResourcePool`] is a single abstraction whose storage policy is picked at construction:
//! [`ResourcePool::locked`] guards its free list with a `parking_lot::Mutex` and may be shared
//! between threads, [`ResourcePool::single_owner`] keeps the free list in a `RefCell` and is
//! meant for hot loops owned by one thread.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::warn;
use parking_lot::Mutex;

/// Free-list storage behind a [`ResourcePool`].
pub trait PoolStorage<T> {
    fn pop(&self) -> Option<T>;
    fn push(&self, item: T);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutex-guarded storage; safe for concurrent take/give-back.
pub struct LockedStorage<T>(Mutex<Vec<T>>);

impl<T> Default for LockedStorage<T> {
    fn default() -> Self {
        Self(Mutex::new(Vec::new()))
    }
}

impl<T> PoolStorage<T> for LockedStorage<T> {
    fn pop(&self) -> Option<T> {
        self.0.lock().pop()
    }

    fn push(&self, item: T) {
        self.0.lock().push(item);
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Non-locking storage; the pool is `!Sync` so the compiler enforces single-thread use.
pub struct SingleOwnerStorage<T>(RefCell<Vec<T>>);

impl<T> Default for SingleOwnerStorage<T> {
    fn default() -> Self {
        Self(RefCell::new(Vec::new()))
    }
}

impl<T> PoolStorage<T> for SingleOwnerStorage<T> {
    fn pop(&self) -> Option<T> {
        self.0.borrow_mut().pop()
    }

    fn push(&self, item: T) {
        self.0.borrow_mut().push(item);
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Pool of reusable objects with a bounded or unbounded free list.
pub struct ResourcePool<T, S: PoolStorage<T> = LockedStorage<T>> {
    storage: S,
    factory: Factory<T>,
    /// Maximum number of idle items retained; `None` keeps everything given back.
    capacity: Option<usize>,
    outstanding: AtomicUsize,
    created: AtomicUsize,
}

impl<T> ResourcePool<T, LockedStorage<T>> {
    /// Pool usable from several threads at once.
    pub fn locked<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_storage(LockedStorage::default(), Box::new(factory))
    }
}

impl<T> ResourcePool<T, SingleOwnerStorage<T>> {
    /// Pool owned by a single thread; no locking on take/give-back.
    pub fn single_owner<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_storage(SingleOwnerStorage::default(), Box::new(factory))
    }
}

impl<T, S: PoolStorage<T>> ResourcePool<T, S> {
    fn with_storage(storage: S, factory: Factory<T>) -> Self {
        Self {
            storage,
            factory,
            capacity: None,
            outstanding: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
        }
    }

    /// Limits how many idle items are retained; extra give-backs are dropped.
    pub fn with_capacity_limit(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Pre-populates the free list.
    pub fn prewarm(&self, count: usize) {
        for _ in 0..count {
            self.created.fetch_add(1, Ordering::Relaxed);
            self.storage.push((self.factory)());
        }
    }

    /// Returns an idle item or constructs a new one.
    pub fn take(&self) -> T {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        match self.storage.pop() {
            Some(item) => item,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        }
    }

    /// Returns an item previously obtained from [`take`](Self::take).
    pub fn give_back(&self, item: T) {
        let released = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });
        if released.is_err() {
            warn!("resource pool received an item that was never taken; dropping it");
            debug_assert!(false, "give_back without a matching take");
            return;
        }

        if let Some(capacity) = self.capacity {
            if self.storage.len() >= capacity {
                return;
            }
        }
        self.storage.push(item);
    }

    /// Items currently taken and not yet given back.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Idle items waiting for reuse.
    pub fn available(&self) -> usize {
        self.storage.len()
    }

    /// Total items constructed by the factory.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}
