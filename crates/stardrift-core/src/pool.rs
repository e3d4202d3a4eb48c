//! Single-owner object pool for scratch buffers that churn with body
//! spawns and deaths.
//!
//! # Example
//!
//! ```
//! use stardrift_core::pool::Pool;
//!
//! let mut pool: Pool<Vec<u32>> = Pool::new();
//! pool.preallocate(2);
//!
//! let mut buf = pool.acquire();
//! buf.push(7);
//! pool.release(buf);
//!
//! // Released objects come back reset.
//! assert!(pool.acquire().is_empty());
//! ```

/// Objects that can be returned to a [`Pool`].
pub trait Poolable {
    /// Restore the object to its freshly created state.
    fn reset(&mut self);
}

impl<T> Poolable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Free list of reusable objects.
pub struct Pool<T: Poolable> {
    free: Vec<T>,
    factory: fn() -> T,
    created: usize,
}

impl<T: Poolable + Default> Pool<T> {
    pub fn new() -> Self {
        Self::with_factory(T::default)
    }
}

impl<T: Poolable + Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> Pool<T> {
    pub fn with_factory(factory: fn() -> T) -> Self {
        Self {
            free: Vec::new(),
            factory,
            created: 0,
        }
    }

    /// Take an object from the free list, creating one if it is empty.
    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_else(|| {
            self.created += 1;
            (self.factory)()
        })
    }

    /// Reset `item` and put it back on the free list.
    pub fn release(&mut self, mut item: T) {
        item.reset();
        self.free.push(item);
    }

    /// Create `count` objects up front.
    pub fn preallocate(&mut self, count: usize) {
        self.free.reserve(count);
        for _ in 0..count {
            self.created += 1;
            self.free.push((self.factory)());
        }
    }

    /// Objects currently idle in the pool.
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    /// Objects ever created by the factory.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Drop every idle object.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

impl<T: Poolable> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.free.len())
            .field("created", &self.created)
            .finish()
    }
}
