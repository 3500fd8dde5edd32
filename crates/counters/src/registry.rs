use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

/// The four independent counter categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Worker,
    BufferManager,
    Cpu,
    Rdma,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Worker => "worker",
            Category::BufferManager => "buffer manager",
            Category::Cpu => "cpu",
            Category::Rdma => "rdma",
        };
        f.write_str(name)
    }
}

/// Opaque membership handle returned by [`Registry::register`].
///
/// A handle is an index into the registry's slab plus the generation of the
/// slot at registration time, so a handle kept after deregistration can never
/// address a producer that later reuses the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

struct SlabSlot<T> {
    generation: u32,
    entry: Option<T>,
}

/// Index-based arena of registered entries with a free list.
struct Slab<T> {
    slots: Vec<SlabSlot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Slab<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    fn insert(&mut self, entry: T) -> Handle {
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return Handle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(SlabSlot {
            generation: 0,
            entry: Some(entry),
        });
        Handle {
            index,
            generation: 0,
        }
    }

    fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let entry = slot.entry.take()?;
        // Bump the generation so the old handle goes stale once the slot is reused
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(entry)
    }

    fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| slot.entry.as_mut())
    }
}

/// Mutex-guarded set of live producers for a single category.
///
/// `register`, `deregister` and `aggregate` all hold the same mutex for their
/// whole duration, so a producer is either fully visited by a sweep or not
/// visited at all.
pub struct Registry<T> {
    category: Category,
    slab: Mutex<Slab<T>>,
}

impl<T> Registry<T> {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            slab: Mutex::new(Slab::new()),
        }
    }

    /// Adds an entry to the live set and returns its handle.
    pub fn register(&self, entry: T) -> Handle {
        let handle = self.lock().insert(entry);
        debug!("registered {} producer {:?}", self.category, handle);
        handle
    }

    /// Removes the entry behind `handle` and hands it back.
    ///
    /// Deregistering a handle that is no longer registered is a no-op and
    /// returns `None`.
    pub fn deregister(&self, handle: Handle) -> Option<T> {
        let removed = self.lock().remove(handle);
        if removed.is_some() {
            debug!("deregistered {} producer {:?}", self.category, handle);
        }
        removed
    }

    /// Visits every registered entry exactly once, folding it into `acc`.
    ///
    /// Returns the number of entries visited.
    pub fn aggregate<A, F>(&self, acc: &mut A, mut visit: F) -> usize
    where
        F: FnMut(&mut T, &mut A),
    {
        let mut slab = self.lock();
        let mut visited = 0;
        for entry in slab.iter_mut() {
            visit(entry, acc);
            visited += 1;
        }
        visited
    }

    /// Runs `f` on the entry registered under `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was already deregistered. Producers deregister only
    /// when they are dropped, so reaching this is a lifecycle bug.
    pub fn with<R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> R {
        let mut slab = self.lock();
        match slab.get_mut(handle) {
            Some(entry) => f(entry),
            None => panic!(
                "{} producer {:?} used after deregistration",
                self.category, handle
            ),
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.lock().get_mut(handle).is_some()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Counter storage stays consistent if a visitor panicked, so keep going
    fn lock(&self) -> MutexGuard<'_, Slab<T>> {
        self.slab.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_aggregate() {
        let registry = Registry::new(Category::Worker);
        registry.register(1u64);
        registry.register(2u64);
        registry.register(3u64);

        let mut sum = 0u64;
        let visited = registry.aggregate(&mut sum, |value, sum| *sum += *value);

        assert_eq!(visited, 3);
        assert_eq!(sum, 6);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_deregister_removes_entry() {
        let registry = Registry::new(Category::Rdma);
        let a = registry.register(10u64);
        let b = registry.register(20u64);

        assert_eq!(registry.deregister(a), Some(10));
        assert!(!registry.contains(a));
        assert!(registry.contains(b));

        let mut sum = 0u64;
        registry.aggregate(&mut sum, |value, sum| *sum += *value);
        assert_eq!(sum, 20);
    }

    #[test]
    fn test_deregister_absent_is_noop() {
        let registry = Registry::new(Category::Cpu);
        let handle = registry.register(1u64);

        assert_eq!(registry.deregister(handle), Some(1));
        assert_eq!(registry.deregister(handle), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_hit_reused_slot() {
        let registry = Registry::new(Category::BufferManager);
        let old = registry.register(1u64);
        registry.deregister(old);

        // The freed slot gets reused by the next registration
        let new = registry.register(2u64);
        assert_ne!(old, new);

        assert_eq!(registry.deregister(old), None);
        assert!(registry.contains(new));
        assert_eq!(registry.with(new, |value| *value), 2);
    }

    #[test]
    #[should_panic(expected = "used after deregistration")]
    fn test_with_stale_handle_panics() {
        let registry = Registry::new(Category::Worker);
        let handle = registry.register(1u64);
        registry.deregister(handle);
        registry.with(handle, |_| ());
    }

    #[test]
    fn test_aggregate_can_mutate_entries() {
        let registry = Registry::new(Category::Worker);
        registry.register(5u64);
        registry.register(7u64);

        let mut sum = 0u64;
        registry.aggregate(&mut sum, |value, sum| {
            *sum += std::mem::take(value);
        });
        assert_eq!(sum, 12);

        // Second sweep sees the reset values
        let mut sum = 0u64;
        registry.aggregate(&mut sum, |value, sum| *sum += *value);
        assert_eq!(sum, 0);
    }
}
