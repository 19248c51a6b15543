use std::collections::HashMap;
use std::fmt;

type DisposeHook<T> = Box<dyn FnMut(&str, T)>;

struct CacheEntry<T> {
    value: T,
    ref_count: u32,
    last_access: u64,
}

/// Keyed store of shared resources with reference counts.
///
/// An entry lives while its reference count is above zero. When a new key
/// arrives at capacity, the least recently used entry with a count of at
/// most one is evicted; entries held more than once are never evicted, so
/// the cache grows past capacity instead.
///
/// Every removal (release to zero, eviction, `dispose`) hands the value to
/// the dispose hook, if any.
pub struct ResourceCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    capacity: usize,
    clock: u64,
    on_dispose: Option<DisposeHook<T>>,
}

impl<T> ResourceCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            clock: 0,
            on_dispose: None,
        }
    }

    pub fn with_dispose_hook(capacity: usize, hook: impl FnMut(&str, T) + 'static) -> Self {
        Self {
            on_dispose: Some(Box::new(hook)),
            ..Self::new(capacity)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn ref_count(&self, key: &str) -> Option<u32> {
        self.entries.get(key).map(|e| e.ref_count)
    }

    /// Sum of every entry's reference count.
    pub fn total_ref_count(&self) -> u64 {
        self.entries.values().map(|e| u64::from(e.ref_count)).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in no particular order. Does not count as a use.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(key, e)| (key.as_str(), &e.value))
    }

    /// Swaps the value stored under `key`, keeping its reference count.
    /// Returns the previous value, or `None` (and drops `value`) if the key
    /// is not cached.
    pub fn replace(&mut self, key: &str, value: T) -> Option<T> {
        let entry = self.entries.get_mut(key)?;
        Some(std::mem::replace(&mut entry.value, value))
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Looks up `key` without taking a reference. Counts as a use for
    /// eviction order.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        let now = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_access = now;
        Some(&entry.value)
    }

    /// Stores `value` under `key` with `initial_ref_count` references.
    ///
    /// If the key is already cached, the existing value is kept, `value` is
    /// dropped, and the count goes up by `initial_ref_count`.
    pub fn set(&mut self, key: impl Into<String>, value: T, initial_ref_count: u32) -> &T {
        let key = key.into();
        let now = self.tick();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_one();
        }

        let entry = self
            .entries
            .entry(key)
            .and_modify(|entry| {
                entry.ref_count += initial_ref_count;
                entry.last_access = now;
            })
            .or_insert(CacheEntry {
                value,
                ref_count: initial_ref_count,
                last_access: now,
            });
        &entry.value
    }

    /// Takes one more reference. `false` if the key is not cached.
    pub fn acquire(&mut self, key: &str) -> bool {
        let now = self.tick();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.ref_count += 1;
                entry.last_access = now;
                true
            }
            None => {
                log::debug!("acquire on missing cache key {key}");
                false
            }
        }
    }

    /// Drops one reference, disposing the entry when none remain.
    /// `false` if the key is not cached.
    pub fn release(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            log::debug!("release on missing cache key {key}");
            return false;
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 {
            self.dispose(key);
        }
        true
    }

    /// Removes `key` regardless of its reference count.
    pub fn dispose(&mut self, key: &str) -> bool {
        match self.entries.remove_entry(key) {
            Some((key, entry)) => {
                self.run_hook(&key, entry.value);
                true
            }
            None => false,
        }
    }

    pub fn dispose_all(&mut self) {
        let entries: Vec<_> = self.entries.drain().collect();
        for (key, entry) in entries {
            self.run_hook(&key, entry.value);
        }
    }

    fn run_hook(&mut self, key: &str, value: T) {
        if let Some(hook) = self.on_dispose.as_mut() {
            hook(key, value);
        }
    }

    /// Removes the least recently used entry held at most once.
    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .filter(|(_, e)| e.ref_count <= 1)
            .min_by_key(|(_, e)| e.last_access)
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                log::debug!("Evicting {key}");
                self.dispose(&key);
            }
            None => log::warn!(
                "Cache over capacity ({} entries, capacity {}): every entry is shared",
                self.entries.len(),
                self.capacity
            ),
        }
    }
}

impl<T> fmt::Debug for ResourceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recording(capacity: usize) -> (ResourceCache<u32>, Rc<RefCell<Vec<String>>>) {
        let disposed = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&disposed);
        let cache =
            ResourceCache::with_dispose_hook(capacity, move |key, _| log.borrow_mut().push(key.to_string()));
        (cache, disposed)
    }

    #[test]
    fn get_does_not_change_ref_count() {
        let mut cache = ResourceCache::new(4);
        cache.set("a", 1u32, 1);
        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.ref_count("a"), Some(1));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn set_existing_keeps_value_and_adds_initial_count() {
        let mut cache = ResourceCache::new(4);
        cache.set("a", 1u32, 1);
        assert_eq!(*cache.set("a", 2, 5), 1);
        assert_eq!(cache.ref_count("a"), Some(6));
        assert_eq!(*cache.set("a", 3, 1), 1);
        assert_eq!(cache.ref_count("a"), Some(7));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn replace_keeps_ref_count() {
        let mut cache = ResourceCache::new(4);
        cache.set("a", 1u32, 3);
        assert_eq!(cache.replace("a", 9), Some(1));
        assert_eq!(cache.get("a"), Some(&9));
        assert_eq!(cache.ref_count("a"), Some(3));
        assert_eq!(cache.replace("missing", 4), None);
        assert!(!cache.contains("missing"));
    }

    #[test]
    fn release_to_zero_disposes() {
        let (mut cache, disposed) = recording(4);
        cache.set("a", 1, 1);
        assert!(cache.acquire("a"));
        assert!(cache.release("a"));
        assert!(cache.contains("a"));
        assert!(cache.release("a"));
        assert!(!cache.contains("a"));
        assert_eq!(*disposed.borrow(), vec!["a"]);
        assert!(!cache.release("a"));
        assert!(!cache.acquire("a"));
    }

    #[test]
    fn ref_count_tracks_acquire_minus_release() {
        let mut cache = ResourceCache::new(4);
        cache.set("a", 1u32, 2);
        for _ in 0..3 {
            cache.acquire("a");
        }
        cache.release("a");
        assert_eq!(cache.ref_count("a"), Some(4));
        assert_eq!(cache.total_ref_count(), 4);
    }

    #[test]
    fn evicts_least_recently_used() {
        let (mut cache, disposed) = recording(2);
        cache.set("a", 1, 1);
        cache.set("b", 2, 1);
        cache.get("a");
        cache.set("c", 3, 1);
        assert_eq!(*disposed.borrow(), vec!["b"]);
        assert!(cache.contains("a") && cache.contains("c"));
    }

    #[test]
    fn shared_entries_never_evicted() {
        let (mut cache, disposed) = recording(2);
        cache.set("a", 1, 2);
        cache.set("b", 2, 1);
        cache.get("b");
        cache.set("c", 3, 1);
        // "a" is older but shared.
        assert_eq!(*disposed.borrow(), vec!["b"]);
        assert!(cache.contains("a"));
    }

    #[test]
    fn grows_when_everything_is_shared() {
        let (mut cache, disposed) = recording(1);
        cache.set("a", 1, 2);
        cache.set("b", 2, 2);
        assert_eq!(cache.len(), 2);
        assert!(disposed.borrow().is_empty());
    }

    #[test]
    fn dispose_all_runs_hook_for_everything() {
        let (mut cache, disposed) = recording(4);
        cache.set("a", 1, 3);
        cache.set("b", 2, 1);
        cache.dispose_all();
        assert!(cache.is_empty());
        let mut keys = disposed.borrow().clone();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
