//! The untyped slot table behind every asset manager.
//!
//! A slot is `Free` or `Resident`. Structural changes (binding a URI, growing,
//! releasing) happen under one table-wide mutex held through a [`SlotGuard`].
//! Reference counts live beside it as atomics so handle copies and drops only
//! need a shared read lock.
//!
//! Lock order is always `state` then `ref_counts`, and no path takes the read
//! lock twice.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard, RwLock};
use satchel_core::alloc::{HashMap, IndexPool};
use satchel_core::profiling::profile_function;

use crate::error::{AssetError, AssetResult};
use crate::handle::HandleId;

pub type SlotIndex = u16;
pub type SlotChecksum = u16;

/// Index value that never names a real slot.
pub const INVALID_INDEX: SlotIndex = SlotIndex::MAX;
/// Checksum stored in free slots.
pub const INVALID_CHECKSUM: SlotChecksum = SlotChecksum::MAX;
/// Number of slots added each time the free list runs dry.
pub const DEFAULT_GROWTH: usize = 16;

/// Per-slot arrays owned by the layer above the table.
///
/// `grow` is called under the table lock whenever the table grows, so a new
/// index is usable in every array as soon as it is handed out.
pub trait SlotStorage: Send {
    fn grow(&mut self, new_len: usize);
}

impl SlotStorage for () {
    fn grow(&mut self, _new_len: usize) {}
}

struct TableState<S> {
    uri_map: HashMap<String, SlotIndex>,
    uris: Vec<Option<String>>,
    checksums: Vec<SlotChecksum>,
    pool: IndexPool,
    growth_chunk: usize,
    growth_events: usize,
    storage: S,
}

impl<S: SlotStorage> TableState<S> {
    /// Extend every parallel array by up to `additional` slots.
    fn grow(&mut self, ref_counts: &RwLock<Vec<AtomicU32>>, additional: usize) -> usize {
        let added = self.pool.grow(additional);
        let new_len = added.end;
        if added.is_empty() {
            return 0;
        }

        self.uris.resize(new_len, None);
        self.checksums.resize(new_len, INVALID_CHECKSUM);
        self.storage.grow(new_len);
        ref_counts
            .write()
            .resize_with(new_len, || AtomicU32::new(0));
        added.len()
    }
}

pub struct SlotTable<S = ()> {
    state: Mutex<TableState<S>>,
    ref_counts: RwLock<Vec<AtomicU32>>,
}

impl<S: SlotStorage> SlotTable<S> {
    pub fn new(storage: S, initial_capacity: usize, growth_chunk: usize) -> Self {
        Self::with_limit(storage, initial_capacity, growth_chunk, IndexPool::MAX_INDICES)
    }

    /// Like [`SlotTable::new`] but never holds more than `limit` slots.
    pub fn with_limit(
        storage: S,
        initial_capacity: usize,
        growth_chunk: usize,
        limit: usize,
    ) -> Self {
        let table = Self {
            state: Mutex::new(TableState {
                uri_map: HashMap::new(),
                uris: Vec::new(),
                checksums: Vec::new(),
                pool: IndexPool::with_limit(limit),
                growth_chunk: growth_chunk.max(1),
                growth_events: 0,
                storage,
            }),
            ref_counts: RwLock::new(Vec::new()),
        };
        if initial_capacity > 0 {
            table.state.lock().grow(&table.ref_counts, initial_capacity);
        }
        table
    }

    /// Take the structural lock.
    pub fn lock(&self) -> SlotGuard<'_, S> {
        SlotGuard {
            state: self.state.lock(),
            ref_counts: &self.ref_counts,
        }
    }

    pub fn reference(&self, index: SlotIndex) {
        let counts = self.ref_counts.read();
        match counts.get(index as usize) {
            Some(count) => {
                count.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                tracing::error!(index, "Referenced a slot outside the table");
                debug_assert!(false, "slot {} is out of range", index);
            }
        }
    }

    /// Drop one reference. Returns `true` when the count reached zero and the
    /// slot is now waiting to be released.
    pub fn dereference(&self, index: SlotIndex) -> bool {
        let counts = self.ref_counts.read();
        let Some(count) = counts.get(index as usize) else {
            tracing::error!(index, "Dereferenced a slot outside the table");
            debug_assert!(false, "slot {} is out of range", index);
            return false;
        };

        match count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1)) {
            Ok(previous) => previous == 1,
            Err(_) => {
                tracing::error!(index, "Dereferenced a slot with no references");
                debug_assert!(false, "slot {} dereferenced below zero", index);
                false
            }
        }
    }

    pub fn ref_count(&self, index: SlotIndex) -> u32 {
        self.ref_counts
            .read()
            .get(index as usize)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    pub fn uri_exists(&self, uri: &str) -> bool {
        self.lock().uri_exists(uri)
    }

    pub fn capacity(&self) -> usize {
        self.ref_counts.read().len()
    }
}

impl<S> SlotTable<S> {
    /// Number of resident slots.
    pub fn resident_count(&self) -> usize {
        self.state.lock().uri_map.len()
    }
}

impl Default for SlotTable<()> {
    fn default() -> Self {
        Self::new((), 0, DEFAULT_GROWTH)
    }
}

/// Exclusive access to the table's structure.
pub struct SlotGuard<'a, S> {
    state: MutexGuard<'a, TableState<S>>,
    ref_counts: &'a RwLock<Vec<AtomicU32>>,
}

impl<'a, S: SlotStorage> SlotGuard<'a, S> {
    pub fn uri_exists(&self, uri: &str) -> bool {
        self.state.uri_map.contains_key(uri)
    }

    pub fn find_index(&self, uri: &str) -> Option<SlotIndex> {
        self.state.uri_map.get(uri).copied()
    }

    /// Index bound to `uri`.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not resident.
    pub fn index_from_uri(&self, uri: &str) -> SlotIndex {
        match self.find_index(uri) {
            Some(index) => index,
            None => {
                tracing::error!(uri, "Looked up the index of a URI that is not loaded");
                panic!("'{}' is not resident", uri);
            }
        }
    }

    /// Bind `uri` to a free slot, growing the table first if none is free.
    ///
    /// The new slot starts with a reference count of zero.
    pub fn add_new(&mut self, uri: &str, checksum: SlotChecksum) -> AssetResult<SlotIndex> {
        profile_function!();
        debug_assert!(!self.uri_exists(uri), "'{}' is already resident", uri);

        if !self.state.pool.has_free() {
            let chunk = self.state.growth_chunk;
            let added = self.state.grow(self.ref_counts, chunk);
            if added == 0 {
                return Err(AssetError::CapacityExhausted {
                    capacity: self.state.pool.capacity(),
                });
            }
            self.state.growth_events += 1;
            tracing::debug!(
                added,
                capacity = self.state.pool.capacity(),
                "Grew slot table"
            );
        }

        let Some(index) = self.state.pool.pop() else {
            return Err(AssetError::CapacityExhausted {
                capacity: self.state.pool.capacity(),
            });
        };

        let slot = index as usize;
        self.state.uri_map.insert(uri.to_string(), index);
        self.state.uris[slot] = Some(uri.to_string());
        self.state.checksums[slot] = checksum;
        if let Some(count) = self.ref_counts.read().get(slot) {
            count.store(0, Ordering::Release);
        }
        Ok(index)
    }

    /// Unbind a resident slot and return its index to the free list.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not resident.
    pub fn release(&mut self, index: SlotIndex) {
        profile_function!();
        let slot = index as usize;
        let Some(uri) = self.state.uris.get_mut(slot).and_then(Option::take) else {
            tracing::error!(index, "Released a slot that is not resident");
            panic!("slot {} is not resident", index);
        };

        self.state.uri_map.remove(&uri);
        self.state.checksums[slot] = INVALID_CHECKSUM;
        if let Some(count) = self.ref_counts.read().get(slot) {
            count.store(0, Ordering::Release);
        }
        self.state.pool.push(index);
        tracing::debug!(index, uri = %uri, "Released slot");
    }

    pub fn checksum_from_index(&self, index: SlotIndex) -> Option<SlotChecksum> {
        self.state.checksums.get(index as usize).copied()
    }

    pub fn checksum_from_uri(&self, uri: &str) -> Option<SlotChecksum> {
        self.find_index(uri)
            .and_then(|index| self.checksum_from_index(index))
    }

    pub fn is_resident(&self, index: SlotIndex) -> bool {
        matches!(self.state.uris.get(index as usize), Some(Some(_)))
    }

    /// Whether `id` still names the asset it was issued for.
    pub fn is_current(&self, id: HandleId) -> bool {
        id.is_valid()
            && self.is_resident(id.index)
            && self.checksum_from_index(id.index) == Some(id.checksum)
    }

    pub fn uri(&self, index: SlotIndex) -> Option<&str> {
        self.state.uris.get(index as usize)?.as_deref()
    }

    pub fn ref_count(&self, index: SlotIndex) -> u32 {
        self.ref_counts
            .read()
            .get(index as usize)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    pub fn capacity(&self) -> usize {
        self.state.checksums.len()
    }

    /// Number of resident slots.
    pub fn len(&self) -> usize {
        self.state.uri_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.uri_map.is_empty()
    }

    pub fn growth_events(&self) -> usize {
        self.state.growth_events
    }

    pub fn storage(&self) -> &S {
        &self.state.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.state.storage
    }

    /// Keep the lock but narrow it to one value inside the storage.
    pub fn map_storage<U: ?Sized>(
        self,
        f: impl FnOnce(&mut S) -> Option<&mut U>,
    ) -> Option<MappedMutexGuard<'a, U>> {
        MutexGuard::try_map(self.state, |state| f(&mut state.storage)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lens(Vec<usize>);

    impl SlotStorage for Lens {
        fn grow(&mut self, new_len: usize) {
            self.0.push(new_len);
        }
    }

    #[test]
    fn test_add_new_grows_in_chunks() {
        let table = SlotTable::new(Lens::default(), 0, 4);
        let mut guard = table.lock();

        for i in 0..5 {
            let index = guard.add_new(&format!("a{}", i), 10).unwrap();
            assert_eq!(index, i);
        }

        assert_eq!(guard.growth_events(), 2);
        assert_eq!(guard.capacity(), 8);
        assert_eq!(guard.storage().0, vec![4, 8]);
        drop(guard);
        assert_eq!(table.capacity(), 8);
    }

    #[test]
    fn test_initial_capacity_is_not_a_growth_event() {
        let table = SlotTable::new((), 16, 16);
        let guard = table.lock();
        assert_eq!(guard.capacity(), 16);
        assert_eq!(guard.growth_events(), 0);
    }

    #[test]
    fn test_release_recycles_index_and_resets_checksum() {
        let table = SlotTable::new((), 0, 1);
        let mut guard = table.lock();
        let a = guard.add_new("a", 5).unwrap();
        assert_eq!(guard.checksum_from_uri("a"), Some(5));

        guard.release(a);
        assert!(!guard.uri_exists("a"));
        assert!(!guard.is_resident(a));
        assert_eq!(guard.checksum_from_index(a), Some(INVALID_CHECKSUM));

        let b = guard.add_new("b", 6).unwrap();
        assert_eq!(a, b);
        assert_eq!(guard.index_from_uri("b"), b);
        assert!(!guard.is_current(HandleId::new(a, 5)));
        assert!(guard.is_current(HandleId::new(b, 6)));
    }

    #[test]
    fn test_reference_counts() {
        let table = SlotTable::new((), 0, DEFAULT_GROWTH);
        let index = table.lock().add_new("a", 1).unwrap();
        assert_eq!(table.ref_count(index), 0);

        table.reference(index);
        table.reference(index);
        assert!(!table.dereference(index));
        assert!(table.dereference(index));
        assert_eq!(table.ref_count(index), 0);
    }

    #[test]
    fn test_capacity_exhausted() {
        let table = SlotTable::with_limit((), 0, 2, 3);
        let mut guard = table.lock();
        for i in 0..3 {
            guard.add_new(&i.to_string(), 0).unwrap();
        }
        let err = guard.add_new("overflow", 0).unwrap_err();
        assert!(matches!(err, AssetError::CapacityExhausted { capacity: 3 }));
    }

    #[test]
    #[should_panic(expected = "not resident")]
    fn test_index_from_missing_uri_panics() {
        let table = SlotTable::default();
        table.lock().index_from_uri("missing");
    }

    #[test]
    #[should_panic(expected = "not resident")]
    fn test_double_release_panics() {
        let table = SlotTable::default();
        let mut guard = table.lock();
        let index = guard.add_new("a", 0).unwrap();
        guard.release(index);
        guard.release(index);
    }
}
