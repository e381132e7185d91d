//! Typed asset managers.
//!
//! An [`AssetManager<T, U>`] binds one payload type to a slot table. It owns
//! the decoded `T` and a per-slot `U` of user data, deduplicates loads by URI,
//! and hands out counted [`AssetHandle`]s. Clones of a manager share the same
//! slots, so a manager can be handed to worker threads.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::MappedMutexGuard;
use satchel_core::profiling::{profile_function, profile_scope};

use crate::Asset;
use crate::error::{AssetError, AssetResult};
use crate::file::{AssetFile, FileType};
use crate::handle::{AssetHandle, HandleId, SlotOwner};
use crate::io::{AssetIo, FileIo};
use crate::slot::{DEFAULT_GROWTH, SlotGuard, SlotIndex, SlotStorage, SlotTable};

type LoadCallback<T, U> = Box<dyn Fn(&T, &mut U) + Send + Sync>;
type UnloadCallback<T, U> = Box<dyn Fn(Option<&T>, &mut U) + Send + Sync>;
type Evicted<T, U> = (Option<Arc<T>>, U);

/// Construction-time settings for an [`AssetManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetManagerConfig {
    /// Slots allocated up front. Growing past this counts as a growth event.
    pub initial_capacity: u16,
    /// Slots added each time the free list runs dry.
    pub growth_chunk: u16,
    /// Keep decoded payloads resident. When `false` the payload is handed to
    /// the load callback and dropped, leaving only user data.
    pub keep_payload: bool,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            growth_chunk: DEFAULT_GROWTH as u16,
            keep_payload: true,
        }
    }
}

impl AssetManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_capacity(mut self, capacity: u16) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn growth_chunk(mut self, chunk: u16) -> Self {
        self.growth_chunk = chunk;
        self
    }

    pub fn keep_payload(mut self, keep: bool) -> Self {
        self.keep_payload = keep;
        self
    }
}

/// Per-load overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSettings {
    /// Overrides [`AssetManagerConfig::keep_payload`] for this load.
    pub keep_payload: Option<bool>,
}

impl LoadSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep_payload(mut self, keep: bool) -> Self {
        self.keep_payload = Some(keep);
        self
    }
}

struct TypedSlots<T, U> {
    payloads: Vec<Option<Arc<T>>>,
    user_data: Vec<U>,
    on_load: Option<LoadCallback<T, U>>,
    on_unload: Option<UnloadCallback<T, U>>,
}

impl<T, U> Default for TypedSlots<T, U> {
    fn default() -> Self {
        Self {
            payloads: Vec::new(),
            user_data: Vec::new(),
            on_load: None,
            on_unload: None,
        }
    }
}

impl<T: Send + Sync, U: Default + Send> SlotStorage for TypedSlots<T, U> {
    fn grow(&mut self, new_len: usize) {
        self.payloads.resize_with(new_len, || None);
        self.user_data.resize_with(new_len, U::default);
    }
}

struct Shared<T, U> {
    table: SlotTable<TypedSlots<T, U>>,
    io: Arc<dyn AssetIo>,
    keep_payload: bool,
}

impl<T: Asset, U: Default + Send + 'static> Shared<T, U> {
    /// Release `index` if nothing re-referenced it since its count hit zero.
    fn release_if_unreferenced(&self, index: SlotIndex) -> bool {
        let evicted = {
            let mut guard = self.table.lock();
            if !guard.is_resident(index) || guard.ref_count(index) != 0 {
                return false;
            }
            Self::unload(&mut guard, index)
        };
        drop(evicted);
        true
    }

    /// Run the unload callback, take the slot's typed storage, then recycle it.
    ///
    /// The evicted values may own handles into this manager, so callers must
    /// drop them only after the guard is gone.
    #[must_use]
    fn unload(guard: &mut SlotGuard<'_, TypedSlots<T, U>>, index: SlotIndex) -> Evicted<T, U> {
        profile_function!();
        let slot = index as usize;
        let TypedSlots {
            payloads,
            user_data,
            on_unload,
            ..
        } = guard.storage_mut();

        let payload = payloads[slot].take();
        if let Some(callback) = on_unload {
            callback(payload.as_deref(), &mut user_data[slot]);
        }
        let user_data = std::mem::take(&mut user_data[slot]);
        guard.release(index);
        (payload, user_data)
    }
}

impl<T: Asset, U: Default + Send + 'static> SlotOwner for Shared<T, U> {
    fn reference(&self, index: SlotIndex) {
        self.table.reference(index);
    }

    fn dereference(&self, index: SlotIndex) {
        if self.table.dereference(index) {
            self.release_if_unreferenced(index);
        }
    }
}

impl<T, U> Drop for Shared<T, U> {
    fn drop(&mut self) {
        let resident = self.table.resident_count();
        if resident > 0 {
            tracing::warn!(
                resident,
                "Asset manager dropped while handles are still alive"
            );
        }
    }
}

/// Loads, deduplicates and owns assets of one type.
pub struct AssetManager<T: Asset, U: Default + Send + 'static = ()> {
    shared: Arc<Shared<T, U>>,
}

impl<T: Asset, U: Default + Send + 'static> AssetManager<T, U> {
    /// A manager reading containers relative to the working directory.
    pub fn new() -> Self {
        Self::with_base_path(".")
    }

    pub fn with_base_path(base_path: impl AsRef<Path>) -> Self {
        Self::with_io(Arc::new(FileIo::new(base_path)))
    }

    pub fn with_io(io: Arc<dyn AssetIo>) -> Self {
        Self::with_config(io, AssetManagerConfig::default())
    }

    pub fn with_config(io: Arc<dyn AssetIo>, config: AssetManagerConfig) -> Self {
        tracing::debug!(
            asset = T::type_name(),
            file_type = %T::FILE_TYPE,
            initial_capacity = config.initial_capacity,
            growth_chunk = config.growth_chunk,
            "Creating asset manager"
        );
        Self {
            shared: Arc::new(Shared {
                table: SlotTable::new(
                    TypedSlots::default(),
                    config.initial_capacity as usize,
                    config.growth_chunk as usize,
                ),
                io,
                keep_payload: config.keep_payload,
            }),
        }
    }

    /// Load `uri`, or return a new handle to it if it is already resident.
    pub fn load(&self, uri: &str) -> AssetResult<AssetHandle<T>> {
        self.load_with(uri, LoadSettings::default())
    }

    pub fn load_with(&self, uri: &str, settings: LoadSettings) -> AssetResult<AssetHandle<T>> {
        profile_function!();

        if let Some(handle) = self.find(uri) {
            tracing::trace!(uri, index = handle.index(), "Reusing resident asset");
            return Ok(handle);
        }

        let file = {
            profile_scope!("read_container");
            AssetFile::load_from(self.shared.io.as_ref(), Path::new(uri))?
        };

        if file.file_type != T::FILE_TYPE {
            tracing::warn!(
                uri,
                expected = %T::FILE_TYPE,
                found = %file.file_type,
                "Refusing to load container of the wrong type"
            );
            return Err(AssetError::TypeMismatch {
                expected: T::FILE_TYPE,
                found: file.file_type,
            });
        }

        let payload = {
            profile_scope!("decode");
            Arc::new(T::decode(&file)?)
        };
        let keep = settings.keep_payload.unwrap_or(self.shared.keep_payload);

        let mut guard = self.shared.table.lock();

        // Another thread may have finished the same load while we were decoding
        if let Some(index) = guard.find_index(uri) {
            return Ok(self.issue(&guard, index));
        }

        let index = guard.add_new(uri, file.checksum)?;
        let slot = index as usize;
        let slots = guard.storage_mut();
        if let Some(callback) = &slots.on_load {
            callback(&*payload, &mut slots.user_data[slot]);
        }
        if keep {
            slots.payloads[slot] = Some(payload);
        }

        tracing::debug!(
            uri,
            index,
            checksum = file.checksum,
            asset = T::type_name(),
            "Loaded asset"
        );
        Ok(AssetHandle::new(
            HandleId::new(index, file.checksum),
            &self.shared,
        ))
    }

    /// Like [`AssetManager::load`] but logs the failure and returns the
    /// invalid handle.
    pub fn load_or_invalid(&self, uri: &str) -> AssetHandle<T> {
        match self.load(uri) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(uri, error = %err, "Failed to load asset");
                AssetHandle::invalid()
            }
        }
    }

    /// The decoded payload, or `None` for stale, out-of-range or invalid ids
    /// and for slots loaded without keeping their payload.
    pub fn get(&self, id: impl Into<HandleId>) -> Option<Arc<T>> {
        profile_function!();
        let id = id.into();
        let guard = self.current(id)?;
        guard.storage().payloads[id.index as usize].clone()
    }

    /// Lock the table and borrow the slot's user data.
    ///
    /// The manager stays locked while the guard lives, so do not call back
    /// into it until the guard is dropped.
    pub fn user_data(&self, id: impl Into<HandleId>) -> Option<MappedMutexGuard<'_, U>> {
        let id = id.into();
        let guard = self.current(id)?;
        guard.map_storage(|slots| slots.user_data.get_mut(id.index as usize))
    }

    pub fn with_user_data<R>(
        &self,
        id: impl Into<HandleId>,
        f: impl FnOnce(&mut U) -> R,
    ) -> Option<R> {
        self.user_data(id).map(|mut data| f(&mut *data))
    }

    /// Whether `id` still names a resident asset.
    pub fn exists(&self, id: impl Into<HandleId>) -> bool {
        let id = id.into();
        id.is_valid() && self.shared.table.lock().is_current(id)
    }

    /// A new handle to `uri` if it is resident.
    pub fn find(&self, uri: &str) -> Option<AssetHandle<T>> {
        let guard = self.shared.table.lock();
        let index = guard.find_index(uri)?;
        Some(self.issue(&guard, index))
    }

    pub fn uri_exists(&self, uri: &str) -> bool {
        self.shared.table.uri_exists(uri)
    }

    /// Number of live handles to the asset `id` names, or 0 if it is stale.
    pub fn ref_count(&self, id: impl Into<HandleId>) -> u32 {
        let id = id.into();
        self.current(id)
            .map_or(0, |guard| guard.ref_count(id.index))
    }

    /// Unload a resident slot that no handle refers to.
    ///
    /// Slots are released automatically when their last handle drops, so this
    /// only matters for slots whose count is already zero. Returns `false`
    /// without touching the slot if it is still referenced.
    pub fn release(&self, index: SlotIndex) -> bool {
        let evicted = {
            let mut guard = self.shared.table.lock();
            if !guard.is_resident(index) {
                tracing::error!(index, "Released a slot that is not resident");
                debug_assert!(false, "slot {} is not resident", index);
                return false;
            }
            let count = guard.ref_count(index);
            if count != 0 {
                tracing::warn!(index, count, "Not releasing a slot that is still referenced");
                return false;
            }
            Shared::unload(&mut guard, index)
        };
        drop(evicted);
        true
    }

    /// Called with the payload and fresh user data each time a slot is loaded.
    ///
    /// Runs under the manager lock, so the callback must not use this manager.
    pub fn set_on_load_callback(&self, callback: impl Fn(&T, &mut U) + Send + Sync + 'static) {
        // Old callback is dropped after the lock; it may own handles
        let _previous = self
            .shared
            .table
            .lock()
            .storage_mut()
            .on_load
            .replace(Box::new(callback));
    }

    /// Called before a slot is recycled. The payload is `None` when it was not
    /// kept after loading.
    ///
    /// Handles left in the user data are dropped once the lock is released, so
    /// leave them there rather than clearing them inside the callback.
    pub fn set_on_unload_callback(
        &self,
        callback: impl Fn(Option<&T>, &mut U) + Send + Sync + 'static,
    ) {
        let _previous = self
            .shared
            .table
            .lock()
            .storage_mut()
            .on_unload
            .replace(Box::new(callback));
    }

    /// Number of resident assets.
    pub fn len(&self) -> usize {
        self.shared.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.table.capacity()
    }

    /// How many times the slot table has grown past its initial capacity.
    pub fn growth_events(&self) -> usize {
        self.shared.table.lock().growth_events()
    }

    pub fn file_type(&self) -> FileType {
        T::FILE_TYPE
    }

    pub fn io(&self) -> &Arc<dyn AssetIo> {
        &self.shared.io
    }

    /// Lock the table if `id` is current.
    fn current(&self, id: HandleId) -> Option<SlotGuard<'_, TypedSlots<T, U>>> {
        if !id.is_valid() {
            return None;
        }
        let guard = self.shared.table.lock();
        if !guard.is_current(id) {
            tracing::warn!(
                index = id.index,
                checksum = id.checksum,
                capacity = guard.capacity(),
                "Stale or out-of-range asset handle"
            );
            return None;
        }
        Some(guard)
    }

    fn issue(&self, guard: &SlotGuard<'_, TypedSlots<T, U>>, index: SlotIndex) -> AssetHandle<T> {
        let checksum = guard
            .checksum_from_index(index)
            .unwrap_or(crate::slot::INVALID_CHECKSUM);
        AssetHandle::new(HandleId::new(index, checksum), &self.shared)
    }
}

impl<T: Asset, U: Default + Send + 'static> Default for AssetManager<T, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Asset, U: Default + Send + 'static> Clone for AssetManager<T, U> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Asset, U: Default + Send + 'static> fmt::Debug for AssetManager<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManager")
            .field("asset", &T::type_name())
            .field("file_type", &T::FILE_TYPE)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
