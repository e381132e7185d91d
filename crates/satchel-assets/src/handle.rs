//! Asset handles - counted references to resident slots.
//!
//! An [`AssetHandle`] carries a slot index, the checksum that slot held when
//! the handle was issued, and a weak link back to the manager that owns the
//! slot. Every live handle contributes one to the slot's reference count:
//! cloning adds one, dropping removes one, and the last drop releases the slot.
//!
//! [`HandleId`] is the plain `{index, checksum}` pair without any counting.
//! It is what to keep when you want to look an asset up later without keeping
//! it resident; lookups with a stale id fail instead of returning whatever
//! asset reuses the slot.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use static_assertions::assert_eq_size;

use crate::slot::{INVALID_CHECKSUM, INVALID_INDEX, SlotChecksum, SlotIndex};

/// Generational slot address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    pub index: SlotIndex,
    pub checksum: SlotChecksum,
}

assert_eq_size!(HandleId, u32);

impl HandleId {
    pub const INVALID: HandleId = HandleId {
        index: INVALID_INDEX,
        checksum: INVALID_CHECKSUM,
    };

    pub const fn new(index: SlotIndex, checksum: SlotChecksum) -> Self {
        Self { index, checksum }
    }

    /// Packed form: index in the low 16 bits, checksum in the high 16.
    pub const fn value(&self) -> u32 {
        self.index as u32 | (self.checksum as u32) << 16
    }

    pub const fn from_value(value: u32) -> Self {
        Self {
            index: (value & 0xFFFF) as SlotIndex,
            checksum: (value >> 16) as SlotChecksum,
        }
    }

    /// `false` only for ids that can never name a slot.
    pub const fn is_valid(&self) -> bool {
        self.index != INVALID_INDEX
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// The side of a manager that handles report reference changes to.
pub(crate) trait SlotOwner: Send + Sync {
    fn reference(&self, index: SlotIndex);
    fn dereference(&self, index: SlotIndex);
}

/// A counted, typed reference to an asset.
///
/// # Example
///
/// ```ignore
/// let handle: AssetHandle<Texture> = textures.load("textures/stone.tx")?;
/// let texture = textures.get(&handle).unwrap();
/// ```
pub struct AssetHandle<T> {
    id: HandleId,
    owner: Option<Weak<dyn SlotOwner>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AssetHandle<T> {
    /// The sentinel handle. It belongs to no manager and counts nothing.
    pub const fn invalid() -> Self {
        Self {
            id: HandleId::INVALID,
            owner: None,
            _marker: PhantomData,
        }
    }

    /// Issue a handle and add its reference.
    pub(crate) fn new<O: SlotOwner + 'static>(id: HandleId, owner: &Arc<O>) -> Self {
        owner.reference(id.index);
        let owner: Arc<dyn SlotOwner> = owner.clone();
        Self {
            id,
            owner: Some(Arc::downgrade(&owner)),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn index(&self) -> SlotIndex {
        self.id.index
    }

    pub fn checksum(&self) -> SlotChecksum {
        self.id.checksum
    }

    pub fn value(&self) -> u32 {
        self.id.value()
    }

    pub fn is_valid(&self) -> bool {
        self.owner.is_some() && self.id.is_valid()
    }

    /// Give up this handle's reference and become the sentinel.
    pub fn set_invalid(&mut self) {
        if let Some(owner) = self.owner.take().and_then(|weak| weak.upgrade()) {
            owner.dereference(self.id.index);
        }
        self.id = HandleId::INVALID;
    }
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        if let Some(owner) = self.owner.as_ref().and_then(Weak::upgrade) {
            owner.reference(self.id.index);
        }
        Self {
            id: self.id,
            owner: self.owner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for AssetHandle<T> {
    fn drop(&mut self) {
        self.set_invalid();
    }
}

impl<T> Default for AssetHandle<T> {
    fn default() -> Self {
        Self::invalid()
    }
}

impl<T> PartialEq for AssetHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl<T> Eq for AssetHandle<T> {}

impl<T> Hash for AssetHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value().hash(state);
    }
}

impl<T> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("type", &std::any::type_name::<T>())
            .field("index", &self.id.index)
            .field("checksum", &self.id.checksum)
            .finish()
    }
}

impl<T> From<&AssetHandle<T>> for HandleId {
    fn from(handle: &AssetHandle<T>) -> Self {
        handle.id
    }
}
