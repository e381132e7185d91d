//! Allocation and collection types for Satchel.
//!
//! This module provides:
//! - Re-exports of hash collections using AHash
//! - [`IndexPool`], a chunk-grown FIFO pool of recyclable slot indices

pub mod index_pool;

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};
pub use index_pool::IndexPool;
