//! Satchel Core
//!
//! Shared utilities for the Satchel crates: hashing collections, the recyclable
//! slot index pool, logging bootstrap and profiling scopes.

pub mod alloc;
pub mod logging;
pub mod profiling;
