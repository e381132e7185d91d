use std::collections::VecDeque;
use std::ops::Range;

use crate::profiling::profile_function;

/// A pool of recyclable `u16` indices.
///
/// Indices are created in batches by [`IndexPool::grow`] and handed out in FIFO
/// order, so a freshly released index goes to the back of the queue and is the
/// last one to be reused. `limit` bounds how many indices can ever exist, which
/// lets callers reserve the top of the range as a sentinel.
#[derive(Debug, Clone)]
pub struct IndexPool {
    free: VecDeque<u16>,
    /// `queued[i]` is set while `i` sits in `free`.
    queued: Vec<bool>,
    capacity: usize,
    limit: usize,
}

impl IndexPool {
    /// Largest number of indices a pool can hold. `u16::MAX` itself is never issued.
    pub const MAX_INDICES: usize = u16::MAX as usize;

    pub const fn new() -> Self {
        Self::with_limit(Self::MAX_INDICES)
    }

    pub const fn with_limit(limit: usize) -> Self {
        let limit = if limit > Self::MAX_INDICES {
            Self::MAX_INDICES
        } else {
            limit
        };
        Self {
            free: VecDeque::new(),
            queued: Vec::new(),
            capacity: 0,
            limit,
        }
    }

    /// Number of indices created so far.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of indices waiting in the free queue.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of indices currently handed out.
    pub fn in_use(&self) -> usize {
        self.capacity - self.free.len()
    }

    pub fn has_free(&self) -> bool {
        !self.free.is_empty()
    }

    /// Create up to `additional` new indices and queue them as free.
    ///
    /// Returns the range of new indices, which is empty once the limit is reached.
    pub fn grow(&mut self, additional: usize) -> Range<usize> {
        profile_function!();
        let start = self.capacity;
        let end = start.saturating_add(additional).min(self.limit);
        self.free.extend((start..end).map(|i| i as u16));
        self.queued.resize(end, true);
        self.capacity = end;
        start..end
    }

    /// Take the oldest free index.
    pub fn pop(&mut self) -> Option<u16> {
        let index = self.free.pop_front()?;
        self.queued[index as usize] = false;
        Some(index)
    }

    /// Return an index to the back of the free queue.
    pub fn push(&mut self, index: u16) {
        assert!(
            (index as usize) < self.capacity,
            "index {} was never issued by this pool",
            index
        );
        let queued = &mut self.queued[index as usize];
        assert!(!*queued, "index {} freed twice", index);
        *queued = true;
        self.free.push_back(index);
    }

    pub fn is_free(&self, index: u16) -> bool {
        self.queued.get(index as usize).copied().unwrap_or(false)
    }
}

impl Default for IndexPool {
    fn default() -> Self {
        Self::new()
    }
}
