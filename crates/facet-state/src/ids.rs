//! Accessor identity allocation.
//!
//! Ids come from a process-wide monotonic counter so accessor identity stays
//! unique across every store in the process. The allocator lives behind its
//! own type so the scheme can change without touching accessor logic.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity of one accessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccessorId(u64);

impl AccessorId {
    /// Raw numeric value.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic source of [`AccessorId`]s.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator starting at zero.
    #[inline]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Hand out the next id.
    #[inline]
    pub fn allocate(&self) -> AccessorId {
        AccessorId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

static ACCESSOR_IDS: IdAllocator = IdAllocator::new();

/// Allocate a process-unique accessor id.
#[inline]
pub(crate) fn next_accessor_id() -> AccessorId {
    ACCESSOR_IDS.allocate()
}
