//! Failover cursor.
//!
//! Remembers which endpoint of a group succeeded last so the next dispatch
//! tries it first instead of starting over at index 0.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Start position shared by every dispatch against one group.
///
/// Concurrent successes race with plain stores; whichever lands last wins.
/// Each store is one in-range index, so readers never see a torn value.
#[derive(Debug)]
pub struct FailoverCursor {
    index: AtomicUsize,
    len: usize,
}

impl FailoverCursor {
    /// Create a cursor for a group of `len` endpoints, starting at 0.
    pub fn new(len: usize) -> Self {
        Self {
            index: AtomicUsize::new(0),
            len,
        }
    }

    /// Index the next dispatch begins probing at.
    pub fn current_start(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// Remember `index` as the endpoint that just succeeded.
    pub fn record_success(&self, index: usize) {
        if index >= self.len {
            tracing::warn!(index, len = self.len, "Ignoring out-of-range failover cursor update");
            return;
        }
        self.index.store(index, Ordering::Release);
    }

    /// Number of endpoints this cursor ranges over.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
