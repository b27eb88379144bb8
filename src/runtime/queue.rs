/*!
 * Waiting Queue
 * Min-heap of waiting user threads ordered by accumulated running time
 */

use crate::core::types::UserThreadId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

/// Reference to a waiting user thread slot
///
/// The key is copied in at insertion time. It stays exact because a thread's
/// running time is only updated while the thread is out of the queue.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WaitEntry {
    pub thread: UserThreadId,
    pub running_time: Duration,
}

impl WaitEntry {
    pub fn new(thread: UserThreadId, running_time: Duration) -> Self {
        Self {
            thread,
            running_time,
        }
    }
}

/// Scheduling priority of two user threads by accumulated running time
///
/// `Greater` means `a` should run before `b`: the thread that has consumed
/// less CPU time wins.
#[inline]
pub(crate) fn priority(a: &WaitEntry, b: &WaitEntry) -> Ordering {
    b.running_time.cmp(&a.running_time)
}

impl PartialEq for WaitEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WaitEntry {}

impl Ord for WaitEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so the least served thread has to compare greatest
        priority(self, other)
    }
}

impl PartialOrd for WaitEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority heap over waiting user threads - O(log n) insert and pop
#[derive(Debug, Default)]
pub(crate) struct WaitingQueue {
    heap: BinaryHeap<WaitEntry>,
}

impl WaitingQueue {
    #[cfg(test)]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, entry: WaitEntry) {
        self.heap.push(entry);
    }

    /// Remove the waiting thread with the least running time
    pub fn pop_highest_priority(&mut self) -> Option<WaitEntry> {
        self.heap.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, thread: UserThreadId) -> bool {
        self.heap.iter().any(|e| e.thread == thread)
    }
}
