//! A concurrency-safe min-heap priority queue with a suspending `take`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

use tokio::sync::Notify;

/// One heap slot: orders by `(priority, insertion_seq)` so that lower
/// priorities come first and equal priorities are FIFO.
struct Entry<T> {
    priority: i64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the lowest priority (and,
        // among ties, the earliest insertion) sorts to the top.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A min-heap keyed by an external priority, with suspending `take`.
pub struct PriorityQueue<T> {
    heap: Mutex<BinaryHeap<Entry<T>>>,
    notify: Notify,
    next_seq: AtomicU64,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        PriorityQueue {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().unwrap().is_empty()
    }

    /// Inserts `item` at `priority`. Among equal priorities, items are
    /// dequeued in the order they were pushed.
    pub fn push(&self, priority: i64, item: T) {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().unwrap().push(Entry { priority, seq, item });
        self.notify.notify_one();
    }

    /// Suspends until an item is available, then removes and returns the
    /// one with the lowest priority (FIFO among ties).
    pub async fn take(&self) -> T {
        loop {
            let notified = self.notify.notified();
            if let Some(entry) = self.heap.lock().unwrap().pop() {
                return entry.item;
            }
            notified.await;
        }
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pops_lowest_priority_first() {
        let queue: PriorityQueue<&str> = PriorityQueue::new();
        queue.push(10, "a");
        queue.push(5, "b");
        queue.push(7, "c");

        assert_eq!(queue.take().await, "b");
        assert_eq!(queue.take().await, "c");
        assert_eq!(queue.take().await, "a");
    }

    #[tokio::test]
    async fn ties_are_fifo() {
        let queue: PriorityQueue<&str> = PriorityQueue::new();
        queue.push(1, "first");
        queue.push(1, "second");

        assert_eq!(queue.take().await, "first");
        assert_eq!(queue.take().await, "second");
    }

    #[tokio::test]
    async fn take_suspends_until_pushed() {
        let queue = std::sync::Arc::new(PriorityQueue::new());
        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take().await })
        };
        tokio::task::yield_now().await;
        queue.push(0, "late");
        assert_eq!(reader.await.unwrap(), "late");
    }
}
