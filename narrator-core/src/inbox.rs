//! Bounded priority inbox feeding the response stage

use crate::error::{PipelineError, Result};
use crate::work_item::WorkItem;
use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tokio::sync::Semaphore;

const QUEUE_NAME: &str = "inbox";

/// Heap entry ordered by `(priority, sequence)` only
struct Entry {
    key: (i64, u64),
    item: WorkItem,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

struct InboxState {
    heap: BinaryHeap<Reverse<Entry>>,
    next_sequence: u64,
}

/// Priority queue with blocking admission.
///
/// `slots` counts free capacity and `ready` counts queued items, so neither
/// `submit` nor `next` holds the heap lock while suspended.
pub struct PriorityInbox {
    state: Mutex<InboxState>,
    slots: Semaphore,
    ready: Semaphore,
    capacity: usize,
}

impl PriorityInbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(InboxState {
                heap: BinaryHeap::with_capacity(capacity),
                next_sequence: 0,
            }),
            slots: Semaphore::new(capacity),
            ready: Semaphore::new(0),
            capacity,
        }
    }

    /// Enqueue, waiting for a free slot when full
    pub async fn submit(&self, item: WorkItem) -> Result<()> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| PipelineError::QueueClosed { queue: QUEUE_NAME })?;
        permit.forget();
        self.push(item);
        Ok(())
    }

    /// Enqueue without waiting. Returns the item back when full or closed.
    pub fn try_submit(&self, item: WorkItem) -> std::result::Result<(), WorkItem> {
        match self.slots.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.push(item);
                Ok(())
            }
            Err(_) => Err(item),
        }
    }

    fn push(&self, item: WorkItem) {
        {
            let mut state = self.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.heap.push(Reverse(Entry {
                key: (item.priority, sequence),
                item,
            }));
        }
        self.ready.add_permits(1);
    }

    /// Wait for the lowest-priority item, earliest arrival first on ties
    pub async fn next(&self) -> Result<WorkItem> {
        let permit = self
            .ready
            .acquire()
            .await
            .map_err(|_| PipelineError::QueueClosed { queue: QUEUE_NAME })?;
        permit.forget();
        let entry = self.state.lock().heap.pop();
        match entry {
            Some(Reverse(entry)) => {
                self.slots.add_permits(1);
                Ok(entry.item)
            }
            // A ready permit is only ever added after a push
            None => Err(PipelineError::QueueClosed { queue: QUEUE_NAME }),
        }
    }

    /// Wake every waiter with `QueueClosed`. Queued items are discarded.
    pub fn close(&self) {
        self.slots.close();
        self.ready.close();
        self.state.lock().heap.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.ready.is_closed()
    }

    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn item(message: &str, priority: i64) -> WorkItem {
        WorkItem::new(message, None).with_priority(priority)
    }

    #[tokio::test]
    async fn test_lowest_priority_first() {
        let inbox = PriorityInbox::new(10);
        inbox.submit(item("low", 5)).await.unwrap();
        inbox.submit(item("urgent", -1)).await.unwrap();
        inbox.submit(item("normal", 0)).await.unwrap();

        assert_eq!(inbox.next().await.unwrap().user_message(), "urgent");
        assert_eq!(inbox.next().await.unwrap().user_message(), "normal");
        assert_eq!(inbox.next().await.unwrap().user_message(), "low");
        assert!(inbox.is_empty());
    }

    #[tokio::test]
    async fn test_equal_priority_keeps_arrival_order() {
        let inbox = PriorityInbox::new(10);
        for name in ["a", "b", "c", "d"] {
            inbox.submit(item(name, 0)).await.unwrap();
        }
        let mut order = Vec::new();
        for _ in 0..4 {
            order.push(inbox.next().await.unwrap().user_message().to_string());
        }
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_submit_blocks_until_slot_frees() {
        let inbox = Arc::new(PriorityInbox::new(2));
        inbox.submit(item("one", 0)).await.unwrap();
        inbox.submit(item("two", 0)).await.unwrap();
        assert!(inbox.try_submit(item("rejected", 0)).is_err());

        let blocked = {
            let inbox = inbox.clone();
            tokio::spawn(async move { inbox.submit(item("three", 0)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());
        assert_eq!(inbox.len(), 2);

        inbox.next().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("submit should complete once a slot frees")
            .unwrap()
            .unwrap();
        assert_eq!(inbox.len(), 2);
    }

    #[tokio::test]
    async fn test_next_waits_for_item() {
        let inbox = Arc::new(PriorityInbox::new(4));
        let waiter = {
            let inbox = inbox.clone();
            tokio::spawn(async move { inbox.next().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        inbox.submit(item("late", 0)).await.unwrap();
        let received = waiter.await.unwrap().unwrap();
        assert_eq!(received.user_message(), "late");
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let inbox = Arc::new(PriorityInbox::new(1));
        let waiter = {
            let inbox = inbox.clone();
            tokio::spawn(async move { inbox.next().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        inbox.close();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(PipelineError::QueueClosed { queue: "inbox" })));
        assert!(inbox.is_closed());
        assert!(inbox.submit(item("after close", 0)).await.is_err());
    }
}
