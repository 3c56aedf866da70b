//! In-memory FIFO work queue shared by the download workers
//!
//! Semantics follow a classic task queue: `put` adds an item and bumps the
//! unfinished counter, `get` waits for an item, `mark_done` acknowledges one
//! processed item, and `join` waits until every `put` has been acknowledged.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Errors raised by queue bookkeeping
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("mark_done called more times than items were put")]
    TooManyDone,
}

/// Unbounded FIFO of URLs with join-on-drain support
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<String>>,
    unfinished: AtomicUsize,
    item_ready: Notify,
    drained: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a URL and wakes one waiting consumer
    pub fn put(&self, url: String) {
        self.unfinished.fetch_add(1, Ordering::SeqCst);
        self.lock_items().push_back(url);
        self.item_ready.notify_one();
    }

    /// Takes the oldest URL, waiting until one is available
    ///
    /// Cancel safe: an item is only removed in the same poll that returns it.
    pub async fn get(&self) -> String {
        loop {
            if let Some(url) = self.lock_items().pop_front() {
                return url;
            }
            self.item_ready.notified().await;
        }
    }

    /// Acknowledges that one item taken with `get` has been fully processed
    pub fn mark_done(&self) -> Result<(), QueueError> {
        let previous = self
            .unfinished
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| QueueError::TooManyDone)?;

        if previous == 1 {
            self.drained.notify_waiters();
        }
        Ok(())
    }

    /// Waits until every item put on the queue has been marked done
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent final mark_done is not missed
            notified.as_mut().enable();

            if self.unfinished.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Number of items waiting to be taken
    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items put but not yet marked done
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }

    fn lock_items(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        // The guarded section never panics, so a poisoned lock still holds a valid deque
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
