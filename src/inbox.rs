// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded hand-off queue between event producers and the recorder worker.
//!
//! Producers never block in [`Inbox::enqueue`]: a full or closed inbox hands the
//! event back and bumps the `rejected` counter. The single consumer waits in
//! [`Inbox::dequeue`] for at most the given timeout.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

use crate::error::RecorderError;
use crate::event::Event;

/// Log one overflow warning per this many rejections
const REJECT_LOG_INTERVAL: u64 = 1000;

/// Fixed-capacity MPSC event queue
pub struct Inbox {
    queue: ArrayQueue<Event>,

    // Wakeups
    item_ready: Notify,
    space_ready: Notify,
    closed: AtomicBool,
    // Producers between their closed check and their push
    pushing: AtomicUsize,

    // Statistics
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    rejected: AtomicU64,
}

impl Inbox {
    /// Create an inbox holding at most `capacity` events (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            item_ready: Notify::new(),
            space_ready: Notify::new(),
            closed: AtomicBool::new(false),
            pushing: AtomicUsize::new(0),
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Push an event without blocking.
    ///
    /// Returns the event back if the inbox is full or closed.
    pub fn enqueue(&self, event: Event) -> Result<(), Event> {
        self.push_if_open(event).map_err(|event| self.reject(event))
    }

    /// Push an event, waiting up to `timeout` for free space.
    pub async fn enqueue_timeout(&self, event: Event, timeout: Duration) -> Result<(), Event> {
        let deadline = Instant::now() + timeout;
        let mut event = event;

        loop {
            if self.is_closed() {
                return Err(self.reject(event));
            }

            // Register interest before retrying so a concurrent pop is not missed
            let notified = self.space_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.push_if_open(event) {
                Ok(()) => return Ok(()),
                Err(returned) if self.is_closed() => return Err(self.reject(returned)),
                Err(returned) => event = returned,
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(self.reject(event));
            }
        }
    }

    /// Pop the oldest event, waiting up to `timeout`.
    ///
    /// `None` means the timeout elapsed, or the inbox is closed and drained.
    pub async fn dequeue(&self, timeout: Duration) -> Option<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(event) = self.try_dequeue() {
                return Some(event);
            }
            if self.is_closed() {
                return None;
            }
            if tokio::time::timeout_at(deadline, self.item_ready.notified())
                .await
                .is_err()
            {
                return self.try_dequeue();
            }
        }
    }

    /// Pop the oldest event if one is queued
    pub fn try_dequeue(&self) -> Option<Event> {
        let event = self.queue.pop()?;
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        self.space_ready.notify_waiters();
        Some(event)
    }

    /// Stop accepting events. Queued events can still be dequeued.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.item_ready.notify_one();
            self.space_ready.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until no producer can still land an event in a closed inbox.
    ///
    /// After `close()` and `quiesce()`, `len()` only goes down.
    pub async fn quiesce(&self) {
        while self.pushing.load(Ordering::SeqCst) > 0 {
            tokio::task::yield_now().await;
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn stats(&self) -> InboxStats {
        InboxStats {
            capacity: self.queue.capacity(),
            len: self.queue.len(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            closed: self.is_closed(),
        }
    }

    /// Push unless closed. Pairs with `close` + `quiesce`: a producer either
    /// sees the closed flag or finishes its push before `quiesce` returns.
    fn push_if_open(&self, event: Event) -> Result<(), Event> {
        self.pushing.fetch_add(1, Ordering::SeqCst);
        let result = if self.closed.load(Ordering::SeqCst) {
            Err(event)
        } else {
            self.try_push(event)
        };
        self.pushing.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn try_push(&self, event: Event) -> Result<(), Event> {
        self.queue.push(event)?;
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.item_ready.notify_one();
        Ok(())
    }

    fn reject(&self, event: Event) -> Event {
        let previous = self.rejected.fetch_add(1, Ordering::Relaxed);
        if previous % REJECT_LOG_INTERVAL == 0 {
            warn!(
                "{} ({} rejected so far, capacity {})",
                RecorderError::QueueOverflow { kind: event.kind() },
                previous + 1,
                self.queue.capacity()
            );
        }
        event
    }
}

/// Inbox counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InboxStats {
    pub capacity: usize,
    pub len: usize,
    pub enqueued: u64,
    pub dequeued: u64,
    /// Events refused because the inbox was full or closed
    pub rejected: u64,
    pub closed: bool,
}

impl InboxStats {
    pub fn fill_percentage(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            (self.len as f64 / self.capacity as f64) * 100.0
        }
    }
}
