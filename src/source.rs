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

// Event source boundary and an in-process event bus

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::event::{Event, EventKind};

/// Callback invoked by the event source for every delivered event
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Identifies one registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// Publish/subscribe mechanism owned by the surrounding application.
///
/// Delivery concurrency and ordering are the source's responsibility.
pub trait EventSource: Send + Sync {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> HandlerId;

    fn unsubscribe(&self, kind: EventKind, id: HandlerId);
}

/// Set of registrations released together, on [`Subscription::release`] or drop.
///
/// Release is idempotent, so the handle can be shared between the worker and
/// its controller.
pub struct Subscription {
    source: Arc<dyn EventSource>,
    registrations: Mutex<Vec<(EventKind, HandlerId)>>,
}

impl Subscription {
    /// Register `handler` for each kind in `kinds`
    pub fn register(
        source: Arc<dyn EventSource>,
        kinds: impl IntoIterator<Item = EventKind>,
        handler: EventHandler,
    ) -> Self {
        let registrations = kinds
            .into_iter()
            .map(|kind| (kind, source.subscribe(kind, handler.clone())))
            .collect();
        Self {
            source,
            registrations: Mutex::new(registrations),
        }
    }

    /// Kinds still registered
    pub fn kinds(&self) -> Vec<EventKind> {
        self.registrations().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn is_active(&self) -> bool {
        !self.registrations().is_empty()
    }

    pub fn release(&self) {
        let registrations = std::mem::take(&mut *self.registrations());
        for (kind, id) in registrations {
            self.source.unsubscribe(kind, id);
            debug!("Unsubscribed handler {:?} from '{}' events", id, kind);
        }
    }

    fn registrations(&self) -> MutexGuard<'_, Vec<(EventKind, HandlerId)>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Synchronous in-process event bus.
///
/// `publish` calls every handler registered for the event's kind on the
/// publishing thread.
#[derive(Default)]
pub struct EventBus {
    handlers: DashMap<EventKind, Vec<(HandlerId, EventHandler)>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to all handlers of its kind.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: Event) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);

        // Clone handlers out so a handler may (un)subscribe without deadlocking
        let handlers: Vec<EventHandler> = match self.handlers.get(&event.kind()) {
            Some(entry) => entry.iter().map(|(_, handler)| handler.clone()).collect(),
            None => return 0,
        };

        let count = handlers.len();
        if let Some((last, rest)) = handlers.split_last() {
            for handler in rest {
                handler(event.clone());
            }
            last(event);
        }
        count
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map(|entry| entry.len()).unwrap_or(0)
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, kind: EventKind, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    fn unsubscribe(&self, kind: EventKind, id: HandlerId) {
        if let Some(mut entry) = self.handlers.get_mut(&kind) {
            entry.retain(|(existing, _)| *existing != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LogData, LogLevel};
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    fn log_event() -> Event {
        Event::Log(LogData {
            level: LogLevel::Info,
            time: Utc::now(),
            msg: "hello".to_string(),
            source: String::new(),
        })
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        Arc::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_publish_reaches_matching_kind_only() {
        let bus = EventBus::new();
        let logs = Arc::new(AtomicUsize::new(0));
        let ticks = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::Log, counting_handler(logs.clone()));
        bus.subscribe(EventKind::Tick, counting_handler(ticks.clone()));

        assert_eq!(bus.publish(log_event()), 1);
        assert_eq!(logs.load(Ordering::SeqCst), 1);
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(bus.published(), 1);
    }

    #[test]
    fn test_subscription_drop_unsubscribes() {
        let bus = Arc::new(EventBus::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let subscription = Subscription::register(
            bus.clone(),
            [EventKind::Log, EventKind::StrategyLog],
            counting_handler(counter.clone()),
        );
        assert_eq!(subscription.kinds(), vec![EventKind::Log, EventKind::StrategyLog]);
        assert_eq!(bus.handler_count(EventKind::Log), 1);

        bus.publish(log_event());
        drop(subscription);
        bus.publish(log_event());

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count(EventKind::Log), 0);
        assert_eq!(bus.handler_count(EventKind::StrategyLog), 0);
    }

    #[test]
    fn test_release_keeps_other_handlers() {
        let bus = Arc::new(EventBus::new());
        let kept = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::Log, counting_handler(kept.clone()));

        let subscription = Subscription::register(
            bus.clone(),
            [EventKind::Log],
            counting_handler(Arc::new(AtomicUsize::new(0))),
        );
        assert_eq!(bus.handler_count(EventKind::Log), 2);
        subscription.release();
        subscription.release();
        assert!(!subscription.is_active());

        assert_eq!(bus.publish(log_event()), 1);
        assert_eq!(kept.load(Ordering::SeqCst), 1);
    }
}
