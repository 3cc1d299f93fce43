//! Publish/subscribe bus for player events
//!
//! Subscribers register closures and get back a [`Subscription`] guard;
//! dropping the guard unsubscribes. Publishing is safe from any thread,
//! including from inside a subscriber callback: events published during
//! delivery are queued and delivered after the current one, so every
//! subscriber sees events in publish order.
//!
//! A panicking subscriber is logged and skipped; the remaining subscribers
//! still receive the event.

use crate::events::{EventKind, PlayerEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;

type Callback = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    kinds: Option<Vec<EventKind>>,
    callback: Callback,
}

impl Subscriber {
    fn wants(&self, kind: EventKind) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }
}

#[derive(Default)]
struct Dispatch {
    queue: VecDeque<PlayerEvent>,
    draining: bool,
}

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<Vec<Subscriber>>,
    dispatch: Mutex<Dispatch>,
    next_id: AtomicU64,
}

impl BusInner {
    fn unsubscribe(&self, id: u64) {
        self.subscribers.write().retain(|s| s.id != id);
    }
}

/// Event bus shared by the player and its surfaces
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Keeps a subscription alive; unsubscribes on drop
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Keep the subscription for the lifetime of the bus
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(callback))
    }

    /// Receive only events of the given kinds
    pub fn subscribe_to<F>(&self, kinds: &[EventKind], callback: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.register(Some(kinds.to_vec()), Arc::new(callback))
    }

    fn register(&self, kinds: Option<Vec<EventKind>>, callback: Callback) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push(Subscriber {
            id,
            kinds,
            callback,
        });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Deliver `event` to every interested subscriber
    ///
    /// If another delivery is already in progress (on this or any other
    /// thread) the event is queued and delivered by that drain loop.
    pub fn publish(&self, event: PlayerEvent) {
        {
            let mut dispatch = self.inner.dispatch.lock();
            dispatch.queue.push_back(event);
            if dispatch.draining {
                return;
            }
            dispatch.draining = true;
        }

        loop {
            let next = {
                let mut dispatch = self.inner.dispatch.lock();
                match dispatch.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        dispatch.draining = false;
                        return;
                    }
                }
            };
            self.deliver(&next);
        }
    }

    fn deliver(&self, event: &PlayerEvent) {
        let kind = event.kind();
        let targets: Vec<Callback> = self
            .inner
            .subscribers
            .read()
            .iter()
            .filter(|s| s.wants(kind))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        for callback in targets {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(?kind, "Event subscriber panicked, continuing delivery");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &EventBus) -> (Arc<Mutex<Vec<PlayerEvent>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(move |e| sink.lock().push(e.clone()));
        (seen, sub)
    }

    #[test]
    fn delivers_in_publish_order() {
        let bus = EventBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.publish(PlayerEvent::PlaybackStarted);
        bus.publish(PlayerEvent::PlaybackProgress { frame: 1, ms: 26 });
        bus.publish(PlayerEvent::PlaybackPaused);

        let kinds: Vec<_> = seen.lock().iter().map(PlayerEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::PlaybackStarted,
                EventKind::PlaybackProgress,
                EventKind::PlaybackPaused
            ]
        );
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = EventBus::new();
        let (seen, sub) = recorder(&bus);
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(PlayerEvent::PlaybackStarted);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn filtered_subscription_only_sees_requested_kinds() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe_to(&[EventKind::AdOn, EventKind::AdOff], move |e| {
            sink.lock().push(e.kind());
        });

        bus.publish(PlayerEvent::PlaybackStarted);
        bus.publish(PlayerEvent::AdOff);
        assert_eq!(*seen.lock(), vec![EventKind::AdOff]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let _bad = bus.subscribe(|_| panic!("subscriber failure"));
        let (seen, _good) = recorder(&bus);

        bus.publish(PlayerEvent::PlaybackStopped);
        bus.publish(PlayerEvent::PlaybackStarted);
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn reentrant_publish_is_queued_after_current_event() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let first = Arc::clone(&order);
        let _a = bus.subscribe(move |e| {
            first.lock().push(("a", e.kind()));
            if e.kind() == EventKind::PlaybackStarted {
                inner_bus.publish(PlayerEvent::PlaybackPaused);
            }
        });
        let second = Arc::clone(&order);
        let _b = bus.subscribe(move |e| second.lock().push(("b", e.kind())));

        bus.publish(PlayerEvent::PlaybackStarted);

        assert_eq!(
            *order.lock(),
            vec![
                ("a", EventKind::PlaybackStarted),
                ("b", EventKind::PlaybackStarted),
                ("a", EventKind::PlaybackPaused),
                ("b", EventKind::PlaybackPaused),
            ]
        );
    }

    #[test]
    fn subscribing_from_a_callback_does_not_deadlock() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        let late = Arc::new(Mutex::new(Vec::new()));
        let late_sink = Arc::clone(&late);

        let _sub = bus.subscribe(move |_| {
            let sink = Arc::clone(&late_sink);
            inner_bus
                .subscribe(move |e| sink.lock().push(e.kind()))
                .detach();
        });

        bus.publish(PlayerEvent::PlaybackStarted);
        assert_eq!(bus.subscriber_count(), 2);
        // Late subscriber joined after the event was already dispatched
        assert!(late.lock().is_empty());
    }

    #[test]
    fn concurrent_publishers_deliver_everything() {
        let bus = EventBus::new();
        let (seen, _sub) = recorder(&bus);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        bus.publish(PlayerEvent::PlaybackProgress { frame: i, ms: t });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(seen.lock().len(), 1_000);
    }
}
