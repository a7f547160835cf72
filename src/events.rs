//! Interrupt-safe message bus.
//!
//! Events are produced by:
//! - The display refresh tick (light-sense requests)
//! - The light sensor (readiness notifications)
//!
//! Producers call [`EventBus::publish`]; the bus fans the event out to every
//! subscribed listener by queueing one [`Delivery`] per listener.  The main
//! loop consumes deliveries with [`MessageBus::drain`] and routes them.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Display     │────▶│              │     │              │
//! │ LightSensor │────▶│ Delivery Q   │────▶│  Main Loop   │
//! └─────────────┘     │ (mutex)      │     │  (consumer)  │
//!                     └──────────────┘     └──────────────┘
//! ```
//!
//! State lives behind an `embassy_sync` blocking mutex, so publishing from
//! the esp_timer task is also safe.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::{Deque, Vec};
use log::warn;

use crate::app::ports::{Event, EventBus, ListenerId};

/// Maximum number of (event, listener) registrations.
const MAX_LISTENERS: usize = 8;

/// Maximum number of undelivered events.
const DELIVERY_QUEUE_CAP: usize = 16;

/// One event routed to one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub listener: ListenerId,
    pub event: Event,
}

struct BusInner {
    listeners: Vec<(Event, ListenerId), MAX_LISTENERS>,
    queue: Deque<Delivery, DELIVERY_QUEUE_CAP>,
    dropped: u32,
}

/// Fan-out bus with fixed-capacity subscription table and delivery queue.
pub struct MessageBus {
    inner: Mutex<CriticalSectionRawMutex, RefCell<BusInner>>,
}

impl MessageBus {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(BusInner {
                listeners: Vec::new(),
                queue: Deque::new(),
                dropped: 0,
            })),
        }
    }

    /// Pop the next pending delivery.  Returns `None` if the queue is empty.
    pub fn pop(&self) -> Option<Delivery> {
        self.inner.lock(|inner| inner.borrow_mut().queue.pop_front())
    }

    /// Deliver all pending events in FIFO order.
    ///
    /// The lock is released before each handler call, so handlers may
    /// publish further events; those are delivered in the same drain.
    pub fn drain(&self, mut handler: impl FnMut(Delivery)) {
        while let Some(delivery) = self.pop() {
            handler(delivery);
        }
    }

    /// Whether `listener` is currently registered for `event`.
    pub fn is_subscribed(&self, event: Event, listener: ListenerId) -> bool {
        self.inner
            .lock(|inner| inner.borrow().listeners.contains(&(event, listener)))
    }

    /// Number of registrations across all events.
    pub fn listener_count(&self) -> usize {
        self.inner.lock(|inner| inner.borrow().listeners.len())
    }

    /// Number of undelivered events.
    pub fn pending(&self) -> usize {
        self.inner.lock(|inner| inner.borrow().queue.len())
    }

    /// Deliveries discarded because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.inner.lock(|inner| inner.borrow().dropped)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for MessageBus {
    fn subscribe(&self, event: Event, listener: ListenerId) -> bool {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.listeners.contains(&(event, listener)) {
                return true;
            }
            inner.listeners.push((event, listener)).is_ok()
        })
    }

    fn unsubscribe(&self, event: Event, listener: ListenerId) {
        self.inner.lock(|inner| {
            inner
                .borrow_mut()
                .listeners
                .retain(|entry| *entry != (event, listener));
        });
    }

    fn publish(&self, event: Event) -> bool {
        self.inner.lock(|inner| {
            let mut guard = inner.borrow_mut();
            let inner = &mut *guard;
            let mut queued = false;
            for &(ev, listener) in &inner.listeners {
                if ev != event {
                    continue;
                }
                if inner.queue.push_back(Delivery { listener, event }).is_ok() {
                    queued = true;
                } else {
                    inner.dropped = inner.dropped.saturating_add(1);
                    warn!("bus: delivery queue full, dropped {:?} for {:?}", event, listener);
                }
            }
            queued
        })
    }
}
