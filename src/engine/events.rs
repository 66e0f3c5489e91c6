//! Lifecycle events and the listener bus.
//!
//! External observers (dashboards, loggers, tests) subscribe with
//! [`EventBus::on`] and are invoked synchronously, in registration order,
//! on the thread driving the run. A panicking listener is caught and
//! logged; it never aborts dispatch to the remaining listeners or the run
//! itself.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use crate::engine::{relock, SimTime};

/// Runtime events emitted by the kernel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A run began.
    Started {
        /// Time at run start.
        t: SimTime,
        /// Requested end time of the run.
        end: SimTime,
    },
    /// Cadence event for observers.
    Tick {
        /// Tick time.
        t: SimTime,
        /// Component that advanced, when ticking per advance.
        #[serde(skip_serializing_if = "Option::is_none")]
        component: Option<String>,
    },
    /// The run thread blocked on the pause gate.
    Paused {
        /// Time at pause.
        t: SimTime,
    },
    /// The pause gate reopened.
    Resumed {
        /// Time at resume.
        t: SimTime,
    },
    /// The run ended via cooperative stop (not a failure).
    Stopped {
        /// Time at stop.
        t: SimTime,
    },
    /// The run ended; emitted unconditionally as the loop's last act.
    Finished {
        /// Final time.
        t: SimTime,
    },
    /// A component failed; the error is re-raised to the caller.
    Error {
        /// Time of the failure.
        t: SimTime,
        /// Rendered error message.
        message: String,
    },
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SimEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

/// Synchronous lifecycle-event bus.
///
/// Cloning yields another handle to the same listener list, so control
/// surfaces on other threads can emit through the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns an id for [`EventBus::off`].
    pub fn on(&self, listener: impl Fn(&SimEvent) + Send + Sync + 'static) -> ListenerId {
        let mut inner = relock(self.inner.lock());
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Unregister a listener. Returns false if the id was unknown.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut inner = relock(self.inner.lock());
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        relock(self.inner.lock()).listeners.len()
    }

    /// Dispatch an event to all listeners in registration order.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe
    /// or unsubscribe from within a callback without deadlocking.
    pub fn emit(&self, event: &SimEvent) {
        let listeners: Vec<Listener> = relock(self.inner.lock())
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(?event, "event listener panicked during dispatch");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tick(t: f64) -> SimEvent {
        SimEvent::Tick {
            t: SimTime::from_secs(t),
            component: None,
        }
    }

    #[test]
    fn test_on_off() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let id = bus.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&tick(0.1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(bus.off(id));
        bus.emit(&tick(0.2));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(!bus.off(id));
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            bus.on(move |_| order.lock().unwrap().push(tag));
        }

        bus.emit(&tick(0.0));
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_panicking_listener_does_not_abort_dispatch() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.on(|_| panic!("listener failure"));
        let c = Arc::clone(&count);
        bus.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&tick(0.0));
        bus.emit(&tick(0.1));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let bus = EventBus::new();
        let inner = bus.clone();
        let slot = Arc::new(Mutex::new(None::<ListenerId>));

        let slot2 = Arc::clone(&slot);
        let id = bus.on(move |_| {
            if let Some(id) = *slot2.lock().unwrap() {
                inner.off(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        bus.emit(&tick(0.0));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_string(&tick(0.5)).unwrap();
        assert!(json.contains("\"event\":\"tick\""));
    }
}
