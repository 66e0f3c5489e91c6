//! Cooperative run control: pause, resume, stop.
//!
//! A [`ControlHandle`] is cloneable and safe to use from a different
//! thread than the one driving `run()`. Pause is a binary gate the run
//! thread blocks on at step boundaries; stop sets a flag and opens the
//! gate so a paused run wakes immediately. Cancellation is cooperative
//! only: a component mid-`advance_to` is never interrupted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::engine::events::{EventBus, SimEvent};
use crate::engine::{relock, SimTime};

#[derive(Debug, Default)]
struct Flags {
    stop_requested: bool,
    paused: bool,
}

#[derive(Debug, Default)]
struct Gate {
    flags: Mutex<Flags>,
    cond: Condvar,
}

/// Thread-safe handle for pausing, resuming, and stopping a run.
///
/// `Paused`/`Resumed` events are emitted from the calling thread, stamped
/// with the kernel's last published simulation time.
#[derive(Clone)]
pub struct ControlHandle {
    gate: Arc<Gate>,
    bus: EventBus,
    /// Kernel time mirror (nanoseconds), updated by the run loop.
    clock: Arc<AtomicU64>,
}

impl ControlHandle {
    pub(crate) fn new(bus: EventBus) -> Self {
        Self {
            gate: Arc::new(Gate::default()),
            bus,
            clock: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Simulation time as last published by the run loop.
    #[must_use]
    pub fn now(&self) -> SimTime {
        SimTime::from_nanos(self.clock.load(Ordering::Acquire))
    }

    /// Request a cooperative stop.
    ///
    /// The flag is checked at the top of every step and immediately after
    /// waking from a pause; a paused run wakes at once.
    pub fn request_stop(&self) {
        let mut flags = relock(self.gate.flags.lock());
        flags.stop_requested = true;
        flags.paused = false;
        drop(flags);
        self.gate.cond.notify_all();
    }

    /// Close the pause gate; the run blocks at the next step boundary.
    pub fn request_pause(&self) {
        let mut flags = relock(self.gate.flags.lock());
        if flags.stop_requested || flags.paused {
            return;
        }
        flags.paused = true;
        drop(flags);
        self.bus.emit(&SimEvent::Paused { t: self.now() });
    }

    /// Reopen the pause gate.
    pub fn request_resume(&self) {
        let mut flags = relock(self.gate.flags.lock());
        if !flags.paused {
            return;
        }
        flags.paused = false;
        drop(flags);
        self.gate.cond.notify_all();
        self.bus.emit(&SimEvent::Resumed { t: self.now() });
    }

    /// True once a stop has been requested.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        relock(self.gate.flags.lock()).stop_requested
    }

    /// True while the pause gate is closed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        relock(self.gate.flags.lock()).paused
    }

    /// Publish the kernel's current time for `Paused`/`Resumed` stamps.
    pub(crate) fn publish_time(&self, t: SimTime) {
        self.clock.store(t.as_nanos(), Ordering::Release);
    }

    /// Clear stop/pause flags at the start of a run.
    pub(crate) fn reset_for_run(&self) {
        let mut flags = relock(self.gate.flags.lock());
        flags.stop_requested = false;
        flags.paused = false;
    }

    /// Block while paused. Returns immediately once stop is requested.
    pub(crate) fn block_while_paused(&self) {
        let mut flags = relock(self.gate.flags.lock());
        while flags.paused && !flags.stop_requested {
            flags = relock(self.gate.cond.wait(flags));
        }
    }
}

impl std::fmt::Debug for ControlHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flags = relock(self.gate.flags.lock());
        f.debug_struct("ControlHandle")
            .field("stop_requested", &flags.stop_requested)
            .field("paused", &flags.paused)
            .finish()
    }
}
