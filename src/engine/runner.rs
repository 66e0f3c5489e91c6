//! Background run driver.
//!
//! Runs a kernel on a dedicated thread while the caller keeps a
//! [`ControlHandle`] for pause/resume/stop and a status snapshot fed by
//! the lifecycle-event bus.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::engine::{relock, ControlHandle, RunReport, SimEvent, SimKernel, SimTime};
use crate::error::SimResult;

/// Snapshot of a background run's progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatus {
    /// True while the run thread is inside `run()`.
    pub running: bool,
    /// True while the pause gate is closed.
    pub paused: bool,
    /// Ticks observed so far.
    pub tick_count: u64,
    /// Rendered error, if the run failed.
    pub error: Option<String>,
}

/// A kernel run executing on a background thread.
pub struct SimRunner {
    handle: JoinHandle<(SimKernel, SimResult<RunReport>)>,
    control: ControlHandle,
    status: Arc<Mutex<RunStatus>>,
}

impl SimRunner {
    /// Spawn `kernel.run(duration)` on a background thread.
    ///
    /// The kernel is moved into the thread and handed back by
    /// [`SimRunner::join`].
    #[must_use]
    pub fn spawn(kernel: SimKernel, duration: SimTime, tick_interval: Option<SimTime>) -> Self {
        let control = kernel.control();
        let status = Arc::new(Mutex::new(RunStatus {
            running: true,
            ..RunStatus::default()
        }));

        let tracker = Arc::clone(&status);
        let listener = kernel.on(move |event| {
            let mut status = relock(tracker.lock());
            match event {
                SimEvent::Tick { .. } => status.tick_count += 1,
                SimEvent::Paused { .. } => status.paused = true,
                SimEvent::Resumed { .. } => status.paused = false,
                SimEvent::Error { message, .. } => status.error = Some(message.clone()),
                _ => {}
            }
        });

        let finish = Arc::clone(&status);
        let handle = std::thread::spawn(move || {
            let mut kernel = kernel;
            let result = kernel.run_inner_for_runner(duration, tick_interval);
            kernel.off(listener);
            relock(finish.lock()).running = false;
            (kernel, result)
        });

        Self {
            handle,
            control,
            status,
        }
    }

    /// Control handle for pause/resume/stop.
    #[must_use]
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        relock(self.status.lock()).clone()
    }

    /// True while the run thread is still working.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Wait for the run to end; returns the kernel and the run result.
    ///
    /// # Panics
    ///
    /// Panics if the run thread itself panicked, which the kernel loop
    /// does not do for component errors (those come back as `Err`).
    #[must_use]
    pub fn join(self) -> (SimKernel, SimResult<RunReport>) {
        #[allow(clippy::expect_used)]
        self.handle.join().expect("run thread panicked")
    }
}

impl SimKernel {
    // Keeps SimRunner independent of which tick mode the caller chose.
    fn run_inner_for_runner(
        &mut self,
        duration: SimTime,
        tick_interval: Option<SimTime>,
    ) -> SimResult<RunReport> {
        match tick_interval {
            Some(dt) => self.run_with_ticks(duration, dt),
            None => self.run(duration),
        }
    }
}
