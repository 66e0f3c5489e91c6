//! Adaptive step sizing on top of [`TimeBroker`].
//!
//! Watches scalar outputs between steps and adjusts the step size: fast
//! change shrinks the step for accuracy, slow change grows it for
//! throughput.

use std::collections::HashMap;

use tracing::debug;

use crate::config::{AdaptiveSettings, SimConfig};
use crate::engine::router::Transform;
use crate::error::SimResult;
use crate::signal::Signal;

use super::{TimeBroker, TimeScale, TIME_EPS};

/// Step growth factor applied when outputs are quiet.
const GROWTH_FACTOR: f64 = 1.5;

/// A [`TimeBroker`] that adjusts its own step size.
///
/// The error estimate is the largest relative change of any scalar
/// output signal since the previous step. Above the tolerance the step
/// halves; below a tenth of it the step grows by 1.5x. Both are clamped
/// to the configured `[min_dt, max_dt]` range.
pub struct AdaptiveTimeBroker {
    broker: TimeBroker,
    min_dt: f64,
    max_dt: f64,
    tolerance: f64,
    current_dt: f64,
    last_scalars: HashMap<String, HashMap<String, f64>>,
}

impl AdaptiveTimeBroker {
    /// Create an adaptive broker; the initial step is `max_dt`.
    #[must_use]
    pub fn new(canonical: TimeScale, settings: &AdaptiveSettings) -> Self {
        Self {
            broker: TimeBroker::new(canonical),
            min_dt: settings.min_dt,
            max_dt: settings.max_dt,
            tolerance: settings.error_tolerance,
            current_dt: settings.max_dt,
            last_scalars: HashMap::new(),
        }
    }

    /// Register an adapter. See [`TimeBroker::register`].
    ///
    /// # Errors
    ///
    /// Same as [`TimeBroker::register`].
    pub fn register(
        &mut self,
        name: impl Into<String>,
        adapter: Box<dyn super::Adapter>,
        time_scale: TimeScale,
        priority: i32,
        min_dt: f64,
    ) -> SimResult<()> {
        self.broker
            .register(name, adapter, time_scale, priority, min_dt)
    }

    /// Connect a signal between adapters. See [`TimeBroker::connect`].
    ///
    /// # Errors
    ///
    /// Same as [`TimeBroker::connect`].
    pub fn connect(&mut self, source: &str, target: &str) -> SimResult<()> {
        self.broker.connect(source, target)
    }

    /// [`AdaptiveTimeBroker::connect`] with a value transform.
    ///
    /// # Errors
    ///
    /// Same as [`TimeBroker::connect`].
    pub fn connect_with(
        &mut self,
        source: &str,
        target: &str,
        transform: Option<Transform>,
    ) -> SimResult<()> {
        self.broker.connect_with(source, target, transform)
    }

    /// Set up adapters and reset the step size to `max_dt`.
    ///
    /// # Errors
    ///
    /// Same as [`TimeBroker::setup`].
    pub fn setup(&mut self, config: &SimConfig) -> SimResult<()> {
        self.broker.setup(config)?;
        self.current_dt = self.max_dt;
        self.last_scalars.clear();
        Ok(())
    }

    /// Advance one step.
    ///
    /// `dt` overrides the adaptive step for this call only; the error
    /// estimate still updates the step used by subsequent calls.
    ///
    /// # Errors
    ///
    /// Same as [`TimeBroker::step`].
    pub fn step(&mut self, dt: Option<f64>) -> SimResult<f64> {
        let step_dt = dt.unwrap_or(self.current_dt);
        let t = self.broker.step(step_dt)?;

        let error = self.estimate_error();
        self.record_scalars();
        self.update_dt(error);
        Ok(t)
    }

    /// Run for `duration` canonical units using the adaptive step.
    ///
    /// `dt` fixes the step for the whole run instead. The final step is
    /// shortened to land exactly on the end time.
    ///
    /// # Errors
    ///
    /// Propagates the first step failure.
    pub fn run(&mut self, duration: f64, dt: Option<f64>) -> SimResult<f64> {
        let end = self.broker.current_time() + duration;
        loop {
            let remaining = end - self.broker.current_time();
            if remaining <= TIME_EPS {
                return Ok(self.broker.current_time());
            }
            let step_dt = dt.unwrap_or(self.current_dt).min(remaining);
            self.step(Some(step_dt))?;
        }
    }

    /// Largest relative change of any scalar output since the last step.
    fn estimate_error(&self) -> f64 {
        let mut max_error: f64 = 0.0;
        for name in self.broker.adapter_names() {
            let Some(outputs) = self.broker.outputs_of(name) else {
                continue;
            };
            let Some(prior) = self.last_scalars.get(name) else {
                continue;
            };
            for signal in &outputs {
                let Some(value) = signal.value.as_scalar() else {
                    continue;
                };
                let Some(&last) = prior.get(&signal.name) else {
                    continue;
                };
                if last.abs() > f64::EPSILON {
                    max_error = max_error.max(((value - last) / last).abs());
                }
            }
        }
        max_error
    }

    fn record_scalars(&mut self) {
        for name in self
            .broker
            .adapter_names()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
        {
            let Some(outputs) = self.broker.outputs_of(&name) else {
                continue;
            };
            let scalars: HashMap<String, f64> = outputs
                .iter()
                .filter_map(|s| s.value.as_scalar().map(|v| (s.name.clone(), v)))
                .collect();
            self.last_scalars.insert(name, scalars);
        }
    }

    fn update_dt(&mut self, error: f64) {
        let previous = self.current_dt;
        if error > self.tolerance {
            self.current_dt = (self.current_dt / 2.0).max(self.min_dt);
        } else if error < self.tolerance / 10.0 {
            self.current_dt = (self.current_dt * GROWTH_FACTOR).min(self.max_dt);
        }
        if (self.current_dt - previous).abs() > f64::EPSILON {
            debug!(error, from = previous, to = self.current_dt, "adjusted step size");
        }
    }

    /// The step size the next non-overridden call will use.
    #[must_use]
    pub const fn current_dt(&self) -> f64 {
        self.current_dt
    }

    /// Snapshot broker state. See [`TimeBroker::checkpoint`].
    ///
    /// # Errors
    ///
    /// Same as [`TimeBroker::checkpoint`].
    pub fn checkpoint(&mut self) -> SimResult<usize> {
        self.broker.checkpoint()
    }

    /// Restore broker state. See [`TimeBroker::rollback`].
    ///
    /// # Errors
    ///
    /// Same as [`TimeBroker::rollback`].
    pub fn rollback(&mut self, id: usize) -> SimResult<()> {
        self.broker.rollback(id)
    }

    /// Reset adapters and restore the initial step size.
    pub fn reset(&mut self) {
        self.broker.reset();
        self.current_dt = self.max_dt;
        self.last_scalars.clear();
    }

    /// Current canonical time.
    #[must_use]
    pub const fn current_time(&self) -> f64 {
        self.broker.current_time()
    }

    /// Current outputs of a named adapter.
    #[must_use]
    pub fn outputs_of(&self, name: &str) -> Option<Vec<Signal>> {
        self.broker.outputs_of(name)
    }

    /// Look up one signal by `"adapter.signal"` path.
    #[must_use]
    pub fn signal(&self, path: &str) -> Option<Signal> {
        self.broker.signal(path)
    }
}

impl std::fmt::Debug for AdaptiveTimeBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveTimeBroker")
            .field("broker", &self.broker)
            .field("min_dt", &self.min_dt)
            .field("max_dt", &self.max_dt)
            .field("tolerance", &self.tolerance)
            .field("current_dt", &self.current_dt)
            .finish()
    }
}
