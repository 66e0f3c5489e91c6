//! Cross-domain time-synchronization broker.
//!
//! Coordinates several independently-paced sub-simulations ("adapters")
//! that use different native time units, propagating signals between them
//! at a shared canonical time base. Adapters are stepped synchronously,
//! in priority order, on the caller's thread; the broker adds no
//! threading model beyond the kernel's.

pub mod adaptive;
pub mod checkpoint;

use std::collections::BTreeMap;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use adaptive::AdaptiveTimeBroker;
pub use checkpoint::Checkpoint;

use crate::component::ComponentConfig;
use crate::config::SimConfig;
use crate::engine::router::{parse_ref, Transform};
use crate::engine::SimTime;
use crate::error::{SimError, SimResult};
use crate::signal::Signal;

use checkpoint::BrokerSnapshot;

/// Residual below which a remaining interval counts as zero.
///
/// Canonical broker time is f64 (adaptive halving produces non-dyadic
/// steps), so `end - now` can leave a ~1e-16 residue after the final
/// step; treat it as "arrived".
const TIME_EPS: f64 = 1e-12;

/// Default zstd level for checkpoint payloads.
const CHECKPOINT_COMPRESSION: i32 = 3;

/// Common time scales for adapter-native clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeScale {
    /// Seconds.
    #[default]
    Seconds,
    /// Milliseconds.
    #[serde(rename = "ms")]
    Milliseconds,
    /// Microseconds.
    #[serde(rename = "us")]
    Microseconds,
    /// Minutes.
    #[serde(rename = "min")]
    Minutes,
    /// Hours.
    Hours,
}

impl TimeScale {
    /// Conversion factor to seconds.
    #[must_use]
    pub const fn to_seconds(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Milliseconds => 1e-3,
            Self::Microseconds => 1e-6,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
        }
    }
}

impl FromStr for TimeScale {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seconds" | "s" => Ok(Self::Seconds),
            "ms" | "milliseconds" => Ok(Self::Milliseconds),
            "us" | "microseconds" => Ok(Self::Microseconds),
            "min" | "minutes" => Ok(Self::Minutes),
            "hours" | "h" => Ok(Self::Hours),
            other => Err(SimError::config(format!("unknown time scale '{other}'"))),
        }
    }
}

/// An opaque sub-simulation coordinated by the broker.
///
/// `advance_to` receives the target time in the adapter's *native* scale;
/// the broker performs all unit conversion. Checkpoint support is
/// optional: adapters that return `None` from [`Adapter::save_state`] are
/// skipped (best-effort snapshots).
pub trait Adapter: Send {
    /// Initialize the adapter for a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid for this adapter.
    fn setup(&mut self, config: &ComponentConfig) -> SimResult<()> {
        let _ = config;
        Ok(())
    }

    /// Reset the adapter to initial conditions. Default is a no-op.
    fn reset(&mut self) {}

    /// Advance to `native_t`, expressed in the adapter's own time unit.
    ///
    /// # Errors
    ///
    /// Returns an error on adapter failure; the broker propagates it.
    fn advance_to(&mut self, native_t: f64) -> SimResult<()>;

    /// Receive input signals propagated from other adapters.
    ///
    /// # Errors
    ///
    /// Returns an error on adapter failure.
    fn set_inputs(&mut self, inputs: Vec<Signal>) -> SimResult<()> {
        let _ = inputs;
        Ok(())
    }

    /// Current output signals.
    fn outputs(&self) -> Vec<Signal>;

    /// Opaque serialized state for checkpointing; `None` = unsupported.
    fn save_state(&self) -> Option<Vec<u8>> {
        None
    }

    /// Restore previously saved state.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be applied.
    fn restore_state(&mut self, state: &[u8]) -> SimResult<()> {
        let _ = state;
        Ok(())
    }
}

struct AdapterEntry {
    adapter: Box<dyn Adapter>,
    time_scale: TimeScale,
    priority: i32,
    /// Rate limit in the adapter's native units.
    min_dt: f64,
    /// Last synchronization time in canonical units; never decreases
    /// except through rollback.
    last_time: f64,
}

struct BrokerConnection {
    source: String,
    source_signal: String,
    target: String,
    target_signal: String,
    transform: Option<Transform>,
}

/// Coordinates time advancement across multiple adapters.
///
/// Maintains a canonical time and converts to each adapter's native
/// scale as needed.
///
/// # Example
///
/// ```no_run
/// use simloom::broker::{TimeBroker, TimeScale};
/// use simloom::config::SimConfig;
///
/// # fn adapters() -> (Box<dyn simloom::broker::Adapter>, Box<dyn simloom::broker::Adapter>) { unimplemented!() }
/// let (metabolism, neurons) = adapters();
/// let mut broker = TimeBroker::new(TimeScale::Seconds);
/// broker.register("metabolism", metabolism, TimeScale::Seconds, 0, 0.0)?;
/// broker.register("neurons", neurons, TimeScale::Milliseconds, 1, 0.1)?;
/// broker.connect("metabolism.atp", "neurons.energy")?;
/// broker.setup(&SimConfig::default())?;
/// for t in broker.run(10.0, 0.001) {
///     let _t = t?;
/// }
/// # simloom::SimResult::Ok(())
/// ```
pub struct TimeBroker {
    canonical: TimeScale,
    adapters: IndexMap<String, AdapterEntry>,
    connections: Vec<BrokerConnection>,
    now: f64,
    checkpoints: Vec<Checkpoint>,
    is_setup: bool,
}

impl Default for TimeBroker {
    fn default() -> Self {
        Self::new(TimeScale::Seconds)
    }
}

impl TimeBroker {
    /// Create a broker with the given canonical time scale.
    #[must_use]
    pub fn new(canonical: TimeScale) -> Self {
        Self {
            canonical,
            adapters: IndexMap::new(),
            connections: Vec::new(),
            now: 0.0,
            checkpoints: Vec::new(),
            is_setup: false,
        }
    }

    /// Register an adapter.
    ///
    /// `min_dt` is the adapter's rate limit in its *native* units; zero
    /// disables rate limiting.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` on duplicate names or negative
    /// `min_dt`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        adapter: Box<dyn Adapter>,
        time_scale: TimeScale,
        priority: i32,
        min_dt: f64,
    ) -> SimResult<()> {
        let name = name.into();
        if self.adapters.contains_key(&name) {
            return Err(SimError::config(format!(
                "adapter name already registered: {name}"
            )));
        }
        if min_dt < 0.0 || !min_dt.is_finite() {
            return Err(SimError::config(format!(
                "adapter '{name}' min_dt must be finite and non-negative, got {min_dt}"
            )));
        }
        self.adapters.insert(
            name,
            AdapterEntry {
                adapter,
                time_scale,
                priority,
                min_dt,
                last_time: 0.0,
            },
        );
        Ok(())
    }

    /// Connect a signal between adapters, `"adapter.signal"` refs.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Config` for malformed refs or unknown adapters.
    pub fn connect(&mut self, source: &str, target: &str) -> SimResult<()> {
        self.connect_with(source, target, None)
    }

    /// [`TimeBroker::connect`] with a value transform.
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
        let (src_name, src_signal) = parse_ref(source)?;
        let (dst_name, dst_signal) = parse_ref(target)?;
        if !self.adapters.contains_key(&src_name) {
            return Err(SimError::config(format!(
                "connect {source}: unknown adapter '{src_name}'"
            )));
        }
        if !self.adapters.contains_key(&dst_name) {
            return Err(SimError::config(format!(
                "connect {source} -> {target}: unknown adapter '{dst_name}'"
            )));
        }
        self.connections.push(BrokerConnection {
            source: src_name,
            source_signal: src_signal,
            target: dst_name,
            target_signal: dst_signal,
            transform,
        });
        Ok(())
    }

    /// Set up all registered adapters in priority-descending order and
    /// reset canonical time to zero.
    ///
    /// # Errors
    ///
    /// Propagates adapter setup failures.
    pub fn setup(&mut self, config: &SimConfig) -> SimResult<()> {
        let mut order: Vec<String> = self.adapters.keys().cloned().collect();
        order.sort_by_key(|name| std::cmp::Reverse(self.adapters[name].priority));

        for name in &order {
            let entry = &mut self.adapters[name];
            entry.adapter.setup(&config.component(name))?;
            entry.last_time = 0.0;
        }

        self.now = 0.0;
        self.is_setup = true;
        Ok(())
    }

    fn from_canonical(&self, t: f64, scale: TimeScale) -> f64 {
        t * self.canonical.to_seconds() / scale.to_seconds()
    }

    /// Propagate current outputs across all connections.
    ///
    /// A delivery failure in one adapter is logged and skipped so a
    /// single misbehaving adapter cannot take down the whole step.
    fn propagate_signals(&mut self) {
        for i in 0..self.connections.len() {
            let conn = &self.connections[i];
            let Some(signal) = self
                .adapters
                .get(&conn.source)
                .and_then(|entry| {
                    entry
                        .adapter
                        .outputs()
                        .into_iter()
                        .find(|s| s.name == conn.source_signal)
                })
            else {
                continue;
            };

            let value = match &conn.transform {
                Some(f) => f(&signal.value),
                None => signal.value.clone(),
            };
            let delivered = Signal {
                source: conn.source.clone(),
                name: conn.target_signal.clone(),
                value,
                time: SimTime::from_secs(self.now * self.canonical.to_seconds()),
                metadata: signal.metadata,
            };

            let target = self.connections[i].target.clone();
            if let Some(entry) = self.adapters.get_mut(&target) {
                if let Err(err) = entry.adapter.set_inputs(vec![delivered]) {
                    warn!(adapter = %target, error = %err, "signal propagation failed; skipping");
                }
            }
        }
    }

    /// Advance all adapters by `dt` canonical units.
    ///
    /// Signals propagate before stepping, so each adapter advances having
    /// already seen this tick's inputs. Adapters whose elapsed native
    /// interval is below their `min_dt` are skipped.
    ///
    /// # Errors
    ///
    /// `SimError::NotSetUp` before [`TimeBroker::setup`];
    /// `SimError::Config` for a non-positive `dt`; adapter failures
    /// propagate.
    pub fn step(&mut self, dt: f64) -> SimResult<f64> {
        if !self.is_setup {
            return Err(SimError::NotSetUp);
        }
        if dt <= 0.0 || !dt.is_finite() {
            return Err(SimError::config(format!(
                "step dt must be positive and finite, got {dt}"
            )));
        }

        let target = self.now + dt;
        self.propagate_signals();

        let mut order: Vec<String> = self.adapters.keys().cloned().collect();
        order.sort_by_key(|name| std::cmp::Reverse(self.adapters[name].priority));

        for name in &order {
            let scale = self.adapters[name].time_scale;
            let native_target = self.from_canonical(target, scale);
            let native_last = self.from_canonical(self.adapters[name].last_time, scale);
            let entry = &mut self.adapters[name];

            if native_target - native_last < entry.min_dt {
                debug!(adapter = %name, "elapsed below min_dt, skipping advance");
                continue;
            }

            entry.adapter.advance_to(native_target)?;
            entry.last_time = target;
        }

        self.now = target;
        Ok(self.now)
    }

    /// Run for `duration` canonical units in steps of `dt`.
    ///
    /// Returns a lazy, finite, non-restartable sequence of canonical
    /// times, one per step. The final step is shortened to land exactly
    /// on `now + duration`.
    pub fn run(&mut self, duration: f64, dt: f64) -> BrokerRun<'_> {
        let end = self.now + duration;
        BrokerRun {
            broker: self,
            end,
            dt,
            done: false,
        }
    }

    /// [`TimeBroker::run`] with a callback invoked after each step.
    ///
    /// # Errors
    ///
    /// Propagates the first step failure.
    pub fn run_with(
        &mut self,
        duration: f64,
        dt: f64,
        mut callback: impl FnMut(f64),
    ) -> SimResult<()> {
        for t in self.run(duration, dt) {
            callback(t?);
        }
        Ok(())
    }

    /// Snapshot canonical time and each adapter's serializable state.
    ///
    /// Adapters without serialization support are skipped (best-effort).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or compression fails.
    pub fn checkpoint(&mut self) -> SimResult<usize> {
        let mut states = BTreeMap::new();
        for (name, entry) in &self.adapters {
            if let Some(bytes) = entry.adapter.save_state() {
                states.insert(name.clone(), bytes);
            }
        }
        let snapshot = BrokerSnapshot {
            time: self.now,
            adapters: states,
        };
        self.checkpoints
            .push(Checkpoint::create(&snapshot, CHECKPOINT_COMPRESSION)?);
        Ok(self.checkpoints.len() - 1)
    }

    /// Restore canonical time and adapter states from checkpoint `id`,
    /// discarding all later checkpoints (no redo after rollback).
    ///
    /// # Errors
    ///
    /// `SimError::CheckpointNotFound` for an unknown id;
    /// `SimError::CheckpointIntegrity` on hash mismatch; adapter restore
    /// failures propagate.
    pub fn rollback(&mut self, id: usize) -> SimResult<()> {
        let snapshot = self
            .checkpoints
            .get(id)
            .ok_or(SimError::CheckpointNotFound(id))?
            .restore()?;

        self.now = snapshot.time;
        for (name, bytes) in &snapshot.adapters {
            if let Some(entry) = self.adapters.get_mut(name) {
                entry.adapter.restore_state(bytes)?;
            }
        }
        for entry in self.adapters.values_mut() {
            entry.last_time = self.now;
        }
        self.checkpoints.truncate(id + 1);
        Ok(())
    }

    /// Number of stored checkpoints.
    #[must_use]
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Reset all adapters to initial conditions and clear checkpoints.
    pub fn reset(&mut self) {
        for entry in self.adapters.values_mut() {
            entry.adapter.reset();
            entry.last_time = 0.0;
        }
        self.now = 0.0;
        self.checkpoints.clear();
    }

    /// Current canonical time.
    #[must_use]
    pub const fn current_time(&self) -> f64 {
        self.now
    }

    /// Registered adapter names, in registration order.
    #[must_use]
    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    /// Current outputs of a named adapter.
    #[must_use]
    pub fn outputs_of(&self, name: &str) -> Option<Vec<Signal>> {
        self.adapters.get(name).map(|e| e.adapter.outputs())
    }

    /// Look up one signal by `"adapter.signal"` path.
    #[must_use]
    pub fn signal(&self, path: &str) -> Option<Signal> {
        let (name, signal) = parse_ref(path).ok()?;
        self.outputs_of(&name)?
            .into_iter()
            .find(|s| s.name == signal)
    }
}

impl std::fmt::Debug for TimeBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeBroker")
            .field("canonical", &self.canonical)
            .field("adapters", &self.adapters.len())
            .field("connections", &self.connections.len())
            .field("now", &self.now)
            .field("checkpoints", &self.checkpoints.len())
            .finish()
    }
}

/// Lazy, finite, non-restartable step sequence from [`TimeBroker::run`].
pub struct BrokerRun<'a> {
    broker: &'a mut TimeBroker,
    end: f64,
    dt: f64,
    done: bool,
}

impl Iterator for BrokerRun<'_> {
    type Item = SimResult<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let remaining = self.end - self.broker.now;
        if remaining <= TIME_EPS {
            self.done = true;
            return None;
        }

        let step_dt = self.dt.min(remaining);
        match self.broker.step(step_dt) {
            Ok(t) => Some(Ok(t)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
