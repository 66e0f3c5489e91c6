//! The capability contract every pluggable simulation unit implements.
//!
//! A component advances on its own minimum time increment, exchanges
//! [`Signal`]s through the kernel's router, and self-reports when it is
//! next due. The kernel holds components as opaque trait objects and never
//! inspects concrete types.

use std::collections::BTreeSet;

use crate::engine::SimTime;
use crate::error::SimResult;
use crate::signal::Signal;
use crate::visuals::VisualSpec;

/// Per-component configuration payload, as parsed from YAML.
pub type ComponentConfig = serde_yaml::Value;

/// A pluggable simulation unit with its own pacing.
///
/// `Send` is required so a kernel can be driven from a background thread
/// (see [`crate::engine::runner::SimRunner`]).
pub trait Component: Send {
    /// Minimum time step for this component.
    ///
    /// Must be strictly positive; registration rejects components that
    /// report [`SimTime::ZERO`].
    fn min_dt(&self) -> SimTime;

    /// Initialize the component for a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid for this component.
    fn setup(&mut self, config: &ComponentConfig) -> SimResult<()> {
        let _ = config;
        Ok(())
    }

    /// Reset the component to its initial state. Default is a no-op.
    fn reset(&mut self) {}

    /// Advance the component's internal state to time `t`.
    ///
    /// # Errors
    ///
    /// Returns an error on component failure; the kernel aborts the run,
    /// emitting `Error` then `Finished` before propagating it.
    fn advance_to(&mut self, t: SimTime) -> SimResult<()>;

    /// Receive input signals for the next advance step.
    ///
    /// Each signal's `name` is the *target port* it was delivered to.
    ///
    /// # Errors
    ///
    /// Returns an error on component failure.
    fn set_inputs(&mut self, inputs: Vec<Signal>) -> SimResult<()> {
        let _ = inputs;
        Ok(())
    }

    /// Current output signals, one per output port.
    fn outputs(&self) -> Vec<Signal>;

    /// The next time this component should be stepped.
    ///
    /// Invariant: the returned time must be strictly greater than `now`.
    fn next_due_time(&self, now: SimTime) -> SimTime {
        now + self.min_dt()
    }

    /// Declared input port names. Empty means permissive (no validation).
    fn input_ports(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Declared output port names. Empty means permissive (no validation).
    fn output_ports(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Render-agnostic visualization payloads, if the component has any.
    fn visuals(&self) -> Option<Vec<VisualSpec>> {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Constant;

    impl Component for Constant {
        fn min_dt(&self) -> SimTime {
            SimTime::from_secs(0.5)
        }

        fn advance_to(&mut self, _t: SimTime) -> SimResult<()> {
            Ok(())
        }

        fn outputs(&self) -> Vec<Signal> {
            vec![Signal::state("c", "value", 1.0, SimTime::ZERO)]
        }
    }

    #[test]
    fn test_default_next_due_time_adds_min_dt() {
        let c = Constant;
        let due = c.next_due_time(SimTime::from_secs(1.0));
        assert_eq!(due, SimTime::from_secs(1.5));
    }

    #[test]
    fn test_default_ports_are_permissive() {
        let c = Constant;
        assert!(c.input_ports().is_empty());
        assert!(c.output_ports().is_empty());
        assert!(c.visuals().is_none());
    }
}
