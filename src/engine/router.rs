//! Signal routing between component ports.
//!
//! The router owns the connection graph and the signal store (an arena of
//! component id → latest-outputs map). Components never reach into each
//! other's state; everything moves through stored [`Signal`]s.
//!
//! Delivery semantics per connection follow the source signal's kind:
//! state-kind signals are polled (latest value, repeat delivery is
//! expected and harmless), event-kind signals are delivered at most once
//! per production, tracked by a per-connection watermark.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::SimTime;
use crate::error::{SimError, SimResult};
use crate::signal::{Signal, SignalValue};

/// Optional per-connection value transform.
pub type Transform = Arc<dyn Fn(&SignalValue) -> SignalValue + Send + Sync>;

/// Directed edge from one component's output port to another's input port.
///
/// Immutable once applied, except for the event-delivery watermark.
pub struct Connection {
    /// Producing component.
    pub source: String,
    /// Output port on the producing component.
    pub source_port: String,
    /// Receiving component.
    pub target: String,
    /// Input port on the receiving component.
    pub target_port: String,
    /// Optional value transform applied on delivery.
    pub transform: Option<Transform>,
    /// Watermark for at-most-once delivery of event-kind signals.
    last_event_time: Option<SimTime>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("source", &self.source)
            .field("source_port", &self.source_port)
            .field("target", &self.target)
            .field("target_port", &self.target_port)
            .field("transform", &self.transform.is_some())
            .field("last_event_time", &self.last_event_time)
            .finish()
    }
}

/// Parse a `"component.port"` reference.
///
/// An optional direction segment is accepted for readability, as in
/// `"eye.out.stream"` or `"brain.in.stimulus"`.
///
/// # Errors
///
/// Returns `SimError::Config` when the reference has no port part.
pub fn parse_ref(reference: &str) -> SimResult<(String, String)> {
    let parts: Vec<&str> = reference.split('.').collect();
    match parts.as_slice() {
        [name, dir, port, rest @ ..] if (*dir == "in" || *dir == "out") && rest.is_empty() => {
            Ok(((*name).to_string(), (*port).to_string()))
        }
        [name, port_parts @ ..] if !port_parts.is_empty() => {
            Ok(((*name).to_string(), port_parts.join(".")))
        }
        _ => Err(SimError::config(format!(
            "invalid reference '{reference}', expected 'component.port'"
        ))),
    }
}

/// A pending push delivery resolved by [`SignalRouter::push_deliveries`].
pub(crate) struct PushDelivery {
    pub target: String,
    pub target_port: String,
    pub transform: Option<Transform>,
}

/// Tracks named connections and resolves inbound signals for components.
#[derive(Debug, Default)]
pub struct SignalRouter {
    connections: Vec<Connection>,
    /// Component id → latest outputs, keyed by port name.
    store: HashMap<String, HashMap<String, Signal>>,
}

impl SignalRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a validated connection.
    pub(crate) fn add_connection(
        &mut self,
        source: String,
        source_port: String,
        target: String,
        target_port: String,
        transform: Option<Transform>,
    ) {
        self.connections.push(Connection {
            source,
            source_port,
            target,
            target_port,
            transform,
            last_event_time: None,
        });
    }

    /// All connections, in application order.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Replace the stored outputs of `source` with fresh ones.
    pub fn store_outputs(&mut self, source: &str, outputs: Vec<Signal>) {
        if outputs.is_empty() {
            return;
        }
        let slot = self.store.entry(source.to_string()).or_default();
        for signal in outputs {
            slot.insert(signal.name.clone(), signal);
        }
    }

    /// Latest stored outputs of a component, if any.
    #[must_use]
    pub fn latest(&self, source: &str) -> Option<&HashMap<String, Signal>> {
        self.store.get(source)
    }

    /// Resolve the inbound signals currently available to `target`.
    ///
    /// Delivered signals are re-stamped at `now` and renamed to the
    /// target port, but retain the original value (transformed if the
    /// connection carries a transform) and metadata.
    pub fn collect_inputs(&mut self, target: &str, now: SimTime) -> Vec<Signal> {
        let mut inputs = Vec::new();

        for conn in self
            .connections
            .iter_mut()
            .filter(|c| c.target == target)
        {
            let Some(signal) = self
                .store
                .get(&conn.source)
                .and_then(|outputs| outputs.get(&conn.source_port))
            else {
                continue;
            };

            if signal.is_event() {
                // Already delivered on this connection?
                if conn.last_event_time.is_some_and(|w| signal.time <= w) {
                    continue;
                }
                conn.last_event_time = Some(signal.time);
            }

            let value = match &conn.transform {
                Some(f) => f(&signal.value),
                None => signal.value.clone(),
            };

            inputs.push(Signal {
                source: conn.source.clone(),
                name: conn.target_port.clone(),
                value,
                time: now,
                metadata: signal.metadata.clone(),
            });
        }

        inputs
    }

    /// Resolve the receivers of a push publication from `(source, topic)`.
    ///
    /// Advances each matching connection's watermark to `produced_at` so
    /// polling does not re-deliver the same production.
    pub(crate) fn push_deliveries(
        &mut self,
        source: &str,
        topic: &str,
        produced_at: SimTime,
    ) -> Vec<PushDelivery> {
        self.connections
            .iter_mut()
            .filter(|c| c.source == source && c.source_port == topic)
            .map(|c| {
                c.last_event_time = Some(produced_at);
                PushDelivery {
                    target: c.target.clone(),
                    target_port: c.target_port.clone(),
                    transform: c.transform.clone(),
                }
            })
            .collect()
    }

    /// Drop a component's stored outputs and every connection touching it.
    pub fn remove_component(&mut self, name: &str) {
        self.store.remove(name);
        self.connections
            .retain(|c| c.source != name && c.target != name);
    }

    /// Clear the signal store and all delivery watermarks (new run).
    pub fn reset(&mut self) {
        self.store.clear();
        for conn in &mut self.connections {
            conn.last_event_time = None;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn router_a_to_b(transform: Option<Transform>) -> SignalRouter {
        let mut router = SignalRouter::new();
        router.add_connection(
            "a".to_string(),
            "out".to_string(),
            "b".to_string(),
            "in".to_string(),
            transform,
        );
        router
    }

    #[test]
    fn test_parse_ref_forms() {
        assert_eq!(
            parse_ref("eye.stream").unwrap(),
            ("eye".to_string(), "stream".to_string())
        );
        assert_eq!(
            parse_ref("eye.out.stream").unwrap(),
            ("eye".to_string(), "stream".to_string())
        );
        assert!(parse_ref("eye").is_err());
    }

    #[test]
    fn test_state_signal_redelivered_every_poll() {
        let mut router = router_a_to_b(None);
        router.store_outputs(
            "a",
            vec![Signal::state("a", "out", 1.5, SimTime::from_secs(0.1))],
        );

        for step in 1..=3 {
            let now = SimTime::from_secs(0.1 * f64::from(step));
            let inputs = router.collect_inputs("b", now);
            assert_eq!(inputs.len(), 1);
            assert_eq!(inputs[0].name, "in");
            assert_eq!(inputs[0].as_scalar(), Some(1.5));
            // Re-stamped at delivery time.
            assert_eq!(inputs[0].time, now);
        }
    }

    #[test]
    fn test_event_signal_delivered_at_most_once() {
        let mut router = router_a_to_b(None);
        router.store_outputs(
            "a",
            vec![Signal::event("a", "out", 1.0, SimTime::from_secs(0.1))],
        );

        assert_eq!(router.collect_inputs("b", SimTime::from_secs(0.2)).len(), 1);
        assert!(router.collect_inputs("b", SimTime::from_secs(0.3)).is_empty());

        // A fresh production is delivered again, once.
        router.store_outputs(
            "a",
            vec![Signal::event("a", "out", 2.0, SimTime::from_secs(0.4))],
        );
        assert_eq!(router.collect_inputs("b", SimTime::from_secs(0.4)).len(), 1);
        assert!(router.collect_inputs("b", SimTime::from_secs(0.5)).is_empty());
    }

    #[test]
    fn test_missing_source_output_is_skipped() {
        let mut router = router_a_to_b(None);
        assert!(router.collect_inputs("b", SimTime::from_secs(0.1)).is_empty());
    }

    #[test]
    fn test_transform_applied_on_delivery() {
        let double: Transform = Arc::new(|v| match v.as_scalar() {
            Some(x) => SignalValue::Scalar(x * 2.0),
            None => v.clone(),
        });
        let mut router = router_a_to_b(Some(double));
        router.store_outputs(
            "a",
            vec![Signal::state("a", "out", 3.0, SimTime::from_secs(0.1))],
        );

        let inputs = router.collect_inputs("b", SimTime::from_secs(0.2));
        assert_eq!(inputs[0].as_scalar(), Some(6.0));
        // Stored original is untouched.
        assert_eq!(
            router.latest("a").unwrap()["out"].as_scalar(),
            Some(3.0)
        );
    }

    #[test]
    fn test_push_deliveries_advance_watermark() {
        let mut router = router_a_to_b(None);
        let produced_at = SimTime::from_secs(0.1);
        router.store_outputs("a", vec![Signal::event("a", "out", 1.0, produced_at)]);

        let deliveries = router.push_deliveries("a", "out", produced_at);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].target, "b");

        // Polling must not re-deliver the pushed production.
        assert!(router.collect_inputs("b", SimTime::from_secs(0.2)).is_empty());
    }

    #[test]
    fn test_remove_component_drops_connections_and_store() {
        let mut router = router_a_to_b(None);
        router.store_outputs(
            "a",
            vec![Signal::state("a", "out", 1.0, SimTime::ZERO)],
        );
        router.remove_component("a");
        assert!(router.connections().is_empty());
        assert!(router.latest("a").is_none());
    }

    #[test]
    fn test_reset_clears_watermarks() {
        let mut router = router_a_to_b(None);
        router.store_outputs(
            "a",
            vec![Signal::event("a", "out", 1.0, SimTime::from_secs(0.1))],
        );
        assert_eq!(router.collect_inputs("b", SimTime::from_secs(0.1)).len(), 1);

        router.reset();
        assert!(router.latest("a").is_none());

        router.store_outputs(
            "a",
            vec![Signal::event("a", "out", 1.0, SimTime::from_secs(0.1))],
        );
        assert_eq!(router.collect_inputs("b", SimTime::from_secs(0.1)).len(), 1);
    }
}
