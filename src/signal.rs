//! Signal envelope — the neutral interchange format between components.
//!
//! Signals carry a value, the simulation time of production, and metadata
//! so components can exchange data with consistent semantics. A signal is
//! immutable once constructed; producers replace their stored output each
//! time they advance rather than mutating a previously emitted signal.

use serde::{Deserialize, Serialize};

use crate::engine::SimTime;

/// Delivery semantics of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Latest-value semantics: delivered every time the receiver advances.
    #[default]
    State,
    /// Consume-once semantics: delivered at most once per production.
    Event,
}

/// Metadata describing a signal's semantics and units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalMetadata {
    /// Physical units (e.g. `"mV"`, `"Hz"`). `None` if dimensionless.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    /// Expected shape for vector values. `None` for scalars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,

    /// Human-readable description of what this signal represents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Expected minimum value (for validation/visualization).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    /// Expected maximum value (for validation/visualization).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,

    /// Data type hint (e.g. `"f64"`, `"bool"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,

    /// Delivery semantics. Defaults to [`SignalKind::State`].
    #[serde(default)]
    pub kind: SignalKind,
}

impl SignalMetadata {
    /// Metadata for an event-kind signal.
    #[must_use]
    pub fn event() -> Self {
        Self {
            kind: SignalKind::Event,
            ..Self::default()
        }
    }
}

/// Signal payload: scalar, vector, or structured data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// A single numeric value.
    Scalar(f64),
    /// A numeric vector.
    Vector(Vec<f64>),
    /// Structured payload (JSON object, string, etc.).
    Data(serde_json::Value),
}

impl SignalValue {
    /// Get the value as a scalar, if it is one.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a vector slice, if it is one.
    #[must_use]
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// True for scalar payloads.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<f64>> for SignalValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Vector(v)
    }
}

impl From<serde_json::Value> for SignalValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Data(v)
    }
}

/// A signal passed between components.
///
/// Signals are the standard interchange format for cross-component
/// communication: a value plus its source, production time, and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Identifier of the producing component.
    pub source: String,

    /// Port/topic name of this signal.
    pub name: String,

    /// The signal value.
    pub value: SignalValue,

    /// Simulation time when this signal was produced.
    pub time: SimTime,

    /// Metadata about the signal.
    #[serde(default)]
    pub metadata: SignalMetadata,
}

impl Signal {
    /// Create a state-kind signal.
    #[must_use]
    pub fn state(
        source: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<SignalValue>,
        time: SimTime,
    ) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            value: value.into(),
            time,
            metadata: SignalMetadata::default(),
        }
    }

    /// Create an event-kind signal.
    #[must_use]
    pub fn event(
        source: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<SignalValue>,
        time: SimTime,
    ) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            value: value.into(),
            time,
            metadata: SignalMetadata::event(),
        }
    }

    /// Attach metadata to the signal.
    #[must_use]
    pub fn with_metadata(mut self, metadata: SignalMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Get the value as a scalar, if it is one.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        self.value.as_scalar()
    }

    /// True for event-kind signals.
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.metadata.kind == SignalKind::Event
    }
}
