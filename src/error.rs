//! Error types for simloom.
//!
//! All fallible operations return `Result<T, SimError>` instead of
//! panicking. Configuration problems are surfaced at registration/wiring
//! time, never mid-run; a cooperative stop is *not* an error and is
//! reported through [`crate::engine::RunOutcome`] instead.

use thiserror::Error;

use crate::engine::SimTime;

/// Result type alias for simloom operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all simloom operations.
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Configuration errors (pre-run) =====
    /// Invalid registration, wiring, or configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // ===== Scheduling errors (fatal, mid-run) =====
    /// A component reported a next due time that does not advance the clock.
    ///
    /// A component that does not advance time would stall the scheduler, so
    /// this aborts the run immediately.
    #[error(
        "Scheduling invariant violated: component '{component}' reported next due time {due} at t={now}"
    )]
    SchedulingInvariant {
        /// Name of the offending component.
        component: String,
        /// Current simulation time.
        now: SimTime,
        /// The invalid due time (must be > `now`).
        due: SimTime,
    },

    // ===== Component failures =====
    /// A component failed during setup, input delivery, or advance.
    #[error("Component '{component}' failed: {message}")]
    Component {
        /// Name of the failing component.
        component: String,
        /// Description of the failure.
        message: String,
    },

    /// Operation requires `setup()` to have been called first.
    #[error("Not set up: call setup() before stepping or running")]
    NotSetUp,

    // ===== Checkpoint errors =====
    /// Checkpoint id does not refer to a stored checkpoint.
    #[error("Checkpoint not found: id {0}")]
    CheckpointNotFound(usize),

    /// Checkpoint integrity violation.
    #[error("Checkpoint integrity violation: hash mismatch")]
    CheckpointIntegrity,

    // ===== I/O and serialization =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a component failure error.
    #[must_use]
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// True for errors raised before any run starts.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::YamlParse(_) | Self::Validation(_)
        )
    }
}
