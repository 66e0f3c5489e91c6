//! # simloom
//!
//! A discrete-event orchestration kernel for multi-rate simulations.
//!
//! Heterogeneous components advance on independent time grids while the
//! kernel keeps event ordering deterministic and routes signals between
//! them:
//! - Due-time scheduling with priority and FIFO tie-breaking
//! - State and event signal routing with at-most-once event delivery
//! - Cooperative pause/resume/stop from other threads
//! - Cross-domain time synchronization with checkpoint and rollback
//!
//! ## Example
//!
//! ```rust
//! use simloom::prelude::*;
//!
//! let mut kernel = SimKernel::new();
//! let report = kernel.run(SimTime::from_secs(1.0))?;
//! assert_eq!(report.outcome, RunOutcome::Completed);
//! # simloom::SimResult::Ok(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp, // Step boundaries are exact by construction
    clippy::no_effect_underscore_binding,
    clippy::too_many_lines,
    clippy::missing_const_for_fn, // Many functions can't be const in stable Rust
)]

pub mod broker;
pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod signal;
pub mod visuals;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::broker::{Adapter, AdaptiveTimeBroker, TimeBroker, TimeScale};
    pub use crate::component::{Component, ComponentConfig};
    pub use crate::config::SimConfig;
    pub use crate::engine::{
        ControlHandle, RunOutcome, RunReport, SimEvent, SimKernel, SimRunner, SimTime,
    };
    pub use crate::error::{SimError, SimResult};
    pub use crate::signal::{Signal, SignalKind, SignalMetadata, SignalValue};
    pub use crate::visuals::VisualSpec;
}

/// Re-export for public API
pub use error::{SimError, SimResult};

/// Crate version captured at build time (see `build.rs`).
pub const VERSION: &str = env!("SIMLOOM_VERSION");
