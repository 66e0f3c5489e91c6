//! Configuration with YAML schema and validation.
//!
//! Mistake-proofing happens in three layers: type-safe structs, serde
//! schema checks (`deny_unknown_fields`), and runtime semantic validation
//! for constraints the schema cannot express.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::component::ComponentConfig;
use crate::error::{SimError, SimResult};

/// Top-level simulation configuration.
///
/// Loaded from YAML; the `components` section holds opaque per-component
/// payloads handed to [`crate::component::Component::setup`] untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Run settings (duration, tick cadence).
    #[validate(nested)]
    #[serde(default)]
    pub run: RunSettings,

    /// Per-component configuration payloads, keyed by registered name.
    /// Insertion order is preserved.
    #[serde(default)]
    pub components: IndexMap<String, ComponentConfig>,

    /// Adaptive step sizing for the time-synchronization broker.
    #[validate(nested)]
    #[serde(default)]
    pub adaptive: AdaptiveSettings,
}

/// Run settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    /// Default run duration in seconds.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_duration")]
    pub duration: f64,

    /// Tick cadence in seconds; `None` ticks once per component advance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval: Option<f64>,
}

fn default_duration() -> f64 {
    1.0
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            tick_interval: None,
        }
    }
}

/// Adaptive step-sizing bounds and tolerance for the broker.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AdaptiveSettings {
    /// Smallest allowed canonical step.
    #[serde(default = "default_min_dt")]
    pub min_dt: f64,

    /// Largest allowed canonical step.
    #[serde(default = "default_max_dt")]
    pub max_dt: f64,

    /// Target relative-change tolerance for step-size selection.
    #[serde(default = "default_error_tolerance")]
    pub error_tolerance: f64,
}

fn default_min_dt() -> f64 {
    1e-6
}

fn default_max_dt() -> f64 {
    0.1
}

fn default_error_tolerance() -> f64 {
    0.01
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            min_dt: default_min_dt(),
            max_dt: default_max_dt(),
            error_tolerance: default_error_tolerance(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, YAML parsing fails,
    /// or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        config.validate_semantic()?;
        Ok(config)
    }

    /// Configuration payload for a named component (`Null` when absent).
    #[must_use]
    pub fn component(&self, name: &str) -> ComponentConfig {
        self.components
            .get(name)
            .cloned()
            .unwrap_or(ComponentConfig::Null)
    }

    /// Validate semantic constraints beyond schema.
    fn validate_semantic(&self) -> SimResult<()> {
        if let Some(tick) = self.run.tick_interval {
            if tick <= 0.0 || !tick.is_finite() {
                return Err(SimError::config("run.tick_interval must be positive"));
            }
        }
        if !self.run.duration.is_finite() {
            return Err(SimError::config("run.duration must be finite"));
        }

        let adaptive = &self.adaptive;
        if adaptive.min_dt <= 0.0 || !adaptive.min_dt.is_finite() {
            return Err(SimError::config("adaptive.min_dt must be positive"));
        }
        if adaptive.max_dt < adaptive.min_dt {
            return Err(SimError::config(format!(
                "adaptive.max_dt ({}) must be >= adaptive.min_dt ({})",
                adaptive.max_dt, adaptive.min_dt
            )));
        }
        if adaptive.error_tolerance <= 0.0 {
            return Err(SimError::config("adaptive.error_tolerance must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate_semantic().is_ok());
        assert!((config.run.duration - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r"
run:
  duration: 10.0
  tick_interval: 0.5
components:
  osc:
    frequency: 2.0
  sink: {}
adaptive:
  min_dt: 0.001
  max_dt: 0.1
  error_tolerance: 0.05
";
        let config = SimConfig::from_yaml(yaml).unwrap();
        assert!((config.run.duration - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.run.tick_interval, Some(0.5));
        assert_eq!(config.components.len(), 2);
        // Insertion order preserved.
        let names: Vec<&String> = config.components.keys().collect();
        assert_eq!(names, ["osc", "sink"]);
    }

    #[test]
    fn test_component_payload_lookup() {
        let yaml = "components:\n  osc:\n    gain: 3.0\n";
        let config = SimConfig::from_yaml(yaml).unwrap();
        let payload = config.component("osc");
        assert!((payload["gain"].as_f64().unwrap() - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.component("missing"), ComponentConfig::Null);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(SimConfig::from_yaml("bogus_section: 1\n").is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let err = SimConfig::from_yaml("run:\n  tick_interval: 0.0\n").unwrap_err();
        assert!(err.to_string().contains("tick_interval"));
    }

    #[test]
    fn test_inverted_adaptive_bounds_rejected() {
        let yaml = "adaptive:\n  min_dt: 0.1\n  max_dt: 0.01\n";
        assert!(SimConfig::from_yaml(yaml).is_err());
    }
}
