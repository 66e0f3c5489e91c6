//! Render-agnostic visualization payloads.
//!
//! Components may expose `{render, data}` specs interpreted by an
//! external client (timeseries, bar, graph, table, ...). The kernel only
//! validates shape and JSON-serializability; rendering is out of scope.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A single visual specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualSpec {
    /// Visual type, e.g. `"timeseries"`, `"bar"`, `"custom:phase-plot"`.
    pub render: String,
    /// JSON object payload interpreted by the client for `render`.
    pub data: Value,
}

impl VisualSpec {
    /// Create a spec from a render type and a JSON object payload.
    #[must_use]
    pub fn new(render: impl Into<String>, data: Value) -> Self {
        Self {
            render: render.into(),
            data,
        }
    }

    /// Check shape: non-empty `render`, `data` must be a JSON object.
    ///
    /// # Errors
    ///
    /// Returns a brief reason when the spec is malformed.
    pub fn validate(&self) -> Result<(), String> {
        if self.render.is_empty() {
            return Err("'render' must be a non-empty string".to_string());
        }
        if !self.data.is_object() {
            return Err("'data' must be a JSON object".to_string());
        }
        Ok(())
    }
}

/// Visuals collected from one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentVisuals {
    /// Registered component name.
    pub component: String,
    /// Validated visual specs.
    pub visuals: Vec<VisualSpec>,
}

/// Filter a component's visuals down to the valid entries.
///
/// Invalid entries are logged at warn level and dropped; one malformed
/// payload never suppresses the others.
#[must_use]
pub fn normalize_visuals(component: &str, visuals: Vec<VisualSpec>) -> Vec<VisualSpec> {
    visuals
        .into_iter()
        .filter(|spec| match spec.validate() {
            Ok(()) => true,
            Err(reason) => {
                warn!(component, render = %spec.render, reason, "dropping malformed visual spec");
                false
            }
        })
        .collect()
}
