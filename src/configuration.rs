//! Model and initial-condition configuration received from the UI

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Potential type written when none was selected
pub const DEFAULT_POTENTIAL_TYPE: &str = "tanh";

/// Validated model + initial-condition inputs for one solver run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Initial value of each field, in field order
    pub field_values: Vec<f64>,
    /// Initial velocity of each field, same length as `field_values`
    pub field_velocities: Vec<f64>,
    pub initial_time: f64,
    pub time_step: f64,
    /// First solver-tuning parameter
    pub kstar: f64,
    /// Second solver-tuning parameter
    pub cq: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_parameters: Option<Vec<f64>>,
    /// Free-form potential expression (custom potentials only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_expression: Option<String>,
}

/// Structural problems that make a configuration unrepresentable in the input file
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("at least one field is required")]
    NoFields,
    #[error("{values} field values but {velocities} field velocities")]
    FieldCountMismatch { values: usize, velocities: usize },
    #[error("{name} is not a finite number")]
    NonFinite { name: String },
    #[error("{name} must fit on a single line")]
    MultiLine { name: &'static str },
}

impl Configuration {
    /// Number of fields, derived from the field-value sequence
    pub fn field_count(&self) -> usize {
        self.field_values.len()
    }

    /// Potential type tag, falling back to `tanh`
    pub fn potential_type(&self) -> &str {
        self.potential_type
            .as_deref()
            .unwrap_or(DEFAULT_POTENTIAL_TYPE)
    }

    /// Potential parameters, empty when absent
    pub fn potential_parameters(&self) -> &[f64] {
        self.potential_parameters.as_deref().unwrap_or(&[])
    }

    /// Check the structural invariants the input file relies on.
    ///
    /// Physical plausibility is not checked here.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.field_values.is_empty() {
            return Err(ConfigurationError::NoFields);
        }
        if self.field_values.len() != self.field_velocities.len() {
            return Err(ConfigurationError::FieldCountMismatch {
                values: self.field_values.len(),
                velocities: self.field_velocities.len(),
            });
        }

        let indexed = |label: &str, values: &[f64]| {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("{}[{}]", label, i), *v))
                .collect::<Vec<_>>()
        };

        let mut numbers = indexed("fieldValues", &self.field_values);
        numbers.extend(indexed("fieldVelocities", &self.field_velocities));
        numbers.extend(indexed("potentialParameters", self.potential_parameters()));
        numbers.push(("initialTime".to_string(), self.initial_time));
        numbers.push(("timeStep".to_string(), self.time_step));
        numbers.push(("kstar".to_string(), self.kstar));
        numbers.push(("cq".to_string(), self.cq));

        if let Some((name, _)) = numbers.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigurationError::NonFinite { name });
        }

        let is_multi_line = |s: &Option<String>| {
            s.as_deref()
                .map(|s| s.contains('\n') || s.contains('\r'))
                .unwrap_or(false)
        };
        if is_multi_line(&self.potential_type) {
            return Err(ConfigurationError::MultiLine {
                name: "potentialType",
            });
        }
        if is_multi_line(&self.potential_expression) {
            return Err(ConfigurationError::MultiLine {
                name: "potentialExpression",
            });
        }

        Ok(())
    }
}
