//! Boundary validation errors.
//!
//! Nothing in here is raised by the evaluator. Unit configuration is checked
//! when a [`MonitoredUnit`](crate::MonitoredUnit) is built, and readings are
//! checked by whoever accepts them before calling
//! [`evaluate`](crate::evaluate).

use thiserror::Error;

/// A unit configuration that cannot be monitored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unit id is empty")]
    EmptyId,

    #[error("unit '{id}': location is empty")]
    EmptyLocation { id: String },

    #[error("unit '{id}': band bounds must be finite numbers")]
    NonFiniteBound { id: String },

    #[error("unit '{id}': target_min ({min}) must be less than target_max ({max})")]
    InvalidBand { id: String, min: f64, max: f64 },
}

/// A temperature reading that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("temperature reading must be a finite number, got {0}")]
    NonFinite(f64),

    #[error("'{0}' is not a valid temperature")]
    NotANumber(String),
}

/// Accept a numeric reading only if it is finite.
pub fn validate_reading(temp: f64) -> Result<f64, InputError> {
    if temp.is_finite() {
        Ok(temp)
    } else {
        Err(InputError::NonFinite(temp))
    }
}

/// Parse a reading typed by an operator ("38", " 41.5 ", "-3").
pub fn parse_reading(input: &str) -> Result<f64, InputError> {
    let trimmed = input.trim();
    let temp: f64 = trimmed
        .parse()
        .map_err(|_| InputError::NotANumber(trimmed.to_string()))?;
    validate_reading(temp)
}
