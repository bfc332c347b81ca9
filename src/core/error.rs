use thiserror::Error;

use crate::core::types::{InventoryId, ResourceName, SimTime};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Non-finite {what}: {value}")]
    NonFiniteInput { what: String, value: f64 },

    #[error("Negative {what}: {value}")]
    NegativeInput { what: String, value: f64 },

    #[error("Changepoint {predicted} precedes current time {current}")]
    TemporalRegression { current: SimTime, predicted: SimTime },

    #[error("No progress after {updates} zero-length updates at time {time}")]
    NoProgress { time: SimTime, updates: u32 },

    #[error("Requested time {requested} is before last update {last_update}")]
    TimeReversal { requested: SimTime, last_update: SimTime },

    #[error("Inventory index out of range: {0}")]
    InventoryNotFound(usize),

    #[error("Converter index out of range: {0}")]
    ConverterNotFound(usize),

    #[error("Duplicate inventory id: {0}")]
    DuplicateInventory(InventoryId),

    #[error("Rate resolution failed for {resource}: {reason}")]
    RateResolution { resource: ResourceName, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SolverError {
    /// Reject NaN values at the API boundary
    pub fn check_not_nan(what: &str, value: f64) -> Result<f64> {
        if value.is_nan() {
            return Err(SolverError::NonFiniteInput {
                what: what.to_string(),
                value,
            });
        }
        Ok(value)
    }

    /// Reject NaN and infinite values at the API boundary
    pub fn check_finite(what: &str, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(SolverError::NonFiniteInput {
                what: what.to_string(),
                value,
            });
        }
        Ok(value)
    }

    /// Reject NaN and negative values at the API boundary
    pub fn check_non_negative(what: &str, value: f64) -> Result<f64> {
        Self::check_not_nan(what, value)?;
        if value < 0.0 {
            return Err(SolverError::NegativeInput {
                what: what.to_string(),
                value,
            });
        }
        Ok(value)
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
