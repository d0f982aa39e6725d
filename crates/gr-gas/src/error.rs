//! Error types for gas channel operations.

use gr_core::{CoreError, GasId};
use gr_devices::LinkError;
use thiserror::Error;

pub type GasResult<T> = Result<T, GasError>;

/// Requested flow outside a channel's calibrated range.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{gas} flow {requested} sccm (calibrated {converted}) is outside [{min}, {max}] sccm")]
pub struct RangeViolation {
    pub gas: GasId,
    pub requested: f64,
    pub converted: f64,
    pub min: f64,
    pub max: f64,
}

impl RangeViolation {
    pub fn below_minimum(&self) -> bool {
        self.converted < self.min
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GasError {
    #[error("Unknown gas: {gas}")]
    UnknownGas { gas: String },

    #[error(transparent)]
    RangeViolation(#[from] RangeViolation),

    #[error("Flow for {gas} is not a number: {value}")]
    InvalidFlow { gas: GasId, value: f64 },

    #[error("Setpoint for {gas} abandoned by operator")]
    Aborted { gas: GasId },

    #[error("Malformed status from {what}")]
    MalformedStatus { what: String },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for GasError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownGas { name } => GasError::UnknownGas { gas: name },
            other => GasError::Core(other),
        }
    }
}
