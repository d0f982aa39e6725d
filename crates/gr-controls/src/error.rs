//! Error types for sequencing and control loops.

use gr_devices::LinkError;
use gr_gas::GasError;
use thiserror::Error;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// A polled device kept failing after every retry.
    #[error("{what} unavailable after {attempts} attempts: {source}")]
    DeviceUnavailable {
        what: &'static str,
        attempts: u32,
        source: LinkError,
    },

    #[error("{what} cancelled")]
    Cancelled { what: &'static str },

    /// A ramp cannot converge without a target.
    #[error("Ramp has no setpoint")]
    MissingSetpoint,

    #[error("No PID profile named {name}")]
    UnknownProfile { name: String },

    #[error(transparent)]
    Gas(#[from] GasError),

    #[error(transparent)]
    Link(#[from] LinkError),
}
