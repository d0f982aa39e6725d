//! Gas channel registry and flow setpoint control.
//!
//! A gas channel binds a [`GasId`](gr_core::GasId) to the MFC node that
//! meters it, the calibration curve to select on that node, the accepted flow
//! range and the setpoint quantization. Before a channel is given a positive
//! flow, its source valve is switched so the node actually sees that gas.

pub mod error;
pub mod flow;
pub mod registry;
pub mod setpoint;
pub mod source;
pub mod status;

pub use error::{GasError, GasResult, RangeViolation};
pub use flow::{Correction, FlowSetpointController, PRIORITY_GROUPS, SetpointRequest};
pub use registry::{GasChannel, GasChannelRegistry};
pub use setpoint::FlowSetpoint;
pub use source::{SourceSelection, SourceSelector, validate_source_valves};
pub use status::{ChannelReading, FlowStatus, LinePressures, PressureSource};
