//! Device capability interfaces for the gas rig.
//!
//! The rig talks to three instruments over three independent serial links:
//! - a valve bank of binary rotary valves ([`ValveLink`])
//! - a bus of mass-flow and pressure controllers ([`MfcLink`])
//! - a PID temperature controller ([`TempLink`])
//!
//! Frame encoding and port discovery live behind these traits. This crate
//! owns the valve command vocabulary and the [`ValveController`], which is the
//! only component allowed to move valves.

pub mod error;
pub mod link;
pub mod loopback;
pub mod mfc;
pub mod valve;

pub use error::{LinkError, LinkKind, LinkResult};
pub use link::{MfcLink, TempLink, ValveLink};
pub use mfc::{ParamAddr, ParamData, ParamRead, ParamType, ParamWrite};
pub use valve::{SetOutcome, ValveController, ValveOp, ValvePosition, ValveReading, ValveTarget};
