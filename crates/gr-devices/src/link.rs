//! Narrow capability traits implemented by the serial drivers.

use crate::error::LinkResult;
use crate::mfc::{ParamData, ParamRead, ParamWrite};

/// Line-oriented ASCII link to the valve bank.
pub trait ValveLink {
    /// Send one complete command frame, terminator included.
    fn write_command(&mut self, bytes: &[u8]) -> LinkResult<()>;

    /// Read one response line.
    fn read_line(&mut self) -> LinkResult<String>;
}

/// Parameter-oriented link to the MFC bus.
pub trait MfcLink {
    /// Read a batch of parameters. The result has one value per request, in
    /// request order.
    fn read_parameters(&mut self, params: &[ParamRead]) -> LinkResult<Vec<ParamData>>;

    /// Write a batch of parameters. Devices do not acknowledge the values.
    fn write_parameters(&mut self, params: &[ParamWrite]) -> LinkResult<()>;
}

/// Register-oriented link to the temperature controller.
pub trait TempLink {
    fn read_register(&mut self, address: u16, decimals: u8) -> LinkResult<f64>;

    fn write_register(&mut self, address: u16, value: f64, decimals: u8) -> LinkResult<()>;
}
