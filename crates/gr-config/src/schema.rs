//! Rig configuration schema.

use std::collections::BTreeMap;
use std::time::Duration;

use gr_core::{GasId, NodeId, ValveId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RigConfig {
    pub devices: DeviceAddresses,
    #[serde(default)]
    pub valves: ValveBankConfig,
    #[serde(default)]
    pub mfc: MfcBusConfig,
    pub gases: BTreeMap<GasId, GasChannelConfig>,
    #[serde(default)]
    pub thermal: ThermalConfig,
    #[serde(default)]
    pub pulses: PulseConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub pid_profiles: BTreeMap<String, PidProfile>,
}

/// Where each link is found. Port discovery resolves a hardware-id pattern
/// or takes the explicit port name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceAddresses {
    pub valves: PortAddress,
    pub mfc: PortAddress,
    pub temperature: PortAddress,
    #[serde(default = "default_mfc_baud")]
    pub mfc_baud: u32,
    #[serde(default = "default_temperature_sub_address")]
    pub temperature_sub_address: u8,
}

fn default_mfc_baud() -> u32 {
    38_400
}

fn default_temperature_sub_address() -> u8 {
    2
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

impl PortAddress {
    pub fn port(name: impl Into<String>) -> Self {
        Self {
            hid: None,
            port: Some(name.into()),
        }
    }

    /// The string discovery will match on, preferring the explicit port.
    pub fn key(&self) -> Option<&str> {
        self.port
            .as_deref()
            .or(self.hid.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValveBankConfig {
    pub letters: Vec<ValveId>,
    pub settle_ms: u64,
}

impl ValveBankConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MfcBusConfig {
    /// Setpoint code corresponding to 100 % of a channel's divisor.
    pub full_scale: u16,
    pub pressure_nodes: LineNodes,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LineNodes {
    pub a: NodeId,
    pub b: NodeId,
}

/// One gas channel as wired on the rig.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GasChannelConfig {
    pub node: NodeId,
    /// Calibration curve to select on the node; absent when the node has a
    /// single curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<u8>,
    /// Accepted flow range in sccm, after calibration-factor conversion.
    pub range: FlowRange,
    #[serde(default = "default_calibration_factor")]
    pub calibration_factor: f64,
    /// Flow (sccm) that maps to the full-scale code.
    pub divisor: f64,
}

fn default_calibration_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FlowRange {
    pub min: f64,
    pub max: f64,
}

impl FlowRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, flow: f64) -> bool {
        flow >= self.min && flow <= self.max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThermalConfig {
    pub registers: TempRegisterMap,
    /// Decimal places used for every process register exchange.
    pub decimals: u8,
    pub poll_interval_ms: u64,
    pub retry: RetryConfig,
    pub finish: FinishSetpoint,
}

impl ThermalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Register addresses on the temperature controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TempRegisterMap {
    pub process_value: u16,
    pub programmer_value: u16,
    pub power_output: u16,
    pub ramp_rate: u16,
    pub heating_setpoint: u16,
    pub cooling_setpoint: u16,
    pub proportional_band: u16,
    pub integral_time: u16,
    pub derivative_time: u16,
    pub ms_relay: u16,
    pub logic_output_a: u16,
    pub ir_status: u16,
}

/// Bounded retry with exponential backoff for device reads in polling loops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

/// Ramp applied when an experiment ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FinishSetpoint {
    pub rate_c_per_min: f64,
    pub setpoint_c: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PulseConfig {
    /// Physical switching delay added to every valve-open window.
    pub actuation_latency_s: f64,
    /// Valve toggled by dual-loop pulsing.
    pub strobe_valve: ValveId,
}

impl PulseConfig {
    /// `None` when the latency is negative, NaN or too large for a `Duration`.
    pub fn actuation_latency(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.actuation_latency_s).ok()
    }
}

/// Levels and holds used for remote triggering of acquisition hardware.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    pub ms_hold_s: f64,
    pub ir_trigger_level: f64,
    pub ir_hold_s: f64,
    pub pulse_marker_level: f64,
    pub ir_poll_interval_ms: u64,
}

/// PID bands for one reactor cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PidProfile {
    pub proportional_band: f64,
    pub integral_time: f64,
    pub derivative_time: f64,
    #[serde(default)]
    pub decimals: u8,
}
