//! Reference rig: the catalytic-reactor gas manifold this software was
//! written for.

use std::collections::BTreeMap;

use gr_core::{GasId, NodeId, ValveId};

use crate::schema::*;

impl Default for ValveBankConfig {
    fn default() -> Self {
        Self {
            letters: ValveId::all().collect(),
            settle_ms: 300,
        }
    }
}

impl Default for MfcBusConfig {
    fn default() -> Self {
        Self {
            full_scale: 32_000,
            pressure_nodes: LineNodes {
                a: NodeId(3),
                b: NodeId(14),
            },
        }
    }
}

impl Default for TempRegisterMap {
    fn default() -> Self {
        Self {
            process_value: 1,
            programmer_value: 5,
            power_output: 85,
            ramp_rate: 35,
            heating_setpoint: 24,
            cooling_setpoint: 2,
            proportional_band: 6,
            integral_time: 8,
            derivative_time: 9,
            ms_relay: 363,
            logic_output_a: 376,
            ir_status: 361,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            registers: TempRegisterMap::default(),
            decimals: 1,
            poll_interval_ms: 1_000,
            retry: RetryConfig::default(),
            finish: FinishSetpoint {
                rate_c_per_min: 10.0,
                setpoint_c: 18.0,
            },
        }
    }
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            actuation_latency_s: 0.145,
            strobe_valve: ValveId::A,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            ms_hold_s: 10.0,
            ir_trigger_level: 5.0,
            ir_hold_s: 1.0,
            pulse_marker_level: 3.0,
            ir_poll_interval_ms: 100,
        }
    }
}

fn channel(node: u8, curve: Option<u8>, min: f64, max: f64, divisor: f64) -> GasChannelConfig {
    GasChannelConfig {
        node: NodeId(node),
        curve,
        range: FlowRange::new(min, max),
        calibration_factor: 1.0,
        divisor,
    }
}

/// The 26 channels of the reference rig.
pub fn reference_gases() -> BTreeMap<GasId, GasChannelConfig> {
    use GasId::*;

    let table = [
        (H2A, channel(4, Some(0), 0.6, 30.0, 30.0)),
        (D2A, channel(4, Some(1), 0.6, 30.0, 30.0)),
        (O2A, channel(5, Some(0), 0.6, 30.0, 30.0)),
        (CoAH, channel(6, Some(0), 0.6, 30.0, 30.0)),
        (Co2AH, channel(6, Some(1), 0.6, 30.0, 30.0)),
        (Co2AL, channel(6, Some(2), 0.26, 13.0, 13.0)),
        (CoAL, channel(6, Some(3), 0.36, 18.0, 18.0)),
        (Ch4A, channel(7, Some(0), 0.6, 30.0, 30.0)),
        (C2h6A, channel(7, Some(1), 0.6, 30.0, 30.0)),
        (C3h8A, channel(7, Some(2), 0.6, 30.0, 30.0)),
        (HeA, channel(8, Some(0), 1.2, 60.0, 60.0)),
        (ArA, channel(8, Some(1), 1.2, 60.0, 60.0)),
        (N2A, channel(8, Some(2), 1.2, 60.0, 60.0)),
        (HeB, channel(9, Some(0), 1.2, 60.0, 60.0)),
        (ArB, channel(9, Some(1), 1.2, 60.0, 60.0)),
        (N2B, channel(9, Some(2), 1.2, 60.0, 60.0)),
        (Ch4B, channel(10, Some(0), 0.6, 30.0, 30.0)),
        (C2h6B, channel(10, Some(1), 0.6, 30.0, 30.0)),
        (C3h8B, channel(10, Some(2), 0.6, 30.0, 30.0)),
        (CoBH, channel(11, Some(0), 0.6, 30.0, 30.0)),
        (Co2BH, channel(11, Some(1), 0.6, 30.0, 30.0)),
        (Co2BL, channel(11, Some(2), 0.26, 13.0, 13.0)),
        (CoBL, channel(11, Some(3), 0.36, 18.0, 18.0)),
        (O2B, channel(12, Some(0), 0.6, 30.0, 30.0)),
        (H2B, channel(13, Some(0), 0.6, 30.0, 30.0)),
        (D2B, channel(13, Some(1), 0.6, 30.0, 30.0)),
    ];
    table.into_iter().collect()
}

/// PID bands for the reactor cells used on the reference rig.
pub fn reference_pid_profiles() -> BTreeMap<String, PidProfile> {
    BTreeMap::from([
        (
            "drifts".to_string(),
            PidProfile {
                proportional_band: 86.92,
                integral_time: 95.52,
                derivative_time: 15.92,
                decimals: 2,
            },
        ),
        (
            "clausen".to_string(),
            PidProfile {
                proportional_band: 600.0,
                integral_time: 20.0,
                derivative_time: 4.0,
                decimals: 0,
            },
        ),
    ])
}

impl RigConfig {
    /// Configuration of the reference rig.
    pub fn reference() -> Self {
        Self {
            devices: DeviceAddresses {
                valves: PortAddress::port("COM10"),
                mfc: PortAddress::port("COM9"),
                temperature: PortAddress::port("COM8"),
                mfc_baud: 38_400,
                temperature_sub_address: 2,
            },
            valves: ValveBankConfig::default(),
            mfc: MfcBusConfig::default(),
            gases: reference_gases(),
            thermal: ThermalConfig::default(),
            pulses: PulseConfig::default(),
            triggers: TriggerConfig::default(),
            pid_profiles: reference_pid_profiles(),
        }
    }
}
