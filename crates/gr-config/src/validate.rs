//! Configuration validation.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use gr_core::{GasId, NodeId, ValveId};

use crate::schema::{DeviceAddresses, GasChannelConfig, RigConfig};
use crate::{ConfigError, ConfigResult};

/// Valves the delivery modes drive directly.
const MODE_VALVES: [ValveId; 3] = [ValveId::A, ValveId::B, ValveId::C];

pub fn validate_config(config: &RigConfig) -> ConfigResult<()> {
    validate_devices(&config.devices)?;
    validate_valves(config)?;
    validate_gases(config)?;
    validate_timing(config)?;
    Ok(())
}

fn validate_devices(devices: &DeviceAddresses) -> ConfigResult<()> {
    let links = [
        ("valve", &devices.valves),
        ("MFC", &devices.mfc),
        ("temperature", &devices.temperature),
    ];

    let mut claimed: BTreeMap<String, &'static str> = BTreeMap::new();
    for (device, address) in links {
        let key = address
            .key()
            .ok_or(ConfigError::MissingAddress { device })?;
        if let Some(first) = claimed.insert(key.to_string(), device) {
            return Err(ConfigError::AmbiguousAddress {
                address: key.to_string(),
                first,
                second: device,
            });
        }
    }

    if devices.mfc_baud == 0 {
        return Err(ConfigError::invalid("devices.mfc_baud", "must be positive"));
    }
    Ok(())
}

fn validate_valves(config: &RigConfig) -> ConfigResult<()> {
    let mut seen = BTreeSet::new();
    for valve in &config.valves.letters {
        if !seen.insert(*valve) {
            return Err(ConfigError::invalid(
                "valves.letters",
                format!("valve {valve} listed twice"),
            ));
        }
    }
    for valve in MODE_VALVES.iter().chain([&config.pulses.strobe_valve]) {
        if !seen.contains(valve) {
            return Err(ConfigError::invalid(
                "valves.letters",
                format!("valve {valve} is required by the delivery modes"),
            ));
        }
    }
    Ok(())
}

fn validate_gases(config: &RigConfig) -> ConfigResult<()> {
    if config.gases.is_empty() {
        return Err(ConfigError::invalid("gases", "no gas channels configured"));
    }
    if config.mfc.full_scale == 0 {
        return Err(ConfigError::invalid("mfc.full_scale", "must be positive"));
    }

    let pressure_nodes = [config.mfc.pressure_nodes.a, config.mfc.pressure_nodes.b];
    if pressure_nodes[0] == pressure_nodes[1] {
        return Err(ConfigError::invalid(
            "mfc.pressure_nodes",
            "lines A and B need distinct pressure nodes",
        ));
    }

    let mut by_node: BTreeMap<NodeId, Vec<(&GasId, &GasChannelConfig)>> = BTreeMap::new();
    for (gas, channel) in &config.gases {
        let field = |name: &str| format!("gases.{gas}.{name}");

        if pressure_nodes.contains(&channel.node) {
            return Err(ConfigError::invalid(
                field("node"),
                format!("{} is a pressure node", channel.node),
            ));
        }
        let range = channel.range;
        let finite = range.min.is_finite() && range.max.is_finite();
        if !finite || range.min < 0.0 || range.min >= range.max {
            return Err(ConfigError::invalid(
                field("range"),
                format!("expected 0 <= min < max, got [{}, {}]", range.min, range.max),
            ));
        }
        if !(channel.calibration_factor.is_finite() && channel.calibration_factor > 0.0) {
            return Err(ConfigError::invalid(
                field("calibration_factor"),
                "must be positive",
            ));
        }
        if !(channel.divisor.is_finite() && channel.divisor > 0.0) {
            return Err(ConfigError::invalid(field("divisor"), "must be positive"));
        }
        let max_code = range.max * f64::from(config.mfc.full_scale) / channel.divisor;
        if max_code.round() > f64::from(i16::MAX) {
            return Err(ConfigError::invalid(
                field("divisor"),
                format!("range maximum encodes to {max_code:.0}, above the 16-bit setpoint limit"),
            ));
        }
        by_node.entry(channel.node).or_default().push((gas, channel));
    }

    for (node, channels) in by_node {
        if channels.len() < 2 {
            continue;
        }
        let mut curves = BTreeSet::new();
        for (gas, channel) in &channels {
            let Some(curve) = channel.curve else {
                return Err(ConfigError::invalid(
                    format!("gases.{gas}.curve"),
                    format!("{node} is shared, so every channel on it needs a curve"),
                ));
            };
            if !curves.insert(curve) {
                return Err(ConfigError::invalid(
                    format!("gases.{gas}.curve"),
                    format!("curve {curve} is already used on {node}"),
                ));
            }
        }
        let lines: BTreeSet<_> = channels.iter().map(|(gas, _)| gas.line()).collect();
        if lines.len() > 1 {
            return Err(ConfigError::invalid(
                "gases",
                format!("{node} is shared by channels on both lines"),
            ));
        }
    }
    Ok(())
}

fn validate_timing(config: &RigConfig) -> ConfigResult<()> {
    let thermal = &config.thermal;
    if thermal.poll_interval_ms == 0 {
        return Err(ConfigError::invalid(
            "thermal.poll_interval_ms",
            "must be positive",
        ));
    }
    if thermal.retry.max_attempts == 0 {
        return Err(ConfigError::invalid(
            "thermal.retry.max_attempts",
            "at least one attempt is required",
        ));
    }
    if !(thermal.retry.multiplier.is_finite() && thermal.retry.multiplier >= 1.0) {
        return Err(ConfigError::invalid(
            "thermal.retry.multiplier",
            "must be at least 1.0",
        ));
    }
    if config.pulses.actuation_latency().is_none() {
        return Err(ConfigError::invalid(
            "pulses.actuation_latency_s",
            "must be a non-negative number of seconds",
        ));
    }
    let triggers = &config.triggers;
    let holds = [
        ("ms_hold_s", triggers.ms_hold_s),
        ("ir_hold_s", triggers.ir_hold_s),
    ];
    for (name, value) in holds {
        if Duration::try_from_secs_f64(value).is_err() {
            return Err(ConfigError::invalid(
                format!("triggers.{name}"),
                "must be a non-negative number of seconds",
            ));
        }
    }
    Ok(())
}
