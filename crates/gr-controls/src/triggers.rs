//! Remote triggering of acquisition hardware through the temperature
//! controller's relay and logic outputs, plus PID profile import.

use core::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use gr_config::{PidProfile, TriggerConfig};
use gr_core::Clock;
use gr_devices::TempLink;
use tracing::info;

use crate::error::{ControlError, ControlResult};
use crate::retry::Cancellation;
use crate::thermal::ThermalRampController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    MassSpecStart,
    MassSpecStop,
    IrAcquisitionStart,
    PulseMarkerOn,
    PulseMarkerOff,
    IrReady,
    PidImported,
}

impl fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TriggerAction::MassSpecStart => "MS sequence started",
            TriggerAction::MassSpecStop => "MS sequence stopped",
            TriggerAction::IrAcquisitionStart => "IR data acquisition started",
            TriggerAction::PulseMarkerOn => "Pulse ON",
            TriggerAction::PulseMarkerOff => "Pulse OFF",
            TriggerAction::IrReady => "IR ready",
            TriggerAction::PidImported => "PID imported",
        };
        f.write_str(text)
    }
}

/// When a trigger fired, by the wall clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerRecord {
    pub action: TriggerAction,
    pub at: DateTime<Local>,
}

impl TriggerRecord {
    fn now(action: TriggerAction) -> Self {
        let record = Self {
            action,
            at: Local::now(),
        };
        info!(at = %record.at.format("%m/%d/%Y %H:%M:%S"), "{action}");
        record
    }
}

/// PID bands as read back after an import.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidReadback {
    pub proportional_band: f64,
    pub integral_time: f64,
    pub derivative_time: f64,
    pub record: TriggerRecord,
}

impl<T: TempLink, C: Clock> ThermalRampController<T, C> {
    /// Write a PID profile and read the three bands back.
    pub fn apply_pid_profile(
        &mut self,
        profile: &PidProfile,
        cancel: &Cancellation,
    ) -> ControlResult<PidReadback> {
        let r = self.registers;
        let d = profile.decimals;
        self.link.write_register(r.proportional_band, profile.proportional_band, d)?;
        self.link.write_register(r.integral_time, profile.integral_time, d)?;
        self.link.write_register(r.derivative_time, profile.derivative_time, d)?;

        let link = &mut self.link;
        let (p, i, dt) = self.retry.run(&self.clock, cancel, "PID read-back", || {
            Ok((
                link.read_register(r.proportional_band, d)?,
                link.read_register(r.integral_time, d)?,
                link.read_register(r.derivative_time, d)?,
            ))
        })?;
        info!(
            proportional_band = p,
            integral_time = i,
            derivative_time = dt,
            "PID profile read back"
        );
        Ok(PidReadback {
            proportional_band: p,
            integral_time: i,
            derivative_time: dt,
            record: TriggerRecord::now(TriggerAction::PidImported),
        })
    }

    /// Close the mass spectrometer relay and give the sequence time to start.
    pub fn ms_start(&mut self, triggers: &TriggerConfig) -> ControlResult<TriggerRecord> {
        self.link.write_register(self.registers.ms_relay, 0.0, 0)?;
        self.clock.sleep(secs(triggers.ms_hold_s)?);
        Ok(TriggerRecord::now(TriggerAction::MassSpecStart))
    }

    pub fn ms_stop(&mut self, triggers: &TriggerConfig) -> ControlResult<TriggerRecord> {
        self.link.write_register(self.registers.ms_relay, 1.0, 0)?;
        self.clock.sleep(secs(triggers.ms_hold_s)?);
        Ok(TriggerRecord::now(TriggerAction::MassSpecStop))
    }

    /// Pulse logic output A to start IR acquisition.
    pub fn ir_start(&mut self, triggers: &TriggerConfig) -> ControlResult<TriggerRecord> {
        let out = self.registers.logic_output_a;
        self.link.write_register(out, triggers.ir_trigger_level, 0)?;
        self.clock.sleep(secs(triggers.ir_hold_s)?);
        self.link.write_register(out, 0.0, 0)?;
        Ok(TriggerRecord::now(TriggerAction::IrAcquisitionStart))
    }

    pub fn pulse_marker_on(&mut self, triggers: &TriggerConfig) -> ControlResult<TriggerRecord> {
        self.link
            .write_register(self.registers.logic_output_a, triggers.pulse_marker_level, 0)?;
        Ok(TriggerRecord::now(TriggerAction::PulseMarkerOn))
    }

    pub fn pulse_marker_off(&mut self) -> ControlResult<TriggerRecord> {
        self.link.write_register(self.registers.logic_output_a, 0.0, 0)?;
        Ok(TriggerRecord::now(TriggerAction::PulseMarkerOff))
    }

    /// Poll the IR status input until it reads 1.
    ///
    /// Read errors are retried per the controller's retry policy; the wait
    /// itself ends only on readiness or `cancel`.
    pub fn wait_ir_ready(
        &mut self,
        triggers: &TriggerConfig,
        cancel: &Cancellation,
    ) -> ControlResult<TriggerRecord> {
        let register = self.registers.ir_status;
        let interval = Duration::from_millis(triggers.ir_poll_interval_ms);
        let link = &mut self.link;
        loop {
            let status = self.retry.run(&self.clock, cancel, "IR status", || {
                link.read_register(register, 0)
            })?;
            if status == 1.0 {
                return Ok(TriggerRecord::now(TriggerAction::IrReady));
            }
            cancel.check(&self.clock, "IR ready wait")?;
            self.clock.sleep(interval);
        }
    }
}

fn secs(value: f64) -> ControlResult<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| ControlError::InvalidArg {
        what: "hold time must be finite and non-negative",
    })
}
