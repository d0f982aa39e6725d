//! Heating and cooling ramps on the PID temperature controller.
//!
//! A ramp writes its rate and target, then polls the process value once per
//! poll interval until it crosses the target. Register writes are
//! best-effort: the controller gives no acknowledgement, and a failed write
//! leaves the previous value in place.

use std::time::Duration;

use chrono::Local;
use gr_config::{FinishSetpoint, TempRegisterMap, ThermalConfig};
use gr_core::{Clock, Stopwatch, degc};
use gr_devices::TempLink;
use gr_gas::PressureSource;
use tracing::{debug, info, warn};

use crate::error::{ControlError, ControlResult};
use crate::events::{RampTick, StatusEvent, StatusSink, WaitTick};
use crate::retry::{Cancellation, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Heating,
    Cooling,
}

impl Direction {
    /// Whether `pv` has yet to reach `setpoint` in this direction.
    pub fn still_ramping(self, pv: f64, setpoint: f64) -> bool {
        match self {
            Direction::Heating => pv < setpoint,
            Direction::Cooling => pv > setpoint,
        }
    }

    fn setpoint_register(self, registers: &TempRegisterMap) -> u16 {
        match self {
            Direction::Heating => registers.heating_setpoint,
            Direction::Cooling => registers.cooling_setpoint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RampState {
    #[default]
    Idle,
    Ramping,
    SetpointReached,
}

/// How a converged ramp ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampSummary {
    pub direction: Direction,
    pub setpoint: f64,
    pub final_pv: f64,
    pub ticks: u32,
    pub elapsed: Duration,
}

/// One poll of the three loop registers.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LoopSample {
    process_value: f64,
    programmer: f64,
    power: f64,
}

/// Sole owner of the temperature link.
pub struct ThermalRampController<T: TempLink, C: Clock> {
    pub(crate) link: T,
    pub(crate) clock: C,
    pub(crate) registers: TempRegisterMap,
    pub(crate) decimals: u8,
    pub(crate) poll_interval: Duration,
    pub(crate) retry: RetryPolicy,
    pub(crate) finish: FinishSetpoint,
    state: RampState,
}

impl<T: TempLink, C: Clock> ThermalRampController<T, C> {
    pub fn new(link: T, clock: C, config: &ThermalConfig) -> ControlResult<Self> {
        if config.poll_interval().is_zero() {
            return Err(ControlError::InvalidArg {
                what: "poll interval must be positive",
            });
        }
        Ok(Self {
            link,
            clock,
            registers: config.registers,
            decimals: config.decimals,
            poll_interval: config.poll_interval(),
            retry: RetryPolicy::from_config(&config.retry)?,
            finish: config.finish,
            state: RampState::Idle,
        })
    }

    pub fn state(&self) -> RampState {
        self.state
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Current reactor temperature, °C.
    pub fn process_value(&mut self, cancel: &Cancellation) -> ControlResult<f64> {
        let (register, decimals) = (self.registers.process_value, self.decimals);
        let link = &mut self.link;
        self.retry.run(&self.clock, cancel, "process value", || {
            link.read_register(register, decimals)
        })
    }

    /// Ramp up at `rate` °C/min until the process value reaches `setpoint`.
    pub fn heating_event(
        &mut self,
        rate: Option<f64>,
        setpoint: Option<f64>,
        pressures: &mut impl PressureSource,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<RampSummary> {
        self.run_ramp(Direction::Heating, rate, setpoint, pressures, sink, cancel)
    }

    /// Ramp down at `rate` °C/min until the process value reaches `setpoint`.
    pub fn cooling_event(
        &mut self,
        rate: Option<f64>,
        setpoint: Option<f64>,
        pressures: &mut impl PressureSource,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<RampSummary> {
        self.run_ramp(Direction::Cooling, rate, setpoint, pressures, sink, cancel)
    }

    /// Heat or cool toward `setpoint`, whichever the current reading needs.
    pub fn ramp_to_setpoint(
        &mut self,
        rate: Option<f64>,
        setpoint: Option<f64>,
        pressures: &mut impl PressureSource,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<RampSummary> {
        let Some(target) = setpoint.filter(|v| v.is_finite()) else {
            return Err(ControlError::MissingSetpoint);
        };
        let pv = self.process_value(cancel)?;
        let direction = if pv > target {
            Direction::Cooling
        } else {
            Direction::Heating
        };
        debug!(pv, target, ?direction, "ramp direction chosen");
        self.run_ramp(direction, rate, setpoint, pressures, sink, cancel)
    }

    /// Wait `duration`, emitting a tick with line pressures every poll
    /// interval.
    pub fn time_event(
        &mut self,
        duration: Duration,
        label: &str,
        pressures: &mut impl PressureSource,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<()> {
        info!(label, seconds = duration.as_secs_f64(), "wait started");
        let watch = Stopwatch::start(&self.clock);
        loop {
            let elapsed = watch.elapsed();
            if elapsed >= duration {
                break;
            }
            cancel.check(&self.clock, "timed wait")?;
            sink.emit(StatusEvent::Wait(WaitTick {
                label: label.to_string(),
                elapsed,
                total: duration,
                pressures: read_pressures(pressures),
            }));
            self.clock.sleep(self.poll_interval);
        }
        info!(label, "wait completed");
        Ok(())
    }

    /// Best-effort register write; failures and non-finite values are logged.
    pub(crate) fn write_best_effort(&mut self, register: u16, value: Option<f64>, what: &str) {
        match value {
            Some(v) if v.is_finite() => {
                if let Err(err) = self.link.write_register(register, v, self.decimals) {
                    warn!(register, value = v, error = %err, "{what} not written");
                } else {
                    debug!(register, value = v, "{what} written");
                }
            }
            Some(v) => warn!(register, value = v, "{what} is not a number, left unchanged"),
            None => debug!(register, "{what} not given, left unchanged"),
        }
    }

    /// Put the controller on the end-of-experiment rate and setpoint.
    pub fn finish_experiment(&mut self) {
        let finish = self.finish;
        self.write_best_effort(self.registers.ramp_rate, Some(finish.rate_c_per_min), "ramp rate");
        self.write_best_effort(
            self.registers.heating_setpoint,
            Some(finish.setpoint_c),
            "heating setpoint",
        );
        self.state = RampState::Idle;
        info!(
            rate = finish.rate_c_per_min,
            setpoint = finish.setpoint_c,
            "end-of-experiment setpoint applied"
        );
    }

    fn run_ramp(
        &mut self,
        direction: Direction,
        rate: Option<f64>,
        setpoint: Option<f64>,
        pressures: &mut impl PressureSource,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<RampSummary> {
        info!(?direction, ?rate, ?setpoint, "ramp started");
        self.write_best_effort(self.registers.ramp_rate, rate, "ramp rate");
        let register = direction.setpoint_register(&self.registers);
        self.write_best_effort(register, setpoint, "setpoint");
        let Some(target) = setpoint.filter(|v| v.is_finite()) else {
            self.state = RampState::Idle;
            return Err(ControlError::MissingSetpoint);
        };
        self.state = RampState::Ramping;

        let result = self.poll_until_reached(direction, target, pressures, sink, cancel);
        self.state = match result {
            Ok(_) => RampState::SetpointReached,
            Err(_) => RampState::Idle,
        };
        result
    }

    fn poll_until_reached(
        &mut self,
        direction: Direction,
        target: f64,
        pressures: &mut impl PressureSource,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<RampSummary> {
        let registers = self.registers;
        let decimals = self.decimals;
        let link = &mut self.link;
        let clock = &self.clock;
        let watch = Stopwatch::start(clock);
        let mut ticks = 0;

        loop {
            cancel.check(clock, "temperature ramp")?;
            let sample = self.retry.run(clock, cancel, "temperature loop", || {
                Ok(LoopSample {
                    process_value: link.read_register(registers.process_value, decimals)?,
                    programmer: link.read_register(registers.programmer_value, decimals)?,
                    power: link.read_register(registers.power_output, decimals)?,
                })
            })?;

            if !direction.still_ramping(sample.process_value, target) {
                info!(setpoint = target, pv = sample.process_value, "setpoint reached");
                return Ok(RampSummary {
                    direction,
                    setpoint: target,
                    final_pv: sample.process_value,
                    ticks,
                    elapsed: watch.elapsed(),
                });
            }

            ticks += 1;
            sink.emit(StatusEvent::Ramp(RampTick {
                direction,
                pressures: read_pressures(pressures),
                setpoint: degc(target),
                programmer: degc(sample.programmer),
                process_value: degc(sample.process_value),
                power: sample.power,
                elapsed: watch.elapsed(),
                at: Local::now(),
            }));
            clock.sleep(self.poll_interval);
        }
    }
}

fn read_pressures(source: &mut impl PressureSource) -> Option<gr_gas::LinePressures> {
    match source.line_pressures() {
        Ok(p) => Some(p),
        Err(err) => {
            warn!(error = %err, "line pressure read failed");
            None
        }
    }
}
