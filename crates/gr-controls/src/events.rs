//! Live status emitted by polling loops.

use std::time::Duration;

use chrono::{DateTime, Local};
use gr_core::{Temperature, as_degc};
use gr_gas::LinePressures;
use tracing::info;

use crate::thermal::Direction;

/// One iteration of a ramp that has not converged yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RampTick {
    pub direction: Direction,
    /// `None` when the pressure read failed this iteration.
    pub pressures: Option<LinePressures>,
    pub setpoint: Temperature,
    pub programmer: Temperature,
    pub process_value: Temperature,
    /// Heater output, percent.
    pub power: f64,
    pub elapsed: Duration,
    pub at: DateTime<Local>,
}

/// One iteration of a timed wait.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitTick {
    pub label: String,
    pub elapsed: Duration,
    pub total: Duration,
    pub pressures: Option<LinePressures>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Ramp(RampTick),
    Wait(WaitTick),
}

/// Receiver of live status events.
pub trait StatusSink {
    fn emit(&mut self, event: StatusEvent);
}

impl StatusSink for Vec<StatusEvent> {
    fn emit(&mut self, event: StatusEvent) {
        self.push(event);
    }
}

/// Forwards every event to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn emit(&mut self, event: StatusEvent) {
        match event {
            StatusEvent::Ramp(t) => info!(
                direction = ?t.direction,
                setpoint_c = as_degc(t.setpoint),
                programmer_c = as_degc(t.programmer),
                reactor_c = as_degc(t.process_value),
                power_pct = t.power,
                pressure_a = t.pressures.map(|p| p.a),
                pressure_b = t.pressures.map(|p| p.b),
                elapsed_s = t.elapsed.as_secs(),
                "ramping"
            ),
            StatusEvent::Wait(t) => info!(
                label = %t.label,
                elapsed_s = t.elapsed.as_secs(),
                total_s = t.total.as_secs(),
                pressure_a = t.pressures.map(|p| p.a),
                pressure_b = t.pressures.map(|p| p.b),
                "waiting"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait(secs: u64) -> StatusEvent {
        StatusEvent::Wait(WaitTick {
            label: "purge".to_string(),
            elapsed: Duration::from_secs(secs),
            total: Duration::from_secs(10),
            pressures: None,
        })
    }

    #[test]
    fn vec_sink_keeps_order() {
        let mut sink: Vec<StatusEvent> = Vec::new();
        sink.emit(wait(0));
        sink.emit(wait(1));
        assert_eq!(sink, vec![wait(0), wait(1)]);
    }

    #[test]
    fn log_sink_accepts_every_event() {
        let mut sink = LogSink;
        sink.emit(wait(3));
        sink.emit(StatusEvent::Ramp(RampTick {
            direction: Direction::Heating,
            pressures: Some(LinePressures { a: 14.7, b: 14.9 }),
            setpoint: gr_core::degc(250.0),
            programmer: gr_core::degc(120.0),
            process_value: gr_core::degc(118.5),
            power: 35.0,
            elapsed: Duration::from_secs(60),
            at: Local::now(),
        }));
    }
}
