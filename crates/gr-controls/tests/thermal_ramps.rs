//! Heating and cooling ramps against the loopback temperature controller.

use std::time::Duration;

use gr_config::ThermalConfig;
use gr_controls::{
    Cancellation, ControlError, Direction, RampState, StatusEvent, ThermalRampController,
};
use gr_core::{Clock, ManualClock, as_degc};
use gr_devices::loopback::LoopbackTemperature;
use gr_devices::{LinkError, LinkKind};
use gr_gas::{GasResult, LinePressures, PressureSource};

const PV: u16 = 1;
const PROGRAMMER: u16 = 5;
const POWER: u16 = 85;
const RATE: u16 = 35;
const HEAT_SP: u16 = 24;
const COOL_SP: u16 = 2;

struct FixedPressures(Option<LinePressures>);

impl PressureSource for FixedPressures {
    fn line_pressures(&mut self) -> GasResult<LinePressures> {
        self.0
            .ok_or_else(|| LinkError::io(LinkKind::Mfc, "bus silent").into())
    }
}

fn steady() -> FixedPressures {
    FixedPressures(Some(LinePressures { a: 14.7, b: 15.0 }))
}

struct Bench {
    temp: LoopbackTemperature,
    clock: ManualClock,
    ctl: ThermalRampController<LoopbackTemperature, ManualClock>,
}

fn bench() -> Bench {
    let temp = LoopbackTemperature::new();
    temp.set_register(PROGRAMMER, 100.0);
    temp.set_register(POWER, 40.0);
    let clock = ManualClock::new();
    let ctl = ThermalRampController::new(temp.clone(), clock.clone(), &ThermalConfig::default())
        .unwrap();
    Bench { temp, clock, ctl }
}

#[test]
fn heating_polls_until_setpoint() {
    let mut b = bench();
    b.temp.script(PV, [20.0, 120.0, 250.0]);
    let mut events = Vec::new();

    let summary = b
        .ctl
        .heating_event(
            Some(10.0),
            Some(250.0),
            &mut steady(),
            &mut events,
            &Cancellation::none(),
        )
        .unwrap();

    assert_eq!(b.temp.writes(), vec![(RATE, 10.0), (HEAT_SP, 250.0)]);
    assert_eq!(summary.direction, Direction::Heating);
    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.final_pv, 250.0);
    assert_eq!(b.clock.sleeps(), vec![Duration::from_secs(1); 2]);
    assert_eq!(b.ctl.state(), RampState::SetpointReached);

    let StatusEvent::Ramp(first) = &events[0] else {
        panic!("expected a ramp tick");
    };
    assert_eq!(as_degc(first.process_value), 20.0);
    assert_eq!(as_degc(first.setpoint), 250.0);
    assert_eq!(first.power, 40.0);
    assert_eq!(first.pressures, Some(LinePressures { a: 14.7, b: 15.0 }));
    assert_eq!(events.len(), 2);
}

#[test]
fn already_at_setpoint_exits_without_tick() {
    let mut b = bench();
    b.temp.set_register(PV, 300.0);
    let mut events = Vec::new();

    let summary = b
        .ctl
        .heating_event(None, Some(250.0), &mut steady(), &mut events, &Cancellation::none())
        .unwrap();

    assert_eq!(summary.ticks, 0);
    assert!(events.is_empty());
    assert!(b.clock.sleeps().is_empty());
    assert_eq!(b.temp.writes(), vec![(HEAT_SP, 250.0)]);
}

#[test]
fn cooling_uses_cooling_register() {
    let mut b = bench();
    b.temp.script(PV, [300.0, 260.0, 250.0]);
    let mut events = Vec::new();

    let summary = b
        .ctl
        .cooling_event(
            Some(5.0),
            Some(250.0),
            &mut steady(),
            &mut events,
            &Cancellation::none(),
        )
        .unwrap();

    assert_eq!(b.temp.writes(), vec![(RATE, 5.0), (COOL_SP, 250.0)]);
    assert_eq!(summary.direction, Direction::Cooling);
    assert_eq!(summary.ticks, 2);
}

#[test]
fn missing_setpoint_cannot_converge() {
    let mut b = bench();
    b.temp.set_register(PV, 20.0);

    let err = b
        .ctl
        .heating_event(
            Some(10.0),
            None,
            &mut steady(),
            &mut Vec::new(),
            &Cancellation::none(),
        )
        .unwrap_err();

    assert_eq!(err, ControlError::MissingSetpoint);
    assert_eq!(b.temp.writes(), vec![(RATE, 10.0)]);
    assert_eq!(b.ctl.state(), RampState::Idle);
}

#[test]
fn bad_rate_is_skipped_not_fatal() {
    let mut b = bench();
    b.temp.set_register(PV, 260.0);

    b.ctl
        .heating_event(
            Some(f64::NAN),
            Some(250.0),
            &mut steady(),
            &mut Vec::new(),
            &Cancellation::none(),
        )
        .unwrap();

    assert_eq!(b.temp.writes(), vec![(HEAT_SP, 250.0)]);
}

#[test]
fn refused_write_is_logged_and_ramp_continues() {
    let mut b = bench();
    b.temp.make_read_only(RATE);
    b.temp.script(PV, [200.0, 250.0]);

    let summary = b
        .ctl
        .heating_event(
            Some(10.0),
            Some(250.0),
            &mut steady(),
            &mut Vec::new(),
            &Cancellation::none(),
        )
        .unwrap();

    assert_eq!(summary.ticks, 1);
    assert_eq!(b.temp.writes(), vec![(HEAT_SP, 250.0)]);
}

#[test]
fn ramp_to_setpoint_picks_direction() {
    let mut b = bench();
    b.temp.script(PV, [300.0, 300.0, 240.0]);

    let summary = b
        .ctl
        .ramp_to_setpoint(
            Some(10.0),
            Some(250.0),
            &mut steady(),
            &mut Vec::new(),
            &Cancellation::none(),
        )
        .unwrap();

    assert_eq!(summary.direction, Direction::Cooling);
    assert_eq!(summary.ticks, 1);
    assert!(b.temp.writes().contains(&(COOL_SP, 250.0)));
}

#[test]
fn ramp_to_setpoint_requires_target() {
    let mut b = bench();
    let err = b
        .ctl
        .ramp_to_setpoint(Some(10.0), None, &mut steady(), &mut Vec::new(), &Cancellation::none())
        .unwrap_err();
    assert_eq!(err, ControlError::MissingSetpoint);
    assert_eq!(b.temp.reads(), 0);
}

#[test]
fn transient_read_failures_are_retried() {
    let mut b = bench();
    b.temp.set_register(PV, 300.0);
    b.temp.fail_reads(2);

    b.ctl
        .heating_event(None, Some(250.0), &mut steady(), &mut Vec::new(), &Cancellation::none())
        .unwrap();

    assert_eq!(
        b.clock.sleeps(),
        vec![Duration::from_millis(50), Duration::from_millis(100)]
    );
}

#[test]
fn persistent_failure_is_device_unavailable() {
    let mut b = bench();
    b.temp.set_register(PV, 20.0);
    b.temp.fail_reads(usize::MAX);

    let err = b
        .ctl
        .heating_event(None, Some(250.0), &mut steady(), &mut Vec::new(), &Cancellation::none())
        .unwrap_err();

    assert!(matches!(
        err,
        ControlError::DeviceUnavailable { attempts: 10, .. }
    ));
    assert_eq!(b.ctl.state(), RampState::Idle);
}

#[test]
fn deadline_cancels_a_stalled_ramp() {
    let mut b = bench();
    b.temp.set_register(PV, 20.0);
    let cancel = Cancellation::new().after(&b.clock, Duration::from_secs(5));
    let mut events = Vec::new();

    let err = b
        .ctl
        .heating_event(None, Some(250.0), &mut steady(), &mut events, &cancel)
        .unwrap_err();

    assert!(matches!(err, ControlError::Cancelled { .. }));
    assert_eq!(events.len(), 5);
    assert_eq!(b.ctl.state(), RampState::Idle);
}

#[test]
fn pressure_failure_does_not_stop_ramp() {
    let mut b = bench();
    b.temp.script(PV, [100.0, 250.0]);
    let mut events = Vec::new();

    b.ctl
        .heating_event(
            None,
            Some(250.0),
            &mut FixedPressures(None),
            &mut events,
            &Cancellation::none(),
        )
        .unwrap();

    let StatusEvent::Ramp(tick) = &events[0] else {
        panic!("expected a ramp tick");
    };
    assert_eq!(tick.pressures, None);
}

#[test]
fn time_event_ticks_once_per_interval() {
    let mut b = bench();
    let mut events = Vec::new();

    b.ctl
        .time_event(
            Duration::from_secs(3),
            "CO adsorption",
            &mut steady(),
            &mut events,
            &Cancellation::none(),
        )
        .unwrap();

    let elapsed: Vec<u64> = events
        .iter()
        .map(|e| match e {
            StatusEvent::Wait(w) => w.elapsed.as_secs(),
            StatusEvent::Ramp(_) => panic!("unexpected ramp tick"),
        })
        .collect();
    assert_eq!(elapsed, vec![0, 1, 2]);
    assert_eq!(b.clock.now(), Duration::from_secs(3));
}

#[test]
fn process_value_reads_pv_register() {
    let mut b = bench();
    b.temp.set_register(PV, 187.5);
    assert_eq!(b.ctl.process_value(&Cancellation::none()).unwrap(), 187.5);
}

#[test]
fn finish_experiment_sets_cool_down() {
    let mut b = bench();
    b.ctl.finish_experiment();
    assert_eq!(b.temp.writes(), vec![(RATE, 10.0), (HEAT_SP, 18.0)]);
}
