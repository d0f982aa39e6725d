//! Routing modes and pulse trains against the loopback valve bank.

use std::time::Duration;

use gr_config::PulseConfig;
use gr_core::{GasLine, ManualClock, ValveId};
use gr_controls::{Cancellation, ControlError, PulseSequencer, RoutingMode, RoutingModeEngine};
use gr_devices::loopback::LoopbackValveBank;
use gr_devices::{SetOutcome, ValveController};
use gr_gas::SourceSelection;

const SETTLE: Duration = Duration::from_millis(300);

struct Bench {
    bank: LoopbackValveBank,
    clock: ManualClock,
    valves: ValveController<LoopbackValveBank, ManualClock>,
    engine: RoutingModeEngine,
}

fn bench() -> Bench {
    let bank = LoopbackValveBank::new();
    let clock = ManualClock::new();
    let valves = ValveController::new(bank.clone(), clock.clone(), ValveId::all());
    Bench {
        bank,
        clock,
        valves,
        engine: RoutingModeEngine::new(),
    }
}

fn abc(bank: &LoopbackValveBank) -> [char; 3] {
    [ValveId::A, ValveId::B, ValveId::C].map(|v| bank.position_code(v))
}

/// Sleeps other than valve settle delays.
fn holds(clock: &ManualClock) -> Vec<Duration> {
    clock.sleeps().into_iter().filter(|d| *d != SETTLE).collect()
}

#[test]
fn every_mode_lands_on_its_vector() {
    let expected = [
        (RoutingMode::ContinuousA, ['A', 'A', 'A']),
        (RoutingMode::ContinuousB, ['A', 'B', 'A']),
        (RoutingMode::PulseLoopA, ['B', 'A', 'B']),
        (RoutingMode::PulseLoopB, ['B', 'B', 'B']),
    ];
    let mut b = bench();
    for (mode, positions) in expected {
        b.engine.enter(&mut b.valves, mode).unwrap();
        assert_eq!(abc(&b.bank), positions, "{mode}");
        assert_eq!(b.engine.active(), Some(mode));
    }
}

#[test]
fn reentering_reapplies_full_vector() {
    let mut b = bench();
    b.engine.enter(&mut b.valves, RoutingMode::ContinuousB).unwrap();
    b.bank.clear_log();

    let outcomes = b.engine.enter(&mut b.valves, RoutingMode::ContinuousB).unwrap();

    assert_eq!(outcomes, [SetOutcome::Confirmed; 3]);
    assert_eq!(b.bank.actuations(), vec!["/ACW", "/BCC", "/CCW"]);
    assert_eq!(abc(&b.bank), ['A', 'B', 'A']);
}

#[test]
fn pulse_valve_cannot_be_entered_directly() {
    let mut b = bench();
    let err = b
        .engine
        .enter(&mut b.valves, RoutingMode::PulseValve)
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidArg { .. }));
    assert!(b.bank.commands().is_empty());
    assert_eq!(b.engine.active(), None);
}

#[test]
fn partial_vector_leaves_no_active_mode() {
    let mut b = bench();
    b.engine.enter(&mut b.valves, RoutingMode::ContinuousA).unwrap();
    b.bank.jam(ValveId::B);

    let err = b
        .engine
        .enter(&mut b.valves, RoutingMode::ContinuousB)
        .unwrap_err();

    assert!(matches!(err, ControlError::Link(_)));
    assert_eq!(b.engine.active(), None);
}

#[test]
fn source_selection_leaves_mode_alone() {
    let mut b = bench();
    b.engine.enter(&mut b.valves, RoutingMode::PulseLoopA).unwrap();
    b.bank.clear_log();

    b.engine
        .select_source(&mut b.valves, SourceSelection::DeuteriumA)
        .unwrap();
    b.engine
        .select_source(&mut b.valves, SourceSelection::Oxygen)
        .unwrap();

    assert_eq!(b.bank.actuations(), vec!["/ICC"]);
    assert_eq!(b.engine.active(), Some(RoutingMode::PulseLoopA));
}

#[test]
fn single_mode_valve_clears_active_mode() {
    let mut b = bench();
    b.engine.enter(&mut b.valves, RoutingMode::ContinuousA).unwrap();

    b.engine
        .set_mode_valve(&mut b.valves, ValveId::C, gr_devices::ValveTarget::On)
        .unwrap();

    assert_eq!(b.engine.active(), None);
    assert!(
        b.engine
            .set_mode_valve(&mut b.valves, ValveId::G, gr_devices::ValveTarget::On)
            .is_err()
    );
}

#[test]
fn loop_pulses_strobe_valve_a() {
    let mut b = bench();
    let seq = PulseSequencer::new(b.clock.clone(), &PulseConfig::default()).unwrap();

    let report = seq
        .loop_pulses(
            &mut b.engine,
            &mut b.valves,
            GasLine::B,
            3,
            Duration::from_secs(2),
            &Cancellation::none(),
        )
        .unwrap();

    assert_eq!(report.mode, RoutingMode::PulseLoopB);
    assert_eq!(report.pulses, 3);
    assert_eq!(
        b.bank.actuations(),
        vec!["/ACC", "/BCC", "/CCC", "/ATO", "/ATO", "/ATO"]
    );
    assert_eq!(holds(&b.clock), vec![Duration::from_secs(2); 3]);
    assert_eq!(report.elapsed, Duration::from_secs(6));
    assert_eq!(b.engine.active(), Some(RoutingMode::PulseLoopB));
}

#[test]
fn valve_pulses_hold_open_plus_latency() {
    let mut b = bench();
    let config = PulseConfig::default();
    let seq = PulseSequencer::new(b.clock.clone(), &config).unwrap();
    let open = Duration::from_secs(1);
    let between = Duration::from_secs(3);

    let report = seq
        .valve_pulses(&mut b.engine, &mut b.valves, 2, open, between, &Cancellation::none())
        .unwrap();

    let open_hold = open + seq.actuation_latency();
    assert_eq!(holds(&b.clock), vec![open_hold, between, open_hold, between]);
    assert_eq!(report.hold_per_pulse, open_hold + between);
    assert_eq!(report.mode, RoutingMode::PulseValve);
    assert_eq!(b.engine.active(), Some(RoutingMode::ContinuousA));
    assert_eq!(abc(&b.bank), ['A', 'A', 'A']);
    let b_moves: Vec<_> = b
        .bank
        .actuations()
        .into_iter()
        .filter(|c| c.starts_with("/B"))
        .collect();
    assert_eq!(b_moves, vec!["/BCW", "/BCC", "/BCW", "/BCC", "/BCW"]);
}

#[test]
fn cancelled_loop_pulses_send_nothing() {
    let mut b = bench();
    let seq = PulseSequencer::new(b.clock.clone(), &PulseConfig::default()).unwrap();
    let cancel = Cancellation::new();
    cancel.cancel();

    let err = seq
        .loop_pulses(
            &mut b.engine,
            &mut b.valves,
            GasLine::A,
            5,
            Duration::from_secs(1),
            &cancel,
        )
        .unwrap_err();

    assert_eq!(err, ControlError::Cancelled { what: "loop pulses" });
    assert!(!b.bank.actuations().iter().any(|c| c.ends_with("TO")));
}

#[test]
fn deadline_stops_valve_pulses_in_continuous_a() {
    let mut b = bench();
    let seq = PulseSequencer::new(b.clock.clone(), &PulseConfig::default()).unwrap();
    let cancel = Cancellation::new().after(&b.clock, Duration::from_secs(2));

    let err = seq
        .valve_pulses(
            &mut b.engine,
            &mut b.valves,
            10,
            Duration::from_secs(1),
            Duration::from_secs(3),
            &cancel,
        )
        .unwrap_err();

    assert!(matches!(err, ControlError::Cancelled { .. }));
    assert_eq!(b.engine.active(), Some(RoutingMode::ContinuousA));
    let opened = b
        .bank
        .actuations()
        .into_iter()
        .filter(|c| c == "/BCC")
        .count();
    assert_eq!(opened, 1);
}
