//! Timed pulse trains.
//!
//! Dual-loop pulsing strobes the loop valve, swapping which sample loop feeds
//! the reactor. Valve pulsing alternates the two continuous modes, holding
//! line B open for a set time plus the valve's actuation latency.

use std::time::Duration;

use gr_config::PulseConfig;
use gr_core::{Clock, GasLine, Stopwatch, ValveId};
use gr_devices::{ValveController, ValveLink};
use tracing::{debug, info};

use crate::error::{ControlError, ControlResult};
use crate::retry::Cancellation;
use crate::routing::{RoutingMode, RoutingModeEngine};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseReport {
    pub mode: RoutingMode,
    pub pulses: u32,
    /// Time spent per pulse, excluding valve settle and read-back.
    pub hold_per_pulse: Duration,
    pub elapsed: Duration,
}

pub struct PulseSequencer<C: Clock> {
    clock: C,
    latency: Duration,
    strobe_valve: ValveId,
}

impl<C: Clock> PulseSequencer<C> {
    pub fn new(clock: C, config: &PulseConfig) -> ControlResult<Self> {
        let latency = config
            .actuation_latency()
            .ok_or(ControlError::InvalidArg {
                what: "actuation latency must be a finite, non-negative duration",
            })?;
        Ok(Self {
            clock,
            latency,
            strobe_valve: config.strobe_valve,
        })
    }

    pub fn actuation_latency(&self) -> Duration {
        self.latency
    }

    /// Hold per valve pulse: open window, actuation latency, gap.
    pub fn per_pulse_hold(&self, open: Duration, between: Duration) -> Duration {
        open + self.latency + between
    }

    /// Enter the loop mode for `line` and strobe the loop valve `pulses`
    /// times, `between` apart.
    pub fn loop_pulses<L: ValveLink, VC: Clock>(
        &self,
        engine: &mut RoutingModeEngine,
        valves: &mut ValveController<L, VC>,
        line: GasLine,
        pulses: u32,
        between: Duration,
        cancel: &Cancellation,
    ) -> ControlResult<PulseReport> {
        let mode = match line {
            GasLine::A => RoutingMode::PulseLoopA,
            GasLine::B => RoutingMode::PulseLoopB,
        };
        engine.enter(valves, mode)?;
        info!(mode = %mode, pulses, between_s = between.as_secs_f64(), "starting loop pulses");

        let watch = Stopwatch::start(&self.clock);
        for n in 1..=pulses {
            cancel.check(&self.clock, "loop pulses")?;
            valves.strobe(self.strobe_valve)?;
            debug!(pulse = n, of = pulses, "pulse sent");
            self.clock.sleep(between);
        }
        info!(pulses, "loop pulses finished");

        Ok(PulseReport {
            mode,
            pulses,
            hold_per_pulse: between,
            elapsed: watch.elapsed(),
        })
    }

    /// Pulse line B into the reactor `pulses` times by alternating the
    /// continuous modes, then leave the bank in continuous A.
    pub fn valve_pulses<L: ValveLink, VC: Clock>(
        &self,
        engine: &mut RoutingModeEngine,
        valves: &mut ValveController<L, VC>,
        pulses: u32,
        open: Duration,
        between: Duration,
        cancel: &Cancellation,
    ) -> ControlResult<PulseReport> {
        engine.enter(valves, RoutingMode::ContinuousA)?;
        info!(
            pulses,
            open_s = open.as_secs_f64(),
            between_s = between.as_secs_f64(),
            "starting valve pulses"
        );

        let open_hold = open + self.latency;
        let watch = Stopwatch::start(&self.clock);
        for n in 1..=pulses {
            if let Err(err) = cancel.check(&self.clock, "valve pulses") {
                engine.mark(RoutingMode::ContinuousA);
                return Err(err);
            }
            engine.apply_as(valves, RoutingMode::ContinuousB, RoutingMode::PulseValve)?;
            self.clock.sleep(open_hold);
            engine.apply_as(valves, RoutingMode::ContinuousA, RoutingMode::PulseValve)?;
            debug!(pulse = n, of = pulses, "pulse sent");
            self.clock.sleep(between);
        }
        engine.mark(RoutingMode::ContinuousA);
        info!(pulses, "valve pulses finished");

        Ok(PulseReport {
            mode: RoutingMode::PulseValve,
            pulses,
            hold_per_pulse: self.per_pulse_hold(open, between),
            elapsed: watch.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_core::ManualClock;
    use gr_devices::loopback::LoopbackValveBank;
    use proptest::prelude::*;

    /// Sub-millisecond, so it never collides with the whole-millisecond holds.
    const SETTLE: Duration = Duration::from_micros(7);

    #[test]
    fn unrepresentable_latency_is_rejected() {
        for latency in [1e20, -0.5, f64::NAN] {
            let config = PulseConfig {
                actuation_latency_s: latency,
                ..PulseConfig::default()
            };
            assert!(matches!(
                PulseSequencer::new(ManualClock::new(), &config),
                Err(ControlError::InvalidArg { .. })
            ));
        }
    }

    proptest! {
        #[test]
        fn valve_pulse_holds_are_exact(
            pulses in 0u32..6,
            open_ms in 1u64..5_000,
            between_ms in 1u64..5_000,
        ) {
            let clock = ManualClock::new();
            let bank = LoopbackValveBank::new();
            let mut valves =
                ValveController::new(bank, clock.clone(), ValveId::all()).with_settle(SETTLE);
            let mut engine = RoutingModeEngine::new();
            let seq = PulseSequencer::new(clock.clone(), &PulseConfig::default()).unwrap();
            let open = Duration::from_millis(open_ms);
            let between = Duration::from_millis(between_ms);

            let cancel = Cancellation::none();
            let report = seq
                .valve_pulses(&mut engine, &mut valves, pulses, open, between, &cancel)
                .unwrap();

            let open_hold = open + seq.actuation_latency();
            let holds: Vec<Duration> =
                clock.sleeps().into_iter().filter(|d| *d != SETTLE).collect();
            let expected: Vec<Duration> = (0..pulses).flat_map(|_| [open_hold, between]).collect();
            prop_assert_eq!(holds, expected);
            prop_assert_eq!(report.hold_per_pulse, open_hold + between);
            prop_assert_eq!(report.pulses, pulses);
            prop_assert_eq!(engine.active(), Some(RoutingMode::ContinuousA));
        }
    }
}
