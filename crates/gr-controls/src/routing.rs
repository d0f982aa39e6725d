//! Named delivery modes and the valve vectors that realise them.

use core::fmt;

use gr_core::{Clock, ValveId};
use gr_devices::{SetOutcome, ValveController, ValveLink, ValveTarget};
use gr_gas::{SourceSelection, SourceSelector};
use tracing::{info, warn};

use crate::error::{ControlError, ControlResult};

/// Gas delivery modes of the reaction mode selection module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingMode {
    /// Mixing line A to the reactor.
    ContinuousA,
    /// Mixing line B to the reactor.
    ContinuousB,
    /// Alternating ContinuousA/ContinuousB under pulse sequencer control.
    PulseValve,
    /// Line B through loop 2 to the reactor, line A through loop 1 to vent.
    PulseLoopA,
    /// Line A through loop 2 to the reactor, line B through loop 1 to vent.
    PulseLoopB,
}

impl RoutingMode {
    /// Modes with a fixed valve vector.
    pub const VECTOR_MODES: [RoutingMode; 4] = [
        RoutingMode::ContinuousA,
        RoutingMode::ContinuousB,
        RoutingMode::PulseLoopA,
        RoutingMode::PulseLoopB,
    ];

    /// Positions of valves A, B and C, in application order.
    pub fn vector(self) -> Option<[(ValveId, ValveTarget); 3]> {
        use ValveTarget::{Off, On};
        let [a, b, c] = match self {
            RoutingMode::ContinuousA => [Off, Off, Off],
            RoutingMode::ContinuousB => [Off, On, Off],
            RoutingMode::PulseLoopA => [On, Off, On],
            RoutingMode::PulseLoopB => [On, On, On],
            RoutingMode::PulseValve => return None,
        };
        Some([(ValveId::A, a), (ValveId::B, b), (ValveId::C, c)])
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoutingMode::ContinuousA => "continuous A",
            RoutingMode::ContinuousB => "continuous B",
            RoutingMode::PulseValve => "pulses (valve)",
            RoutingMode::PulseLoopA => "pulses loop A",
            RoutingMode::PulseLoopB => "pulses loop B",
        };
        f.write_str(name)
    }
}

/// Tracks which delivery mode the valve bank is in.
///
/// A mode only becomes active once its whole vector has been applied; any
/// failure part way leaves the engine with no active mode.
#[derive(Debug, Default)]
pub struct RoutingModeEngine {
    active: Option<RoutingMode>,
}

impl RoutingModeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<RoutingMode> {
        self.active
    }

    /// Apply `mode`'s full vector, even if the mode is already active.
    pub fn enter<L: ValveLink, C: Clock>(
        &mut self,
        valves: &mut ValveController<L, C>,
        mode: RoutingMode,
    ) -> ControlResult<[SetOutcome; 3]> {
        let Some(vector) = mode.vector() else {
            return Err(ControlError::InvalidArg {
                what: "pulse valve mode is entered by the valve pulse sequence",
            });
        };
        let outcomes = self.apply(valves, vector)?;
        self.active = Some(mode);
        info!(mode = %mode, "routing mode entered");
        Ok(outcomes)
    }

    /// Apply a vector mode while reporting `reported` as the active mode.
    pub(crate) fn apply_as<L: ValveLink, C: Clock>(
        &mut self,
        valves: &mut ValveController<L, C>,
        mode: RoutingMode,
        reported: RoutingMode,
    ) -> ControlResult<()> {
        let Some(vector) = mode.vector() else {
            return Err(ControlError::InvalidArg {
                what: "mode has no valve vector",
            });
        };
        self.apply(valves, vector)?;
        self.active = Some(reported);
        Ok(())
    }

    pub(crate) fn mark(&mut self, mode: RoutingMode) {
        self.active = Some(mode);
    }

    fn apply<L: ValveLink, C: Clock>(
        &mut self,
        valves: &mut ValveController<L, C>,
        vector: [(ValveId, ValveTarget); 3],
    ) -> ControlResult<[SetOutcome; 3]> {
        let mut outcomes = [SetOutcome::Confirmed; 3];
        for (slot, (valve, target)) in outcomes.iter_mut().zip(vector) {
            match valves.set_position(valve, target) {
                Ok(outcome) => *slot = outcome,
                Err(err) => {
                    warn!(valve = %valve, error = %err, "mode vector interrupted");
                    self.active = None;
                    return Err(err.into());
                }
            }
        }
        Ok(outcomes)
    }

    /// Switch a source selection valve; does not affect the active mode.
    pub fn select_source<L: ValveLink, C: Clock>(
        &mut self,
        valves: &mut ValveController<L, C>,
        selection: SourceSelection,
    ) -> ControlResult<()> {
        valves.select_source(selection)?;
        Ok(())
    }

    /// Move one of the mode valves A, B or C on its own.
    ///
    /// The active mode is forgotten, since the vector no longer holds.
    pub fn set_mode_valve<L: ValveLink, C: Clock>(
        &mut self,
        valves: &mut ValveController<L, C>,
        valve: ValveId,
        target: ValveTarget,
    ) -> ControlResult<SetOutcome> {
        if ![ValveId::A, ValveId::B, ValveId::C].contains(&valve) {
            return Err(ControlError::InvalidArg {
                what: "only valves A, B and C select the delivery mode",
            });
        }
        self.active = None;
        Ok(valves.set_position(valve, target)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_match_mode_table() {
        use ValveTarget::{Off, On};
        let positions = |m: RoutingMode| m.vector().unwrap().map(|(_, t)| t);
        assert_eq!(positions(RoutingMode::ContinuousA), [Off, Off, Off]);
        assert_eq!(positions(RoutingMode::ContinuousB), [Off, On, Off]);
        assert_eq!(positions(RoutingMode::PulseLoopA), [On, Off, On]);
        assert_eq!(positions(RoutingMode::PulseLoopB), [On, On, On]);
        assert!(RoutingMode::PulseValve.vector().is_none());
    }

    #[test]
    fn vectors_apply_a_then_b_then_c() {
        for mode in RoutingMode::VECTOR_MODES {
            let ids = mode.vector().unwrap().map(|(v, _)| v);
            assert_eq!(ids, [ValveId::A, ValveId::B, ValveId::C]);
        }
    }
}
