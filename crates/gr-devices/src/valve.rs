//! Valve bank commands and the verifying valve controller.
//!
//! Wire vocabulary: `/{letter}{OP}\r` with
//! - `CW` move to position A (OFF)
//! - `CC` move to position B (ON)
//! - `CP` query position
//! - `TO` toggle (pulse strobe)

use std::time::Duration;

use gr_core::{Clock, ValveId};
use tracing::{debug, warn};

use crate::error::{LinkError, LinkKind, LinkResult};
use crate::link::ValveLink;

/// Default wait between a move command and its position query.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

/// Operation code sent to a valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveOp {
    MoveOff,
    MoveOn,
    QueryPosition,
    Strobe,
}

impl ValveOp {
    pub fn code(self) -> &'static str {
        match self {
            ValveOp::MoveOff => "CW",
            ValveOp::MoveOn => "CC",
            ValveOp::QueryPosition => "CP",
            ValveOp::Strobe => "TO",
        }
    }

    /// Full command frame for `valve`.
    pub fn frame(self, valve: ValveId) -> Vec<u8> {
        format!("/{}{}\r", valve.letter(), self.code()).into_bytes()
    }
}

/// Commandable valve position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValveTarget {
    Off,
    On,
}

impl ValveTarget {
    pub fn op(self) -> ValveOp {
        match self {
            ValveTarget::Off => ValveOp::MoveOff,
            ValveTarget::On => ValveOp::MoveOn,
        }
    }

    /// Position character the valve reports once it has arrived.
    pub fn expected_code(self) -> char {
        match self {
            ValveTarget::Off => 'A',
            ValveTarget::On => 'B',
        }
    }

    pub fn position(self) -> ValvePosition {
        match self {
            ValveTarget::Off => ValvePosition::Off,
            ValveTarget::On => ValvePosition::On,
        }
    }
}

/// Position as read back from hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValvePosition {
    Off,
    On,
    Unknown,
}

impl ValvePosition {
    pub fn from_code(code: char) -> Self {
        match code {
            'A' => ValvePosition::Off,
            'B' => ValvePosition::On,
            _ => ValvePosition::Unknown,
        }
    }
}

impl core::fmt::Display for ValvePosition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ValvePosition::Off => f.write_str("OFF"),
            ValvePosition::On => f.write_str("ON"),
            ValvePosition::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Parsed answer to a position query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveReading {
    /// Valve identifier echoed by the device.
    pub reported_id: char,
    pub position: ValvePosition,
}

impl ValveReading {
    /// Parse a query response: id at offset 1, position code at offset -2.
    pub fn parse(response: &str) -> LinkResult<Self> {
        let trimmed = response.trim();
        let chars: Vec<char> = trimmed.chars().collect();
        if chars.len() < 3 {
            return Err(LinkError::malformed(
                LinkKind::Valve,
                format!("position response too short: {trimmed:?}"),
            ));
        }
        Ok(Self {
            reported_id: chars[1],
            position: ValvePosition::from_code(chars[chars.len() - 2]),
        })
    }
}

/// Result of a verified move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Read-back matched on the first attempt.
    Confirmed,
    /// Read-back did not match; the command was sent a second time and
    /// accepted without another check. `observed` is the first read-back.
    Resent { observed: ValvePosition },
}

/// Sole owner of the valve link.
pub struct ValveController<L: ValveLink, C: Clock> {
    link: L,
    clock: C,
    valves: Vec<ValveId>,
    settle: Duration,
}

impl<L: ValveLink, C: Clock> ValveController<L, C> {
    /// Controller for `valves`, kept in id order for bulk queries.
    pub fn new(link: L, clock: C, valves: impl IntoIterator<Item = ValveId>) -> Self {
        let mut valves: Vec<ValveId> = valves.into_iter().collect();
        valves.sort();
        valves.dedup();
        Self {
            link,
            clock,
            valves,
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn valves(&self) -> &[ValveId] {
        &self.valves
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Move `valve` to `target`, verify once, resend once on mismatch.
    pub fn set_position(&mut self, valve: ValveId, target: ValveTarget) -> LinkResult<SetOutcome> {
        let op = target.op();
        self.send(valve, op)?;
        self.clock.sleep(self.settle);

        let observed = match self.get_position(valve) {
            Ok(reading) => reading.position,
            Err(err) => {
                debug!(valve = %valve, error = %err, "position read-back failed");
                ValvePosition::Unknown
            }
        };
        if observed == target.position() {
            return Ok(SetOutcome::Confirmed);
        }

        // Second attempt is not verified.
        warn!(
            valve = %valve,
            expected = %target.position(),
            observed = %observed,
            "valve did not reach target, resending once"
        );
        self.send(valve, op)?;
        Ok(SetOutcome::Resent { observed })
    }

    /// Query and parse the current position of `valve`.
    pub fn get_position(&mut self, valve: ValveId) -> LinkResult<ValveReading> {
        self.send(valve, ValveOp::QueryPosition)?;
        let line = self.link.read_line()?;
        ValveReading::parse(&line)
    }

    /// Query every configured valve in id order.
    pub fn get_all_positions(&mut self) -> LinkResult<Vec<(ValveId, ValvePosition)>> {
        let valves = self.valves.clone();
        valves
            .into_iter()
            .map(|valve| Ok((valve, self.get_position(valve)?.position)))
            .collect()
    }

    /// Fire the toggle actuation without read-back.
    pub fn strobe(&mut self, valve: ValveId) -> LinkResult<()> {
        self.send(valve, ValveOp::Strobe)
    }

    fn send(&mut self, valve: ValveId, op: ValveOp) -> LinkResult<()> {
        debug!(valve = %valve, op = op.code(), "valve command");
        self.link.write_command(&op.frame(valve))
    }
}
