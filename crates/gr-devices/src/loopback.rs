//! In-memory device models.
//!
//! Each model is a cheap shared handle: clones observe and steer the same
//! device, so one clone can be moved into a controller while another stays
//! with the caller for inspection. Used for dry runs and throughout the test
//! suites.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use gr_core::{NodeId, ValveId};

use crate::error::{LinkError, LinkKind, LinkResult};
use crate::link::{MfcLink, TempLink, ValveLink};
use crate::mfc::{ParamAddr, ParamData, ParamRead, ParamWrite};

#[derive(Debug, Default)]
struct ValveBankState {
    positions: BTreeMap<char, char>,
    commands: Vec<String>,
    responses: VecDeque<String>,
    stuck: BTreeSet<char>,
    jammed: BTreeSet<char>,
    failing_queries: usize,
}

/// Valve bank that moves instantly and answers position queries.
#[derive(Clone, Debug, Default)]
pub struct LoopbackValveBank {
    state: Rc<RefCell<ValveBankState>>,
}

impl LoopbackValveBank {
    /// Bank with every valve in position A.
    pub fn new() -> Self {
        let bank = Self::default();
        {
            let mut state = bank.state.borrow_mut();
            for valve in ValveId::all() {
                state.positions.insert(valve.letter(), 'A');
            }
        }
        bank
    }

    /// Valve ignores move commands until released.
    pub fn stick(&self, valve: ValveId) {
        self.state.borrow_mut().stuck.insert(valve.letter());
    }

    pub fn release(&self, valve: ValveId) {
        self.state.borrow_mut().stuck.remove(&valve.letter());
    }

    /// Commands addressed to `valve` fail at the link.
    pub fn jam(&self, valve: ValveId) {
        self.state.borrow_mut().jammed.insert(valve.letter());
    }

    /// The next `n` position queries produce no response line.
    pub fn fail_queries(&self, n: usize) {
        self.state.borrow_mut().failing_queries = n;
    }

    pub fn force_position(&self, valve: ValveId, code: char) {
        self.state
            .borrow_mut()
            .positions
            .insert(valve.letter(), code);
    }

    /// Raw position code of `valve`.
    pub fn position_code(&self, valve: ValveId) -> char {
        self.state
            .borrow()
            .positions
            .get(&valve.letter())
            .copied()
            .unwrap_or('?')
    }

    /// Every command received, without the terminator.
    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    /// Commands other than position queries.
    pub fn actuations(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| !c.ends_with("CP"))
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().commands.clear();
    }
}

impl ValveLink for LoopbackValveBank {
    fn write_command(&mut self, bytes: &[u8]) -> LinkResult<()> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LinkError::malformed(LinkKind::Valve, e.to_string()))?;
        let frame = text.trim_end_matches('\r');
        let mut chars = frame.chars();
        let (Some('/'), Some(letter)) = (chars.next(), chars.next()) else {
            return Err(LinkError::malformed(LinkKind::Valve, frame.to_string()));
        };
        let op: String = chars.collect();

        let mut state = self.state.borrow_mut();
        if state.jammed.contains(&letter) {
            return Err(LinkError::io(LinkKind::Valve, format!("valve {letter} not answering")));
        }
        state.commands.push(frame.to_string());
        let stuck = state.stuck.contains(&letter);
        match op.as_str() {
            "CW" if !stuck => {
                state.positions.insert(letter, 'A');
            }
            "CC" if !stuck => {
                state.positions.insert(letter, 'B');
            }
            "TO" if !stuck => {
                let next = match state.positions.get(&letter) {
                    Some('A') => 'B',
                    _ => 'A',
                };
                state.positions.insert(letter, next);
            }
            "CP" => {
                if state.failing_queries > 0 {
                    state.failing_queries -= 1;
                } else {
                    let code = state.positions.get(&letter).copied().unwrap_or('?');
                    state
                        .responses
                        .push_back(format!("/{letter} Position is \"{code}\"\r\n"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn read_line(&mut self) -> LinkResult<String> {
        self.state
            .borrow_mut()
            .responses
            .pop_front()
            .ok_or_else(|| LinkError::io(LinkKind::Valve, "read timed out"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct NodeState {
    measured: f64,
    setpoint: f64,
    curve: i64,
}

#[derive(Debug, Default)]
struct MfcBusState {
    nodes: BTreeMap<NodeId, NodeState>,
    writes: Vec<ParamWrite>,
    failing_reads: usize,
}

/// MFC bus whose readings are set by the caller and whose writes are logged.
#[derive(Clone, Debug, Default)]
pub struct LoopbackMfcBus {
    state: Rc<RefCell<MfcBusState>>,
}

impl LoopbackMfcBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what `node` reports for measured value and setpoint.
    pub fn set_reading(&self, node: NodeId, measured: f64, setpoint: f64) {
        let mut state = self.state.borrow_mut();
        let entry = state.nodes.entry(node).or_default();
        entry.measured = measured;
        entry.setpoint = setpoint;
    }

    pub fn set_curve(&self, node: NodeId, curve: i64) {
        self.state.borrow_mut().nodes.entry(node).or_default().curve = curve;
    }

    pub fn curve(&self, node: NodeId) -> i64 {
        self.state
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.curve)
            .unwrap_or_default()
    }

    /// The next `n` batch reads fail.
    pub fn fail_reads(&self, n: usize) {
        self.state.borrow_mut().failing_reads = n;
    }

    pub fn writes(&self) -> Vec<ParamWrite> {
        self.state.borrow().writes.clone()
    }
}

impl MfcLink for LoopbackMfcBus {
    fn read_parameters(&mut self, params: &[ParamRead]) -> LinkResult<Vec<ParamData>> {
        let mut state = self.state.borrow_mut();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(LinkError::io(LinkKind::Mfc, "no answer from bus"));
        }
        params
            .iter()
            .map(|p| {
                let node = state.nodes.get(&p.node).copied().unwrap_or_default();
                match p.addr {
                    a if a == ParamAddr::MEASURED => Ok(ParamData::Float(node.measured)),
                    a if a == ParamAddr::SETPOINT => Ok(ParamData::Float(node.setpoint)),
                    a if a == ParamAddr::ACTIVE_CURVE => Ok(ParamData::Int(node.curve)),
                    a => Err(LinkError::malformed(
                        LinkKind::Mfc,
                        format!("unsupported parameter {}/{}", a.process, a.parameter),
                    )),
                }
            })
            .collect()
    }

    fn write_parameters(&mut self, params: &[ParamWrite]) -> LinkResult<()> {
        let mut state = self.state.borrow_mut();
        for p in params {
            if p.addr == ParamAddr::ACTIVE_CURVE {
                if let Some(curve) = p.data.as_int() {
                    state.nodes.entry(p.node).or_default().curve = curve;
                }
            }
            state.writes.push(*p);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TempState {
    registers: BTreeMap<u16, f64>,
    scripted: BTreeMap<u16, VecDeque<f64>>,
    writes: Vec<(u16, f64)>,
    reads: usize,
    failing_reads: usize,
    read_only: BTreeSet<u16>,
}

/// Temperature controller with plain registers and scripted sequences.
#[derive(Clone, Debug, Default)]
pub struct LoopbackTemperature {
    state: Rc<RefCell<TempState>>,
}

impl LoopbackTemperature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_register(&self, address: u16, value: f64) {
        self.state.borrow_mut().registers.insert(address, value);
    }

    pub fn register(&self, address: u16) -> Option<f64> {
        self.state.borrow().registers.get(&address).copied()
    }

    /// Successive reads of `address` return `values` in order; the last one
    /// then sticks.
    pub fn script(&self, address: u16, values: impl IntoIterator<Item = f64>) {
        self.state
            .borrow_mut()
            .scripted
            .insert(address, values.into_iter().collect());
    }

    /// The next `n` reads fail, whatever the register.
    pub fn fail_reads(&self, n: usize) {
        self.state.borrow_mut().failing_reads = n;
    }

    /// Writes to `address` are refused.
    pub fn make_read_only(&self, address: u16) {
        self.state.borrow_mut().read_only.insert(address);
    }

    pub fn writes(&self) -> Vec<(u16, f64)> {
        self.state.borrow().writes.clone()
    }

    /// Number of successful reads served.
    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }
}

impl TempLink for LoopbackTemperature {
    fn read_register(&mut self, address: u16, _decimals: u8) -> LinkResult<f64> {
        let mut state = self.state.borrow_mut();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(LinkError::io(LinkKind::Temperature, "no answer"));
        }
        let scripted = match state.scripted.get_mut(&address) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().copied(),
            None => None,
        };
        let value = match scripted {
            Some(v) => {
                state.registers.insert(address, v);
                v
            }
            None => state.registers.get(&address).copied().ok_or_else(|| {
                LinkError::malformed(LinkKind::Temperature, format!("register {address} unset"))
            })?,
        };
        state.reads += 1;
        Ok(value)
    }

    fn write_register(&mut self, address: u16, value: f64, _decimals: u8) -> LinkResult<()> {
        let mut state = self.state.borrow_mut();
        if state.read_only.contains(&address) {
            return Err(LinkError::io(
                LinkKind::Temperature,
                format!("register {address} is read-only"),
            ));
        }
        state.writes.push((address, value));
        state.registers.insert(address, value);
        Ok(())
    }
}
