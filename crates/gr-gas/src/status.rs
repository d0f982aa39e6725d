//! Measured flow and line pressure read-back.

use std::fmt;
use std::time::Duration;

use gr_core::{Clock, GasId, GasLine, NodeId, Psia, Sccm};
use gr_devices::{MfcLink, ParamAddr, ParamData, ParamRead};
use tracing::debug;

use crate::error::{GasError, GasResult};
use crate::flow::FlowSetpointController;

/// Upstream pressure of both delivery lines.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinePressures {
    pub a: Psia,
    pub b: Psia,
}

/// What one flow node reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    pub node: NodeId,
    pub line: GasLine,
    /// Gas decoded from the node's active curve; `None` when the curve does
    /// not match any registered channel.
    pub gas: Option<GasId>,
    pub measured: Sccm,
    pub setpoint: Sccm,
    /// Percentage of the line's total measured flow.
    pub share: Option<f64>,
}

/// Snapshot of every flow node and both line pressures.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStatus {
    pub channels: Vec<ChannelReading>,
    pub pressures: LinePressures,
}

impl FlowStatus {
    pub fn total(&self, line: GasLine) -> Sccm {
        self.channels
            .iter()
            .filter(|c| c.line == line)
            .map(|c| c.measured)
            .sum()
    }

    /// Channels with a non-zero setpoint.
    pub fn active(&self) -> impl Iterator<Item = &ChannelReading> {
        self.channels.iter().filter(|c| c.setpoint != 0.0)
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Flow Report ---")?;
        for c in self.active() {
            match c.gas {
                Some(gas) => write!(f, "{gas}")?,
                None => write!(f, "{} (line {})", c.node, c.line)?,
            }
            write!(
                f,
                ": measured flow is {:.2} sccm. Flow setpoint is {:.2} sccm.",
                c.measured, c.setpoint
            )?;
            if let Some(share) = c.share {
                write!(f, " Concentration is {share:.1}%")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "Total flow line A: {:.2} sccm", self.total(GasLine::A))?;
        writeln!(f, "Total flow line B: {:.2} sccm", self.total(GasLine::B))?;
        writeln!(f, "--- Pressure Report ---")?;
        writeln!(f, "Pressure in line A: {:.2} psia", self.pressures.a)?;
        write!(f, "Pressure in line B: {:.2} psia", self.pressures.b)
    }
}

/// Source of line pressures for status events.
pub trait PressureSource {
    fn line_pressures(&mut self) -> GasResult<LinePressures>;
}

impl<M: MfcLink, C: Clock> PressureSource for FlowSetpointController<M, C> {
    fn line_pressures(&mut self) -> GasResult<LinePressures> {
        self.read_pressures()
    }
}

impl<M: MfcLink, C: Clock> FlowSetpointController<M, C> {
    /// Measured pressure on the two line pressure controllers.
    pub fn read_pressures(&mut self) -> GasResult<LinePressures> {
        let nodes = self.registry.pressure_nodes();
        let reads = [ParamAddr::MEASURED.at(nodes.a), ParamAddr::MEASURED.at(nodes.b)];
        let values = self.link.read_parameters(&reads)?;
        let [a, b] = values.as_slice() else {
            return Err(malformed("pressure read", reads.len(), values.len()));
        };
        Ok(LinePressures {
            a: a.as_f64(),
            b: b.as_f64(),
        })
    }

    /// Wait `delay`, then read every flow node and both pressures in one batch.
    pub fn read_status(&mut self, delay: Duration) -> GasResult<FlowStatus> {
        self.clock.sleep(delay);

        let mut layout: Vec<(NodeId, GasLine, bool)> = Vec::new();
        for line in [GasLine::A, GasLine::B] {
            for node in self.registry.nodes_for_line(line) {
                layout.push((node, line, self.registry.node_has_curves(node)));
            }
        }

        let mut reads: Vec<ParamRead> = Vec::with_capacity(layout.len() * 3 + 2);
        for &(node, _, curves) in &layout {
            reads.push(ParamAddr::MEASURED.at(node));
            reads.push(ParamAddr::SETPOINT.at(node));
            if curves {
                reads.push(ParamAddr::ACTIVE_CURVE.at(node));
            }
        }
        let pressure_nodes = self.registry.pressure_nodes();
        reads.push(ParamAddr::MEASURED.at(pressure_nodes.a));
        reads.push(ParamAddr::MEASURED.at(pressure_nodes.b));

        debug!(params = reads.len(), "reading flow status");
        let values = self.link.read_parameters(&reads)?;
        if values.len() != reads.len() {
            return Err(malformed("status read", reads.len(), values.len()));
        }

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or(ParamData::Float(0.0));
        let mut channels = Vec::with_capacity(layout.len());
        for (node, line, curves) in layout {
            let measured = next().as_f64();
            let setpoint = next().as_f64();
            let curve = if curves { next().as_int() } else { None };
            channels.push(ChannelReading {
                node,
                line,
                gas: self.registry.gas_for_curve(node, curve),
                measured,
                setpoint,
                share: None,
            });
        }
        let pressures = LinePressures {
            a: next().as_f64(),
            b: next().as_f64(),
        };

        let mut status = FlowStatus {
            channels,
            pressures,
        };
        for line in [GasLine::A, GasLine::B] {
            let total = status.total(line);
            for c in status.channels.iter_mut().filter(|c| c.line == line) {
                c.share = (total != 0.0).then(|| c.measured / total * 100.0);
            }
        }
        Ok(status)
    }
}

fn malformed(what: &str, expected: usize, got: usize) -> GasError {
    GasError::MalformedStatus {
        what: format!("{what}: expected {expected} values, got {got}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(gas: GasId, line: GasLine, measured: f64, setpoint: f64) -> ChannelReading {
        ChannelReading {
            node: NodeId(1),
            line,
            gas: Some(gas),
            measured,
            setpoint,
            share: Some(50.0),
        }
    }

    #[test]
    fn report_omits_idle_channels() {
        let status = FlowStatus {
            channels: vec![
                reading(GasId::HeA, GasLine::A, 30.0, 30.0),
                reading(GasId::Co2AH, GasLine::A, 30.0, 30.0),
                reading(GasId::ArB, GasLine::B, 0.0, 0.0),
            ],
            pressures: LinePressures { a: 14.7, b: 15.1 },
        };
        let report = status.to_string();
        assert!(report.contains("He_A: measured flow is 30.00 sccm"));
        assert!(report.contains("Concentration is 50.0%"));
        assert!(!report.contains("Ar_B"));
        assert!(report.contains("Total flow line A: 60.00 sccm"));
        assert!(report.contains("Pressure in line B: 15.10 psia"));
    }
}
