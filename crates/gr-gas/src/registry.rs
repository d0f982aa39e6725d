//! Static gas → hardware mapping, built once from configuration.

use std::collections::BTreeMap;

use gr_config::{FlowRange, LineNodes, RigConfig};
use gr_core::{GasId, GasLine, NodeId};

use crate::error::{GasError, GasResult};
use crate::source::SourceSelection;

/// One registered channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasChannel {
    pub gas: GasId,
    pub node: NodeId,
    pub curve: Option<u8>,
    pub range: FlowRange,
    pub calibration_factor: f64,
    pub divisor: f64,
}

impl GasChannel {
    pub fn routing_action(&self) -> SourceSelection {
        SourceSelection::for_gas(self.gas)
    }
}

#[derive(Debug, Clone)]
pub struct GasChannelRegistry {
    channels: BTreeMap<GasId, GasChannel>,
    full_scale: u16,
    pressure_nodes: LineNodes,
}

impl GasChannelRegistry {
    /// Registry over the channels of a validated configuration.
    pub fn from_config(config: &RigConfig) -> Self {
        let channels = config
            .gases
            .iter()
            .map(|(&gas, c)| {
                (
                    gas,
                    GasChannel {
                        gas,
                        node: c.node,
                        curve: c.curve,
                        range: c.range,
                        calibration_factor: c.calibration_factor,
                        divisor: c.divisor,
                    },
                )
            })
            .collect();
        Self {
            channels,
            full_scale: config.mfc.full_scale,
            pressure_nodes: config.mfc.pressure_nodes,
        }
    }

    pub fn channel(&self, gas: GasId) -> GasResult<&GasChannel> {
        self.channels.get(&gas).ok_or_else(|| GasError::UnknownGas {
            gas: gas.to_string(),
        })
    }

    pub fn contains(&self, gas: GasId) -> bool {
        self.channels.contains_key(&gas)
    }

    pub fn channels(&self) -> impl Iterator<Item = &GasChannel> {
        self.channels.values()
    }

    pub fn range(&self, gas: GasId) -> GasResult<FlowRange> {
        Ok(self.channel(gas)?.range)
    }

    pub fn calibration_factor(&self, gas: GasId) -> GasResult<f64> {
        Ok(self.channel(gas)?.calibration_factor)
    }

    pub fn curve_index(&self, gas: GasId) -> GasResult<Option<u8>> {
        Ok(self.channel(gas)?.curve)
    }

    pub fn node(&self, gas: GasId) -> GasResult<NodeId> {
        Ok(self.channel(gas)?.node)
    }

    pub fn quantization_divisor(&self, gas: GasId) -> GasResult<f64> {
        Ok(self.channel(gas)?.divisor)
    }

    pub fn routing_action(&self, gas: GasId) -> GasResult<SourceSelection> {
        Ok(self.channel(gas)?.routing_action())
    }

    /// Which gas a node is metering, given the curve it reports.
    ///
    /// Nodes with a single channel match regardless of the reported curve.
    pub fn gas_for_curve(&self, node: NodeId, curve: Option<i64>) -> Option<GasId> {
        let mut on_node = self.channels.values().filter(|c| c.node == node);
        let first = on_node.next()?;
        let rest: Vec<&GasChannel> = on_node.collect();
        if rest.is_empty() {
            return Some(first.gas);
        }
        let curve = curve?;
        std::iter::once(first)
            .chain(rest)
            .find(|c| c.curve.map(i64::from) == Some(curve))
            .map(|c| c.gas)
    }

    /// Distinct flow nodes feeding `line`, ascending.
    pub fn nodes_for_line(&self, line: GasLine) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self
            .channels
            .values()
            .filter(|c| c.gas.line() == line)
            .map(|c| c.node)
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    /// Whether any channel on `node` selects a curve.
    pub fn node_has_curves(&self, node: NodeId) -> bool {
        self.channels
            .values()
            .any(|c| c.node == node && c.curve.is_some())
    }

    pub fn full_scale(&self) -> u16 {
        self.full_scale
    }

    pub fn pressure_nodes(&self) -> LineNodes {
        self.pressure_nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> GasChannelRegistry {
        GasChannelRegistry::from_config(&RigConfig::reference())
    }

    #[test]
    fn reference_carrier_channel() {
        let reg = registry();
        let he = reg.channel(GasId::HeA).unwrap();
        assert_eq!(he.node, NodeId(8));
        assert_eq!(he.curve, Some(0));
        assert_eq!(he.range, FlowRange::new(1.2, 60.0));
        assert_eq!(he.divisor, 60.0);
        assert_eq!(
            reg.routing_action(GasId::HeA).unwrap(),
            SourceSelection::CarrierHeA
        );
    }

    #[test]
    fn oxygen_reselects_curve_zero() {
        let reg = registry();
        assert_eq!(reg.curve_index(GasId::O2B).unwrap(), Some(0));
        assert!(reg.node_has_curves(NodeId(12)));
    }

    #[test]
    fn missing_channel_is_unknown_gas() {
        let mut config = RigConfig::reference();
        config.gases.remove(&GasId::N2B);
        let reg = GasChannelRegistry::from_config(&config);
        assert!(matches!(
            reg.node(GasId::N2B),
            Err(GasError::UnknownGas { gas }) if gas == "N2_B"
        ));
    }

    #[test]
    fn curve_decodes_to_gas() {
        let reg = registry();
        assert_eq!(reg.gas_for_curve(NodeId(6), Some(3)), Some(GasId::CoAL));
        assert_eq!(reg.gas_for_curve(NodeId(11), Some(1)), Some(GasId::Co2BH));
        assert_eq!(reg.gas_for_curve(NodeId(6), Some(7)), None);
        assert_eq!(reg.gas_for_curve(NodeId(5), Some(4)), Some(GasId::O2A));
        assert_eq!(reg.gas_for_curve(NodeId(3), Some(0)), None);
    }

    #[test]
    fn line_a_nodes() {
        let nodes = registry().nodes_for_line(GasLine::A);
        assert_eq!(
            nodes,
            vec![NodeId(4), NodeId(5), NodeId(6), NodeId(7), NodeId(8)]
        );
    }
}
