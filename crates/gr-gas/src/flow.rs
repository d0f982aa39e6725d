//! Flow setpoint dispatch to the MFC bus.

use std::collections::BTreeMap;

use gr_core::{Clock, GasId};
use gr_devices::{MfcLink, ParamAddr, ParamData, ParamWrite};
use tracing::{debug, info};

use crate::error::{GasError, GasResult, RangeViolation};
use crate::registry::{GasChannel, GasChannelRegistry};
use crate::setpoint::{FlowSetpoint, validate_flow};
use crate::source::SourceSelector;

/// Channels that share hardware, in the order `set_many` applies them.
///
/// Within a group only one channel may flow at a time.
pub const PRIORITY_GROUPS: &[&[GasId]] = {
    use GasId::*;
    &[
        &[CoAH, CoAL, Co2AH, Co2AL],
        &[CoBH, CoBL, Co2BH, Co2BL],
        &[Ch4A, C2h6A, C3h8A],
        &[Ch4B, C2h6B, C3h8B],
        &[H2A, D2A],
        &[H2B, D2B],
        &[HeA, ArA, N2A],
        &[HeB, ArB, N2B],
        &[O2A],
        &[O2B],
    ]
};

/// What to do after a [`RangeViolation`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    Retry(f64),
    Abort,
}

/// Flows requested for many channels at once. Missing channels are off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetpointRequest {
    flows: BTreeMap<GasId, f64>,
}

impl SetpointRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, gas: GasId, flow: f64) -> Self {
        self.flows.insert(gas, flow);
        self
    }

    pub fn set(&mut self, gas: GasId, flow: f64) {
        self.flows.insert(gas, flow);
    }

    pub fn get(&self, gas: GasId) -> Option<f64> {
        self.flows.get(&gas).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

impl FromIterator<(GasId, f64)> for SetpointRequest {
    fn from_iter<I: IntoIterator<Item = (GasId, f64)>>(iter: I) -> Self {
        Self {
            flows: iter.into_iter().collect(),
        }
    }
}

/// Sole owner of the MFC link.
pub struct FlowSetpointController<M: MfcLink, C: Clock> {
    pub(crate) link: M,
    pub(crate) clock: C,
    pub(crate) registry: GasChannelRegistry,
}

impl<M: MfcLink, C: Clock> FlowSetpointController<M, C> {
    pub fn new(link: M, clock: C, registry: GasChannelRegistry) -> Self {
        Self {
            link,
            clock,
            registry,
        }
    }

    pub fn registry(&self) -> &GasChannelRegistry {
        &self.registry
    }

    /// Validate, route and write one channel's setpoint.
    ///
    /// The source valve is switched before the MFC is touched, and only when
    /// the channel will actually flow. The write is not read back.
    pub fn set_flow(
        &mut self,
        selector: &mut impl SourceSelector,
        gas: GasId,
        flow: Option<f64>,
    ) -> GasResult<FlowSetpoint> {
        let channel = *self.registry.channel(gas)?;
        let setpoint = validate_flow(&channel, flow, self.registry.full_scale())?;
        self.apply(selector, &channel, setpoint)?;
        Ok(setpoint)
    }

    /// [`set_flow`](Self::set_flow) addressed by the channel's script name.
    pub fn set_flow_named(
        &mut self,
        selector: &mut impl SourceSelector,
        name: &str,
        flow: Option<f64>,
    ) -> GasResult<FlowSetpoint> {
        let gas: GasId = name.parse()?;
        self.set_flow(selector, gas, flow)
    }

    /// Like [`set_flow`](Self::set_flow), asking `resolver` for a new flow
    /// each time the request falls outside the channel range.
    pub fn set_flow_with<F>(
        &mut self,
        selector: &mut impl SourceSelector,
        gas: GasId,
        flow: Option<f64>,
        mut resolver: F,
    ) -> GasResult<FlowSetpoint>
    where
        F: FnMut(&RangeViolation) -> Correction,
    {
        let channel = *self.registry.channel(gas)?;
        let mut flow = flow;
        let setpoint = loop {
            match validate_flow(&channel, flow, self.registry.full_scale()) {
                Ok(sp) => break sp,
                Err(GasError::RangeViolation(violation)) => match resolver(&violation) {
                    Correction::Retry(next) => {
                        info!(gas = %gas, rejected = violation.requested, next, "retrying flow");
                        flow = Some(next);
                    }
                    Correction::Abort => return Err(GasError::Aborted { gas }),
                },
                Err(err) => return Err(err),
            }
        };
        self.apply(selector, &channel, setpoint)?;
        Ok(setpoint)
    }

    /// Apply one channel per [`PRIORITY_GROUPS`] entry.
    ///
    /// The first registered channel with a positive flow wins its group;
    /// otherwise the last registered channel receives its own value (off when
    /// absent). Unregistered channels are skipped.
    pub fn set_many(
        &mut self,
        selector: &mut impl SourceSelector,
        request: &SetpointRequest,
    ) -> GasResult<Vec<FlowSetpoint>> {
        let mut applied = Vec::with_capacity(PRIORITY_GROUPS.len());
        for group in PRIORITY_GROUPS {
            let Some(gas) = select_in_group(group, request, &self.registry) else {
                continue;
            };
            applied.push(self.set_flow(selector, gas, request.get(gas))?);
        }
        Ok(applied)
    }

    fn apply(
        &mut self,
        selector: &mut impl SourceSelector,
        channel: &GasChannel,
        setpoint: FlowSetpoint,
    ) -> GasResult<()> {
        if setpoint.is_flowing() {
            selector.select_source(channel.routing_action())?;
        }

        let mut batch: Vec<ParamWrite> = Vec::with_capacity(2);
        if let Some(curve) = channel.curve {
            batch.push(ParamAddr::ACTIVE_CURVE.write(channel.node, ParamData::Int(curve.into())));
        }
        batch.push(
            ParamAddr::SETPOINT_CODE.write(channel.node, ParamData::Int(setpoint.code.into())),
        );
        debug!(gas = %channel.gas, node = %channel.node, writes = batch.len(), "writing setpoint");
        self.link.write_parameters(&batch)?;
        info!(
            gas = %channel.gas,
            flow = setpoint.validated,
            code = setpoint.code,
            "flow setpoint sent"
        );
        Ok(())
    }
}

fn select_in_group(
    group: &[GasId],
    request: &SetpointRequest,
    registry: &GasChannelRegistry,
) -> Option<GasId> {
    let mut last = None;
    for gas in group.iter().copied().filter(|&g| registry.contains(g)) {
        if request.get(gas).is_some_and(|v| v > 0.0) {
            return Some(gas);
        }
        last = Some(gas);
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_config::RigConfig;

    fn registry() -> GasChannelRegistry {
        GasChannelRegistry::from_config(&RigConfig::reference())
    }

    #[test]
    fn groups_cover_every_channel_once() {
        let mut seen: Vec<GasId> = PRIORITY_GROUPS.iter().flat_map(|g| g.iter().copied()).collect();
        seen.sort();
        let mut all = GasId::ALL.to_vec();
        all.sort();
        assert_eq!(seen, all);
    }

    #[test]
    fn first_positive_wins() {
        let req = SetpointRequest::new().with(GasId::Ch4A, 5.0).with(GasId::C2h6A, 10.0);
        let group = PRIORITY_GROUPS[2];
        assert_eq!(select_in_group(group, &req, &registry()), Some(GasId::Ch4A));
    }

    #[test]
    fn zero_flows_fall_back_to_last() {
        let req = SetpointRequest::new().with(GasId::HeA, 0.0);
        let group = PRIORITY_GROUPS[6];
        assert_eq!(select_in_group(group, &req, &registry()), Some(GasId::N2A));
    }

    #[test]
    fn unregistered_members_are_skipped() {
        let mut config = RigConfig::reference();
        config.gases.remove(&GasId::N2A);
        config.gases.remove(&GasId::O2B);
        let reg = GasChannelRegistry::from_config(&config);
        let req = SetpointRequest::new();
        assert_eq!(select_in_group(PRIORITY_GROUPS[6], &req, &reg), Some(GasId::ArA));
        assert_eq!(select_in_group(PRIORITY_GROUPS[9], &req, &reg), None);
    }
}
