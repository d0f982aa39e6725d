//! The whole rig behind one handle.

use std::time::Duration;

use gr_config::{ConfigError, ConfigResult, RigConfig, validate_config};
use gr_core::{Clock, GasId, GasLine, ValveId};
use gr_devices::{
    MfcLink, SetOutcome, TempLink, ValveController, ValveLink, ValvePosition, ValveTarget,
};
use gr_gas::{
    Correction, FlowSetpoint, FlowSetpointController, FlowStatus, GasChannelRegistry,
    LinePressures, RangeViolation, SetpointRequest, SourceSelection, validate_source_valves,
};
use tracing::info;

use crate::error::{ControlError, ControlResult};
use crate::events::StatusSink;
use crate::pulse::{PulseReport, PulseSequencer};
use crate::retry::Cancellation;
use crate::routing::{RoutingMode, RoutingModeEngine};
use crate::thermal::{RampState, RampSummary, ThermalRampController};
use crate::triggers::{PidReadback, TriggerRecord};

/// The three device links, one per instrument.
pub struct RigLinks<V, M, T> {
    pub valves: V,
    pub mfc: M,
    pub temperature: T,
}

/// Owns every link and component; each operation borrows the parts it needs.
pub struct GasRig<V: ValveLink, M: MfcLink, T: TempLink, C: Clock + Clone> {
    config: RigConfig,
    valves: ValveController<V, C>,
    routing: RoutingModeEngine,
    flows: FlowSetpointController<M, C>,
    pulses: PulseSequencer<C>,
    thermal: ThermalRampController<T, C>,
}

impl<V, M, T, C> GasRig<V, M, T, C>
where
    V: ValveLink,
    M: MfcLink,
    T: TempLink,
    C: Clock + Clone,
{
    /// Validate `config` and wire the components onto `links`.
    pub fn new(config: RigConfig, links: RigLinks<V, M, T>, clock: C) -> ConfigResult<Self> {
        validate_config(&config)?;
        validate_source_valves(&config)?;

        let valves = ValveController::new(
            links.valves,
            clock.clone(),
            config.valves.letters.iter().copied(),
        )
        .with_settle(config.valves.settle());
        let flows = FlowSetpointController::new(
            links.mfc,
            clock.clone(),
            GasChannelRegistry::from_config(&config),
        );
        let pulses = PulseSequencer::new(clock.clone(), &config.pulses).map_err(|err| {
            ConfigError::InvalidValue {
                field: "pulses".to_string(),
                reason: err.to_string(),
            }
        })?;
        let thermal = ThermalRampController::new(links.temperature, clock, &config.thermal)
            .map_err(|err| ConfigError::InvalidValue {
                field: "thermal".to_string(),
                reason: err.to_string(),
            })?;

        info!(
            valves = valves.valves().len(),
            gases = config.gases.len(),
            "rig assembled"
        );
        Ok(Self {
            config,
            valves,
            routing: RoutingModeEngine::new(),
            flows,
            pulses,
            thermal,
        })
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn registry(&self) -> &GasChannelRegistry {
        self.flows.registry()
    }

    // ---- valves and routing ----

    pub fn routing_mode(&self) -> Option<RoutingMode> {
        self.routing.active()
    }

    pub fn valve_positions(&mut self) -> ControlResult<Vec<(ValveId, ValvePosition)>> {
        Ok(self.valves.get_all_positions()?)
    }

    pub fn enter_mode(&mut self, mode: RoutingMode) -> ControlResult<[SetOutcome; 3]> {
        self.routing.enter(&mut self.valves, mode)
    }

    pub fn select_source(&mut self, selection: SourceSelection) -> ControlResult<()> {
        self.routing.select_source(&mut self.valves, selection)
    }

    pub fn set_mode_valve(
        &mut self,
        valve: ValveId,
        target: ValveTarget,
    ) -> ControlResult<SetOutcome> {
        self.routing.set_mode_valve(&mut self.valves, valve, target)
    }

    // ---- flows ----

    pub fn set_flow(&mut self, gas: GasId, flow: Option<f64>) -> ControlResult<FlowSetpoint> {
        Ok(self.flows.set_flow(&mut self.valves, gas, flow)?)
    }

    pub fn set_flow_with<F>(
        &mut self,
        gas: GasId,
        flow: Option<f64>,
        resolver: F,
    ) -> ControlResult<FlowSetpoint>
    where
        F: FnMut(&RangeViolation) -> Correction,
    {
        Ok(self
            .flows
            .set_flow_with(&mut self.valves, gas, flow, resolver)?)
    }

    pub fn set_many(&mut self, request: &SetpointRequest) -> ControlResult<Vec<FlowSetpoint>> {
        Ok(self.flows.set_many(&mut self.valves, request)?)
    }

    pub fn read_status(&mut self, delay: Duration) -> ControlResult<FlowStatus> {
        Ok(self.flows.read_status(delay)?)
    }

    pub fn read_pressures(&mut self) -> ControlResult<LinePressures> {
        Ok(self.flows.read_pressures()?)
    }

    // ---- pulses ----

    pub fn loop_pulses(
        &mut self,
        line: GasLine,
        pulses: u32,
        between: Duration,
        cancel: &Cancellation,
    ) -> ControlResult<PulseReport> {
        self.pulses
            .loop_pulses(&mut self.routing, &mut self.valves, line, pulses, between, cancel)
    }

    pub fn valve_pulses(
        &mut self,
        pulses: u32,
        open: Duration,
        between: Duration,
        cancel: &Cancellation,
    ) -> ControlResult<PulseReport> {
        self.pulses
            .valve_pulses(&mut self.routing, &mut self.valves, pulses, open, between, cancel)
    }

    // ---- temperature ----

    pub fn ramp_state(&self) -> RampState {
        self.thermal.state()
    }

    pub fn process_value(&mut self, cancel: &Cancellation) -> ControlResult<f64> {
        self.thermal.process_value(cancel)
    }

    pub fn heating_event(
        &mut self,
        rate: Option<f64>,
        setpoint: Option<f64>,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<RampSummary> {
        self.thermal
            .heating_event(rate, setpoint, &mut self.flows, sink, cancel)
    }

    pub fn cooling_event(
        &mut self,
        rate: Option<f64>,
        setpoint: Option<f64>,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<RampSummary> {
        self.thermal
            .cooling_event(rate, setpoint, &mut self.flows, sink, cancel)
    }

    pub fn ramp_to_setpoint(
        &mut self,
        rate: Option<f64>,
        setpoint: Option<f64>,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<RampSummary> {
        self.thermal
            .ramp_to_setpoint(rate, setpoint, &mut self.flows, sink, cancel)
    }

    pub fn time_event(
        &mut self,
        duration: Duration,
        label: &str,
        sink: &mut impl StatusSink,
        cancel: &Cancellation,
    ) -> ControlResult<()> {
        self.thermal
            .time_event(duration, label, &mut self.flows, sink, cancel)
    }

    pub fn finish_experiment(&mut self) {
        self.thermal.finish_experiment();
    }

    // ---- triggers ----

    /// Import the PID profile configured under `name`.
    pub fn apply_pid_profile(
        &mut self,
        name: &str,
        cancel: &Cancellation,
    ) -> ControlResult<PidReadback> {
        let profile = *self
            .config
            .pid_profiles
            .get(name)
            .ok_or_else(|| ControlError::UnknownProfile {
                name: name.to_string(),
            })?;
        self.thermal.apply_pid_profile(&profile, cancel)
    }

    pub fn ms_start(&mut self) -> ControlResult<TriggerRecord> {
        self.thermal.ms_start(&self.config.triggers)
    }

    pub fn ms_stop(&mut self) -> ControlResult<TriggerRecord> {
        self.thermal.ms_stop(&self.config.triggers)
    }

    pub fn ir_start(&mut self) -> ControlResult<TriggerRecord> {
        self.thermal.ir_start(&self.config.triggers)
    }

    pub fn pulse_marker_on(&mut self) -> ControlResult<TriggerRecord> {
        self.thermal.pulse_marker_on(&self.config.triggers)
    }

    pub fn pulse_marker_off(&mut self) -> ControlResult<TriggerRecord> {
        self.thermal.pulse_marker_off()
    }

    pub fn wait_ir_ready(&mut self, cancel: &Cancellation) -> ControlResult<TriggerRecord> {
        self.thermal.wait_ir_ready(&self.config.triggers, cancel)
    }
}
