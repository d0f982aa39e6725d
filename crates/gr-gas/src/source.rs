//! Gas source selection valves.
//!
//! Several gases share one MFC; a selection valve upstream decides which gas
//! the controller meters. The mapping is fixed by the manifold plumbing.

use gr_config::{ConfigError, ConfigResult, RigConfig};
use gr_core::{Clock, GasId, ValveId};
use gr_devices::{LinkResult, ValveController, ValveLink, ValveTarget};
use tracing::info;

/// Upstream source selections on the manifold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceSelection {
    CarrierHeA,
    CarrierArA,
    CarrierHeB,
    CarrierArB,
    CarbonMonoxide,
    CarbonDioxide,
    Methane,
    Ethane,
    HydrogenA,
    DeuteriumA,
    HydrogenB,
    DeuteriumB,
    /// O2 has a dedicated controller on each line and no selection valve.
    Oxygen,
}

impl SourceSelection {
    /// Selection a channel needs before it may flow.
    ///
    /// N2 is plumbed behind the Ar carrier position and C3H8 behind the
    /// C2H6 position.
    pub fn for_gas(gas: GasId) -> Self {
        use GasId::*;
        match gas {
            H2A => SourceSelection::HydrogenA,
            H2B => SourceSelection::HydrogenB,
            D2A => SourceSelection::DeuteriumA,
            D2B => SourceSelection::DeuteriumB,
            O2A | O2B => SourceSelection::Oxygen,
            CoAH | CoAL | CoBH | CoBL => SourceSelection::CarbonMonoxide,
            Co2AH | Co2AL | Co2BH | Co2BL => SourceSelection::CarbonDioxide,
            Ch4A | Ch4B => SourceSelection::Methane,
            C2h6A | C2h6B | C3h8A | C3h8B => SourceSelection::Ethane,
            HeA => SourceSelection::CarrierHeA,
            HeB => SourceSelection::CarrierHeB,
            ArA | N2A => SourceSelection::CarrierArA,
            ArB | N2B => SourceSelection::CarrierArB,
        }
    }

    /// Valve and position realising this selection, if any.
    pub fn valve_setting(self) -> Option<(ValveId, ValveTarget)> {
        use SourceSelection::*;
        let setting = match self {
            CarrierHeA => (ValveId::G, ValveTarget::Off),
            CarrierArA => (ValveId::G, ValveTarget::On),
            CarrierHeB => (ValveId::F, ValveTarget::On),
            CarrierArB => (ValveId::F, ValveTarget::Off),
            CarbonMonoxide => (ValveId::D, ValveTarget::Off),
            CarbonDioxide => (ValveId::D, ValveTarget::On),
            Methane => (ValveId::E, ValveTarget::On),
            Ethane => (ValveId::E, ValveTarget::Off),
            HydrogenA => (ValveId::I, ValveTarget::Off),
            DeuteriumA => (ValveId::I, ValveTarget::On),
            HydrogenB => (ValveId::H, ValveTarget::On),
            DeuteriumB => (ValveId::H, ValveTarget::Off),
            Oxygen => return None,
        };
        Some(setting)
    }

    pub fn describe(self) -> &'static str {
        use SourceSelection::*;
        match self {
            CarrierHeA => "He carrier on line A",
            CarrierArA => "Ar carrier on line A",
            CarrierHeB => "He carrier on line B",
            CarrierArB => "Ar carrier on line B",
            CarbonMonoxide => "CO to lines A and B",
            CarbonDioxide => "CO2 to lines A and B",
            Methane => "CH4 to lines A and B",
            Ethane => "C2H6 to lines A and B",
            HydrogenA => "H2 to line A",
            DeuteriumA => "D2 to line A",
            HydrogenB => "H2 to line B",
            DeuteriumB => "D2 to line B",
            Oxygen => "O2 (no selection valve)",
        }
    }
}

/// Anything that can switch a source selection valve.
pub trait SourceSelector {
    fn select_source(&mut self, selection: SourceSelection) -> LinkResult<()>;
}

impl<L: ValveLink, C: Clock> SourceSelector for ValveController<L, C> {
    fn select_source(&mut self, selection: SourceSelection) -> LinkResult<()> {
        if let Some((valve, target)) = selection.valve_setting() {
            self.set_position(valve, target)?;
            info!(selection = selection.describe(), "source selected");
        }
        Ok(())
    }
}

/// Every selection valve a configured gas switches must be in the bank.
pub fn validate_source_valves(config: &RigConfig) -> ConfigResult<()> {
    for gas in config.gases.keys() {
        let Some((valve, _)) = SourceSelection::for_gas(*gas).valve_setting() else {
            continue;
        };
        if !config.valves.letters.contains(&valve) {
            return Err(ConfigError::InvalidValue {
                field: "valves.letters".to_string(),
                reason: format!("valve {valve} selects the source for {gas}"),
            });
        }
    }
    Ok(())
}
