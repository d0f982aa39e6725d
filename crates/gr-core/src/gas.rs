//! Closed set of gas channel identifiers.
//!
//! Each identifier names a gas on a delivery line, and for CO/CO2 also the
//! calibration range (`H` high, `L` low) of the shared controller.

use core::fmt;
use core::str::FromStr;

use crate::error::CoreError;

/// Delivery line a channel feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GasLine {
    A,
    B,
}

impl fmt::Display for GasLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasLine::A => f.write_str("A"),
            GasLine::B => f.write_str("B"),
        }
    }
}

macro_rules! gas_ids {
    ($($variant:ident => $name:literal, $line:ident;)+) => {
        /// Gas channel identifier.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum GasId {
            $(
                #[cfg_attr(feature = "serde", serde(rename = $name))]
                $variant,
            )+
        }

        impl GasId {
            /// Every channel, in the rig's canonical listing order.
            pub const ALL: &'static [GasId] = &[$(GasId::$variant),+];

            /// Name used by experiment scripts and configuration files.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(GasId::$variant => $name,)+
                }
            }

            pub fn line(self) -> GasLine {
                match self {
                    $(GasId::$variant => GasLine::$line,)+
                }
            }
        }

        impl FromStr for GasId {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(GasId::$variant),)+
                    _ => Err(CoreError::UnknownGas { name: s.to_string() }),
                }
            }
        }
    };
}

gas_ids! {
    H2A => "H2_A", A;
    H2B => "H2_B", B;
    D2A => "D2_A", A;
    D2B => "D2_B", B;
    O2A => "O2_A", A;
    O2B => "O2_B", B;
    CoAH => "CO_AH", A;
    CoAL => "CO_AL", A;
    CoBH => "CO_BH", B;
    CoBL => "CO_BL", B;
    Co2AH => "CO2_AH", A;
    Co2AL => "CO2_AL", A;
    Co2BH => "CO2_BH", B;
    Co2BL => "CO2_BL", B;
    Ch4A => "CH4_A", A;
    Ch4B => "CH4_B", B;
    C2h6A => "C2H6_A", A;
    C2h6B => "C2H6_B", B;
    C3h8A => "C3H8_A", A;
    C3h8B => "C3H8_B", B;
    HeA => "He_A", A;
    HeB => "He_B", B;
    ArA => "Ar_A", A;
    ArB => "Ar_B", B;
    N2A => "N2_A", A;
    N2B => "N2_B", B;
}

impl fmt::Display for GasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for gas in GasId::ALL {
            assert_eq!(gas.as_str().parse::<GasId>().unwrap(), *gas);
        }
        assert_eq!(GasId::ALL.len(), 26);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = "Xe_A".parse::<GasId>().unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownGas {
                name: "Xe_A".to_string()
            }
        );
        // Names are case sensitive, as in experiment scripts.
        assert!("he_a".parse::<GasId>().is_err());
    }

    #[test]
    fn lines_follow_suffix() {
        assert_eq!(GasId::CoAL.line(), GasLine::A);
        assert_eq!(GasId::Co2BH.line(), GasLine::B);
        assert_eq!(GasId::N2B.line(), GasLine::B);
    }
}
