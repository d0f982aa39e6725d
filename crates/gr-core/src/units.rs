// gr-core/src/units.rs

use uom::si::f64::ThermodynamicTemperature as UomThermodynamicTemperature;
use uom::si::thermodynamic_temperature::degree_celsius;

pub type Temperature = UomThermodynamicTemperature;

/// Volumetric flow in standard cubic centimetres per minute.
pub type Sccm = f64;

/// Line pressure as reported by the pressure controllers, in psia.
pub type Psia = f64;

#[inline]
pub fn degc(v: f64) -> Temperature {
    Temperature::new::<degree_celsius>(v)
}

#[inline]
pub fn as_degc(t: Temperature) -> f64 {
    t.get::<degree_celsius>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_round_trips() {
        let t = degc(250.0);
        assert!((as_degc(t) - 250.0).abs() < 1e-9);
    }
}
