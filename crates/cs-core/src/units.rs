// cs-core/src/units.rs

use uom::si::f64::{Mass as UomMass, ThermodynamicTemperature as UomThermodynamicTemperature};

// Public canonical unit types (SI, f64)
pub type Mass = UomMass;
pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn deg_c(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::degree_celsius;
    Temperature::new::<degree_celsius>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn grams(v: f64) -> Mass {
    use uom::si::mass::gram;
    Mass::new::<gram>(v)
}

#[inline]
pub fn kg(v: f64) -> Mass {
    use uom::si::mass::kilogram;
    Mass::new::<kilogram>(v)
}

#[inline]
pub fn as_celsius(t: Temperature) -> f64 {
    use uom::si::thermodynamic_temperature::degree_celsius;
    t.get::<degree_celsius>()
}

#[inline]
pub fn as_grams(m: Mass) -> f64 {
    use uom::si::mass::gram;
    m.get::<gram>()
}

pub mod constants {
    /// Offset between the Celsius and Kelvin scales.
    pub const ZERO_CELSIUS_K: f64 = 273.15;

    pub const LN_10: f64 = std::f64::consts::LN_10;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_round_trip() {
        assert!((as_celsius(deg_c(25.0)) - 25.0).abs() < 1e-9);
        assert!((as_celsius(k(298.15)) - 25.0).abs() < 1e-9);
        assert!((as_grams(grams(50.0)) - 50.0).abs() < 1e-12);
        assert!((as_grams(kg(0.05)) - 50.0).abs() < 1e-9);
    }
}
