//! Seawater state: the only state every equilibrium-constant function sees.

use crate::numeric::ensure_finite;
use crate::units::{Temperature, as_celsius, constants::ZERO_CELSIUS_K};
use crate::{CsError, CsResult};

/// Temperature and salinity of a seawater sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeawaterState {
    temperature_c: f64,
    salinity: f64,
}

impl SeawaterState {
    /// Build a state from a `uom` temperature and a practical salinity (PSU).
    pub fn new(temperature: Temperature, salinity: f64) -> CsResult<Self> {
        Self::from_celsius(as_celsius(temperature), salinity)
    }

    /// Build a state from a temperature in °C and a practical salinity (PSU).
    pub fn from_celsius(temperature_c: f64, salinity: f64) -> CsResult<Self> {
        let temperature_c = ensure_finite(temperature_c, "temperature")?;
        let salinity = ensure_finite(salinity, "salinity")?;
        if temperature_c <= -ZERO_CELSIUS_K {
            return Err(CsError::InvalidInput {
                what: format!("temperature {temperature_c} °C is below absolute zero"),
            });
        }
        if salinity < 0.0 {
            return Err(CsError::InvalidInput {
                what: format!("salinity must be non-negative, got {salinity}"),
            });
        }
        Ok(Self {
            temperature_c,
            salinity,
        })
    }

    /// Standard state used for reference constants (25 °C, S = 35).
    pub fn standard() -> Self {
        Self {
            temperature_c: 25.0,
            salinity: 35.0,
        }
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    pub fn temperature_k(&self) -> f64 {
        self.temperature_c + ZERO_CELSIUS_K
    }

    pub fn salinity(&self) -> f64 {
        self.salinity
    }
}
