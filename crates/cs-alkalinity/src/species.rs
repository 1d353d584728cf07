//! Seawater sulfate and fluoride speciation.
//!
//! Totals are in mol/kg-SW. `KS` is on the free scale (Dickson 1990), `KF`
//! on the total scale (Dickson, Sabine & Christian 2007).

use cs_core::SeawaterState;

/// Total sulfate (Morris & Riley 1966).
pub fn total_sulfate(salinity: f64) -> f64 {
    (0.14 / 96.062) * (salinity / 1.80655)
}

/// Total fluoride (Riley 1965).
pub fn total_fluoride(salinity: f64) -> f64 {
    (0.000067 / 18.998) * (salinity / 1.80655)
}

/// Total boron (Lee et al. 2010).
pub fn total_boron(salinity: f64) -> f64 {
    0.0004326 * salinity / 35.0
}

/// Ionic strength from salinity.
pub fn ionic_strength(salinity: f64) -> f64 {
    19.924 * salinity / (1000.0 - 1.005 * salinity)
}

/// HSO4⁻ dissociation constant, free scale.
pub fn ks(state: &SeawaterState) -> f64 {
    let t = state.temperature_k();
    let ln_t = t.ln();
    let s = state.salinity();
    let i = ionic_strength(s);
    let sqrt_i = i.sqrt();

    (141.328 - 4276.1 / t - 23.093 * ln_t
        + sqrt_i * (324.57 - 13856.0 / t - 47.986 * ln_t)
        + i * (-771.54 + 35474.0 / t + 114.723 * ln_t)
        - 2698.0 / t * i * sqrt_i
        + 1776.0 / t * i * i
        + (1.0 - 0.001005 * s).ln())
    .exp()
}

/// HF dissociation constant, total scale.
pub fn kf(state: &SeawaterState) -> f64 {
    (874.0 / state.temperature_k() - 9.68 + 0.111 * state.salinity().sqrt()).exp()
}

/// Species totals and constants at one seawater state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesConstants {
    pub total_sulfate: f64,
    pub total_fluoride: f64,
    pub total_boron: f64,
    pub ks: f64,
    pub kf: f64,
}

impl SpeciesConstants {
    pub fn at(state: &SeawaterState) -> Self {
        let s = state.salinity();
        Self {
            total_sulfate: total_sulfate(s),
            total_fluoride: total_fluoride(s),
            total_boron: total_boron(s),
            ks: ks(state),
            kf: kf(state),
        }
    }

    /// Free proton concentration for total-scale `h`.
    pub fn free_h(&self, h: f64) -> f64 {
        h / (1.0 + self.total_sulfate / self.ks)
    }

    pub fn hso4(&self, h: f64) -> f64 {
        self.total_sulfate / (1.0 + self.ks / self.free_h(h))
    }

    pub fn hf(&self, h: f64) -> f64 {
        self.total_fluoride / (1.0 + self.kf / h)
    }

    /// Excess protons held in solution at total-scale `h`: `[H⁺]F + [HSO4⁻] + [HF]`.
    pub fn excess_protons(&self, h: f64) -> f64 {
        self.free_h(h) + self.hso4(h) + self.hf(h)
    }

    /// `d(excess_protons)/dh`.
    pub fn d_excess_protons_d_h(&self, h: f64) -> f64 {
        let (ts, tf, ks, kf) = (self.total_sulfate, self.total_fluoride, self.ks, self.kf);
        let d_free = 1.0 / (1.0 + ts / ks);
        // HSO4 = TS·h / (h + KS + TS)
        let d_hso4 = ts * (ks + ts) / (h + ks + ts).powi(2);
        let d_hf = tf * kf / (h + kf).powi(2);
        d_free + d_hso4 + d_hf
    }
}
