//! pH from dye absorbance.

use crate::dye::{Dye, KCalibration, equilibrium_constant_on};
use crate::error::{DyeError, DyeResult};
use cs_core::{CorrelatedValue, SeawaterState};
use cs_spectra::MixtureFit;
use tracing::debug;

/// Nand & Ellwood (2018) temperature correction of the BPB ratio to 25 °C.
const BPB_R25_TEMPERATURE: f64 = 6.774e-3;
const BPB_E1: f64 = 5.3259624e-3;
const BPB_E2: f64 = 2.2319033;
const BPB_E3: f64 = 3.19e-2;

/// Dye fraction ratio `F = b / a`.
pub fn fraction_ratio(a: &CorrelatedValue, b: &CorrelatedValue) -> CorrelatedValue {
    b / a
}

/// `pH = −log10(K / F)`.
pub fn ph_from_f(f: &CorrelatedValue, k: &CorrelatedValue) -> DyeResult<CorrelatedValue> {
    for (name, v) in [("F", f.nominal()), ("K", k.nominal())] {
        if !(v.is_finite() && v > 0.0) {
            return Err(DyeError::InvalidArg {
                what: format!("{name} must be positive and finite, got {v}"),
            });
        }
    }
    Ok(-(k / f).log10())
}

/// pH of a fitted spectrum, with the fit covariance (and, for the Tris
/// calibration, the K coefficient covariance) propagated.
pub fn ph_from_fit(
    fit: &MixtureFit,
    dye: Dye,
    state: &SeawaterState,
    calibration: KCalibration,
) -> DyeResult<CorrelatedValue> {
    let mixture = fit.correlated()?;
    let f = fraction_ratio(&mixture.a, &mixture.b);
    let ph = match f.basis() {
        Some(basis) => {
            let (k, on) = equilibrium_constant_on(dye, state, calibration, basis)?;
            ph_from_f(&f.lift(&on)?, &k)?
        }
        None => {
            let k = crate::dye::equilibrium_constant_correlated(dye, state, calibration)?;
            ph_from_f(&f, &k)?
        }
    };
    debug!(%dye, f = f.nominal(), ph = ph.nominal(), sd = ph.std_dev(), "pH from mixture fit");
    Ok(ph)
}

/// pH from a background-corrected base/acid absorbance ratio (two-point method).
///
/// BPB: Nand & Ellwood (2018), with `R` first corrected to 25 °C.
/// MCP: Liu, Patsavas & Byrne (2011).
pub fn ph_from_ratio(
    dye: Dye,
    ratio: &CorrelatedValue,
    state: &SeawaterState,
) -> DyeResult<CorrelatedValue> {
    let t = state.temperature_c();
    let s = state.salinity();
    let (offset, numerator, denominator) = if dye.is_bpb() {
        let r25 = ratio * (1.0 + BPB_R25_TEMPERATURE * (25.0 - t));
        (dye.bpb_pka(s)?, &r25 - BPB_E1, BPB_E2 - &r25 * BPB_E3)
    } else {
        let tk = state.temperature_k();
        (
            mcp_logk2e2(tk, s),
            ratio - mcp_e1(tk),
            1.0 - ratio * mcp_e3_over_e2(tk, s),
        )
    };
    if !(numerator.nominal() > 0.0 && denominator.nominal() > 0.0) {
        return Err(DyeError::InvalidArg {
            what: format!(
                "absorbance ratio {} is outside the range of the {dye} calibration",
                ratio.nominal()
            ),
        });
    }
    Ok((numerator / denominator).log10() + offset)
}

fn mcp_logk2e2(tk: f64, s: f64) -> f64 {
    let a = -319.8369 + 0.688159 * s - 0.00018374 * s * s;
    let b = 10508.724 - 32.9599 * s + 0.059082 * s * s;
    let c = 55.54253 - 0.101639 * s;
    let d = -0.08112151;
    a + b / tk + c * tk.ln() + d * tk
}

fn mcp_e1(tk: f64) -> f64 {
    -0.004363 + 3.598e-5 * tk
}

fn mcp_e3_over_e2(tk: f64, s: f64) -> f64 {
    -0.016224 + 2.42851e-4 * tk + 5.05663e-5 * (s - 35.0)
}

/// pH (total scale) of Tris-buffered artificial seawater (Liu et al. 2011, eq. 6).
pub fn tris_buffer_ph(state: &SeawaterState) -> f64 {
    let s = state.salinity();
    let tk = state.temperature_k();
    (11911.08 - 18.2499 * s - 0.039336 * s * s) / tk - 366.27059
        + 0.53993607 * s
        + 0.00016329 * s * s
        + (64.52243 - 0.084041 * s) * tk.ln()
        - 0.11149858 * tk
}
