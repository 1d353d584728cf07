//! Supported indicator dyes and their dissociation constants.

use crate::error::{DyeError, DyeResult};
use cs_core::{CorrelatedValue, SeawaterState, UncertaintyBasis, correlated_values, polyval};
use cs_spectra::PeakLocations;
use nalgebra::DMatrix;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Indicator dye. `*Cam1` variants are in-house batches with their own
/// calibration of the same chemistry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dye {
    /// Bromophenol blue
    Bpb,
    BpbCam1,
    /// m-Cresol purple
    Mcp,
    McpCam1,
}

impl Dye {
    pub const ALL: [Dye; 4] = [Dye::Bpb, Dye::BpbCam1, Dye::Mcp, Dye::McpCam1];

    pub fn name(self) -> &'static str {
        match self {
            Dye::Bpb => "BPB",
            Dye::BpbCam1 => "BPB_Cam1",
            Dye::Mcp => "MCP",
            Dye::McpCam1 => "MCP_Cam1",
        }
    }

    pub fn is_bpb(self) -> bool {
        matches!(self, Dye::Bpb | Dye::BpbCam1)
    }

    pub fn is_mcp(self) -> bool {
        matches!(self, Dye::Mcp | Dye::McpCam1)
    }

    /// Nominal acid, base and background wavelengths for the two-point method.
    pub fn peak_locations(self) -> PeakLocations {
        if self.is_mcp() {
            PeakLocations {
                acid: 434.0,
                base: 578.0,
                background: 690.0,
            }
        } else {
            PeakLocations {
                acid: 436.0,
                base: 590.0,
                background: 690.0,
            }
        }
    }

    /// BPB pKa at salinity `s` (Nand & Ellwood 2018, eq. 17).
    pub fn bpb_pka(self, salinity: f64) -> DyeResult<f64> {
        let pka35 = match self {
            Dye::Bpb => BPB_PKA35,
            Dye::BpbCam1 => BPB_CAM1_PKA35,
            Dye::Mcp | Dye::McpCam1 => {
                return Err(DyeError::InvalidArg {
                    what: format!("{self} has no BPB pKa"),
                });
            }
        };
        Ok(pka35 + BPB_PKA_SALINITY * (35.0 - salinity))
    }
}

impl fmt::Display for Dye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dye {
    type Err = DyeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dye::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DyeError::UnknownDye {
                name: s.to_string(),
            })
    }
}

/// Which MCP dissociation constant to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KCalibration {
    /// Published constants (Dickson, Sabine & Christian 2007, SOP 6b for MCP)
    #[default]
    Published,
    /// In-house fit against Tris-buffered artificial seawater (MCP only)
    Tris,
}

impl FromStr for KCalibration {
    type Err = DyeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "published" | "dickson" => Ok(KCalibration::Published),
            "tris" => Ok(KCalibration::Tris),
            other => Err(DyeError::InvalidArg {
                what: format!("unknown K calibration '{other}' (expected published or tris)"),
            }),
        }
    }
}

const BPB_PKA35: f64 = 3.515654103;
const BPB_CAM1_PKA35: f64 = 3.631498503311959;
const BPB_PKA_SALINITY: f64 = 1.74e-3;
/// Quadratic temperature correction of BPB K, highest degree first (°C).
const BPB_K_TEMPERATURE: [f64; 3] = [1.00921921e-7, -2.56020702e-6, 0.0];

/// MCP K from Tris buffer measurements, quadratic in °C, highest degree first.
const MCP_TRIS_K: [f64; 3] = [8.818739e-12, -5.00996717e-11, 5.95759909e-9];
const MCP_TRIS_K_NAMES: [&str; 3] = ["k_tris_t2", "k_tris_t1", "k_tris_t0"];
#[rustfmt::skip]
const MCP_TRIS_K_COVARIANCE: [f64; 9] = [
     5.72672924e-24, -2.56643258e-22,  2.80811298e-21,
    -2.56643258e-22,  1.15587639e-20, -1.27159130e-19,
     2.80811298e-21, -1.27159130e-19,  1.40773494e-18,
];

fn check_calibration(dye: Dye, calibration: KCalibration) -> DyeResult<()> {
    if calibration == KCalibration::Tris && !dye.is_mcp() {
        return Err(DyeError::InvalidArg {
            what: format!("Tris calibration is only available for MCP dyes, not {dye}"),
        });
    }
    Ok(())
}

/// Dissociation constant K of `dye` at `state`.
pub fn equilibrium_constant(
    dye: Dye,
    state: &SeawaterState,
    calibration: KCalibration,
) -> DyeResult<f64> {
    check_calibration(dye, calibration)?;
    let t = state.temperature_c();
    let s = state.salinity();
    let k = match (dye, calibration) {
        (Dye::Bpb | Dye::BpbCam1, _) => {
            10f64.powf(-dye.bpb_pka(s)?) + polyval(&BPB_K_TEMPERATURE, t)
        }
        (Dye::Mcp | Dye::McpCam1, KCalibration::Published) => {
            let pk = 1245.69 / state.temperature_k() + 3.8275 + 0.00211 * (35.0 - s);
            10f64.powf(-pk)
        }
        (Dye::Mcp | Dye::McpCam1, KCalibration::Tris) => polyval(&MCP_TRIS_K, t),
    };
    if !(k.is_finite() && k > 0.0) {
        return Err(DyeError::InvalidArg {
            what: format!("K of {dye} is {k} at t={t} °C, S={s}"),
        });
    }
    Ok(k)
}

fn tris_covariance() -> DMatrix<f64> {
    DMatrix::from_row_slice(3, 3, &MCP_TRIS_K_COVARIANCE)
}

fn tris_k(coefficients: &[CorrelatedValue], t: f64) -> CorrelatedValue {
    coefficients
        .iter()
        .fold(CorrelatedValue::constant(0.0), |acc, c| acc * t + c)
}

/// K with the uncertainty of its calibration, on a basis of its own.
///
/// Only the Tris calibration carries coefficient uncertainty; every other
/// constant is exact.
pub fn equilibrium_constant_correlated(
    dye: Dye,
    state: &SeawaterState,
    calibration: KCalibration,
) -> DyeResult<CorrelatedValue> {
    let nominal = equilibrium_constant(dye, state, calibration)?;
    if calibration != KCalibration::Tris {
        return Ok(CorrelatedValue::constant(nominal));
    }
    let coefficients = correlated_values(&MCP_TRIS_K_NAMES, &MCP_TRIS_K, tris_covariance())?;
    Ok(tris_k(&coefficients, state.temperature_c()))
}

/// K expressed on `basis`, extended with the calibration's own parameters
/// when it has any. Returns K and the basis it lives on; values already on
/// `basis` must be lifted onto the returned one before combining.
pub fn equilibrium_constant_on(
    dye: Dye,
    state: &SeawaterState,
    calibration: KCalibration,
    basis: &Arc<UncertaintyBasis>,
) -> DyeResult<(CorrelatedValue, Arc<UncertaintyBasis>)> {
    let nominal = equilibrium_constant(dye, state, calibration)?;
    if calibration != KCalibration::Tris {
        return Ok((CorrelatedValue::constant(nominal), Arc::clone(basis)));
    }
    let extended = basis.extend(&MCP_TRIS_K_NAMES, &tris_covariance())?;
    let offset = basis.len();
    let coefficients = MCP_TRIS_K
        .iter()
        .enumerate()
        .map(|(i, &c)| extended.variable(offset + i, c))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((tris_k(&coefficients, state.temperature_c()), extended))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig4(a: f64, b: f64) -> bool {
        ((a - b) / b).abs() < 5e-4
    }

    #[test]
    fn reference_constants_at_standard_state() {
        let st = SeawaterState::standard();
        let k = |d, c| equilibrium_constant(d, &st, c).unwrap();
        assert!(sig4(k(Dye::Bpb, KCalibration::Published), 3.041e-4));
        assert!(sig4(k(Dye::BpbCam1, KCalibration::Published), 2.327e-4));
        assert!(sig4(k(Dye::Mcp, KCalibration::Published), 9.873e-9));
        assert!(sig4(k(Dye::McpCam1, KCalibration::Published), 9.873e-9));
        assert!(sig4(k(Dye::Mcp, KCalibration::Tris), 1.022e-8));
    }

    #[test]
    fn parses_identifiers() {
        assert_eq!("BPB".parse::<Dye>().unwrap(), Dye::Bpb);
        assert_eq!("MCP_Cam1".parse::<Dye>().unwrap(), Dye::McpCam1);
        assert_eq!("bpb_cam1".parse::<Dye>().unwrap(), Dye::BpbCam1);
        for d in Dye::ALL {
            assert_eq!(d.to_string().parse::<Dye>().unwrap(), d);
        }
    }

    #[test]
    fn unknown_identifier_is_reported() {
        match "TB".parse::<Dye>() {
            Err(DyeError::UnknownDye { name }) => assert_eq!(name, "TB"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tris_for_bpb_is_rejected() {
        let err = equilibrium_constant(Dye::Bpb, &SeawaterState::standard(), KCalibration::Tris);
        assert!(matches!(err, Err(DyeError::InvalidArg { .. })));
    }

    #[test]
    fn bpb_pka_increases_at_lower_salinity() {
        assert!(Dye::Bpb.bpb_pka(30.0).unwrap() > Dye::Bpb.bpb_pka(35.0).unwrap());
        assert!(Dye::Mcp.bpb_pka(35.0).is_err());
    }

    #[test]
    fn tris_k_carries_coefficient_uncertainty() {
        let st = SeawaterState::from_celsius(20.0, 35.0).unwrap();
        let k = equilibrium_constant_correlated(Dye::Mcp, &st, KCalibration::Tris).unwrap();
        let nominal = equilibrium_constant(Dye::Mcp, &st, KCalibration::Tris).unwrap();
        assert!((k.nominal() - nominal).abs() < 1e-22);
        // g = (t², t, 1)
        let g = [400.0, 20.0, 1.0];
        let cov = tris_covariance();
        let expected: f64 = (0..3)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .map(|(i, j)| g[i] * cov[(i, j)] * g[j])
            .sum();
        assert!((k.variance() - expected).abs() <= 1e-6 * expected.abs());

        let published =
            equilibrium_constant_correlated(Dye::Mcp, &st, KCalibration::Published).unwrap();
        assert!(published.is_exact());
    }

    #[test]
    fn k_on_extended_basis_keeps_prefix() {
        let basis = UncertaintyBasis::independent(&["a", "b"], &[0.01, 0.02]).unwrap();
        let st = SeawaterState::standard();
        let (k, on) = equilibrium_constant_on(Dye::Mcp, &st, KCalibration::Tris, &basis).unwrap();
        assert_eq!(on.len(), 5);
        assert!(k.std_dev() > 0.0);
        let a = basis.variable(0, 1.0).unwrap().lift(&on).unwrap();
        assert_eq!(a.covariance_with(&k).unwrap(), 0.0);

        let (k, on) =
            equilibrium_constant_on(Dye::Bpb, &st, KCalibration::Published, &basis).unwrap();
        assert!(k.is_exact());
        assert!(Arc::ptr_eq(&on, &basis));
    }

    #[test]
    fn peak_locations_per_family() {
        assert_eq!(Dye::McpCam1.peak_locations().base, 578.0);
        assert_eq!(Dye::BpbCam1.peak_locations().acid, 436.0);
    }
}
