//! Spectrum -> pH -> TA for single measurements, and acid calibration.

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use cs_alkalinity::{
    AcidCalibrator, AcidStrength, CalibrationMeasurement, CrmCalibration, MICRO, TaBudget,
    TitrationSample, ta_budget, ta_with_inputs,
};
use cs_core::units::Mass;
use cs_core::{CorrelatedValue, SeawaterState};
use cs_dye::ph_from_fit;
use cs_spectra::{MixtureFit, ReferenceSpectrum, SpectralMixtureFitter, Spectrum};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Sample and acid masses of a titration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Titration {
    pub sample_mass: Mass,
    pub acid_mass: Mass,
}

/// One dyed-sample spectrum and its context.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub spectrum: Spectrum,
    /// Per-sample absorbance standard deviation
    pub sigma: Option<Vec<f64>>,
    pub state: SeawaterState,
    /// Needed when the acid strength drifts with time
    pub time: Option<f64>,
    pub titration: Option<Titration>,
}

impl Measurement {
    pub fn new(spectrum: Spectrum, state: SeawaterState) -> Self {
        Self {
            spectrum,
            sigma: None,
            state,
            time: None,
            titration: None,
        }
    }

    pub fn with_sigma(mut self, sigma: Vec<f64>) -> Self {
        self.sigma = Some(sigma);
        self
    }

    pub fn at_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_titration(mut self, sample_mass: Mass, acid_mass: Mass) -> Self {
        self.titration = Some(Titration {
            sample_mass,
            acid_mass,
        });
        self
    }
}

/// Pure acid-form and base-form spectra of the engine's dye.
#[derive(Debug, Clone)]
pub struct DyeReferences<R> {
    pub acid: R,
    pub base: R,
}

#[derive(Debug, Clone)]
pub struct PhOutcome {
    pub fit: MixtureFit,
    pub ph: CorrelatedValue,
}

#[derive(Debug, Clone)]
pub struct AlkalinityOutcome {
    pub fit: MixtureFit,
    pub ph: CorrelatedValue,
    /// mol/kg
    pub acid_concentration: f64,
    /// mol/kg, on the pH basis extended with the titration inputs
    pub ta: CorrelatedValue,
    pub budget: TaBudget,
}

impl AlkalinityOutcome {
    /// Nominal TA in µmol/kg.
    pub fn ta_micro(&self) -> f64 {
        self.ta.nominal() * MICRO
    }

    pub fn ta_sd_micro(&self) -> f64 {
        self.ta.std_dev() * MICRO
    }
}

/// The measurement pipeline for one dye.
#[derive(Debug, Clone)]
pub struct Engine<R> {
    config: EngineConfig,
    fitter: SpectralMixtureFitter,
    references: DyeReferences<R>,
}

impl<R: ReferenceSpectrum> Engine<R> {
    pub fn new(config: EngineConfig, references: DyeReferences<R>) -> Self {
        let fitter = SpectralMixtureFitter::new(config.fit.clone());
        Self {
            config,
            fitter,
            references,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fit the spectrum and convert the fraction ratio to pH.
    pub fn ph(&self, measurement: &Measurement) -> AppResult<PhOutcome> {
        let sigma = match (&measurement.sigma, &self.config.noise) {
            (Some(sigma), _) => Some(sigma.clone()),
            (None, Some(noise)) => Some(noise.sigma_for(&measurement.spectrum)?),
            (None, None) => None,
        };
        let fit = self.fitter.fit(
            &measurement.spectrum,
            &self.references.acid,
            &self.references.base,
            sigma.as_deref(),
        )?;
        let ph = ph_from_fit(&fit, self.config.dye, &measurement.state, self.config.calibration)?;
        Ok(PhOutcome { fit, ph })
    }

    /// Full titration result. The acid concentration comes from `acid`,
    /// evaluated at the measurement time when it drifts.
    pub fn alkalinity(
        &self,
        measurement: &Measurement,
        acid: &AcidStrength,
    ) -> AppResult<AlkalinityOutcome> {
        let sample = self.titration_sample(measurement, acid)?;
        let PhOutcome { fit, ph } = self.ph(measurement)?;

        let uncertainty = &self.config.ta_uncertainty;
        let budget = ta_budget(&ph, &sample, uncertainty)?;
        let ta = ta_with_inputs(&ph, &sample, uncertainty)?;
        if ta.nominal() <= 0.0 {
            warn!(ta = ta.nominal(), ph = ph.nominal(), "non-positive alkalinity");
        }
        debug!(
            ph = ph.nominal(),
            ta = ta.nominal() * MICRO,
            sd = ta.std_dev() * MICRO,
            "alkalinity"
        );
        Ok(AlkalinityOutcome {
            fit,
            ph,
            acid_concentration: sample.acid_concentration,
            ta,
            budget,
        })
    }

    fn titration_sample(
        &self,
        measurement: &Measurement,
        acid: &AcidStrength,
    ) -> AppResult<TitrationSample> {
        let titration = measurement.titration.ok_or_else(|| {
            AppError::InvalidInput("measurement has no titration masses".to_string())
        })?;
        let time = match (measurement.time, acid.is_constant()) {
            (Some(t), _) => t,
            (None, true) => 0.0,
            (None, false) => {
                return Err(AppError::InvalidInput(
                    "drifting acid strength needs a measurement time".to_string(),
                ));
            }
        };
        Ok(TitrationSample::new(
            titration.sample_mass,
            titration.acid_mass,
            acid.concentration_at(time),
            measurement.state,
        )?)
    }

    /// Acid strength from titrations of a reference material of known
    /// alkalinity (µmol/kg). Spectra are fitted in parallel.
    pub fn calibrate_acid(
        &self,
        certified_ta: f64,
        measurements: &[Measurement],
        order: Option<usize>,
    ) -> AppResult<AcidStrength> {
        let calibration = measurements
            .par_iter()
            .map(|m| {
                let titration = m.titration.ok_or_else(|| {
                    AppError::InvalidInput(
                        "reference titration has no sample and acid masses".to_string(),
                    )
                })?;
                let PhOutcome { ph, .. } = self.ph(m)?;
                Ok(CalibrationMeasurement {
                    ph: ph.nominal(),
                    sample_mass: titration.sample_mass,
                    acid_mass: titration.acid_mass,
                    state: m.state,
                    time: m.time,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let crm = CrmCalibration {
            certified_ta,
            measurements: calibration,
        };
        let strength =
            AcidCalibrator::new(self.config.acid_calibration.clone()).calibrate(&crm, order)?;
        debug!(coefficients = ?strength.coefficients, "acid calibration");
        Ok(strength)
    }
}
