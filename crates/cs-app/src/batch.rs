//! Parallel evaluation of independent measurements.
//!
//! Results come back in input order; one failed measurement does not stop
//! the others.

use crate::error::AppResult;
use crate::pipeline::{AlkalinityOutcome, Engine, Measurement, PhOutcome};
use cs_alkalinity::AcidStrength;
use cs_spectra::ReferenceSpectrum;
use rayon::prelude::*;
use tracing::debug;

impl<R: ReferenceSpectrum> Engine<R> {
    pub fn ph_batch(&self, measurements: &[Measurement]) -> Vec<AppResult<PhOutcome>> {
        debug!(count = measurements.len(), "pH batch");
        measurements.par_iter().map(|m| self.ph(m)).collect()
    }

    pub fn alkalinity_batch(
        &self,
        measurements: &[Measurement],
        acid: &AcidStrength,
    ) -> Vec<AppResult<AlkalinityOutcome>> {
        debug!(count = measurements.len(), "alkalinity batch");
        measurements
            .par_iter()
            .map(|m| self.alkalinity(m, acid))
            .collect()
    }
}
