//! Spectrum to TA through the engine, with synthetic BPB spectra.

use cs_alkalinity::{AcidStrength, TaUncertainty, TitrationSample, ph_from_ta};
use cs_app::{AppError, DyeReferences, Engine, EngineConfig, Measurement};
use cs_core::SeawaterState;
use cs_core::units::grams;
use cs_dye::{Dye, KCalibration, equilibrium_constant};
use cs_spectra::{CubicSpline, PhotometricNoise, Spectrum, synthesize_from_ph};

fn band(centre: f64, width: f64) -> CubicSpline {
    CubicSpline::from_fn(300.0, 800.0, 1001, |x| {
        (-(x - centre).powi(2) / (2.0 * width * width)).exp()
    })
    .unwrap()
}

fn engine(config: EngineConfig) -> Engine<CubicSpline> {
    Engine::new(
        config,
        DyeReferences {
            acid: band(436.0, 30.0),
            base: band(590.0, 40.0),
        },
    )
}

fn state() -> SeawaterState {
    SeawaterState::from_celsius(24.0, 34.2).unwrap()
}

/// Spectrum of a titration of alkalinity `ta` (µmol/kg) with small
/// deterministic noise.
fn titration(ta: f64, acid_concentration: f64, acid_g: f64, seed: f64) -> Measurement {
    let sample = TitrationSample::new(grams(50.0), grams(acid_g), acid_concentration, state())
        .unwrap();
    let ph = ph_from_ta(ta * 1e-6, &sample).unwrap();
    let k = equilibrium_constant(Dye::Bpb, &state(), KCalibration::Published).unwrap();

    let wv: Vec<f64> = (400..=700).map(f64::from).collect();
    let clean =
        synthesize_from_ph(&wv, ph, 0.8, k, &band(436.0, 30.0), &band(590.0, 40.0)).unwrap();
    let abs = clean
        .iter()
        .enumerate()
        .map(|(i, a)| a + 2e-4 * ((i as f64 * 12.9898 + seed).sin() * 43_758.545).fract())
        .collect();
    Measurement::new(Spectrum::new(wv, abs).unwrap(), state())
        .with_titration(sample.sample_mass, sample.acid_mass)
}

fn constant_acid(c: f64) -> AcidStrength {
    AcidStrength {
        coefficients: vec![c],
        objective: 0.0,
        iterations: 0,
    }
}

#[test]
fn spectrum_to_alkalinity() {
    let config = EngineConfig {
        ta_uncertainty: TaUncertainty {
            sample_mass_sd: grams(0.002),
            acid_mass_sd: grams(0.0005),
            acid_concentration_sd: 5e-5,
        },
        ..EngineConfig::for_dye(Dye::Bpb)
    };
    let outcome = engine(config)
        .alkalinity(&titration(2300.0, 0.1, 1.55, 0.0), &constant_acid(0.1))
        .unwrap();

    assert!((outcome.ta_micro() - 2300.0).abs() < 5.0, "{}", outcome.ta_micro());
    assert_eq!(outcome.acid_concentration, 0.1);
    assert!(outcome.ta_sd_micro() > 0.0);
    assert!((outcome.ta.std_dev() - outcome.budget.total_sd).abs() < 1e-3 * outcome.budget.total_sd);
    assert!(outcome.budget.acid_concentration > 0.0);
}

#[test]
fn acid_strength_from_reference_spectra() {
    let certified = 2215.0;
    let measurements: Vec<Measurement> = [1.52, 1.56, 1.6, 1.64]
        .iter()
        .enumerate()
        .map(|(i, &m)| titration(certified, 0.1012, m, i as f64))
        .collect();

    let strength = engine(EngineConfig::default())
        .calibrate_acid(certified, &measurements, None)
        .unwrap();
    let c = strength.concentration_at(0.0);
    assert!((c - 0.1012).abs() < 0.01 * 0.1012, "{c}");
}

#[test]
fn batch_keeps_order_and_isolates_failures() {
    let mut broken = titration(2200.0, 0.1, 1.55, 1.0);
    broken.titration = None;
    let measurements = vec![
        titration(2100.0, 0.1, 1.55, 0.0),
        broken,
        titration(2400.0, 0.1, 1.55, 2.0),
    ];

    let results = engine(EngineConfig::default()).alkalinity_batch(&measurements, &constant_acid(0.1));
    assert_eq!(results.len(), 3);
    assert!(matches!(results[1], Err(AppError::InvalidInput(_))));
    let first = results[0].as_ref().unwrap().ta_micro();
    let last = results[2].as_ref().unwrap().ta_micro();
    assert!((first - 2100.0).abs() < 5.0);
    assert!((last - 2400.0).abs() < 5.0);
}

#[test]
fn ph_batch_matches_single_evaluation() {
    let engine = engine(EngineConfig::default());
    let measurements: Vec<Measurement> = (0..4)
        .map(|i| titration(2000.0 + 100.0 * f64::from(i), 0.1, 1.55, f64::from(i)))
        .collect();
    let batch = engine.ph_batch(&measurements);
    for (m, result) in measurements.iter().zip(&batch) {
        let single = engine.ph(m).unwrap();
        assert_eq!(result.as_ref().unwrap().ph.nominal(), single.ph.nominal());
    }
}

#[test]
fn drifting_acid_needs_time() {
    let drift = AcidStrength {
        coefficients: vec![1e-4, 0.1],
        objective: 0.0,
        iterations: 0,
    };
    let engine = engine(EngineConfig::default());
    let m = titration(2300.0, 0.1, 1.55, 0.0);
    assert!(matches!(
        engine.alkalinity(&m, &drift),
        Err(AppError::InvalidInput(_))
    ));
    assert!(engine.alkalinity(&m.at_time(0.0), &drift).is_ok());
}

#[test]
fn photometric_noise_weights_the_fit() {
    let config = EngineConfig {
        noise: Some(PhotometricNoise::new(1e-4, 2e-4, 1e-4)),
        ..EngineConfig::default()
    };
    let m = titration(2300.0, 0.1, 1.55, 0.0);
    let weighted = engine(config).ph(&m).unwrap();
    let plain = engine(EngineConfig::default()).ph(&m).unwrap();
    assert!((weighted.ph.nominal() - plain.ph.nominal()).abs() < 5e-3);
}

#[test]
fn missing_titration_is_invalid_for_calibration() {
    let m = Measurement::new(titration(2300.0, 0.1, 1.55, 0.0).spectrum, state());
    let err = engine(EngineConfig::default())
        .calibrate_acid(2215.0, &[m], None)
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}
