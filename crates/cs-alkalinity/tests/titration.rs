//! End-point pH, TA and acid calibration against each other.

use cs_alkalinity::{
    AcidCalibrator, AlkalinityError, AlkalinityModel, CalibrationConfig, CalibrationMeasurement,
    CrmCalibration, MICRO, TitrationSample, acid_mass_from_ph_ta, ph_from_ta, ta_from_ph,
};
use cs_core::SeawaterState;
use cs_core::units::{as_grams, grams};
use proptest::prelude::*;

#[test]
fn reference_titration() {
    // Free [H⁺] of 1e-4 mol/kg on the total scale at 25 °C, S = 35.
    let sample =
        TitrationSample::new(grams(50.0), grams(1.5), 0.1, SeawaterState::standard()).unwrap();
    let ph = -(1e-4_f64 / 0.5143).log10();
    assert!((ph - 3.7112).abs() < 1e-4);

    let ta = ta_from_ph(ph, &sample).unwrap() * MICRO;
    assert!(ta > 1000.0 && ta < 3500.0, "{ta}");
    assert!((ph_from_ta(ta / MICRO, &sample).unwrap() - ph).abs() < 1e-8);
}

#[test]
fn ta_rises_with_end_point_ph() {
    let model = AlkalinityModel::new(&SeawaterState::from_celsius(20.0, 33.0).unwrap());
    let mut last = f64::NEG_INFINITY;
    for i in 0..20 {
        let ph = 3.0 + 0.1 * f64::from(i);
        let ta = model.ta(ph, 45.0, 1.4, 0.1).unwrap();
        assert!(ta > last);
        last = ta;
    }
    // Bounded by the alkalinity neutralised by all the acid.
    assert!(last < 1.4 * 0.1 / 45.0);
}

#[test]
fn end_point_below_ph_zero_is_implausible() {
    // The alkalinity a sample would need to end at pH -0.2.
    let sample =
        TitrationSample::new(grams(50.0), grams(1.5), 0.1, SeawaterState::standard()).unwrap();
    let ta = ta_from_ph(-0.2, &sample).unwrap();
    assert!(ta < 0.0);
    match ph_from_ta(ta, &sample) {
        Err(AlkalinityError::ChemicallyImplausible { what, value }) => {
            assert_eq!(what, "end-point pH");
            assert!((value + 0.2).abs() < 1e-6, "{value}");
        }
        other => panic!("expected an implausible end point, got {other:?}"),
    }
}

fn crm_titration(
    certified_ta: f64,
    acid_concentration: f64,
    acid_g: f64,
    time: Option<f64>,
) -> CalibrationMeasurement {
    let state = SeawaterState::from_celsius(24.0, 33.4).unwrap();
    let sample = TitrationSample::new(grams(52.0), grams(acid_g), acid_concentration, state).unwrap();
    CalibrationMeasurement {
        ph: ph_from_ta(certified_ta / MICRO, &sample).unwrap(),
        sample_mass: sample.sample_mass,
        acid_mass: sample.acid_mass,
        state,
        time,
    }
}

#[test]
fn constant_acid_strength_is_recovered() {
    let certified = 2215.0;
    let crm = CrmCalibration {
        certified_ta: certified,
        measurements: [1.55, 1.6, 1.65]
            .iter()
            .map(|&m| crm_titration(certified, 0.1003, m, None))
            .collect(),
    };
    let strength = AcidCalibrator::default().calibrate(&crm, None).unwrap();

    assert!(strength.is_constant());
    let c = strength.concentration_at(0.0);
    assert!((c - 0.1003).abs() < 0.01 * 0.1003, "{c}");
    assert!(strength.objective < 1e-3);
}

#[test]
fn linear_acid_drift_is_recovered() {
    let certified = 2215.0;
    let drift = |t: f64| 0.1 + 4e-4 * t;
    let crm = CrmCalibration {
        certified_ta: certified,
        measurements: (0..6)
            .map(|i| {
                let t = f64::from(i);
                crm_titration(certified, drift(t), 1.55 + 0.02 * t, Some(t))
            })
            .collect(),
    };
    let strength = AcidCalibrator::default().calibrate(&crm, Some(1)).unwrap();

    assert_eq!(strength.coefficients.len(), 2);
    assert!((strength.coefficients[0] - 4e-4).abs() < 0.01 * 4e-4, "{:?}", strength.coefficients);
    assert!((strength.coefficients[1] - 0.1).abs() < 0.01 * 0.1);
    assert!((strength.concentration_at(2.5) - drift(2.5)).abs() < 1e-4);
}

#[test]
fn calibration_iteration_budget_is_reported() {
    let certified = 2215.0;
    let crm = CrmCalibration {
        certified_ta: certified,
        measurements: [1.55, 1.6, 1.65]
            .iter()
            .map(|&m| crm_titration(certified, 0.1003, m, None))
            .collect(),
    };
    let calibrator = AcidCalibrator::new(CalibrationConfig {
        max_iterations: 2,
        ..CalibrationConfig::default()
    });
    match calibrator.calibrate(&crm, None) {
        Err(AlkalinityError::DidNotConverge {
            last_iterate,
            residual,
            ..
        }) => {
            assert_eq!(last_iterate.len(), 1);
            assert!(last_iterate[0] > 0.0);
            assert!(residual.is_finite() && residual > 0.0);
        }
        other => panic!("expected non-convergence, got {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ph_round_trips_through_ta(
        ph in 3.0f64..4.2,
        sample_g in 40.0f64..60.0,
        acid_g in 1.2f64..1.8,
        c in 0.09f64..0.11,
        t in 15.0f64..30.0,
        s in 30.0f64..38.0,
    ) {
        let state = SeawaterState::from_celsius(t, s).unwrap();
        let sample = TitrationSample::new(grams(sample_g), grams(acid_g), c, state).unwrap();
        let ta = ta_from_ph(ph, &sample).unwrap();
        let back = ph_from_ta(ta, &sample).unwrap();
        prop_assert!((back - ph).abs() < 1e-8, "{} vs {}", back, ph);
    }

    #[test]
    fn acid_mass_round_trips_through_ta(
        ph in 3.0f64..4.2,
        sample_g in 40.0f64..60.0,
        acid_g in 1.2f64..1.8,
        c in 0.09f64..0.11,
    ) {
        let state = SeawaterState::standard();
        let sample = TitrationSample::new(grams(sample_g), grams(acid_g), c, state).unwrap();
        let ta = ta_from_ph(ph, &sample).unwrap();
        let m = acid_mass_from_ph_ta(ph, ta, sample.sample_mass, &state, c).unwrap();
        prop_assert!((as_grams(m) - acid_g).abs() < 1e-9);
    }
}
