//! End-to-end integration tests.

use simfmri::{
    analysis, build, double_gamma, glm, noise, norm, random_trials, seeded, timing, DesignBuilder, Experiment,
    ExperimentConfig, Glm, HrfKernel, HrfParams, ModelSpec, NoiseModel, Normalization, RunConfig, Runner, SimError,
};

fn quiet() -> ExperimentConfig {
    ExperimentConfig::default().noise(NoiseModel::White { sigma: 0.0 })
}

/// Basic smoke test that the whole pipeline runs.
#[test]
fn smoke_test() {
    let runner = Runner::new(RunConfig::new(4).ncore(2), |_code, prng| {
        let (trials, prng) = random_trials(2, 20, true, prng);
        Experiment::with_unit_durations(trials, ExperimentConfig::default(), prng)?
            .model(ModelSpec::boxcar("model_01", ["box_1"]))?
            .model(ModelSpec::boxcar("model_02", ["box_2"]))
    });

    let records = runner.go(true).unwrap();
    assert_eq!(records.len(), 4);
    for r in &records {
        assert!(r.model("model_01").is_some());
        assert!(r.model("model_02").is_some());
    }
}

/// Two-condition boxcar: the documented shape and columns.
#[test]
fn boxcar_design_two_conditions() {
    let dm = build(&[0, 0, 0, 1, 1, 1], &[1; 6], None, None).unwrap();
    assert_eq!(dm.matrix().shape(), (6, 2));
    assert_eq!(dm.column(0), vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    assert_eq!(dm.column(1), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
}

/// The baseline column is 1 exactly where the expanded timeline is 0.
#[test]
fn baseline_marks_jitter() {
    let (trials, _) = random_trials(3, 15, true, seeded(5));
    let durations: Vec<usize> = (0..trials.len()).map(|i| 1 + i % 3).collect();
    let dm = build(&trials, &durations, None, None).unwrap();

    let expanded: Vec<u32> = trials
        .iter()
        .zip(&durations)
        .flat_map(|(&t, &d)| std::iter::repeat(t).take(d))
        .collect();
    for (row, &label) in expanded.iter().enumerate() {
        assert_eq!(dm.matrix()[(row, 0)] == 1.0, label == 0);
    }

    // Dropped positions join the baseline
    let mask = [false, true, false];
    let dm = build(&trials, &durations, None, Some(&mask)).unwrap();
    let masked = timing::dtime(&trials, &durations, Some(&mask), 0).unwrap();
    assert_eq!(masked.len(), dm.nrows());
    for (row, &label) in masked.iter().enumerate() {
        assert_eq!(dm.matrix()[(row, 0)] == 1.0, label == 0);
    }
}

/// Convolved designs keep their row count for any length.
#[test]
fn convolution_keeps_rows() {
    let hrf = HrfKernel::try_from(HrfParams::canonical()).unwrap();
    for n in [1usize, 10, 31, 32, 100] {
        let trials: Vec<u32> = (0..n).map(|i| (i % 2) as u32).collect();
        let dm = DesignBuilder::new(&trials, &vec![1; n]).convolve(&hrf).boxcar().unwrap();
        assert_eq!(dm.nrows(), n);
    }
}

/// A noiseless BOLD built from condition 1 is recovered by the fit.
#[test]
fn zero_noise_fit_recovers_condition() {
    let (trials, _) = random_trials(2, 40, true, seeded(9));
    let hrf = double_gamma(32.0, 1.0, 6.0, 12.0, 0.9, 0.9, 0.35).unwrap();
    let dm = DesignBuilder::new(&trials, &vec![1; trials.len()])
        .convolve(&hrf)
        .boxcar()
        .unwrap();

    let bold = dm.column(1);
    let mut model = Glm::new();
    let fit = model.fit(&bold, dm.matrix()).unwrap();

    assert!((fit.beta[1] - 1.0).abs() < 1e-6);
    assert!(fit.beta[0].abs() < 1e-6);
    assert!(fit.beta[2].abs() < 1e-6);
    assert!(fit.t[1].abs() > 100.0);
}

/// Contrasts need a fitted model.
#[test]
fn contrast_requires_fit() {
    let glm = Glm::new();
    assert!(matches!(glm.contrast(&[1.0, -1.0]), Err(SimError::NotFitted)));
}

/// Noise draws from identical seeds are bit-identical.
#[test]
fn white_noise_is_reproducible() {
    let (a, _) = noise::white(1000, 1.0, seeded(123)).unwrap();
    let (b, _) = noise::white(1000, 1.0, seeded(123)).unwrap();
    assert_eq!(a, b);

    let (ar, _) = noise::ar1(100, 0.0, 1.0, seeded(77)).unwrap();
    let (w, _) = noise::white(100, 1.0, seeded(77)).unwrap();
    assert_eq!(ar, w);
}

/// Normalization is stable and never produces NaN on degenerate columns.
#[test]
fn normalization_properties() {
    let m = simfmri::Matrix::from_column_slice(5, 2, &[1.0, 4.0, 2.0, 8.0, 5.0, 3.0, 3.0, 3.0, 3.0, 3.0]);
    let once = norm::zscore(&m);
    let twice = norm::zscore(&once);
    assert!((once.clone() - twice).amax() < 1e-12);
    assert!(once.column(1).iter().all(|&x| x == 0.0));
    assert!(Normalization::Percent.apply_matrix(&m).iter().all(|x| x.is_finite()));
}

/// A parametric experiment with data-driven BOLD, end to end.
#[test]
fn parametric_experiment_summary() {
    let (trials, prng) = random_trials(2, 30, true, seeded(2));
    let value: Vec<f64> = trials.iter().enumerate().map(|(i, &t)| if t == 0 { 0.0 } else { (i % 7) as f64 }).collect();
    let exp = Experiment::with_unit_durations(trials, quiet(), prng)
        .unwrap()
        .data("value", value)
        .unwrap()
        .model(ModelSpec::parametric("model_01", ["value"], ["value"]).with_box())
        .unwrap();

    let (record, _) = exp.run(0).unwrap();
    let summary = analysis::summary(&[record], "model_01", "beta").unwrap();
    assert_eq!(
        summary.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["baseline", "box_1", "box_2", "value_1", "value_2"]
    );
}

/// Fitting directly with the free function mirrors the stateful fitter.
#[test]
fn free_fit_matches_stateful() {
    let (trials, _) = random_trials(1, 30, true, seeded(4));
    let dm = build(&trials, &vec![1; trials.len()], None, None).unwrap();
    let (trace, _) = noise::white(dm.nrows(), 1.0, seeded(8)).unwrap();
    let bold: Vec<f64> = dm.column(1).iter().zip(&trace).map(|(a, b)| a + b).collect();

    let free = glm::fit(&bold, dm.matrix()).unwrap();
    let mut model = Glm::new();
    let stateful = model.fit(&bold, dm.matrix()).unwrap();
    assert_eq!(&free, stateful);
}
