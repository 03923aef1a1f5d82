//! Seeding and chunking behavior of simulation runs.

use simfmri::{
    create_chunks, hrf, noise, random_trials, reduce_chunks, seeded, Experiment, ExperimentConfig, HrfParams,
    ModelSpec, NoiseModel, Prng, Result, RunConfig, Runner, SimError,
};

fn factory(_code: usize, prng: Prng) -> Result<Experiment> {
    let (trials, prng) = random_trials(2, 15, true, prng);
    let config = ExperimentConfig::default().noise(NoiseModel::Ar1 { alpha: 0.4, sigma: 1.0 });
    Experiment::with_unit_durations(trials, config, prng)?.model(ModelSpec::boxcar("model_01", ["box_2"]))
}

#[test]
fn repeated_runs_are_identical() {
    let runner = Runner::new(RunConfig::new(6).ncore(3), factory);
    assert_eq!(runner.go(true).unwrap(), runner.go(true).unwrap());
    assert_eq!(runner.go(false).unwrap(), runner.go(false).unwrap());
}

#[test]
fn chunks_use_distinct_streams() {
    let records = Runner::new(RunConfig::new(2).ncore(2), factory).run_parallel().unwrap();
    // Chunk 0 and chunk 1 start from different seeds
    assert_ne!(records[0].get("trials"), records[1].get("trials"));
}

#[test]
fn serial_seed_changes_results() {
    let a = Runner::new(RunConfig::new(2), factory).run_serial().unwrap();
    let b = Runner::new(RunConfig::new(2).serial_seed(7), factory).run_serial().unwrap();
    assert_ne!(a, b);
}

#[test]
fn uneven_chunks_are_rejected() {
    let err = Runner::new(RunConfig::new(5).ncore(2), factory).run_parallel().unwrap_err();
    assert!(matches!(err, SimError::InvalidParameter { name: "ncore", .. }));
    assert!(create_chunks(5, 2).is_err());
}

#[test]
fn chunking_round_trips_indices() {
    let chunks = create_chunks(12, 4).unwrap();
    assert_eq!(chunks.len(), 4);
    assert_eq!(reduce_chunks(chunks), (0..12).collect::<Vec<_>>());
}

#[test]
fn noise_streams_continue() {
    // Threading the PRNG yields the same draws as one long trace
    let (first, prng) = noise::white(50, 1.0, seeded(4)).unwrap();
    let (second, _) = noise::white(50, 1.0, prng).unwrap();
    let (whole, _) = noise::white(100, 1.0, seeded(4)).unwrap();
    assert_eq!([first, second].concat(), whole);
}

#[test]
fn hrf_perturbation_is_seeded() {
    let (a, _) = hrf::perturb(HrfParams::canonical(), 10.0, seeded(6)).unwrap();
    let (b, _) = hrf::perturb(HrfParams::canonical(), 10.0, seeded(6)).unwrap();
    assert_eq!(a.params, b.params);
    assert_eq!(a.perturbed, b.perturbed);
    assert_ne!(a.params, HrfParams::canonical());
}
