//! End-to-end seismic response of the hybrid tower

use approx::assert_relative_eq;
use hybrid_tower::prelude::*;

fn tower(n_floors: usize) -> ParameterSet {
    ParameterSet::builder().with_floors(n_floors).build().unwrap()
}

#[test]
fn two_floor_tower_at_rest_stays_at_rest() {
    let sim = Simulation::new(tower(2), SimulationOptions::default()).unwrap();
    let series = sim.run_with(&NoExcitation).unwrap();

    assert_eq!(series.len(), 600);
    for sample in series.samples() {
        assert!(sample.displacement.iter().all(|&u| u == 0.0));
        assert!(sample.velocity.iter().all(|&v| v == 0.0));
    }
}

#[test]
fn default_run_is_bounded_and_complete() {
    let sim = Simulation::new(ParameterSet::default(), SimulationOptions::default()).unwrap();
    let series = sim.run().unwrap();

    assert_eq!(series.len(), 600);
    assert_eq!(series.n_floors(), 100);
    assert!(series.samples().iter().all(|s| s.displacement.len() == 100 && s.velocity.len() == 100));
    assert!(series.is_finite());
    assert!(series.peak_displacement() < 1.0, "peak = {}", series.peak_displacement());
    assert!(series.peak_displacement() > 0.0);

    let times = series.times();
    assert_eq!(times[0], 0.0);
    assert_eq!(times[599], 30.0);

    // Starts from rest
    assert!(series.samples()[0].displacement.iter().all(|&u| u == 0.0));

    let elevations = series.elevations();
    assert_eq!(elevations[0], 0.0);
    assert_relative_eq!(elevations[99], 350.0, max_relative = 1e-12);
}

#[test]
fn identical_inputs_give_identical_output() {
    let options = SimulationOptions::default().with_horizon(5.0, 50);
    let sim = Simulation::new(tower(12), options).unwrap();

    let first = sim.run().unwrap();
    let second = sim.run().unwrap();
    assert_eq!(first, second);
}

#[test]
fn closure_ground_motion_matches_builtin() {
    let options = SimulationOptions::default().with_horizon(3.0, 31);
    let sim = Simulation::new(tower(6), options).unwrap();
    let quake = SeismicExcitation::default();

    let builtin = sim.run().unwrap();
    let closure = sim.run_with(&|t: f64| quake.acceleration(t)).unwrap();
    assert_eq!(builtin.samples(), closure.samples());
}

#[test]
fn invalid_parameters_rejected_before_any_work() {
    let err = ParameterSet::builder().with_floors(1).build().unwrap_err();
    assert!(matches!(err, SimError::InvalidParameter { field: "n_floors", .. }));

    let err = ParameterSet::builder().with_material(-1.0, 6500.0).build().unwrap_err();
    assert!(matches!(err, SimError::InvalidParameter { field: "e", .. }));

    let err = ParameterSet::builder().with_hybrid_factor(1.5).build().unwrap_err();
    assert!(matches!(err, SimError::InvalidParameter { field: "hybrid_factor", .. }));

    let err = ParameterSet::builder().with_height(f64::NAN).build().unwrap_err();
    assert!(matches!(err, SimError::InvalidParameter { field: "height", .. }));
}

#[test]
fn step_budget_failure_carries_partial_history() {
    let options = SimulationOptions::default().with_horizon(10.0, 101).with_max_steps(5);
    let sim = Simulation::new(tower(6), options).unwrap();

    let err = sim.run().unwrap_err();
    assert!(matches!(
        err,
        SimError::IntegrationFailure {
            reason: FailureReason::StepBudgetExceeded(5),
            requested: 101,
            ..
        }
    ));

    let partial = err.partial().unwrap();
    assert!(partial.len() < 101);
    assert!(partial.len() >= 1);
    assert_eq!(partial.times[0], 0.0);
}

#[test]
fn transverse_reduction_changes_response() {
    let options = SimulationOptions::default().with_horizon(2.0, 21);
    let axial = Simulation::new(tower(5), options.clone()).unwrap().run().unwrap();
    let transverse = Simulation::new(tower(5), options.with_retained_dof(RetainedDof::Transverse))
        .unwrap()
        .run()
        .unwrap();

    assert!(axial.is_finite() && transverse.is_finite());
    assert_ne!(axial.samples(), transverse.samples());
}

#[test]
fn parameter_set_round_trips_through_builder() {
    let json = r#"{ "n_floors": 10, "hybrid_factor": 0.25 }"#;
    let params: ParameterSet = serde_json::from_str(json).unwrap();
    assert_eq!(params.n_floors(), 10);
    assert_eq!(params.height(), 35.0);
    assert_eq!(params.hybrid_factor(), 0.25);

    let bad = r#"{ "n_floors": 10, "rho": 0.0 }"#;
    assert!(serde_json::from_str::<ParameterSet>(bad).is_err());
}
