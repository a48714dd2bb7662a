//! End-to-end seismic time-history analysis
//!
//! ParameterSet -> {PDE, FEM} -> hybrid blend -> state derivative -> BDF
//! integration -> [`ResultSeries`].

use std::time::Instant;

use log::info;

use crate::analysis::SimulationOptions;
use crate::dynamics::DynamicSystem;
use crate::error::{SimError, SimResult};
use crate::forcing::{GroundMotion, SeismicExcitation};
use crate::integrator::{Bdf, Integrator};
use crate::operators::{FemOperatorBuilder, HybridAssembler, HybridOperatorTriple, PdeOperatorBuilder};
use crate::params::ParameterSet;
use crate::results::ResultSeries;

/// A tower together with the options of the analysis to run on it
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    params: ParameterSet,
    options: SimulationOptions,
}

impl Simulation {
    /// Check the options up front so no matrix is built for a run that
    /// cannot start
    pub fn new(params: ParameterSet, options: SimulationOptions) -> SimResult<Self> {
        validate_options(&options)?;
        Ok(Self { params, options })
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    /// Integrator configured from the options
    pub fn integrator(&self) -> Bdf {
        let mut bdf = Bdf::new(self.options.rtol, self.options.atol).with_max_steps(self.options.max_steps);
        if let Some(budget) = self.options.max_wall_time {
            bdf = bdf.with_wall_time(budget);
        }
        if let Some(h) = self.options.max_step {
            bdf = bdf.with_max_step(h);
        }
        bdf
    }

    /// Build the PDE and reduced FEM operators and blend them
    pub fn build_operators(&self) -> SimResult<HybridOperatorTriple> {
        let pde = PdeOperatorBuilder::new(&self.params).build()?;
        let fem = FemOperatorBuilder::new(&self.params)
            .with_retained_dof(self.options.retained_dof)
            .build_reduced()?;

        HybridAssembler::new(self.params.hybrid_factor())?.assemble(&pde, &fem)
    }

    /// Run under the default synthetic earthquake
    pub fn run(&self) -> SimResult<ResultSeries> {
        self.run_with(&SeismicExcitation::default())
    }

    /// Run under an arbitrary ground motion, starting from rest
    ///
    /// On [`SimError::IntegrationFailure`] the samples computed so far are
    /// available through [`SimError::partial`].
    pub fn run_with<G: GroundMotion + ?Sized>(&self, ground: &G) -> SimResult<ResultSeries> {
        let started = Instant::now();
        let grid = self.options.sample_grid()?;

        let hybrid = self.build_operators()?;
        info!(
            "Operators built: {} floors, FEM weight {}, {:.3?}",
            hybrid.dim(),
            hybrid.factor(),
            started.elapsed()
        );

        let system = DynamicSystem::new(hybrid.operators(), ground)?;
        let y0 = system.rest_state();

        info!(
            "Integrating over [0, {}] s with {} samples (rtol {:e}, atol {:e})",
            self.options.t_end,
            grid.len(),
            self.options.rtol,
            self.options.atol
        );

        let trajectory = self
            .integrator()
            .integrate(&system, &y0, (0.0, self.options.t_end), grid.times())?;

        let stats = trajectory.stats;
        info!(
            "Integration finished in {:.3?}: {} steps, {} rejected, {} RHS evaluations, {} LU factorizations",
            started.elapsed(),
            stats.steps,
            stats.rejected,
            stats.rhs_evals,
            stats.lu_decompositions
        );

        ResultSeries::from_trajectory(trajectory, self.params.elevations())
    }
}

fn validate_options(options: &SimulationOptions) -> SimResult<()> {
    options.sample_grid()?;

    if !(options.rtol.is_finite() && options.rtol > 0.0) {
        return Err(SimError::invalid("rtol", format!("must be positive, got {}", options.rtol)));
    }
    if !(options.atol.is_finite() && options.atol > 0.0) {
        return Err(SimError::invalid("atol", format!("must be positive, got {}", options.atol)));
    }
    if options.max_steps == 0 {
        return Err(SimError::invalid("max_steps", "must be at least 1"));
    }
    if let Some(h) = options.max_step {
        if !(h > 0.0) {
            return Err(SimError::invalid("max_step", format!("must be positive, got {}", h)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcing::NoExcitation;

    fn small(n: usize) -> ParameterSet {
        ParameterSet::builder().with_floors(n).build().unwrap()
    }

    #[test]
    fn test_rejects_bad_options() {
        let opts = SimulationOptions::default().with_tolerances(0.0, 1e-6);
        assert!(matches!(
            Simulation::new(small(3), opts),
            Err(SimError::InvalidParameter { field: "rtol", .. })
        ));

        let opts = SimulationOptions::default().with_horizon(-1.0, 10);
        assert!(Simulation::new(small(3), opts).is_err());

        let opts = SimulationOptions::default().with_max_steps(0);
        assert!(Simulation::new(small(3), opts).is_err());
    }

    #[test]
    fn test_operator_dimensions() {
        let sim = Simulation::new(small(8), SimulationOptions::default()).unwrap();
        let hybrid = sim.build_operators().unwrap();
        assert_eq!(hybrid.dim(), 8);
        assert_eq!(hybrid.factor(), 0.5);
    }

    #[test]
    fn test_integrator_follows_options() {
        let opts = SimulationOptions::default()
            .with_tolerances(1e-5, 1e-7)
            .with_max_steps(42)
            .with_max_step(0.1);
        let bdf = Simulation::new(small(3), opts).unwrap().integrator();
        assert_eq!(bdf.rtol, 1e-5);
        assert_eq!(bdf.atol, 1e-7);
        assert_eq!(bdf.max_steps, 42);
        assert_eq!(bdf.max_step, 0.1);
    }

    #[test]
    fn test_quiet_ground_short_run() {
        let opts = SimulationOptions::default().with_horizon(1.0, 11);
        let sim = Simulation::new(small(4), opts).unwrap();
        let series = sim.run_with(&NoExcitation).unwrap();

        assert_eq!(series.len(), 11);
        assert_eq!(series.n_floors(), 4);
        assert_eq!(series.peak_displacement(), 0.0);
    }
}
