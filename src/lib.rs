//! Hybrid Tower - seismic response of a tall slender tower
//!
//! The tower is modelled twice, as a finite-difference Euler-Bernoulli beam
//! and as an assembly of beam finite elements. The two sets of operators are
//! blended and the resulting damped structural ODE is integrated with a stiff
//! variable-order BDF solver under a synthetic base acceleration:
//! - PDE and FEM operator construction (stiffness, lumped mass, Rayleigh damping)
//! - Convex hybrid blend of the two discretizations
//! - Variable-order, variable-step BDF with dense output
//! - Displacement and velocity history of every floor
//!
//! ## Example
//! ```rust,no_run
//! use hybrid_tower::prelude::*;
//!
//! let params = ParameterSet::builder().with_floors(20).build().unwrap();
//! let options = SimulationOptions::default().with_horizon(10.0, 200);
//!
//! let series = Simulation::new(params, options).unwrap().run().unwrap();
//!
//! println!("peak displacement: {:.4} m", series.peak_displacement());
//! ```

pub mod analysis;
pub mod dynamics;
pub mod error;
pub mod forcing;
pub mod integrator;
pub mod math;
pub mod operators;
pub mod params;
pub mod results;
pub mod simulation;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{SampleGrid, SimulationOptions};
    pub use crate::dynamics::DynamicSystem;
    pub use crate::error::{FailureReason, SimError, SimResult};
    pub use crate::forcing::{GroundMotion, Harmonic, NoExcitation, SeismicExcitation};
    pub use crate::integrator::{Bdf, IntegrationStats, Integrator, OdeSystem, Trajectory};
    pub use crate::operators::{
        FemOperatorBuilder, HybridAssembler, HybridOperatorTriple, OperatorTriple, PdeOperatorBuilder,
        RetainedDof,
    };
    pub use crate::params::{ParameterSet, ParameterSetBuilder};
    pub use crate::results::{ResultSeries, Sample, SimulationSummary};
    pub use crate::simulation::Simulation;
}
