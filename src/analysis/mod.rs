//! Time-history analysis options

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::operators::RetainedDof;

/// Options for a seismic time-history analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOptions {
    /// End of the time horizon in s (the start is always 0)
    pub t_end: f64,
    /// Number of evenly spaced output samples over [0, t_end]
    pub sample_count: usize,
    /// Relative error tolerance of the stiff integrator
    pub rtol: f64,
    /// Absolute error tolerance of the stiff integrator
    pub atol: f64,
    /// Maximum number of accepted integrator steps
    pub max_steps: usize,
    /// Optional wall-clock budget for the integration
    pub max_wall_time: Option<Duration>,
    /// Optional upper bound on the internal step size in s
    pub max_step: Option<f64>,
    /// DOF kept from each FEM node block when reducing to one DOF per node
    pub retained_dof: RetainedDof,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            t_end: 30.0,
            sample_count: 600,
            rtol: 1e-6,
            atol: 1e-6,
            max_steps: 100_000,
            max_wall_time: None,
            max_step: None,
            retained_dof: RetainedDof::default(),
        }
    }
}

impl SimulationOptions {
    /// Set the time horizon and sample count
    pub fn with_horizon(mut self, t_end: f64, sample_count: usize) -> Self {
        self.t_end = t_end;
        self.sample_count = sample_count;
        self
    }

    /// Set integrator tolerances
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// Set maximum accepted steps
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set a wall-clock budget
    pub fn with_wall_time(mut self, budget: Duration) -> Self {
        self.max_wall_time = Some(budget);
        self
    }

    /// Limit the internal step size
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    /// Choose which FEM DOF survives the reduction
    pub fn with_retained_dof(mut self, dof: RetainedDof) -> Self {
        self.retained_dof = dof;
        self
    }

    /// Evenly spaced sample grid over the horizon
    pub fn sample_grid(&self) -> SimResult<SampleGrid> {
        SampleGrid::linspace(0.0, self.t_end, self.sample_count)
    }
}

/// Sorted set of times at which the response is reported
///
/// Serialized as a plain list of times; deserialization goes through
/// [`SampleGrid::from_times`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct SampleGrid {
    times: Vec<f64>,
}

impl SampleGrid {
    /// `count` evenly spaced times from `t0` to `t1`, both included
    pub fn linspace(t0: f64, t1: f64, count: usize) -> SimResult<Self> {
        if count < 2 {
            return Err(SimError::invalid(
                "sample_count",
                format!("at least 2 samples required, got {}", count),
            ));
        }
        if !(t0.is_finite() && t1.is_finite() && t1 > t0) {
            return Err(SimError::invalid(
                "t_end",
                format!("time span [{}, {}] is empty or not finite", t0, t1),
            ));
        }

        let dt = (t1 - t0) / (count - 1) as f64;
        let mut times: Vec<f64> = (0..count).map(|k| t0 + k as f64 * dt).collect();
        // Pin the last sample so it matches the horizon exactly
        times[count - 1] = t1;

        Ok(Self { times })
    }

    /// Use an explicit list of times (must be finite and ascending)
    pub fn from_times(times: Vec<f64>) -> SimResult<Self> {
        if times.is_empty() {
            return Err(SimError::InvalidInput("sample grid is empty".to_string()));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(SimError::InvalidInput("sample grid contains non-finite times".to_string()));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidInput(
                "sample times must be strictly ascending".to_string(),
            ));
        }
        Ok(Self { times })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.times[0]
    }

    pub fn last(&self) -> f64 {
        self.times[self.times.len() - 1]
    }
}

impl TryFrom<Vec<f64>> for SampleGrid {
    type Error = SimError;

    fn try_from(times: Vec<f64>) -> SimResult<Self> {
        Self::from_times(times)
    }
}

impl From<SampleGrid> for Vec<f64> {
    fn from(grid: SampleGrid) -> Self {
        grid.times
    }
}
