//! Sampled response of a seismic time-history analysis

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::integrator::{IntegrationStats, Trajectory};
use crate::math::{Mat, Vec};

/// Displacement and velocity of every floor at one output time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Time in s
    pub time: f64,
    /// Floor displacements in m
    pub displacement: Vec,
    /// Floor velocities in m/s
    pub velocity: Vec,
}

/// Response history handed to presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSeries {
    samples: std::vec::Vec<Sample>,
    elevations: std::vec::Vec<f64>,
    stats: IntegrationStats,
}

impl ResultSeries {
    /// Split each `[u; v]` state of a trajectory into displacement and velocity
    pub fn from_trajectory(trajectory: Trajectory, elevations: std::vec::Vec<f64>) -> SimResult<Self> {
        let n = elevations.len();
        let stats = trajectory.stats;

        let samples = trajectory
            .times
            .into_iter()
            .zip(trajectory.states)
            .map(|(time, state)| {
                if state.len() != 2 * n {
                    return Err(SimError::DimensionMismatch {
                        expected: 2 * n,
                        found: state.len(),
                    });
                }
                Ok(Sample {
                    time,
                    displacement: state.rows(0, n).into_owned(),
                    velocity: state.rows(n, n).into_owned(),
                })
            })
            .collect::<SimResult<std::vec::Vec<_>>>()?;

        Ok(Self {
            samples,
            elevations,
            stats,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of floors
    pub fn n_floors(&self) -> usize {
        self.elevations.len()
    }

    /// Height of each floor above the base, `linspace(0, L, n)`
    pub fn elevations(&self) -> &[f64] {
        &self.elevations
    }

    pub fn times(&self) -> std::vec::Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn stats(&self) -> &IntegrationStats {
        &self.stats
    }

    /// Displacements with one row per sample and one column per floor
    pub fn displacement_matrix(&self) -> Mat {
        Mat::from_fn(self.len(), self.n_floors(), |r, c| {
            self.samples[r].displacement[c]
        })
    }

    /// Largest |u| reached by each floor over the whole history
    pub fn peak_envelope(&self) -> Vec {
        let mut envelope = Vec::zeros(self.n_floors());
        for sample in &self.samples {
            envelope.zip_apply(&sample.displacement, |peak, u| *peak = peak.max(u.abs()));
        }
        envelope
    }

    /// Largest |u| over all floors and samples
    pub fn peak_displacement(&self) -> f64 {
        self.peak_envelope().iter().fold(0.0, |acc, &u| acc.max(u))
    }

    /// True when no displacement or velocity is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| {
            s.displacement.iter().all(|v| v.is_finite()) && s.velocity.iter().all(|v| v.is_finite())
        })
    }

    pub fn summary(&self) -> SimulationSummary {
        let envelope = self.peak_envelope();
        SimulationSummary {
            n_floors: self.n_floors(),
            sample_count: self.len(),
            t_end: self.samples.last().map_or(0.0, |s| s.time),
            peak_displacement: envelope.iter().fold(0.0, |acc, &u| acc.max(u)),
            peak_roof_displacement: envelope.iter().last().copied().unwrap_or(0.0),
            stats: self.stats,
        }
    }
}

/// Headline numbers of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub n_floors: usize,
    pub sample_count: usize,
    pub t_end: f64,
    /// Peak |u| over all floors in m
    pub peak_displacement: f64,
    /// Peak |u| of the top floor in m
    pub peak_roof_displacement: f64,
    pub stats: IntegrationStats,
}

impl SimulationSummary {
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
