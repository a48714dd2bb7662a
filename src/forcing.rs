//! Ground-motion models
//!
//! A ground motion is a pure function of time returning the horizontal base
//! acceleration in m/s². The integrator evaluates it at arbitrary, repeated
//! and out-of-order times while retrying rejected steps, so implementations
//! must not keep state.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Base acceleration as a function of time
pub trait GroundMotion: Send + Sync {
    /// Acceleration in m/s² at time `t` (s)
    fn acceleration(&self, t: f64) -> f64;
}

impl<F> GroundMotion for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn acceleration(&self, t: f64) -> f64 {
        self(t)
    }
}

/// One sinusoidal component of the excitation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Harmonic {
    /// Weight relative to the overall amplitude
    pub weight: f64,
    /// Frequency in Hz
    pub frequency: f64,
}

/// Decaying multi-frequency synthetic earthquake
///
/// `a(t) = amplitude * sum(w_k * sin(2*pi*f_k*t)) * exp(-decay*t)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicExcitation {
    pub amplitude: f64,
    pub harmonics: Vec<Harmonic>,
    /// Envelope decay rate in 1/s
    pub decay: f64,
}

impl Default for SeismicExcitation {
    fn default() -> Self {
        Self {
            amplitude: 1.5,
            harmonics: vec![
                Harmonic { weight: 1.0, frequency: 0.25 },
                Harmonic { weight: 0.4, frequency: 1.2 },
                Harmonic { weight: 0.2, frequency: 3.0 },
            ],
            decay: 0.05,
        }
    }
}

impl GroundMotion for SeismicExcitation {
    fn acceleration(&self, t: f64) -> f64 {
        let oscillation: f64 = self
            .harmonics
            .iter()
            .map(|h| h.weight * (2.0 * PI * h.frequency * t).sin())
            .sum();

        self.amplitude * oscillation * (-self.decay * t).exp()
    }
}

/// No ground motion at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoExcitation;

impl GroundMotion for NoExcitation {
    fn acceleration(&self, _t: f64) -> f64 {
        0.0
    }
}
