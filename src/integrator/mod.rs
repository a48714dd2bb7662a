//! Time integration of first-order ODE systems
//!
//! - [`OdeSystem`]: right-hand side `f(t, y)` and its Jacobian
//! - [`Integrator`]: strategy advancing a system over a span and sampling it
//! - [`Bdf`]: variable-order, variable-step BDF for stiff systems

mod bdf;

pub use bdf::Bdf;

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::math::{Mat, Vec};

/// A first-order system `y' = f(t, y)`
pub trait OdeSystem {
    /// Length of the state vector
    fn dimension(&self) -> usize;

    /// Evaluate `f(t, y)`
    fn derivative(&self, t: f64, y: &Vec) -> SimResult<Vec>;

    /// Jacobian `df/dy`; forward differences unless the system knows better
    fn jacobian(&self, t: f64, y: &Vec) -> SimResult<Mat> {
        let f0 = self.derivative(t, y)?;
        finite_difference_jacobian(self, t, y, &f0)
    }
}

/// Forward-difference approximation of `df/dy` around `(t, y)`
pub fn finite_difference_jacobian<S: OdeSystem + ?Sized>(
    system: &S,
    t: f64,
    y: &Vec,
    f0: &Vec,
) -> SimResult<Mat> {
    let n = y.len();
    let mut jac = Mat::zeros(f0.len(), n);
    let sqrt_eps = f64::EPSILON.sqrt();

    let mut y_pert = y.clone();
    for j in 0..n {
        let yj = y[j];
        let step = sqrt_eps * yj.abs().max(1.0);
        y_pert[j] = yj + step;
        // Use the representable increment
        let step = y_pert[j] - yj;

        let f1 = system.derivative(t, &y_pert)?;
        jac.set_column(j, &((f1 - f0) / step));
        y_pert[j] = yj;
    }

    Ok(jac)
}

/// Work counters of one integration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    /// Accepted steps
    pub steps: usize,
    /// Rejected step attempts (error test or Newton failure)
    pub rejected: usize,
    /// Right-hand side evaluations
    pub rhs_evals: usize,
    /// Jacobian evaluations
    pub jacobian_evals: usize,
    /// LU factorizations of the Newton matrix
    pub lu_decompositions: usize,
}

/// States sampled at the requested times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: std::vec::Vec<f64>,
    pub states: std::vec::Vec<Vec>,
    pub stats: IntegrationStats,
}

impl Trajectory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: std::vec::Vec::with_capacity(capacity),
            states: std::vec::Vec::with_capacity(capacity),
            stats: IntegrationStats::default(),
        }
    }

    pub fn push(&mut self, t: f64, y: Vec) {
        self.times.push(t);
        self.states.push(y);
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Advances an [`OdeSystem`] from `y0` over `t_span` and reports the state at
/// every sample time.
///
/// Sample times must be ascending and lie inside `t_span`.
pub trait Integrator {
    fn integrate<S: OdeSystem + ?Sized>(
        &self,
        system: &S,
        y0: &Vec,
        t_span: (f64, f64),
        sample_times: &[f64],
    ) -> SimResult<Trajectory>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Linear {
        a: Mat,
    }

    impl OdeSystem for Linear {
        fn dimension(&self) -> usize {
            self.a.nrows()
        }

        fn derivative(&self, _t: f64, y: &Vec) -> SimResult<Vec> {
            Ok(&self.a * y)
        }
    }

    #[test]
    fn test_finite_difference_jacobian_of_linear_system() {
        let a = Mat::from_row_slice(2, 2, &[-2.0, 1.0, 0.5, -30.0]);
        let system = Linear { a: a.clone() };
        let y = Vec::from_vec(vec![0.3, -1.7]);

        let jac = system.jacobian(0.0, &y).unwrap();
        for (x, e) in jac.iter().zip(a.iter()) {
            assert_relative_eq!(*x, *e, epsilon = 1e-6);
        }
    }
}
