//! Finite-difference beam operators

use log::debug;

use crate::error::SimResult;
use crate::math::{self, Mat, FOURTH_DERIVATIVE_STENCIL};
use crate::operators::OperatorTriple;
use crate::params::ParameterSet;

/// Builds K, M and C from the fourth-derivative beam equation on the floor grid
///
/// K is the five-point stencil scaled by `E*I/dx^4`, with rows near the base
/// and roof simply truncated. M is `rho*A` on the diagonal.
#[derive(Debug, Clone)]
pub struct PdeOperatorBuilder<'a> {
    params: &'a ParameterSet,
}

impl<'a> PdeOperatorBuilder<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params }
    }

    /// Stiffness operator (n x n, pentadiagonal)
    pub fn stiffness(&self) -> Mat {
        let n = self.params.n_floors();
        let dx = self.params.spacing();
        let scale = self.params.flexural_rigidity() / dx.powi(4);

        math::banded_matrix(n, &FOURTH_DERIVATIVE_STENCIL, scale)
    }

    /// Mass operator (rho*A times identity)
    pub fn mass(&self) -> Mat {
        let n = self.params.n_floors();
        Mat::identity(n, n) * self.params.linear_density()
    }

    pub fn build(&self) -> SimResult<OperatorTriple> {
        let k = self.stiffness();
        let m = self.mass();

        debug!(
            "PDE operators: n = {}, dx = {:.4} m, EI/dx^4 = {:.4e}",
            self.params.n_floors(),
            self.params.spacing(),
            self.params.flexural_rigidity() / self.params.spacing().powi(4)
        );

        OperatorTriple::with_rayleigh_damping(k, m, self.params.alpha(), self.params.beta())
    }
}
