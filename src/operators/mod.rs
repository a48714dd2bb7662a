//! Structural operators (stiffness, mass, damping)
//!
//! Two discretizations of the same tower produce an [`OperatorTriple`] each:
//! - [`pde`]: finite-difference Euler-Bernoulli beam on the floor grid
//! - [`fem`]: assembled beam elements, reduced to one DOF per node
//!
//! [`hybrid`] blends the two into the operators that drive the dynamics.

pub mod fem;
pub mod hybrid;
pub mod pde;

pub use fem::{FemOperatorBuilder, RetainedDof};
pub use hybrid::{HybridAssembler, HybridOperatorTriple};
pub use pde::PdeOperatorBuilder;

use crate::error::{SimError, SimResult};
use crate::math::Mat;

/// Stiffness, mass and damping operators of equal square dimension
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorTriple {
    k: Mat,
    m: Mat,
    c: Mat,
}

impl OperatorTriple {
    /// Bundle three operators, checking they are square and of one size
    pub fn new(k: Mat, m: Mat, c: Mat) -> SimResult<Self> {
        let n = k.nrows();
        for op in [&k, &m, &c] {
            if op.nrows() != n {
                return Err(SimError::DimensionMismatch {
                    expected: n,
                    found: op.nrows(),
                });
            }
            if op.ncols() != n {
                return Err(SimError::DimensionMismatch {
                    expected: n,
                    found: op.ncols(),
                });
            }
        }
        Ok(Self { k, m, c })
    }

    /// Build the triple with Rayleigh damping C = alpha*M + beta*K
    pub fn with_rayleigh_damping(k: Mat, m: Mat, alpha: f64, beta: f64) -> SimResult<Self> {
        let c = rayleigh_damping(&k, &m, alpha, beta);
        Self::new(k, m, c)
    }

    /// Stiffness operator
    pub fn k(&self) -> &Mat {
        &self.k
    }

    /// Mass operator
    pub fn m(&self) -> &Mat {
        &self.m
    }

    /// Damping operator
    pub fn c(&self) -> &Mat {
        &self.c
    }

    /// Number of rows (and columns) of each operator
    pub fn dim(&self) -> usize {
        self.k.nrows()
    }

    /// Apply `f` to each operator
    pub(crate) fn map(&self, f: impl Fn(&Mat) -> Mat) -> Self {
        Self {
            k: f(&self.k),
            m: f(&self.m),
            c: f(&self.c),
        }
    }
}

/// Rayleigh damping C = alpha*M + beta*K
pub fn rayleigh_damping(k: &Mat, m: &Mat, alpha: f64, beta: f64) -> Mat {
    m * alpha + k * beta
}
