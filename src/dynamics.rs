//! First-order form of the damped structural equations of motion
//!
//! `M u'' + C u' + K u = -M e0 a(t)` becomes `y' = f(t, y)` with `y = [u; v]`.

use nalgebra::linalg::LU;
use nalgebra::Dyn;
use nalgebra_sparse::CsrMatrix;

use crate::error::{SimError, SimResult};
use crate::forcing::GroundMotion;
use crate::integrator::OdeSystem;
use crate::math::sparse::dense_to_csr;
use crate::math::{sparse_matvec, Mat, Vec};
use crate::operators::OperatorTriple;

/// Diagonal shift added to the mass operator before it is factorized
pub const REGULARIZATION: f64 = 1e-6;

/// State derivative of a tower shaken at its base
///
/// The regularized mass `A = M + eps*I` is factorized once at construction,
/// so every derivative evaluation costs two sparse products and one pair of
/// triangular solves.
pub struct DynamicSystem<'a, G: GroundMotion + ?Sized> {
    ground: &'a G,
    n: usize,
    k: CsrMatrix<f64>,
    c: CsrMatrix<f64>,
    /// `-M e0`, the load pattern scaled by the ground acceleration
    load_pattern: Vec,
    mass_lu: LU<f64, Dyn, Dyn>,
    jacobian: Mat,
}

impl<'a, G: GroundMotion + ?Sized> DynamicSystem<'a, G> {
    pub fn new(ops: &OperatorTriple, ground: &'a G) -> SimResult<Self> {
        let n = ops.dim();
        if n == 0 {
            return Err(SimError::InvalidInput("operators are empty".to_string()));
        }

        let regularized = ops.m() + Mat::identity(n, n) * REGULARIZATION;
        let mass_lu = regularized.lu();
        if !mass_lu.is_invertible() {
            return Err(SimError::SingularSystem(format!(
                "mass operator + {:e} I is not invertible",
                REGULARIZATION
            )));
        }

        let singular = || SimError::SingularSystem("mass solve failed".to_string());
        let a_inv_k = mass_lu.solve(ops.k()).ok_or_else(singular)?;
        let a_inv_c = mass_lu.solve(ops.c()).ok_or_else(singular)?;

        // [[0, I], [-A^-1 K, -A^-1 C]]
        let mut jacobian = Mat::zeros(2 * n, 2 * n);
        jacobian.view_mut((0, n), (n, n)).fill_with_identity();
        jacobian.view_mut((n, 0), (n, n)).copy_from(&(-a_inv_k));
        jacobian.view_mut((n, n), (n, n)).copy_from(&(-a_inv_c));

        Ok(Self {
            ground,
            n,
            k: dense_to_csr(ops.k()),
            c: dense_to_csr(ops.c()),
            load_pattern: -ops.m().column(0).into_owned(),
            mass_lu,
            jacobian,
        })
    }

    /// Number of structural DOFs (half the state length)
    pub fn n_dofs(&self) -> usize {
        self.n
    }

    /// Load vector `-M e0 a(t)`
    pub fn load(&self, t: f64) -> Vec {
        &self.load_pattern * self.ground.acceleration(t)
    }

    /// Initial state: at rest, undeformed
    pub fn rest_state(&self) -> Vec {
        Vec::zeros(2 * self.n)
    }
}

impl<G: GroundMotion + ?Sized> OdeSystem for DynamicSystem<'_, G> {
    fn dimension(&self) -> usize {
        2 * self.n
    }

    fn derivative(&self, t: f64, y: &Vec) -> SimResult<Vec> {
        let n = self.n;
        if y.len() != 2 * n {
            return Err(SimError::DimensionMismatch {
                expected: 2 * n,
                found: y.len(),
            });
        }

        let u = y.rows(0, n).into_owned();
        let v = y.rows(n, n).into_owned();

        let rhs = self.load(t) - sparse_matvec(&self.c, &v) - sparse_matvec(&self.k, &u);
        let accel = self
            .mass_lu
            .solve(&rhs)
            .ok_or_else(|| SimError::SingularSystem("mass solve failed".to_string()))?;

        let mut dy = Vec::zeros(2 * n);
        dy.rows_mut(0, n).copy_from(&v);
        dy.rows_mut(n, n).copy_from(&accel);
        Ok(dy)
    }

    fn jacobian(&self, _t: f64, _y: &Vec) -> SimResult<Mat> {
        Ok(self.jacobian.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcing::{NoExcitation, SeismicExcitation};
    use crate::integrator::finite_difference_jacobian;
    use approx::assert_relative_eq;

    fn small_triple() -> OperatorTriple {
        let k = Mat::from_row_slice(3, 3, &[2.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 1.0]) * 100.0;
        let m = Mat::identity(3, 3) * 4.0;
        OperatorTriple::with_rayleigh_damping(k, m, 0.03, 0.003).unwrap()
    }

    #[test]
    fn test_rest_is_equilibrium_at_origin() {
        let ops = small_triple();
        let quake = SeismicExcitation::default();
        let system = DynamicSystem::new(&ops, &quake).unwrap();

        let dy = system.derivative(0.0, &system.rest_state()).unwrap();
        assert_eq!(dy.len(), 6);
        assert!(dy.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_base_acceleration_loads_first_column() {
        let ops = small_triple();
        let ground = |_t: f64| 2.0;
        let system = DynamicSystem::new(&ops, &ground).unwrap();

        let dy = system.derivative(1.0, &system.rest_state()).unwrap();
        // Diagonal mass: only the first DOF is loaded, v' = -4*2/(4 + eps)
        assert_relative_eq!(dy[3], -8.0 / (4.0 + REGULARIZATION), max_relative = 1e-14);
        assert_eq!(dy[4], 0.0);
        assert_eq!(dy[5], 0.0);
    }

    #[test]
    fn test_velocity_passes_through() {
        let ops = small_triple();
        let system = DynamicSystem::new(&ops, &NoExcitation).unwrap();
        let y = Vec::from_vec(vec![0.0, 0.0, 0.0, 1.0, -2.0, 3.0]);

        let dy = system.derivative(0.5, &y).unwrap();
        assert_eq!(dy.rows(0, 3).into_owned(), y.rows(3, 3).into_owned());
    }

    #[test]
    fn test_exact_jacobian_matches_finite_differences() {
        let ops = small_triple();
        let system = DynamicSystem::new(&ops, &NoExcitation).unwrap();
        let y = Vec::from_vec(vec![0.01, -0.02, 0.03, 0.1, 0.0, -0.1]);

        let exact = system.jacobian(0.0, &y).unwrap();
        let f0 = system.derivative(0.0, &y).unwrap();
        let approx = finite_difference_jacobian(&system, 0.0, &y, &f0).unwrap();

        for (a, b) in exact.iter().zip(approx.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-5, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_zero_mass_is_regularized() {
        let ops = OperatorTriple::new(Mat::identity(2, 2), Mat::zeros(2, 2), Mat::zeros(2, 2)).unwrap();
        let system = DynamicSystem::new(&ops, &NoExcitation).unwrap();

        let y = Vec::from_vec(vec![1e-6, 0.0, 0.0, 0.0]);
        let dy = system.derivative(0.0, &y).unwrap();
        assert_relative_eq!(dy[2], -1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_singular_after_regularization() {
        let m = Mat::from_diagonal(&Vec::from_vec(vec![-REGULARIZATION, 1.0]));
        let ops = OperatorTriple::new(Mat::identity(2, 2), m, Mat::zeros(2, 2)).unwrap();

        let result = DynamicSystem::new(&ops, &NoExcitation);
        assert!(matches!(result, Err(SimError::SingularSystem(_))));
    }

    #[test]
    fn test_rejects_wrong_state_length() {
        let ops = small_triple();
        let system = DynamicSystem::new(&ops, &NoExcitation).unwrap();
        assert!(matches!(
            system.derivative(0.0, &Vec::zeros(4)),
            Err(SimError::DimensionMismatch { expected: 6, found: 4 })
        ));
    }
}
