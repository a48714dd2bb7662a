//! Mathematical utilities for operator construction and integration

pub mod sparse;

use nalgebra::{DMatrix, DVector, Matrix6};

pub use sparse::{sparse_matvec, SparseMatrixBuilder};

pub type Mat = DMatrix<f64>;
pub type Vec = DVector<f64>;
pub type Mat6 = Matrix6<f64>;

/// Five-point stencil of the fourth spatial derivative, as (offset, weight)
pub const FOURTH_DERIVATIVE_STENCIL: [(isize, f64); 5] =
    [(-2, 1.0), (-1, -4.0), (0, 6.0), (1, -4.0), (2, 1.0)];

/// Compute the local stiffness matrix of a planar Euler-Bernoulli beam element
///
/// DOF order per node is (axial, transverse, rotation), node i first.
///
/// # Arguments
/// * `e` - Modulus of elasticity
/// * `a` - Cross-sectional area
/// * `i` - Second moment of area
/// * `length` - Element length
///
/// # Returns
/// 6x6 local stiffness matrix
pub fn beam_local_stiffness(e: f64, a: f64, i: f64, length: f64) -> Mat6 {
    let l = length;
    let l2 = l * l;
    let l3 = l2 * l;

    let ea_l = e * a / l;
    let ei_l3 = e * i / l3;
    let ei_l2 = e * i / l2;
    let ei_l = e * i / l;

    #[rustfmt::skip]
    let data = [
        // Row 0: axial at i
        ea_l,    0.0,          0.0,         -ea_l,   0.0,          0.0,
        // Row 1: shear at i
        0.0,     12.0*ei_l3,   6.0*ei_l2,   0.0,     -12.0*ei_l3,  6.0*ei_l2,
        // Row 2: moment at i
        0.0,     6.0*ei_l2,    4.0*ei_l,    0.0,     -6.0*ei_l2,   2.0*ei_l,
        // Row 3: axial at j
        -ea_l,   0.0,          0.0,         ea_l,    0.0,          0.0,
        // Row 4: shear at j
        0.0,     -12.0*ei_l3,  -6.0*ei_l2,  0.0,     12.0*ei_l3,   -6.0*ei_l2,
        // Row 5: moment at j
        0.0,     6.0*ei_l2,    2.0*ei_l,    0.0,     -6.0*ei_l2,   4.0*ei_l,
    ];

    Mat6::from_row_slice(&data)
}

/// Build an n x n banded matrix from a stencil of (diagonal offset, weight)
///
/// Entries falling outside the matrix are dropped, so rows near the edges
/// carry fewer diagonals.
pub fn banded_matrix(n: usize, stencil: &[(isize, f64)], scale: f64) -> Mat {
    let mut builder = SparseMatrixBuilder::new(n);

    for row in 0..n {
        for &(offset, weight) in stencil {
            let col = row as isize + offset;
            if col >= 0 && (col as usize) < n {
                builder.add(row, col as usize, scale * weight);
            }
        }
    }

    builder.to_dense()
}

/// Keep every `stride`-th row and column starting at `offset`
pub fn select_stride(m: &Mat, offset: usize, stride: usize) -> Mat {
    let indices: std::vec::Vec<usize> = (offset..m.nrows()).step_by(stride).collect();
    let n = indices.len();

    Mat::from_fn(n, n, |r, c| m[(indices[r], indices[c])])
}

/// Check symmetry to a relative tolerance
pub fn is_symmetric(m: &Mat, rel_tol: f64) -> bool {
    if !m.is_square() {
        return false;
    }
    let scale = m.amax().max(f64::MIN_POSITIVE);
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > rel_tol * scale {
                return false;
            }
        }
    }
    true
}

/// Check that all off-diagonal entries are exactly zero
pub fn is_diagonal(m: &Mat) -> bool {
    m.is_square()
        && m
            .iter()
            .enumerate()
            .all(|(idx, &v)| idx % m.nrows() == idx / m.nrows() || v == 0.0)
}

/// Root-mean-square norm, the error norm of the stiff integrator
#[inline]
pub fn rms_norm(v: &Vec) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.norm() / (v.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_beam_stiffness_symmetry() {
        let k = beam_local_stiffness(200e9, 0.01, 1e-4, 3.0);

        for i in 0..6 {
            for j in 0..6 {
                assert_relative_eq!(k[(i, j)], k[(j, i)], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_beam_stiffness_rigid_translation() {
        // A rigid transverse translation produces no force
        let k = beam_local_stiffness(200e9, 0.01, 1e-4, 3.0);
        let rigid = nalgebra::Vector6::new(0.0, 1.0, 0.0, 0.0, 1.0, 0.0);
        let f = k * rigid;
        assert!(f.amax() < 1e-3, "rigid body force: {}", f);

        let axial = nalgebra::Vector6::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        assert!((k * axial).amax() < 1e-3);
    }

    #[test]
    fn test_banded_matrix_truncates_at_edges() {
        let m = banded_matrix(4, &FOURTH_DERIVATIVE_STENCIL, 2.0);

        assert_eq!(m[(0, 0)], 12.0);
        assert_eq!(m[(0, 1)], -8.0);
        assert_eq!(m[(0, 2)], 2.0);
        assert_eq!(m[(0, 3)], 0.0);
        assert_eq!(m[(1, 0)], -8.0);
        assert_eq!(m[(3, 1)], 2.0);
        assert!(is_symmetric(&m, 0.0));
    }

    #[test]
    fn test_select_stride() {
        let m = Mat::from_fn(6, 6, |r, c| (10 * r + c) as f64);

        let s0 = select_stride(&m, 0, 3);
        assert_eq!(s0.shape(), (2, 2));
        assert_eq!(s0[(0, 1)], 3.0);
        assert_eq!(s0[(1, 1)], 33.0);

        let s1 = select_stride(&m, 1, 3);
        assert_eq!(s1[(0, 0)], 11.0);
        assert_eq!(s1[(1, 0)], 41.0);
    }

    #[test]
    fn test_rms_norm() {
        let v = Vec::from_vec(vec![3.0, 4.0]);
        assert_relative_eq!(rms_norm(&v), 5.0 / 2.0_f64.sqrt());
        assert_eq!(rms_norm(&Vec::zeros(0)), 0.0);
    }
}
