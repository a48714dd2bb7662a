//! Beam finite-element operators
//!
//! The tower is a vertical stack of `n - 1` identical Euler-Bernoulli beam
//! elements. Each node carries three DOFs (axial, transverse, rotation), so
//! the assembled operators are 3n x 3n. Blending with the PDE model needs one
//! DOF per node, so [`FemOperatorBuilder::build_reduced`] keeps every third
//! row and column.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::math::{self, Mat, Mat6, SparseMatrixBuilder};
use crate::operators::OperatorTriple;
use crate::params::ParameterSet;

/// DOFs per node in the element formulation
pub const DOFS_PER_NODE: usize = 3;

/// Which DOF of each node block survives the reduction to n x n
///
/// The default keeps the axial DOF, i.e. the plain every-third-row slice of
/// the 3n x 3n operators. Choose `Transverse` for the lateral bending DOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetainedDof {
    /// Local index 0, the plain stride-3 slice starting at the first row
    #[default]
    Axial,
    /// Local index 1
    Transverse,
}

impl RetainedDof {
    /// Offset of the retained DOF within a node block
    pub fn offset(self) -> usize {
        match self {
            Self::Axial => 0,
            Self::Transverse => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FemOperatorBuilder<'a> {
    params: &'a ParameterSet,
    retained: RetainedDof,
}

impl<'a> FemOperatorBuilder<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self {
            params,
            retained: RetainedDof::default(),
        }
    }

    pub fn with_retained_dof(mut self, retained: RetainedDof) -> Self {
        self.retained = retained;
        self
    }

    /// Number of elements in the stack
    pub fn n_elements(&self) -> usize {
        self.params.n_floors() - 1
    }

    /// Size of the unreduced operators
    pub fn n_dofs(&self) -> usize {
        self.params.n_floors() * DOFS_PER_NODE
    }

    /// Uniform element length
    pub fn element_length(&self) -> f64 {
        self.params.spacing()
    }

    /// Local stiffness of one element (all elements are identical)
    pub fn element_stiffness(&self) -> Mat6 {
        math::beam_local_stiffness(
            self.params.e(),
            self.params.a(),
            self.params.i(),
            self.element_length(),
        )
    }

    /// Global DOF indices of element `elem` (its two end nodes)
    pub fn element_dofs(&self, elem: usize) -> [usize; 6] {
        let i_dof = elem * DOFS_PER_NODE;
        let j_dof = i_dof + DOFS_PER_NODE;
        [i_dof, i_dof + 1, i_dof + 2, j_dof, j_dof + 1, j_dof + 2]
    }

    /// Contribution of a single element, scattered into a 3n x 3n matrix
    pub fn element_contribution(&self, elem: usize) -> Mat {
        let mut builder = SparseMatrixBuilder::new(self.n_dofs());
        builder.add_element_matrix(&self.element_dofs(elem), &self.element_stiffness());
        builder.to_dense()
    }

    /// Assemble the global 3n x 3n stiffness matrix
    pub fn global_stiffness(&self) -> Mat {
        let n_dofs = self.n_dofs();
        let mut k_global = Mat::zeros(n_dofs, n_dofs);
        let k_local = self.element_stiffness();

        for elem in 0..self.n_elements() {
            let dofs = self.element_dofs(elem);

            for (a, &da) in dofs.iter().enumerate() {
                for (b, &db) in dofs.iter().enumerate() {
                    k_global[(da, db)] += k_local[(a, b)];
                }
            }
        }

        k_global
    }

    /// Lumped global mass matrix
    ///
    /// Every node gets `rho*A*Le/2` on its axial and transverse DOFs;
    /// rotational inertia is left at zero.
    pub fn global_mass(&self) -> Mat {
        let n_dofs = self.n_dofs();
        let lumped = self.params.linear_density() * self.element_length() / 2.0;

        let mut m_global = Mat::zeros(n_dofs, n_dofs);
        for node in 0..self.params.n_floors() {
            let base = node * DOFS_PER_NODE;
            m_global[(base, base)] = lumped;
            m_global[(base + 1, base + 1)] = lumped;
        }

        m_global
    }

    /// Full 3n x 3n operators
    pub fn build(&self) -> SimResult<OperatorTriple> {
        let k = self.global_stiffness();
        let m = self.global_mass();

        debug!(
            "FEM operators: {} elements of {:.4} m, {} DOFs",
            self.n_elements(),
            self.element_length(),
            self.n_dofs()
        );

        OperatorTriple::with_rayleigh_damping(k, m, self.params.alpha(), self.params.beta())
    }

    /// Operators reduced to one DOF per node (n x n)
    pub fn build_reduced(&self) -> SimResult<OperatorTriple> {
        let full = self.build()?;
        Ok(reduce(&full, self.retained))
    }
}

/// Keep one DOF of every node block of a 3n x 3n triple
pub fn reduce(full: &OperatorTriple, retained: RetainedDof) -> OperatorTriple {
    full.map(|op| math::select_stride(op, retained.offset(), DOFS_PER_NODE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(n: usize) -> ParameterSet {
        ParameterSet::builder().with_floors(n).build().unwrap()
    }

    #[test]
    fn test_global_stiffness_symmetric() {
        for n in [2, 3, 10, 100] {
            let p = params(n);
            let k = FemOperatorBuilder::new(&p).global_stiffness();
            assert_eq!(k.shape(), (3 * n, 3 * n));
            assert!(math::is_symmetric(&k, 1e-14));
        }
    }

    #[test]
    fn test_assembly_equals_sum_of_element_contributions() {
        let p = params(7);
        let builder = FemOperatorBuilder::new(&p);

        let direct = builder.global_stiffness();

        // Sum in reverse element order to exercise commutativity too
        let mut summed = Mat::zeros(builder.n_dofs(), builder.n_dofs());
        for elem in (0..builder.n_elements()).rev() {
            summed += builder.element_contribution(elem);
        }

        for (a, b) in direct.iter().zip(summed.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-14);
        }
    }

    #[test]
    fn test_overlapping_nodes_accumulate() {
        let p = params(3);
        let builder = FemOperatorBuilder::new(&p);
        let k = builder.global_stiffness();
        let ea_l = p.e() * p.a() / p.spacing();

        // Middle node is shared by both elements
        assert_relative_eq!(k[(0, 0)], ea_l);
        assert_relative_eq!(k[(3, 3)], 2.0 * ea_l);
        assert_relative_eq!(k[(6, 6)], ea_l);
        assert_relative_eq!(k[(0, 3)], -ea_l);
        assert_eq!(k[(0, 6)], 0.0);
    }

    #[test]
    fn test_lumped_mass() {
        let p = params(4);
        let builder = FemOperatorBuilder::new(&p);
        let m = builder.global_mass();
        let lumped = p.rho() * p.a() * p.spacing() / 2.0;

        assert!(math::is_diagonal(&m));
        for node in 0..4 {
            assert_eq!(m[(3 * node, 3 * node)], lumped);
            assert_eq!(m[(3 * node + 1, 3 * node + 1)], lumped);
            assert_eq!(m[(3 * node + 2, 3 * node + 2)], 0.0);
        }
    }

    #[test]
    fn test_reduction_keeps_every_third_dof() {
        let p = params(5);
        let builder = FemOperatorBuilder::new(&p);
        let full = builder.build().unwrap();
        let reduced = builder.build_reduced().unwrap();

        assert_eq!(reduced.dim(), 5);
        for r in 0..5 {
            for c in 0..5 {
                assert_eq!(reduced.k()[(r, c)], full.k()[(3 * r, 3 * c)]);
                assert_eq!(reduced.m()[(r, c)], full.m()[(3 * r, 3 * c)]);
                assert_eq!(reduced.c()[(r, c)], full.c()[(3 * r, 3 * c)]);
            }
        }

        let transverse = builder
            .with_retained_dof(RetainedDof::Transverse)
            .build_reduced()
            .unwrap();
        let k_bend = 12.0 * p.e() * p.i() / p.spacing().powi(3);
        assert_relative_eq!(transverse.k()[(0, 0)], k_bend);
        assert_relative_eq!(transverse.k()[(2, 2)], 2.0 * k_bend);
        assert_relative_eq!(transverse.k()[(1, 2)], -k_bend);
    }

    #[test]
    fn test_default_reduction_is_plain_stride() {
        assert_eq!(RetainedDof::default(), RetainedDof::Axial);
        assert_eq!(RetainedDof::default().offset(), 0);

        let p = params(3);
        let reduced = FemOperatorBuilder::new(&p).build_reduced().unwrap();
        let ea_l = p.e() * p.a() / p.spacing();
        assert_relative_eq!(reduced.k()[(0, 0)], ea_l);
        assert_relative_eq!(reduced.k()[(1, 1)], 2.0 * ea_l);
    }
}
