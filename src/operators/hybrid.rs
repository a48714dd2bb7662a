//! Convex blend of the PDE and FEM operators

use log::debug;

use crate::error::{SimError, SimResult};
use crate::math::Mat;
use crate::operators::OperatorTriple;

/// Operators of the blended model: `h*FEM + (1 - h)*PDE`
#[derive(Debug, Clone, PartialEq)]
pub struct HybridOperatorTriple {
    ops: OperatorTriple,
    factor: f64,
}

impl HybridOperatorTriple {
    pub fn operators(&self) -> &OperatorTriple {
        &self.ops
    }

    /// FEM weight used for the blend
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn k(&self) -> &Mat {
        self.ops.k()
    }

    pub fn m(&self) -> &Mat {
        self.ops.m()
    }

    pub fn c(&self) -> &Mat {
        self.ops.c()
    }

    pub fn dim(&self) -> usize {
        self.ops.dim()
    }
}

/// Blends a PDE triple with a reduced FEM triple of the same size
#[derive(Debug, Clone, Copy)]
pub struct HybridAssembler {
    factor: f64,
}

impl HybridAssembler {
    /// `factor` is the FEM weight; it must lie in [0, 1]
    pub fn new(factor: f64) -> SimResult<Self> {
        if !(0.0..=1.0).contains(&factor) {
            return Err(SimError::invalid(
                "hybrid_factor",
                format!("must lie in [0, 1], got {}", factor),
            ));
        }
        Ok(Self { factor })
    }

    /// Element-wise `factor*fem + (1 - factor)*pde` for each of K, M and C
    pub fn assemble(&self, pde: &OperatorTriple, fem: &OperatorTriple) -> SimResult<HybridOperatorTriple> {
        if pde.dim() != fem.dim() {
            return Err(SimError::DimensionMismatch {
                expected: pde.dim(),
                found: fem.dim(),
            });
        }

        let h = self.factor;
        let blend = |f: &Mat, p: &Mat| -> Mat { f * h + p * (1.0 - h) };

        let ops = OperatorTriple::new(
            blend(fem.k(), pde.k()),
            blend(fem.m(), pde.m()),
            blend(fem.c(), pde.c()),
        )?;

        debug!("Hybrid operators: n = {}, FEM weight = {}", ops.dim(), h);

        Ok(HybridOperatorTriple { ops, factor: h })
    }
}
