//! Physical and geometric parameters of the tower

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Storey height used when the total height is not given explicitly (m)
pub const DEFAULT_STOREY_HEIGHT: f64 = 3.5;

/// Immutable parameter set shared by every operator builder.
///
/// Built through [`ParameterSetBuilder`]; deserialization goes through the
/// builder as well so a `ParameterSet` always satisfies its constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterSetBuilder", into = "ParameterSetBuilder")]
pub struct ParameterSet {
    n_floors: usize,
    height: f64,
    e: f64,
    rho: f64,
    a: f64,
    i: f64,
    alpha: f64,
    beta: f64,
    hybrid_factor: f64,
}

impl ParameterSet {
    /// Start from the default 100-storey steel tower
    pub fn builder() -> ParameterSetBuilder {
        ParameterSetBuilder::default()
    }

    /// Number of floors, which is also the number of structural nodes
    pub fn n_floors(&self) -> usize {
        self.n_floors
    }

    /// Total height in m
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Modulus of elasticity in Pa
    pub fn e(&self) -> f64 {
        self.e
    }

    /// Density in kg/m³
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Cross-sectional area in m²
    pub fn a(&self) -> f64 {
        self.a
    }

    /// Second moment of area in m⁴
    pub fn i(&self) -> f64 {
        self.i
    }

    /// Mass-proportional Rayleigh coefficient
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Stiffness-proportional Rayleigh coefficient
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Weight of the FEM operators in the hybrid blend
    pub fn hybrid_factor(&self) -> f64 {
        self.hybrid_factor
    }

    /// Node spacing, identical for the finite-difference grid and the elements
    pub fn spacing(&self) -> f64 {
        self.height / (self.n_floors - 1) as f64
    }

    /// Mass per unit length (rho * A)
    pub fn linear_density(&self) -> f64 {
        self.rho * self.a
    }

    /// Bending stiffness (E * I)
    pub fn flexural_rigidity(&self) -> f64 {
        self.e * self.i
    }

    /// Elevation of every node, from the base (0) to the roof (L)
    pub fn elevations(&self) -> Vec<f64> {
        let dx = self.spacing();
        (0..self.n_floors).map(|k| k as f64 * dx).collect()
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            n_floors: 100,
            height: DEFAULT_STOREY_HEIGHT * 100.0,
            e: 1.75e11,
            rho: 6500.0,
            a: 0.025,
            i: 5.5e-4,
            alpha: 0.03,
            beta: 0.003,
            hybrid_factor: 0.5,
        }
    }
}

/// Builder for [`ParameterSet`]
///
/// Leaving `height` unset derives it from the floor count
/// (`3.5 m * n_floors`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSetBuilder {
    pub n_floors: usize,
    pub height: Option<f64>,
    pub e: f64,
    pub rho: f64,
    pub a: f64,
    pub i: f64,
    pub alpha: f64,
    pub beta: f64,
    pub hybrid_factor: f64,
}

impl Default for ParameterSetBuilder {
    fn default() -> Self {
        let p = ParameterSet::default();
        Self {
            n_floors: p.n_floors,
            height: None,
            e: p.e,
            rho: p.rho,
            a: p.a,
            i: p.i,
            alpha: p.alpha,
            beta: p.beta,
            hybrid_factor: p.hybrid_factor,
        }
    }
}

impl ParameterSetBuilder {
    /// Set the number of floors
    pub fn with_floors(mut self, n_floors: usize) -> Self {
        self.n_floors = n_floors;
        self
    }

    /// Set the total height explicitly
    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    /// Set material properties (modulus, density)
    pub fn with_material(mut self, e: f64, rho: f64) -> Self {
        self.e = e;
        self.rho = rho;
        self
    }

    /// Set section properties (area, second moment of area)
    pub fn with_section(mut self, a: f64, i: f64) -> Self {
        self.a = a;
        self.i = i;
        self
    }

    /// Set Rayleigh damping coefficients (C = alpha*M + beta*K)
    pub fn with_damping(mut self, alpha: f64, beta: f64) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    /// Set the FEM weight of the hybrid blend
    pub fn with_hybrid_factor(mut self, factor: f64) -> Self {
        self.hybrid_factor = factor;
        self
    }

    /// Validate and freeze the parameters
    pub fn build(self) -> SimResult<ParameterSet> {
        if self.n_floors < 2 {
            return Err(SimError::invalid(
                "n_floors",
                format!("at least 2 floors required, got {}", self.n_floors),
            ));
        }

        let height = self
            .height
            .unwrap_or(DEFAULT_STOREY_HEIGHT * self.n_floors as f64);

        positive("height", height)?;
        positive("e", self.e)?;
        positive("rho", self.rho)?;
        positive("a", self.a)?;
        positive("i", self.i)?;
        non_negative("alpha", self.alpha)?;
        non_negative("beta", self.beta)?;

        if !(0.0..=1.0).contains(&self.hybrid_factor) {
            return Err(SimError::invalid(
                "hybrid_factor",
                format!("must lie in [0, 1], got {}", self.hybrid_factor),
            ));
        }

        Ok(ParameterSet {
            n_floors: self.n_floors,
            height,
            e: self.e,
            rho: self.rho,
            a: self.a,
            i: self.i,
            alpha: self.alpha,
            beta: self.beta,
            hybrid_factor: self.hybrid_factor,
        })
    }
}

impl TryFrom<ParameterSetBuilder> for ParameterSet {
    type Error = SimError;

    fn try_from(builder: ParameterSetBuilder) -> SimResult<Self> {
        builder.build()
    }
}

impl From<ParameterSet> for ParameterSetBuilder {
    fn from(p: ParameterSet) -> Self {
        Self {
            n_floors: p.n_floors,
            height: Some(p.height),
            e: p.e,
            rho: p.rho,
            a: p.a,
            i: p.i,
            alpha: p.alpha,
            beta: p.beta,
            hybrid_factor: p.hybrid_factor,
        }
    }
}

fn positive(field: &'static str, value: f64) -> SimResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid(field, format!("must be positive and finite, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: f64) -> SimResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid(field, format!("must be non-negative and finite, got {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_tower() {
        let p = ParameterSet::builder().build().unwrap();
        assert_eq!(p, ParameterSet::default());
        assert_eq!(p.n_floors(), 100);
        assert_relative_eq!(p.height(), 350.0);
        assert_relative_eq!(p.spacing(), 350.0 / 99.0);
    }

    #[test]
    fn test_height_follows_floor_count() {
        let p = ParameterSet::builder().with_floors(10).build().unwrap();
        assert_relative_eq!(p.height(), 35.0);

        let elevations = p.elevations();
        assert_eq!(elevations.len(), 10);
        assert_eq!(elevations[0], 0.0);
        assert_relative_eq!(elevations[9], 35.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            (ParameterSet::builder().with_floors(1), "n_floors"),
            (ParameterSet::builder().with_height(0.0), "height"),
            (ParameterSet::builder().with_material(-1.0, 6500.0), "e"),
            (ParameterSet::builder().with_material(1e11, 0.0), "rho"),
            (ParameterSet::builder().with_section(0.0, 1e-4), "a"),
            (ParameterSet::builder().with_section(0.1, f64::NAN), "i"),
            (ParameterSet::builder().with_damping(-0.1, 0.0), "alpha"),
            (ParameterSet::builder().with_hybrid_factor(1.5), "hybrid_factor"),
            (ParameterSet::builder().with_hybrid_factor(-0.01), "hybrid_factor"),
        ];

        for (builder, expected) in cases {
            match builder.build() {
                Err(SimError::InvalidParameter { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected InvalidParameter({}), got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let p: ParameterSet = serde_json::from_str(r#"{"n_floors": 4}"#).unwrap();
        assert_eq!(p.n_floors(), 4);
        assert_relative_eq!(p.height(), 14.0);

        let bad = serde_json::from_str::<ParameterSet>(r#"{"hybrid_factor": 2.0}"#);
        assert!(bad.is_err());
    }
}
