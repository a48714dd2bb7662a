//! Error types for the tower simulator

use thiserror::Error;

use crate::integrator::Trajectory;

/// Why the stiff integrator gave up
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailureReason {
    /// Step size fell below the floating-point resolution of the current time
    StepSizeTooSmall,
    /// Accepted step count reached the configured budget
    StepBudgetExceeded(usize),
    /// Wall-clock budget exhausted
    WallTimeExceeded,
    /// The state or its derivative stopped being finite
    NonFiniteState,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StepSizeTooSmall => write!(f, "required step size is less than spacing between numbers"),
            Self::StepBudgetExceeded(n) => write!(f, "step budget of {} steps exhausted", n),
            Self::WallTimeExceeded => write!(f, "wall-clock budget exhausted"),
            Self::NonFiniteState => write!(f, "state became non-finite"),
        }
    }
}

/// Main error type for simulation operations
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Singular system: {0}")]
    SingularSystem(String),

    #[error("Integration failed at t = {time}: {reason} ({} of {requested} samples computed)", .partial.len())]
    IntegrationFailure {
        time: f64,
        reason: FailureReason,
        requested: usize,
        partial: Box<Trajectory>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    /// Partial trajectory carried by an integration failure
    pub fn partial(&self) -> Option<&Trajectory> {
        match self {
            Self::IntegrationFailure { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;
