//! Top-level oracle error

use crate::surface::SurfaceError;
use thiserror::Error;
use types::errors::{ConfigError, InvariantViolation};

/// Everything that can end a run early.
///
/// `Invariant` is the defect signal the oracle exists to produce; the other
/// variants mean the run could not be carried out at all (bad configuration,
/// or the control surface failing during setup where there is nothing to
/// fall back to).
#[derive(Error, Debug)]
pub enum OracleError {
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("surface failure: {0}")]
    Surface(#[from] SurfaceError),

    #[error("scenario {scenario} cannot run: {detail}")]
    Scenario { scenario: String, detail: String },
}

impl OracleError {
    /// True when the failure is a model/exchange divergence rather than an
    /// environmental problem.
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}
