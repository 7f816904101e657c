//! Error taxonomy for loading sweeps, dispatch optimization and study runs.

use std::io;

use thiserror::Error;

/// Errors surfaced by the study core.
///
/// Divergence and infeasibility are fatal to the call that raised them; there
/// is no partial result and no retry.
#[derive(Debug, Error)]
pub enum StudyError {
    /// An hourly power-flow evaluation did not converge or failed unexpectedly.
    #[error("power flow diverged at hour {hour}: {reason}")]
    PowerFlowDivergence {
        /// Hour index (0–23) whose evaluation failed.
        hour: usize,
        /// Failure reported by the power-flow service.
        reason: String,
    },

    /// The LP solver found no feasible or optimal battery dispatch.
    #[error("battery dispatch is infeasible: {reason}")]
    DispatchInfeasible {
        /// Solver status text.
        reason: String,
    },

    /// A profile does not hold exactly 24 hourly values.
    #[error("profile `{name}` must hold 24 hourly values, got {len}")]
    InvalidProfile {
        /// Profile name (config path or argument name).
        name: String,
        /// Actual number of values.
        len: usize,
    },

    /// A numeric parameter is outside its admissible range.
    #[error("invalid parameter `{field}`: {message}")]
    InvalidParameter {
        /// Parameter name.
        field: String,
        /// Constraint that was violated.
        message: String,
    },

    /// An hour returned a different set of lines than the previous hours.
    #[error("line set returned for hour {hour} differs from earlier hours")]
    TopologyMismatch {
        /// Hour index whose table did not match.
        hour: usize,
    },

    /// A scenario name was requested that the configuration does not define.
    #[error("unknown scenario `{0}`")]
    UnknownScenario(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StudyError {
    pub(crate) fn parameter(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
