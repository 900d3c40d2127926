#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward impact simulator.
//!
//! Ties the ward registry, feature builder and prediction engine together
//! behind [`Simulator`]: a caller hands in `(ward code, intervention type,
//! parameters)` and gets back a [`PredictionResult`] with clamped,
//! provenance-stamped metric deltas.
//!
//! [`PredictionResult`]: urban_sim_simulation_models::PredictionResult

pub mod clock;
pub mod config;
pub mod formatter;
pub mod simulator;
pub mod suggest;

#[cfg(test)]
pub(crate) mod fixtures;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SimulationConfig;
pub use simulator::Simulator;

use thiserror::Error;
use urban_sim_model::ModelError;
use urban_sim_simulation_models::{InterventionType, Metric};
use urban_sim_ward::WardError;

/// Errors surfaced to callers of the simulator.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The requested ward code is not in the live snapshot.
    #[error("Ward not found: {code}")]
    NotFound {
        /// The requested code.
        code: String,
    },

    /// The intervention type is unknown or was not part of training.
    #[error("Unsupported intervention type: {intervention}")]
    UnsupportedIntervention {
        /// The requested type name.
        intervention: String,
    },

    /// An intervention parameter is unknown, missing or out of domain.
    #[error("Invalid intervention parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Persisted artifacts disagree with each other or with this build.
    #[error("Schema version mismatch: {0}")]
    SchemaVersionMismatch(String),

    /// The model artifact could not be loaded.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model produced `NaN` for a metric.
    #[error("Model produced a non-finite value for {metric}")]
    NonFiniteOutput {
        /// The affected metric.
        metric: Metric,
    },

    /// No ward carries the attribute a placement suggestion ranks by.
    #[error("No ward is eligible for a {intervention} suggestion")]
    NoCandidate {
        /// The intervention a placement was requested for.
        intervention: InterventionType,
    },

    /// Configuration is missing or unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ward data could not be built or loaded.
    #[error(transparent)]
    Ward(WardError),

    /// Feature parameters could not be loaded.
    #[error(transparent)]
    Model(ModelError),
}

/// Parses a caller-supplied intervention type name.
///
/// # Errors
///
/// Returns [`SimulationError::UnsupportedIntervention`] for a name that is
/// not a known intervention type.
pub fn parse_intervention(name: &str) -> Result<InterventionType, SimulationError> {
    name.trim()
        .parse()
        .map_err(|_| SimulationError::UnsupportedIntervention {
            intervention: name.to_string(),
        })
}

impl SimulationError {
    /// Whether the error leaves the simulator unusable, as opposed to
    /// rejecting a single request.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::NotFound { .. }
                | Self::UnsupportedIntervention { .. }
                | Self::InvalidParameter { .. }
                | Self::NonFiniteOutput { .. }
                | Self::NoCandidate { .. }
        )
    }
}

impl From<WardError> for SimulationError {
    fn from(value: WardError) -> Self {
        match value {
            WardError::NotFound { code } => Self::NotFound { code },
            other => Self::Ward(other),
        }
    }
}

impl From<ModelError> for SimulationError {
    fn from(value: ModelError) -> Self {
        match value {
            ModelError::SchemaVersionMismatch(message) => Self::SchemaVersionMismatch(message),
            ModelError::UnsupportedIntervention { intervention } => {
                Self::UnsupportedIntervention { intervention }
            }
            ModelError::InvalidParameter { name, reason } => {
                Self::InvalidParameter { name, reason }
            }
            ModelError::ModelUnavailable(message) => Self::ModelUnavailable(message),
            other @ (ModelError::ParamsUnavailable(_) | ModelError::InvalidParams(_)) => {
                Self::Model(other)
            }
        }
    }
}
