#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature construction and model inference.
//!
//! The [`features::FeatureBuilder`] turns a ward and an intervention into a
//! fixed-layout [`features::FeatureVector`] using normalization and
//! encoding parameters persisted next to the model. The
//! [`engine::PredictionEngine`] loads a dense feed-forward model artifact
//! once and maps feature vectors to raw relative changes.

pub mod artifact;
pub mod engine;
pub mod features;
pub mod params;

pub use engine::PredictionEngine;
pub use features::{FEATURE_SCHEMA_VERSION, FeatureBuilder, FeatureVector};
pub use params::FeatureParams;

use thiserror::Error;

/// Errors from feature construction and inference.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Two persisted artifacts disagree on a schema version or layout.
    #[error("Schema version mismatch: {0}")]
    SchemaVersionMismatch(String),

    /// The intervention type has no entry in the encoding table.
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

    /// The model artifact could not be read, parsed or validated.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The feature parameter file could not be read or parsed.
    #[error("Feature parameters unavailable: {0}")]
    ParamsUnavailable(String),

    /// The feature parameter file parsed but holds unusable values.
    #[error("Invalid feature parameters: {0}")]
    InvalidParams(String),
}
