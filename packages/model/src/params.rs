//! Persisted feature parameters.
//!
//! Normalization statistics and the intervention encoding table are fixed
//! at training time and shipped as a TOML file alongside the model. They
//! are never recomputed from the wards currently loaded.
//!
//! ```toml
//! model_version = "2024.1"
//! attribute_schema_version = 1
//! feature_schema_version = 1
//!
//! [[normalization]]
//! attribute = "population_total"
//! mean = 42000.0
//! scale = 15000.0
//!
//! [[interventions]]
//! type = "road"
//! index = 0
//! magnitude_param = "length"
//! reference = 5.0
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use urban_sim_simulation_models::InterventionType;
use urban_sim_ward_models::{ATTRIBUTE_SCHEMA_VERSION, WardAttribute};

use crate::ModelError;
use crate::features::FEATURE_SCHEMA_VERSION;

/// Normalization and encoding parameters for one model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureParams {
    /// Model version these parameters were produced with.
    pub model_version: String,
    /// Ward attribute schema the statistics were computed over.
    pub attribute_schema_version: u32,
    /// Feature layout version.
    pub feature_schema_version: u32,
    /// One entry per ward attribute, in schema order.
    pub normalization: Vec<NormalizationEntry>,
    /// Intervention encoding table.
    pub interventions: Vec<EncodingEntry>,
}

/// Standardization statistics for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizationEntry {
    pub attribute: WardAttribute,
    /// Training mean.
    pub mean: f64,
    /// Training standard deviation (or other non-zero scale).
    pub scale: f64,
}

impl NormalizationEntry {
    /// Standardizes `value`.
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// How one intervention type is encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodingEntry {
    #[serde(rename = "type")]
    pub intervention_type: InterventionType,
    /// One-hot position among the intervention slots.
    pub index: usize,
    /// Name of the single magnitude parameter this type accepts.
    pub magnitude_param: String,
    /// Magnitude that maps to a feature value of `1.0`.
    pub reference: f64,
    /// Magnitude assumed when the caller omits the parameter. Without a
    /// default the parameter is required.
    #[serde(default)]
    pub default: Option<f64>,
}

impl FeatureParams {
    /// Reads and validates a parameter file.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ParamsUnavailable`] if the file cannot be read
    /// or parsed, and the errors of [`FeatureParams::validate`] otherwise.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        log::info!("Loading feature parameters from {}", path.display());
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ModelError::ParamsUnavailable(format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parses and validates parameters from TOML.
    ///
    /// # Errors
    ///
    /// See [`FeatureParams::load`].
    pub fn from_toml(contents: &str) -> Result<Self, ModelError> {
        let params: Self =
            toml::from_str(contents).map_err(|e| ModelError::ParamsUnavailable(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Checks that the parameters describe the compiled feature layout and
    /// hold usable numbers.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SchemaVersionMismatch`] if either schema
    /// version or the attribute order differs from this build, and
    /// [`ModelError::InvalidParams`] for non-finite statistics, a zero
    /// scale, a non-positive reference, repeated intervention types or
    /// non-contiguous indices.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.attribute_schema_version != ATTRIBUTE_SCHEMA_VERSION {
            return Err(ModelError::SchemaVersionMismatch(format!(
                "feature parameters use attribute schema v{}, this build uses v{ATTRIBUTE_SCHEMA_VERSION}",
                self.attribute_schema_version
            )));
        }
        if self.feature_schema_version != FEATURE_SCHEMA_VERSION {
            return Err(ModelError::SchemaVersionMismatch(format!(
                "feature parameters use feature schema v{}, this build uses v{FEATURE_SCHEMA_VERSION}",
                self.feature_schema_version
            )));
        }

        let attributes: Vec<WardAttribute> =
            self.normalization.iter().map(|n| n.attribute).collect();
        if attributes != WardAttribute::all() {
            return Err(ModelError::SchemaVersionMismatch(
                "normalization entries do not match the attribute schema order".to_string(),
            ));
        }

        for entry in &self.normalization {
            if !entry.mean.is_finite() || !entry.scale.is_finite() || entry.scale == 0.0 {
                return Err(ModelError::InvalidParams(format!(
                    "{}: mean {} / scale {} unusable",
                    entry.attribute, entry.mean, entry.scale
                )));
            }
        }

        let mut types = BTreeSet::new();
        let mut indices = BTreeSet::new();
        for entry in &self.interventions {
            if !types.insert(entry.intervention_type) {
                return Err(ModelError::InvalidParams(format!(
                    "intervention {} encoded twice",
                    entry.intervention_type
                )));
            }
            indices.insert(entry.index);
            if !entry.reference.is_finite() || entry.reference <= 0.0 {
                return Err(ModelError::InvalidParams(format!(
                    "intervention {}: reference magnitude must be positive",
                    entry.intervention_type
                )));
            }
            if entry.default.is_some_and(|d| !d.is_finite() || d < 0.0) {
                return Err(ModelError::InvalidParams(format!(
                    "intervention {}: default magnitude must be non-negative",
                    entry.intervention_type
                )));
            }
        }
        if !indices.iter().copied().eq(0..self.interventions.len()) {
            return Err(ModelError::InvalidParams(
                "intervention indices must be 0..n without gaps or repeats".to_string(),
            ));
        }

        Ok(())
    }

    /// Encoding entry for `intervention_type`, if the model was trained on it.
    #[must_use]
    pub fn encoding(&self, intervention_type: InterventionType) -> Option<&EncodingEntry> {
        self.interventions
            .iter()
            .find(|e| e.intervention_type == intervention_type)
    }
}
