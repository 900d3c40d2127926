//! Loaded model and inference.

use std::path::Path;

use sha2::{Digest, Sha256};
use urban_sim_simulation_models::Metric;

use crate::ModelError;
use crate::artifact::ModelArtifact;
use crate::features::FeatureVector;

/// A validated model artifact, loaded once per process.
///
/// Immutable after construction and safe to share across threads.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    artifact: ModelArtifact,
    digest: String,
}

impl PredictionEngine {
    /// Loads the artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ModelUnavailable`] if the file cannot be read,
    /// parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        log::info!("Loading model artifact from {}", path.display());
        let bytes = std::fs::read(path)
            .map_err(|e| ModelError::ModelUnavailable(format!("{}: {e}", path.display())))?;
        let engine = Self::from_bytes(&bytes)?;
        log::info!(
            "Loaded model {} ({} layers, digest {})",
            engine.model_version(),
            engine.artifact.layers.len(),
            engine.digest
        );
        Ok(engine)
    }

    /// Parses an artifact from its JSON bytes.
    ///
    /// # Errors
    ///
    /// See [`PredictionEngine::load`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::ModelUnavailable(e.to_string()))?;
        artifact.validate().map_err(ModelError::ModelUnavailable)?;

        Ok(Self {
            artifact,
            digest: hex::encode(Sha256::digest(bytes)),
        })
    }

    #[must_use]
    pub fn model_version(&self) -> &str {
        &self.artifact.model_version
    }

    /// Hex SHA-256 of the artifact bytes.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    #[must_use]
    pub const fn feature_schema_version(&self) -> u32 {
        self.artifact.feature_schema_version
    }

    #[must_use]
    pub const fn metric_table_version(&self) -> u32 {
        self.artifact.metric_table_version
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    #[must_use]
    pub fn outputs(&self) -> &[Metric] {
        &self.artifact.outputs
    }

    /// Runs the model on `features`, returning one raw relative change per
    /// output.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SchemaVersionMismatch`] if the vector was built
    /// for a different feature schema or has the wrong length.
    pub fn predict(&self, features: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        if features.schema_version() != self.artifact.feature_schema_version {
            return Err(ModelError::SchemaVersionMismatch(format!(
                "feature vector is schema v{}, model expects v{}",
                features.schema_version(),
                self.artifact.feature_schema_version
            )));
        }
        if features.len() != self.artifact.input_len() {
            return Err(ModelError::SchemaVersionMismatch(format!(
                "feature vector has {} values, model expects {}",
                features.len(),
                self.artifact.input_len()
            )));
        }

        Ok(self.artifact.forward(features.values()))
    }
}
