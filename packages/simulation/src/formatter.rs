//! Raw model output -> [`PredictionResult`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use urban_sim_model::{FeatureVector, PredictionEngine};
use urban_sim_simulation_models::{
    InterventionDescriptor, Metric, MetricDelta, PredictionResult, Provenance,
};
use urban_sim_ward::Ward;

use crate::SimulationError;

/// Default clamp bound: a change of at most ±100% of baseline.
pub const DEFAULT_CLAMP_BOUND: f64 = 1.0;

/// Labels, clamps and stamps raw model outputs.
#[derive(Debug, Clone)]
pub struct DeltaFormatter {
    bound: f64,
    metrics: Vec<Metric>,
    model_version: String,
    model_digest: String,
    feature_schema_version: u32,
    metric_table_version: u32,
}

impl DeltaFormatter {
    /// Creates a formatter for `engine`'s outputs.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] unless `bound` is finite and
    /// positive, and [`SimulationError::SchemaVersionMismatch`] if the
    /// engine's outputs are not exactly its declared metric table.
    pub fn new(bound: f64, engine: &PredictionEngine) -> Result<Self, SimulationError> {
        if !bound.is_finite() || bound <= 0.0 {
            return Err(SimulationError::Config(format!(
                "clamp bound must be a positive number, got {bound}"
            )));
        }

        let version = engine.metric_table_version();
        let table = Metric::table(version).ok_or_else(|| {
            SimulationError::SchemaVersionMismatch(format!("unknown metric table v{version}"))
        })?;
        if engine.outputs() != table {
            return Err(SimulationError::SchemaVersionMismatch(format!(
                "model outputs do not follow metric table v{version}"
            )));
        }

        Ok(Self {
            bound,
            metrics: table.to_vec(),
            model_version: engine.model_version().to_string(),
            model_digest: engine.digest().to_string(),
            feature_schema_version: engine.feature_schema_version(),
            metric_table_version: version,
        })
    }

    #[must_use]
    pub const fn bound(&self) -> f64 {
        self.bound
    }

    /// Builds the result for one prediction. `features` is the vector the
    /// model was fed; its imputed attributes are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NonFiniteOutput`] if any output is `NaN`
    /// and [`SimulationError::SchemaVersionMismatch`] if `raw` does not
    /// have one value per metric.
    pub fn format(
        &self,
        raw: &[f64],
        features: &FeatureVector,
        ward: &Ward,
        descriptor: &InterventionDescriptor,
        generated_at: DateTime<Utc>,
    ) -> Result<PredictionResult, SimulationError> {
        if raw.len() != self.metrics.len() {
            return Err(SimulationError::SchemaVersionMismatch(format!(
                "model returned {} values for {} metrics",
                raw.len(),
                self.metrics.len()
            )));
        }

        let mut metrics = BTreeMap::new();
        for (metric, value) in self.metrics.iter().zip(raw) {
            metrics.insert(*metric, self.clamp(*metric, *value)?);
        }

        let missing_attributes = features.missing().to_vec();

        Ok(PredictionResult {
            ward_code: ward.code().to_string(),
            intervention_type: descriptor.intervention_type,
            intervention_params: descriptor.params.clone(),
            metrics,
            complete: missing_attributes.is_empty(),
            missing_attributes,
            provenance: Provenance {
                model_version: self.model_version.clone(),
                model_digest: self.model_digest.clone(),
                feature_schema_version: self.feature_schema_version,
                metric_table_version: self.metric_table_version,
                generated_at,
            },
        })
    }

    fn clamp(&self, metric: Metric, value: f64) -> Result<MetricDelta, SimulationError> {
        if value.is_nan() {
            return Err(SimulationError::NonFiniteOutput { metric });
        }
        if value.abs() > self.bound {
            log::debug!("{metric} = {value} clamped to ±{}", self.bound);
            return Ok(MetricDelta {
                delta: self.bound.copysign(value),
                out_of_range: true,
            });
        }
        Ok(MetricDelta {
            delta: value,
            out_of_range: false,
        })
    }
}
