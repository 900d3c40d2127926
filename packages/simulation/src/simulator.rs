//! The simulator facade.

use std::sync::Arc;

use urban_sim_model::{FEATURE_SCHEMA_VERSION, FeatureBuilder, FeatureParams, PredictionEngine};
use urban_sim_simulation_models::{InterventionDescriptor, PredictionResult, SimulationRequest};
use urban_sim_ward::join::{JoinBuilder, JoinReport};
use urban_sim_ward::{RegistryHandle, WardRegistry};

use crate::SimulationError;
use crate::clock::{Clock, SystemClock};
use crate::config::SimulationConfig;
use crate::formatter::DeltaFormatter;
use crate::parse_intervention;
use crate::suggest::{self, Suggestion};

/// Runs intervention simulations against the live ward snapshot.
///
/// Everything except the registry snapshot is fixed at construction. The
/// simulator is `Send + Sync`; concurrent requests share it by reference.
pub struct Simulator {
    registry: RegistryHandle,
    features: FeatureBuilder,
    engine: PredictionEngine,
    formatter: DeltaFormatter,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("registry", &self.registry)
            .field("model_version", &self.engine.model_version())
            .field("clamp_bound", &self.formatter.bound())
            .finish_non_exhaustive()
    }
}

impl Simulator {
    /// Assembles a simulator after checking that the snapshot, feature
    /// parameters and model agree.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::SchemaVersionMismatch`] if any schema
    /// version, the model version, the feature layout or the metric table
    /// disagree, and [`SimulationError::Config`] for an unusable clamp
    /// bound.
    pub fn new(
        registry: WardRegistry,
        params: FeatureParams,
        engine: PredictionEngine,
        clamp_bound: f64,
        clock: Box<dyn Clock>,
    ) -> Result<Self, SimulationError> {
        let features = FeatureBuilder::new(params)?;
        features.check_schema(registry.attribute_schema_version())?;

        if engine.model_version() != features.params().model_version {
            return Err(SimulationError::SchemaVersionMismatch(format!(
                "model is {}, feature parameters are for {}",
                engine.model_version(),
                features.params().model_version
            )));
        }
        if engine.feature_schema_version() != FEATURE_SCHEMA_VERSION {
            return Err(SimulationError::SchemaVersionMismatch(format!(
                "model expects feature schema v{}, this build produces v{FEATURE_SCHEMA_VERSION}",
                engine.feature_schema_version()
            )));
        }
        if engine.feature_names() != features.feature_names() {
            return Err(SimulationError::SchemaVersionMismatch(
                "model feature names do not match the feature layout".to_string(),
            ));
        }

        let formatter = DeltaFormatter::new(clamp_bound, &engine)?;

        log::info!(
            "Simulator ready: {} wards, model {} ({} features, {} metrics)",
            registry.len(),
            engine.model_version(),
            features.feature_names().len(),
            engine.outputs().len()
        );

        Ok(Self {
            registry: RegistryHandle::new(registry),
            features,
            engine,
            formatter,
            clock,
        })
    }

    /// Loads every artifact named in `config`.
    ///
    /// # Errors
    ///
    /// Any load or consistency failure; all are fatal.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimulationError> {
        Self::from_config_with_clock(config, Box::new(SystemClock))
    }

    /// [`Simulator::from_config`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Simulator::from_config`].
    pub fn from_config_with_clock(
        config: &SimulationConfig,
        clock: Box<dyn Clock>,
    ) -> Result<Self, SimulationError> {
        let registry = WardRegistry::load(&config.snapshot_path)?;
        let params = FeatureParams::load(&config.feature_params_path)?;
        let engine = PredictionEngine::load(&config.model_path)?;
        Self::new(registry, params, engine, config.clamp_bound, clock)
    }

    /// Validates and runs a caller request.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnsupportedIntervention`] for an unknown
    /// type name, plus the errors of [`Simulator::run`].
    pub fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> Result<PredictionResult, SimulationError> {
        let intervention_type = parse_intervention(&request.intervention_type)?;
        self.run(&InterventionDescriptor {
            ward_code: request.ward_code.clone(),
            intervention_type,
            params: request.intervention_params.clone(),
        })
    }

    /// Simulates `descriptor` against the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NotFound`] for an unknown ward,
    /// [`SimulationError::UnsupportedIntervention`] or
    /// [`SimulationError::InvalidParameter`] for an intervention the model
    /// cannot encode, and [`SimulationError::NonFiniteOutput`] if the model
    /// yields `NaN`.
    pub fn run(
        &self,
        descriptor: &InterventionDescriptor,
    ) -> Result<PredictionResult, SimulationError> {
        let registry = self.registry.current();
        self.features.check_schema(registry.attribute_schema_version())?;

        let ward = registry.get(&descriptor.ward_code)?;
        let features = self.features.build(ward, descriptor)?;
        let raw = self.engine.predict(&features)?;
        let result = self
            .formatter
            .format(&raw, &features, ward, descriptor, self.clock.now())?;

        log::debug!(
            "Simulated {} in {}: {} metrics, {} missing attributes",
            descriptor.intervention_type,
            descriptor.ward_code,
            result.metrics.len(),
            result.missing_attributes.len()
        );

        Ok(result)
    }

    /// Suggests a ward for `intervention_type` from the current snapshot.
    ///
    /// # Errors
    ///
    /// See [`suggest::suggest`].
    pub fn suggest(&self, intervention_type: &str) -> Result<Suggestion, SimulationError> {
        let intervention = parse_intervention(intervention_type)?;
        suggest::suggest(&self.registry.current(), intervention)
    }

    /// The live snapshot.
    #[must_use]
    pub fn registry(&self) -> Arc<WardRegistry> {
        self.registry.current()
    }

    /// Re-runs `join` and publishes the result. On any failure, including
    /// a snapshot the feature builder cannot read, the live snapshot stays
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns the join or schema error.
    pub fn rebuild(&self, join: &JoinBuilder) -> Result<JoinReport, SimulationError> {
        let mut report = JoinReport::default();
        self.registry.rebuild(|| {
            let (registry, built) = join.build(self.clock.now())?;
            self.features.check_schema(registry.attribute_schema_version())?;
            report = built;
            Ok::<_, SimulationError>(registry)
        })?;
        Ok(report)
    }

    /// Publishes an already-built snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::SchemaVersionMismatch`] if the feature
    /// builder cannot read it; nothing is published then.
    pub fn publish(&self, registry: WardRegistry) -> Result<Arc<WardRegistry>, SimulationError> {
        self.features.check_schema(registry.attribute_schema_version())?;
        Ok(self.registry.publish(registry))
    }
}
