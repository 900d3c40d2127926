#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request and result types for the ward impact simulator.
//!
//! These are the types an API layer exchanges with the simulation core.
//! They are kept separate from the engine so the serialized contract can
//! evolve independently of the model internals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use urban_sim_ward_models::WardAttribute;

/// Version of the metric name table. Model artifacts declare the table
/// version their outputs follow.
pub const METRIC_TABLE_VERSION: u32 = 1;

/// A kind of infrastructure change that can be simulated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterventionType {
    /// At-grade road.
    Road,
    /// Elevated road bypassing local traffic.
    RoadFlyover,
    /// Underground road with minimal surface footprint.
    RoadTunnel,
    /// Shopping mall / commercial centre.
    Mall,
    /// School.
    School,
    /// Hospital.
    Hospital,
    /// Public park.
    Park,
}

/// A simulation request as received from a caller, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulationRequest {
    /// Target ward code.
    pub ward_code: String,
    /// Intervention type name (e.g. `"road"`).
    pub intervention_type: String,
    /// Intervention magnitude parameters (e.g. `length` in km).
    #[serde(default)]
    pub intervention_params: BTreeMap<String, f64>,
}

/// A validated intervention to simulate in one ward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionDescriptor {
    /// Target ward code.
    pub ward_code: String,
    /// What is being built.
    pub intervention_type: InterventionType,
    /// Magnitude parameters, ordered by name.
    pub params: BTreeMap<String, f64>,
}

impl InterventionDescriptor {
    /// Creates a descriptor with no parameters.
    #[must_use]
    pub fn new(ward_code: impl Into<String>, intervention_type: InterventionType) -> Self {
        Self {
            ward_code: ward_code.into(),
            intervention_type,
            params: BTreeMap::new(),
        }
    }

    /// Adds a magnitude parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// A named output metric, relative to the ward's baseline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Metric {
    /// Overall traffic flow.
    TrafficFlow,
    /// Resident population trend.
    PopulationTrend,
    /// Composite environmental index.
    EnvironmentalIndex,
    /// Air quality index.
    AirQuality,
    /// Heat index.
    HeatIndex,
    /// Vegetation / green space cover.
    VegetationCover,
    /// Light-weight vehicle volume.
    LightVehicles,
    /// Medium-weight vehicle volume.
    MediumVehicles,
    /// Heavy-weight vehicle volume.
    HeavyVehicles,
    /// Economic activity (GDP).
    EconomicActivity,
}

impl Metric {
    /// The metric name table for `version`, in model output order.
    #[must_use]
    pub const fn table(version: u32) -> Option<&'static [Self]> {
        match version {
            1 => Some(&[
                Self::TrafficFlow,
                Self::PopulationTrend,
                Self::EnvironmentalIndex,
                Self::AirQuality,
                Self::HeatIndex,
                Self::VegetationCover,
                Self::LightVehicles,
                Self::MediumVehicles,
                Self::HeavyVehicles,
                Self::EconomicActivity,
            ]),
            _ => None,
        }
    }
}

/// Predicted relative change for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    /// Signed relative change as a fraction of baseline (`0.25` = +25%).
    pub delta: f64,
    /// The model output exceeded the clamp bound and `delta` was clamped.
    pub out_of_range: bool,
}

/// Where a result came from, for reproducibility audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Model version declared by the artifact.
    pub model_version: String,
    /// SHA-256 of the model artifact file.
    pub model_digest: String,
    /// Feature schema version used to build the input.
    pub feature_schema_version: u32,
    /// Metric name table version used to label the output.
    pub metric_table_version: u32,
    /// When the result was produced.
    pub generated_at: DateTime<Utc>,
}

/// The outcome of simulating one intervention in one ward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Ward the intervention was simulated in.
    pub ward_code: String,
    /// What was simulated.
    pub intervention_type: InterventionType,
    /// Magnitude parameters as supplied.
    pub intervention_params: BTreeMap<String, f64>,
    /// Per-metric relative change.
    pub metrics: BTreeMap<Metric, MetricDelta>,
    /// Baseline attributes that were unavailable for this ward. The model
    /// saw the training mean in their place.
    pub missing_attributes: Vec<WardAttribute>,
    /// `true` when no baseline attribute was missing.
    pub complete: bool,
    /// Provenance metadata.
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl PredictionResult {
    /// Whether any metric was clamped.
    #[must_use]
    pub fn any_out_of_range(&self) -> bool {
        self.metrics.values().any(|m| m.out_of_range)
    }

    /// Returns the delta for `metric`, if the model produced it.
    #[must_use]
    pub fn metric(&self, metric: Metric) -> Option<&MetricDelta> {
        self.metrics.get(&metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervention_names_parse() {
        assert_eq!("road".parse::<InterventionType>().unwrap(), InterventionType::Road);
        assert_eq!(
            "road_flyover".parse::<InterventionType>().unwrap(),
            InterventionType::RoadFlyover
        );
        assert!("stadium".parse::<InterventionType>().is_err());
    }

    #[test]
    fn metric_table_v1_has_unique_names() {
        let table = Metric::table(1).unwrap();
        for (i, a) in table.iter().enumerate() {
            for b in &table[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(table[0].to_string(), "trafficFlow");
        assert!(Metric::table(2).is_none());
    }

    #[test]
    fn descriptor_builder_orders_params() {
        let descriptor = InterventionDescriptor::new("W014", InterventionType::Road)
            .with_param("width", 12.0)
            .with_param("length", 2.0);
        let names: Vec<&String> = descriptor.params.keys().collect();
        assert_eq!(names, vec!["length", "width"]);
    }
}
