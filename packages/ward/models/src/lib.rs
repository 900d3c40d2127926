#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward attribute schema types.
//!
//! Defines the fixed set of baseline attributes a ward can carry and the
//! TOML schema for the tabular sources those attributes are joined from.
//! Every attribute is optional: a value that no source provided stays
//! `None` all the way through to the simulation result.

pub mod source;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Version of the ward attribute schema. Bumped whenever an attribute is
/// added, removed or changes meaning, since feature vectors derive their
/// layout from [`WardAttribute::all()`].
pub const ATTRIBUTE_SCHEMA_VERSION: u32 = 1;

/// The only coordinate reference system ward boundaries may use.
pub const WGS84_CRS: &str = "EPSG:4326";

/// A known baseline attribute of a ward.
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
pub enum WardAttribute {
    /// Total resident population.
    PopulationTotal,
    /// Estimated male population.
    PopulationMale,
    /// Estimated female population.
    PopulationFemale,
    /// Daily light-weight vehicle count (2-wheelers, autos).
    LightVehicles,
    /// Daily medium-weight vehicle count (cars, pickups).
    MediumVehicles,
    /// Daily heavy-weight vehicle count (buses, trucks).
    HeavyVehicles,
    /// Road network utilisation, percent.
    TrafficDensityPct,
    /// Air quality index.
    AirQualityIndex,
    /// Green space share of ward area, percent.
    VegetationPct,
    /// Relative heat index.
    HeatIndex,
    /// Built infrastructure share of ward area, percent.
    InfrastructurePct,
    /// Estimated ward GDP in crore.
    GdpCrore,
}

impl WardAttribute {
    /// Returns all attributes in schema order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::PopulationTotal,
            Self::PopulationMale,
            Self::PopulationFemale,
            Self::LightVehicles,
            Self::MediumVehicles,
            Self::HeavyVehicles,
            Self::TrafficDensityPct,
            Self::AirQualityIndex,
            Self::VegetationPct,
            Self::HeatIndex,
            Self::InfrastructurePct,
            Self::GdpCrore,
        ]
    }
}

/// Baseline attribute values for a single ward.
///
/// Unknown keys are rejected on deserialization so that loosely structured
/// input can never smuggle extra fields into a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WardAttributes {
    /// See [`WardAttribute::PopulationTotal`].
    pub population_total: Option<f64>,
    /// See [`WardAttribute::PopulationMale`].
    pub population_male: Option<f64>,
    /// See [`WardAttribute::PopulationFemale`].
    pub population_female: Option<f64>,
    /// See [`WardAttribute::LightVehicles`].
    pub light_vehicles: Option<f64>,
    /// See [`WardAttribute::MediumVehicles`].
    pub medium_vehicles: Option<f64>,
    /// See [`WardAttribute::HeavyVehicles`].
    pub heavy_vehicles: Option<f64>,
    /// See [`WardAttribute::TrafficDensityPct`].
    pub traffic_density_pct: Option<f64>,
    /// See [`WardAttribute::AirQualityIndex`].
    pub air_quality_index: Option<f64>,
    /// See [`WardAttribute::VegetationPct`].
    pub vegetation_pct: Option<f64>,
    /// See [`WardAttribute::HeatIndex`].
    pub heat_index: Option<f64>,
    /// See [`WardAttribute::InfrastructurePct`].
    pub infrastructure_pct: Option<f64>,
    /// See [`WardAttribute::GdpCrore`].
    pub gdp_crore: Option<f64>,
}

impl WardAttributes {
    /// Returns the value of `attribute`, if any source provided it.
    #[must_use]
    pub const fn get(&self, attribute: WardAttribute) -> Option<f64> {
        match attribute {
            WardAttribute::PopulationTotal => self.population_total,
            WardAttribute::PopulationMale => self.population_male,
            WardAttribute::PopulationFemale => self.population_female,
            WardAttribute::LightVehicles => self.light_vehicles,
            WardAttribute::MediumVehicles => self.medium_vehicles,
            WardAttribute::HeavyVehicles => self.heavy_vehicles,
            WardAttribute::TrafficDensityPct => self.traffic_density_pct,
            WardAttribute::AirQualityIndex => self.air_quality_index,
            WardAttribute::VegetationPct => self.vegetation_pct,
            WardAttribute::HeatIndex => self.heat_index,
            WardAttribute::InfrastructurePct => self.infrastructure_pct,
            WardAttribute::GdpCrore => self.gdp_crore,
        }
    }

    /// Sets `attribute`, returning the previous value.
    pub fn set(&mut self, attribute: WardAttribute, value: f64) -> Option<f64> {
        let slot = match attribute {
            WardAttribute::PopulationTotal => &mut self.population_total,
            WardAttribute::PopulationMale => &mut self.population_male,
            WardAttribute::PopulationFemale => &mut self.population_female,
            WardAttribute::LightVehicles => &mut self.light_vehicles,
            WardAttribute::MediumVehicles => &mut self.medium_vehicles,
            WardAttribute::HeavyVehicles => &mut self.heavy_vehicles,
            WardAttribute::TrafficDensityPct => &mut self.traffic_density_pct,
            WardAttribute::AirQualityIndex => &mut self.air_quality_index,
            WardAttribute::VegetationPct => &mut self.vegetation_pct,
            WardAttribute::HeatIndex => &mut self.heat_index,
            WardAttribute::InfrastructurePct => &mut self.infrastructure_pct,
            WardAttribute::GdpCrore => &mut self.gdp_crore,
        };
        slot.replace(value)
    }

    /// Attributes with no value, in schema order.
    #[must_use]
    pub fn missing(&self) -> Vec<WardAttribute> {
        WardAttribute::all()
            .iter()
            .copied()
            .filter(|attr| self.get(*attr).is_none())
            .collect()
    }
}
