//! Inline artifacts shared by the simulator tests.

use chrono::{DateTime, TimeZone as _, Utc};
use urban_sim_model::artifact::{Activation, DenseLayer, ModelArtifact};
use urban_sim_model::params::{EncodingEntry, NormalizationEntry};
use urban_sim_model::{FeatureBuilder, FeatureParams, PredictionEngine};
use urban_sim_simulation_models::{InterventionType, Metric};
use urban_sim_ward::WardRegistry;
use urban_sim_ward_models::WardAttribute;

pub fn instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Feature parameters encoding road, park and school.
pub fn params() -> FeatureParams {
    let normalization = WardAttribute::all()
        .iter()
        .map(|attribute| {
            let (mean, scale) = match attribute {
                WardAttribute::LightVehicles => (300.0, 100.0),
                WardAttribute::MediumVehicles => (150.0, 50.0),
                WardAttribute::HeavyVehicles => (50.0, 25.0),
                _ => (10.0, 5.0),
            };
            NormalizationEntry {
                attribute: *attribute,
                mean,
                scale,
            }
        })
        .collect();

    let encoding = |intervention_type, index, magnitude_param: &str, reference, default| {
        EncodingEntry {
            intervention_type,
            index,
            magnitude_param: magnitude_param.to_string(),
            reference,
            default,
        }
    };

    FeatureParams {
        model_version: "test-1".to_string(),
        attribute_schema_version: 1,
        feature_schema_version: 1,
        normalization,
        interventions: vec![
            encoding(InterventionType::Road, 0, "length", 5.0, None),
            encoding(InterventionType::Park, 1, "area", 2.0, Some(1.0)),
            encoding(InterventionType::School, 2, "capacity", 1000.0, Some(500.0)),
        ],
    }
}

/// One linear layer. `trafficFlow` is `traffic_weight * light_vehicles +
/// 0.5 * magnitude`; `vegetationCover` is `0.25 * magnitude`; everything
/// else is zero.
pub fn artifact_bytes(traffic_weight: f64) -> Vec<u8> {
    let names = FeatureBuilder::new(params()).unwrap().feature_names().to_vec();
    let outputs = Metric::table(1).unwrap().to_vec();
    let last = names.len() - 1;

    let weights = outputs
        .iter()
        .map(|metric| {
            (0..names.len())
                .map(|i| match (metric, i) {
                    (Metric::TrafficFlow, 3) => traffic_weight,
                    (Metric::TrafficFlow, i) if i == last => 0.5,
                    (Metric::VegetationCover, i) if i == last => 0.25,
                    _ => 0.0,
                })
                .collect()
        })
        .collect();

    let artifact = ModelArtifact {
        model_version: "test-1".to_string(),
        feature_schema_version: 1,
        metric_table_version: 1,
        feature_names: names,
        layers: vec![DenseLayer {
            weights,
            bias: vec![0.0; outputs.len()],
            activation: Activation::Identity,
        }],
        outputs,
    };
    serde_json::to_vec(&artifact).unwrap()
}

pub fn engine() -> PredictionEngine {
    PredictionEngine::from_bytes(&artifact_bytes(0.1)).unwrap()
}

/// A ward square `0.01°` wide at longitude `x0`. `attributes` is the JSON
/// body of its attribute object.
pub struct WardFixture<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub x0: f64,
    pub attributes: &'a str,
}

pub fn snapshot_json(version: u32, wards: &[WardFixture<'_>]) -> String {
    let wards = wards
        .iter()
        .map(|w| {
            let x1 = w.x0 + 0.01;
            format!(
                r#"{{
                    "code": "{code}",
                    "name": "{name}",
                    "boundary": {{
                        "type": "Polygon",
                        "coordinates": [[[{x0}, 17.7], [{x1}, 17.7], [{x1}, 17.71], [{x0}, 17.71], [{x0}, 17.7]]]
                    }},
                    "attributes": {{ {attributes} }}
                }}"#,
                code = w.code,
                name = w.name,
                x0 = w.x0,
                attributes = w.attributes,
            )
        })
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"{{
            "attributeSchemaVersion": {version},
            "crs": "EPSG:4326",
            "builtAt": "2024-01-01T00:00:00Z",
            "wards": [{wards}]
        }}"#
    )
}

pub fn registry(wards: &[WardFixture<'_>]) -> WardRegistry {
    WardRegistry::from_json(&snapshot_json(1, wards)).unwrap()
}

/// Every attribute set; 500 vehicles a day at the training means.
pub const W014_ATTRIBUTES: &str = r#"
    "populationTotal": 42000.0,
    "populationMale": 21500.0,
    "populationFemale": 20500.0,
    "lightVehicles": 300.0,
    "mediumVehicles": 150.0,
    "heavyVehicles": 50.0,
    "trafficDensityPct": 55.0,
    "airQualityIndex": 92.0,
    "vegetationPct": 14.0,
    "heatIndex": 34.0,
    "infrastructurePct": 61.0,
    "gdpCrore": 820.0
"#;

pub fn w014() -> WardFixture<'static> {
    WardFixture {
        code: "W014",
        name: "Dwaraka Nagar",
        x0: 83.3,
        attributes: W014_ATTRIBUTES,
    }
}
