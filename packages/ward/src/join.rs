//! Geospatial join: tabular sources x boundary polygons -> registry.
//!
//! The boundary file is authoritative for ward identity. Tabular rows
//! whose key matches no boundary are dropped and reported; boundary wards
//! that no row matched keep every attribute unset. The build is
//! all-or-nothing: any structural problem in any input aborts it, so a
//! half-built registry can never be published.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use geojson::{FeatureCollection, GeoJson};
use urban_sim_ward_models::source::{BoundarySource, JoinDefinition, KeyKind, TabularSource};
use urban_sim_ward_models::{ATTRIBUTE_SCHEMA_VERSION, WGS84_CRS, WardAttributes};

use crate::normalize::{normalize_code, normalize_name};
use crate::tabular::{self, TabularRow};
use crate::{Ward, WardError, WardRegistry, geometry};

const BOUNDARY_SOURCE_ID: &str = "boundary";

/// A ward boundary as read from the boundary file.
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    /// Ward code.
    pub code: String,
    /// Ward name (falls back to the code when the file has none).
    pub name: String,
    /// Parsed boundary.
    pub boundary: MultiPolygon<f64>,
}

/// A tabular row that matched no boundary ward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord {
    /// Source the row came from.
    pub source_id: String,
    /// Key as it appeared in the source.
    pub key: String,
}

/// Outcome of a successful join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    /// Wards matched by at least one tabular row.
    pub matched: usize,
    /// Ward codes no tabular row matched, sorted.
    pub boundary_only: Vec<String>,
    /// Tabular rows dropped for lack of a boundary.
    pub dropped: Vec<DroppedRecord>,
}

/// Builds a [`WardRegistry`] from a [`JoinDefinition`] on disk.
#[derive(Debug, Clone)]
pub struct JoinBuilder {
    definition: JoinDefinition,
    base_dir: PathBuf,
}

impl JoinBuilder {
    /// Creates a builder resolving source paths against `base_dir`.
    #[must_use]
    pub const fn new(definition: JoinDefinition, base_dir: PathBuf) -> Self {
        Self {
            definition,
            base_dir,
        }
    }

    /// Reads a TOML join definition. Source paths are resolved relative to
    /// the definition file's directory.
    ///
    /// # Errors
    ///
    /// Returns a [`WardError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, WardError> {
        let contents = std::fs::read_to_string(path)?;
        let definition: JoinDefinition = toml::from_str(&contents)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::new(definition, base_dir))
    }

    /// Reads every input and runs the join.
    ///
    /// # Errors
    ///
    /// Returns a [`WardError`] if any input is unreadable or structurally
    /// broken, or any boundary is invalid.
    pub fn build(
        &self,
        built_at: DateTime<Utc>,
    ) -> Result<(WardRegistry, JoinReport), WardError> {
        let boundary_path = self.base_dir.join(&self.definition.boundary.path);
        log::info!("Reading ward boundaries from {}", boundary_path.display());
        let boundary_geojson = std::fs::read_to_string(&boundary_path)?;

        let mut tables = Vec::with_capacity(self.definition.sources.len());
        for source in &self.definition.sources {
            let path = self.base_dir.join(&source.path);
            log::info!("Reading {} from {}", source.id, path.display());
            let rows = tabular::read_source(source, File::open(&path)?)?;
            tables.push((source, rows));
        }

        join(&self.definition, &boundary_geojson, &tables, built_at)
    }
}

/// Parses the boundary `FeatureCollection`.
///
/// # Errors
///
/// Returns a [`WardError`] if the CRS is not WGS84, the file is not a
/// `FeatureCollection`, or a feature lacks a code or polygonal geometry.
pub fn read_boundaries(
    source: &BoundarySource,
    geojson_str: &str,
) -> Result<Vec<BoundaryFeature>, WardError> {
    if source.crs != WGS84_CRS {
        return Err(WardError::UnsupportedCrs {
            crs: source.crs.clone(),
        });
    }

    let collection = match geojson_str.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        _ => {
            return Err(WardError::broken_source(
                BOUNDARY_SOURCE_ID,
                "expected a FeatureCollection",
            ));
        }
    };

    parse_features(source, collection)
}

fn parse_features(
    source: &BoundarySource,
    collection: FeatureCollection,
) -> Result<Vec<BoundaryFeature>, WardError> {
    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(idx, feature)| {
            let code = feature
                .property(&source.code_property)
                .and_then(property_to_string)
                .ok_or_else(|| {
                    WardError::broken_source(
                        BOUNDARY_SOURCE_ID,
                        format!("feature {idx} has no '{}' property", source.code_property),
                    )
                })?;

            let name = feature
                .property(&source.name_property)
                .and_then(property_to_string)
                .unwrap_or_else(|| code.clone());

            let geometry = feature.geometry.as_ref().ok_or_else(|| {
                WardError::broken_source(BOUNDARY_SOURCE_ID, format!("ward {code} has no geometry"))
            })?;

            let boundary = geometry::to_multipolygon(geometry).map_err(|reason| {
                WardError::InvalidGeometry {
                    code: code.clone(),
                    reason,
                }
            })?;

            Ok(BoundaryFeature {
                code,
                name,
                boundary,
            })
        })
        .collect()
}

fn property_to_string(value: &serde_json::Value) -> Option<String> {
    let s = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Joins parsed tabular rows onto the boundary features.
///
/// # Errors
///
/// Returns a [`WardError`] if an attribute is claimed by two sources, two
/// boundaries share a code (or, when a source joins by name, a normalized
/// name), or any boundary fails validation.
pub fn join(
    definition: &JoinDefinition,
    boundary_geojson: &str,
    tables: &[(&TabularSource, Vec<TabularRow>)],
    built_at: DateTime<Utc>,
) -> Result<(WardRegistry, JoinReport), WardError> {
    if let Some((attribute, first, second)) = definition.conflicting_attribute() {
        return Err(WardError::broken_source(
            second,
            format!("attribute {attribute} is already provided by {first}"),
        ));
    }

    let features = read_boundaries(&definition.boundary, boundary_geojson)?;
    log::info!("Parsed {} boundary features", features.len());

    for feature in &features {
        geometry::validate(&feature.boundary).map_err(|reason| WardError::InvalidGeometry {
            code: feature.code.clone(),
            reason,
        })?;
    }

    let by_code = index_by_code(&features)?;
    let by_name = if tables.iter().any(|(s, _)| s.key_kind == KeyKind::Name) {
        index_by_name(&features)?
    } else {
        BTreeMap::new()
    };

    let mut attributes = vec![WardAttributes::default(); features.len()];
    let mut matched = BTreeSet::new();
    let mut report = JoinReport::default();

    for (source, rows) in tables {
        let lookup = match source.key_kind {
            KeyKind::Code => &by_code,
            KeyKind::Name => &by_name,
        };

        for row in rows {
            let Some(&idx) = lookup.get(&row.key) else {
                log::warn!(
                    "{}: no boundary for '{}', dropping record",
                    source.id,
                    row.raw_key
                );
                report.dropped.push(DroppedRecord {
                    source_id: source.id.clone(),
                    key: row.raw_key.clone(),
                });
                continue;
            };

            matched.insert(idx);
            for (attribute, value) in &row.values {
                if let Some(value) = value {
                    attributes[idx].set(*attribute, *value);
                }
            }
        }
    }

    let mut wards = Vec::with_capacity(features.len());
    for (idx, (feature, attrs)) in features.into_iter().zip(attributes).enumerate() {
        if !matched.contains(&idx) {
            log::warn!("Ward {} has no tabular data; all attributes missing", feature.code);
            report.boundary_only.push(feature.code.clone());
        }
        wards.push(Ward::new(feature.code, feature.name, feature.boundary, attrs)?);
    }

    report.matched = matched.len();
    report.boundary_only.sort();

    let registry = WardRegistry::new(wards, ATTRIBUTE_SCHEMA_VERSION, built_at)?;

    log::info!(
        "Join complete: {} wards, {} matched, {} boundary-only, {} dropped records",
        registry.len(),
        report.matched,
        report.boundary_only.len(),
        report.dropped.len()
    );

    Ok((registry, report))
}

fn index_by_code(features: &[BoundaryFeature]) -> Result<BTreeMap<String, usize>, WardError> {
    let mut index = BTreeMap::new();
    for (idx, feature) in features.iter().enumerate() {
        if index.insert(normalize_code(&feature.code), idx).is_some() {
            return Err(WardError::DuplicateWard {
                code: feature.code.clone(),
            });
        }
    }
    Ok(index)
}

fn index_by_name(features: &[BoundaryFeature]) -> Result<BTreeMap<String, usize>, WardError> {
    let mut index = BTreeMap::new();
    for (idx, feature) in features.iter().enumerate() {
        let key = normalize_name(&feature.name);
        if key.is_empty() {
            continue;
        }
        if let Some(other) = index.insert(key, idx) {
            return Err(WardError::broken_source(
                BOUNDARY_SOURCE_ID,
                format!(
                    "wards {} and {} have the same normalized name '{}'",
                    features[other].code,
                    feature.code,
                    normalize_name(&feature.name)
                ),
            ));
        }
    }
    Ok(index)
}
