//! Join definition types, deserialized from TOML.
//!
//! A join definition names one boundary file (authoritative for ward
//! identity) and any number of tabular sources whose columns are mapped
//! onto known [`WardAttribute`]s.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{WGS84_CRS, WardAttribute};

/// Everything needed to build a ward registry from raw inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinDefinition {
    /// Boundary geometry source.
    pub boundary: BoundarySource,
    /// Tabular attribute sources.
    #[serde(default)]
    pub sources: Vec<TabularSource>,
}

impl JoinDefinition {
    /// Returns the attribute that is claimed by more than one source, if
    /// any, along with the two claiming source ids.
    #[must_use]
    pub fn conflicting_attribute(&self) -> Option<(WardAttribute, &str, &str)> {
        let mut claimed: BTreeMap<WardAttribute, &str> = BTreeMap::new();
        for source in &self.sources {
            for attribute in source.columns.keys() {
                if let Some(previous) = claimed.insert(*attribute, source.id.as_str()) {
                    return Some((*attribute, previous, source.id.as_str()));
                }
            }
        }
        None
    }
}

/// A `GeoJSON` `FeatureCollection` of ward boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundarySource {
    /// Path to the `GeoJSON` file, relative to the definition file.
    pub path: PathBuf,
    /// Feature property holding the ward code.
    #[serde(default = "default_code_property")]
    pub code_property: String,
    /// Feature property holding the ward name.
    #[serde(default = "default_name_property")]
    pub name_property: String,
    /// Coordinate reference system of the file. Only [`WGS84_CRS`] is
    /// accepted.
    #[serde(default = "default_crs")]
    pub crs: String,
}

fn default_code_property() -> String {
    "wardcode".to_string()
}

fn default_name_property() -> String {
    "name".to_string()
}

fn default_crs() -> String {
    WGS84_CRS.to_string()
}

/// How a tabular source identifies its wards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Key column holds ward codes.
    Code,
    /// Key column holds ward names.
    Name,
}

/// A CSV file contributing one or more ward attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TabularSource {
    /// Unique source identifier (e.g. `"population"`).
    pub id: String,
    /// Path to the CSV file, relative to the definition file.
    pub path: PathBuf,
    /// Header of the column used as the join key.
    pub key_column: String,
    /// Whether the key column holds codes or names.
    pub key_kind: KeyKind,
    /// Attribute -> CSV column header.
    pub columns: BTreeMap<WardAttribute, String>,
}
