#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ward registry and geospatial join.
//!
//! Reconciles tabular demographic, traffic and environmental records with
//! ward boundary polygons into an immutable [`WardRegistry`] snapshot.
//! Snapshots are persisted as JSON, loaded whole at startup and republished
//! atomically through a [`RegistryHandle`] when rebuilt.

pub mod geometry;
pub mod join;
pub mod normalize;
pub mod registry;
pub mod tabular;
mod ward;

pub use registry::{RegistryHandle, WardRegistry};
pub use ward::Ward;

use thiserror::Error;

/// Errors that can occur while building, loading or querying wards.
#[derive(Debug, Error)]
pub enum WardError {
    /// No ward with the requested code exists in the snapshot.
    #[error("Ward not found: {code}")]
    NotFound {
        /// The requested ward code.
        code: String,
    },

    /// A boundary polygon failed validation.
    #[error("Invalid geometry for ward {code}: {reason}")]
    InvalidGeometry {
        /// Ward code of the offending boundary.
        code: String,
        /// What made the polygon invalid.
        reason: geometry::GeometryIssue,
    },

    /// Two boundary features share the same ward code.
    #[error("Duplicate ward code: {code}")]
    DuplicateWard {
        /// The repeated code.
        code: String,
    },

    /// Boundary data uses a coordinate reference system other than WGS84.
    #[error("Unsupported coordinate reference system: {crs}")]
    UnsupportedCrs {
        /// The declared CRS.
        crs: String,
    },

    /// An input source is structurally broken.
    #[error("Source {source_id}: {message}")]
    Source {
        /// Source identifier (tabular source id or `"boundary"`).
        source_id: String,
        /// Description of what went wrong.
        message: String,
    },

    /// I/O failure reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

impl WardError {
    pub(crate) fn broken_source(source_id: &str, message: impl Into<String>) -> Self {
        Self::Source {
            source_id: source_id.to_string(),
            message: message.into(),
        }
    }
}
