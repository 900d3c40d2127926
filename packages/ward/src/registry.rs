//! Immutable ward registry snapshots.
//!
//! A [`WardRegistry`] is loaded whole at startup and never mutated.
//! Rebuilds produce a new instance which is republished through a
//! [`RegistryHandle`]; readers that already hold an `Arc` to the previous
//! snapshot keep using it until they drop it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};
use urban_sim_ward_models::{WGS84_CRS, WardAttributes};

use crate::{Ward, WardError, geometry};

/// A ward envelope stored in the R-tree, pointing back at its code.
struct WardEnvelope {
    code: String,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for WardEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A complete, validated set of wards.
pub struct WardRegistry {
    wards: BTreeMap<String, Ward>,
    index: RTree<WardEnvelope>,
    attribute_schema_version: u32,
    built_at: DateTime<Utc>,
}

impl std::fmt::Debug for WardRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WardRegistry")
            .field("wards", &self.wards.len())
            .field("attribute_schema_version", &self.attribute_schema_version)
            .field("built_at", &self.built_at)
            .finish_non_exhaustive()
    }
}

impl WardRegistry {
    /// Builds a registry from already-validated wards.
    ///
    /// # Errors
    ///
    /// Returns [`WardError::DuplicateWard`] if two wards share a code.
    pub fn new(
        wards: Vec<Ward>,
        attribute_schema_version: u32,
        built_at: DateTime<Utc>,
    ) -> Result<Self, WardError> {
        let mut by_code = BTreeMap::new();
        for ward in wards {
            let code = ward.code().to_string();
            if by_code.insert(code.clone(), ward).is_some() {
                return Err(WardError::DuplicateWard { code });
            }
        }

        let index = RTree::bulk_load(
            by_code
                .values()
                .map(|ward| WardEnvelope {
                    code: ward.code().to_string(),
                    envelope: geometry::envelope(ward.boundary()),
                })
                .collect(),
        );

        Ok(Self {
            wards: by_code,
            index,
            attribute_schema_version,
            built_at,
        })
    }

    /// Looks up a ward by its exact code.
    ///
    /// # Errors
    ///
    /// Returns [`WardError::NotFound`] if no ward has this code.
    pub fn get(&self, code: &str) -> Result<&Ward, WardError> {
        self.wards.get(code).ok_or_else(|| WardError::NotFound {
            code: code.to_string(),
        })
    }

    /// All wards, ordered by ward code.
    pub fn list(&self) -> impl ExactSizeIterator<Item = &Ward> {
        self.wards.values()
    }

    /// Number of wards in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.wards.len()
    }

    /// Whether the snapshot holds no wards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wards.is_empty()
    }

    /// Finds the ward whose boundary contains the point.
    ///
    /// Ward boundaries tile the city without overlap; if a malformed input
    /// does overlap, the lowest ward code wins.
    #[must_use]
    pub fn locate(&self, lng: f64, lat: f64) -> Option<&Ward> {
        let query_env = AABB::from_point([lng, lat]);

        self.index
            .locate_in_envelope_intersecting(&query_env)
            .filter_map(|entry| self.wards.get(&entry.code))
            .filter(|ward| ward.contains(lng, lat))
            .min_by(|a, b| a.code().cmp(b.code()))
    }

    /// Version of the attribute schema the snapshot was built against.
    #[must_use]
    pub const fn attribute_schema_version(&self) -> u32 {
        self.attribute_schema_version
    }

    /// When the snapshot was built.
    #[must_use]
    pub const fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Loads a snapshot file, re-validating every ward.
    ///
    /// # Errors
    ///
    /// Returns a [`WardError`] if the file cannot be read or parsed, uses a
    /// CRS other than WGS84, holds duplicate codes, or any boundary fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self, WardError> {
        log::info!("Loading ward snapshot from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let registry = Self::from_json(&contents)?;
        log::info!(
            "Loaded {} wards (attribute schema v{}, built {})",
            registry.len(),
            registry.attribute_schema_version,
            registry.built_at
        );
        Ok(registry)
    }

    /// Parses a snapshot from its JSON representation.
    ///
    /// # Errors
    ///
    /// See [`WardRegistry::load`].
    pub fn from_json(contents: &str) -> Result<Self, WardError> {
        let snapshot: SnapshotFile = serde_json::from_str(contents)?;

        if snapshot.crs != WGS84_CRS {
            return Err(WardError::UnsupportedCrs { crs: snapshot.crs });
        }

        let wards = snapshot
            .wards
            .into_iter()
            .map(|entry| {
                let boundary = geometry::to_multipolygon(&entry.boundary).map_err(|reason| {
                    WardError::InvalidGeometry {
                        code: entry.code.clone(),
                        reason,
                    }
                })?;
                Ward::new(entry.code, entry.name, boundary, entry.attributes)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(wards, snapshot.attribute_schema_version, snapshot.built_at)
    }

    /// Serializes the snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`WardError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, WardError> {
        let snapshot = SnapshotFile {
            attribute_schema_version: self.attribute_schema_version,
            crs: WGS84_CRS.to_string(),
            built_at: self.built_at,
            wards: self
                .wards
                .values()
                .map(|ward| SnapshotWard {
                    code: ward.code().to_string(),
                    name: ward.name().to_string(),
                    boundary: geometry::to_geojson(ward.boundary()),
                    attributes: ward.attributes().clone(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Writes the snapshot to `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`WardError`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), WardError> {
        std::fs::write(path, self.to_json()?)?;
        log::info!("Wrote {} wards to {}", self.len(), path.display());
        Ok(())
    }
}

/// On-disk snapshot layout.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SnapshotFile {
    attribute_schema_version: u32,
    crs: String,
    built_at: DateTime<Utc>,
    wards: Vec<SnapshotWard>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SnapshotWard {
    code: String,
    name: String,
    boundary: geojson::Geometry,
    attributes: WardAttributes,
}

/// Publishing point for the live registry snapshot.
///
/// Readers call [`RegistryHandle::current`] and work against the returned
/// `Arc` for the duration of a request. A rebuild publishes a whole new
/// snapshot; nothing is ever mutated in place.
#[derive(Debug)]
pub struct RegistryHandle {
    current: RwLock<Arc<WardRegistry>>,
}

impl RegistryHandle {
    /// Creates a handle publishing `registry`.
    #[must_use]
    pub fn new(registry: WardRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Returns the live snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<WardRegistry> {
        // The guarded value is a single `Arc`, which can't be left half
        // written, so a poisoned lock is still safe to read.
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the live snapshot, returning the previous one.
    pub fn publish(&self, registry: WardRegistry) -> Arc<WardRegistry> {
        self.swap(Arc::new(registry))
    }

    fn swap(&self, next: Arc<WardRegistry>) -> Arc<WardRegistry> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        log::info!("Publishing ward snapshot with {} wards", next.len());
        std::mem::replace(&mut *guard, next)
    }

    /// Runs `build` and publishes its result only if it succeeds. On
    /// failure the live snapshot is untouched.
    ///
    /// # Errors
    ///
    /// Returns whatever error `build` returned.
    pub fn rebuild<E>(
        &self,
        build: impl FnOnce() -> Result<WardRegistry, E>,
    ) -> Result<Arc<WardRegistry>, E> {
        let next = Arc::new(build()?);
        self.swap(Arc::clone(&next));
        Ok(next)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geometry::tests::square;

    pub fn ward(code: &str, x0: f64, attributes: WardAttributes) -> Ward {
        Ward::new(code, format!("Ward {code}"), square(x0, 17.7, 0.01), attributes).unwrap()
    }

    fn registry(codes: &[(&str, f64)]) -> WardRegistry {
        let wards = codes
            .iter()
            .map(|(code, x0)| ward(code, *x0, WardAttributes::default()))
            .collect();
        WardRegistry::new(wards, 1, DateTime::<Utc>::UNIX_EPOCH).unwrap()
    }

    #[test]
    fn list_is_ordered_by_code() {
        let registry = registry(&[("W003", 83.02), ("W001", 83.0), ("W002", 83.01)]);
        let codes: Vec<&str> = registry.list().map(Ward::code).collect();
        assert_eq!(codes, vec!["W001", "W002", "W003"]);
    }

    #[test]
    fn get_unknown_code_is_not_found() {
        let registry = registry(&[("W001", 83.0)]);
        assert!(registry.get("W001").is_ok());
        assert!(matches!(
            registry.get("W999"),
            Err(WardError::NotFound { code }) if code == "W999"
        ));
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let wards = vec![
            ward("W001", 83.0, WardAttributes::default()),
            ward("W001", 83.01, WardAttributes::default()),
        ];
        assert!(matches!(
            WardRegistry::new(wards, 1, DateTime::<Utc>::UNIX_EPOCH),
            Err(WardError::DuplicateWard { .. })
        ));
    }

    #[test]
    fn locates_ward_by_point() {
        let registry = registry(&[("W001", 83.0), ("W002", 83.01)]);
        assert_eq!(registry.locate(83.005, 17.705).map(Ward::code), Some("W001"));
        assert_eq!(registry.locate(83.015, 17.705).map(Ward::code), Some("W002"));
        assert!(registry.locate(84.0, 17.705).is_none());
    }

    #[test]
    fn snapshot_survives_json() {
        let attributes = WardAttributes {
            population_total: Some(12_000.0),
            ..WardAttributes::default()
        };
        let original = WardRegistry::new(
            vec![ward("W014", 83.0, attributes.clone())],
            1,
            DateTime::<Utc>::UNIX_EPOCH,
        )
        .unwrap();

        let restored = WardRegistry::from_json(&original.to_json().unwrap()).unwrap();
        let ward = restored.get("W014").unwrap();
        assert_eq!(ward.attributes(), &attributes);
        assert_eq!(ward.attributes().heat_index, None);
        assert_eq!(restored.attribute_schema_version(), 1);
    }

    #[test]
    fn snapshot_rejects_unknown_attribute_keys() {
        let json = r#"{
            "attributeSchemaVersion": 1,
            "crs": "EPSG:4326",
            "builtAt": "2024-01-01T00:00:00Z",
            "wards": [{
                "code": "W001",
                "name": "One",
                "boundary": {"type": "Polygon", "coordinates": [[[83.0,17.7],[83.01,17.7],[83.01,17.71],[83.0,17.71],[83.0,17.7]]]},
                "attributes": {"populationTotal": 10, "stadiumSeats": 5}
            }]
        }"#;
        assert!(matches!(
            WardRegistry::from_json(json),
            Err(WardError::Json(_))
        ));
    }

    #[test]
    fn snapshot_rejects_other_crs() {
        let json = r#"{
            "attributeSchemaVersion": 1,
            "crs": "EPSG:32644",
            "builtAt": "2024-01-01T00:00:00Z",
            "wards": []
        }"#;
        assert!(matches!(
            WardRegistry::from_json(json),
            Err(WardError::UnsupportedCrs { .. })
        ));
    }

    #[test]
    fn readers_keep_their_snapshot_across_publish() {
        let handle = RegistryHandle::new(registry(&[("W001", 83.0)]));
        let before = handle.current();

        let previous = handle.publish(registry(&[("W001", 83.0), ("W002", 83.01)]));

        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(before.len(), 1);
        assert_eq!(handle.current().len(), 2);
    }

    #[test]
    fn failed_rebuild_keeps_live_snapshot() {
        let handle = RegistryHandle::new(registry(&[("W001", 83.0)]));

        let result = handle.rebuild(|| {
            Err(WardError::DuplicateWard {
                code: "W001".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(handle.current().len(), 1);
    }

    #[test]
    fn rebuild_returns_the_snapshot_it_built() {
        let handle = RegistryHandle::new(registry(&[("W001", 83.0)]));

        let built = handle
            .rebuild(|| Ok::<_, WardError>(registry(&[("W001", 83.0), ("W002", 83.01)])))
            .unwrap();
        assert!(Arc::ptr_eq(&built, &handle.current()));

        handle.publish(registry(&[("W003", 83.02)]));
        assert_eq!(built.len(), 2);
        assert!(built.get("W002").is_ok());
        assert_eq!(handle.current().len(), 1);
    }
}
