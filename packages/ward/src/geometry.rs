//! Boundary geometry parsing and validation.
//!
//! Boundaries arrive as `GeoJSON` `Polygon` or `MultiPolygon` geometries in
//! WGS84 and are held as [`MultiPolygon`]s. A boundary is accepted only if
//! it is topologically valid and stays within longitude/latitude range, and
//! every polygon encloses a non-zero area. Topological validity covers
//! simple rings, holes inside their exterior and non-overlapping parts.

use geo::algorithm::validation::InvalidMultiPolygon;
use geo::{Area, BoundingRect, Coord, CoordsIter, MultiPolygon, Validation};
use rstar::AABB;
use thiserror::Error;

/// Why a boundary polygon was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryIssue {
    /// The geometry is not a `Polygon` or `MultiPolygon`.
    #[error("expected Polygon or MultiPolygon, found {kind}")]
    NotPolygonal {
        /// `GeoJSON` type name that was found.
        kind: String,
    },
    /// The `GeoJSON` geometry could not be converted.
    #[error("unconvertible geometry: {message}")]
    Unconvertible {
        /// Conversion error text.
        message: String,
    },
    /// The multipolygon holds no polygons.
    #[error("geometry is empty")]
    Empty,
    /// A coordinate is NaN/infinite or outside lon/lat range.
    #[error("coordinate ({x}, {y}) is outside WGS84 bounds")]
    CoordinateOutOfRange {
        /// Longitude.
        x: f64,
        /// Latitude.
        y: f64,
    },
    /// Rings cross or self-touch, a hole escapes its exterior, or two
    /// parts overlap.
    #[error("invalid topology: {0}")]
    Topology(InvalidMultiPolygon),
    /// The polygon encloses no area.
    #[error("polygon {polygon} has zero area")]
    ZeroArea {
        /// Polygon index within the multipolygon.
        polygon: usize,
    },
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
///
/// Handles both `Polygon` and `MultiPolygon` geometry types.
///
/// # Errors
///
/// Returns [`GeometryIssue::NotPolygonal`] for any other geometry type and
/// [`GeometryIssue::Unconvertible`] if the coordinates cannot be converted.
pub fn to_multipolygon(
    geometry: &geojson::Geometry,
) -> Result<MultiPolygon<f64>, GeometryIssue> {
    let geo_geom: geo::Geometry<f64> =
        geometry
            .clone()
            .try_into()
            .map_err(|e: geojson::Error| GeometryIssue::Unconvertible {
                message: e.to_string(),
            })?;

    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        _ => Err(GeometryIssue::NotPolygonal {
            kind: type_name(&geometry.value).to_string(),
        }),
    }
}

const fn type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Converts a [`MultiPolygon`] back into a `GeoJSON` geometry.
#[must_use]
pub fn to_geojson(boundary: &MultiPolygon<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(boundary))
}

/// Validates a ward boundary.
///
/// # Errors
///
/// Returns the first [`GeometryIssue`] found.
pub fn validate(boundary: &MultiPolygon<f64>) -> Result<(), GeometryIssue> {
    if boundary.0.is_empty() {
        return Err(GeometryIssue::Empty);
    }

    if let Some(coord) = boundary.coords_iter().find(|c| !in_wgs84_range(*c)) {
        return Err(GeometryIssue::CoordinateOutOfRange {
            x: coord.x,
            y: coord.y,
        });
    }

    boundary
        .check_validation()
        .map_err(GeometryIssue::Topology)?;

    for (polygon_idx, polygon) in boundary.0.iter().enumerate() {
        if polygon.unsigned_area() <= 0.0 {
            return Err(GeometryIssue::ZeroArea {
                polygon: polygon_idx,
            });
        }
    }

    Ok(())
}

fn in_wgs84_range(coord: Coord<f64>) -> bool {
    coord.x.is_finite()
        && coord.y.is_finite()
        && (-180.0..=180.0).contains(&coord.x)
        && (-90.0..=90.0).contains(&coord.y)
}

/// Computes the bounding box envelope for a [`MultiPolygon`].
#[must_use]
pub fn envelope(boundary: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    boundary.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use geo::algorithm::validation::{GeometryIndex, InvalidPolygon, RingRole};
    use geo::{LineString, Polygon};

    use super::*;

    pub fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        let ring = LineString::from(vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ]);
        MultiPolygon(vec![Polygon::new(ring, vec![])])
    }

    #[test]
    fn accepts_simple_square() {
        assert_eq!(validate(&square(83.2, 17.7, 0.01)), Ok(()));
    }

    #[test]
    fn rejects_bowtie() {
        let ring = LineString::from(vec![
            (0.0, 0.0),
            (1.0, 1.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (0.0, 0.0),
        ]);
        let mp = MultiPolygon(vec![Polygon::new(ring, vec![])]);
        assert_eq!(
            validate(&mp),
            Err(GeometryIssue::Topology(InvalidMultiPolygon::InvalidPolygon(
                GeometryIndex(0),
                InvalidPolygon::SelfIntersection(RingRole::Exterior)
            )))
        );
    }

    #[test]
    fn rejects_flat_ring() {
        let ring = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 0.0)]);
        let mp = MultiPolygon(vec![Polygon::new(ring, vec![])]);
        assert!(validate(&mp).is_err());
    }

    #[test]
    fn rejects_too_few_vertices() {
        let ring = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)]);
        let mp = MultiPolygon(vec![Polygon::new(ring, vec![])]);
        assert!(matches!(
            validate(&mp),
            Err(GeometryIssue::Topology(InvalidMultiPolygon::InvalidPolygon(
                _,
                InvalidPolygon::TooFewPointsInRing(RingRole::Exterior)
            )))
        ));
    }

    #[test]
    fn rejects_hole_crossing_exterior() {
        let exterior = LineString::from(vec![
            (83.0, 17.0),
            (83.01, 17.0),
            (83.01, 17.01),
            (83.0, 17.01),
            (83.0, 17.0),
        ]);
        let hole = LineString::from(vec![
            (83.005, 17.005),
            (83.02, 17.005),
            (83.02, 17.008),
            (83.005, 17.008),
            (83.005, 17.005),
        ]);
        let mp = MultiPolygon(vec![Polygon::new(exterior, vec![hole])]);
        assert!(matches!(
            validate(&mp),
            Err(GeometryIssue::Topology(InvalidMultiPolygon::InvalidPolygon(
                GeometryIndex(0),
                _
            )))
        ));
    }

    #[test]
    fn accepts_hole_inside_exterior() {
        let exterior = LineString::from(vec![
            (83.0, 17.0),
            (83.01, 17.0),
            (83.01, 17.01),
            (83.0, 17.01),
            (83.0, 17.0),
        ]);
        let hole = LineString::from(vec![
            (83.004, 17.004),
            (83.006, 17.004),
            (83.006, 17.006),
            (83.004, 17.006),
            (83.004, 17.004),
        ]);
        let mp = MultiPolygon(vec![Polygon::new(exterior, vec![hole])]);
        assert_eq!(validate(&mp), Ok(()));
    }

    #[test]
    fn rejects_overlapping_parts() {
        let mut mp = square(83.0, 17.0, 0.01);
        mp.0.extend(square(83.005, 17.005, 0.01).0);
        assert_eq!(
            validate(&mp),
            Err(GeometryIssue::Topology(InvalidMultiPolygon::ElementsOverlaps(
                GeometryIndex(0),
                GeometryIndex(1)
            )))
        );
    }

    #[test]
    fn accepts_disjoint_parts() {
        let mut mp = square(83.0, 17.0, 0.01);
        mp.0.extend(square(83.05, 17.05, 0.01).0);
        assert_eq!(validate(&mp), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(matches!(
            validate(&square(500_000.0, 1_900_000.0, 10.0)),
            Err(GeometryIssue::CoordinateOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_empty_multipolygon() {
        assert_eq!(validate(&MultiPolygon(vec![])), Err(GeometryIssue::Empty));
    }

    #[test]
    fn converts_geojson_polygon() {
        let geometry: geojson::Geometry = serde_json::from_str(
            r#"{
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
            }"#,
        )
        .unwrap();

        let mp = to_multipolygon(&geometry).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert!((mp.unsigned_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_point_geometry() {
        let geometry = geojson::Geometry::new(geojson::Value::Point(vec![1.0, 2.0]));
        assert!(matches!(
            to_multipolygon(&geometry),
            Err(GeometryIssue::NotPolygonal { .. })
        ));
    }
}
