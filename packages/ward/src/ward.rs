use geo::{Centroid, Contains, GeodesicArea, MultiPolygon, Point};
use urban_sim_ward_models::WardAttributes;

use crate::WardError;
use crate::geometry;

/// A single administrative ward.
///
/// Constructed only through [`Ward::new`], which validates the boundary.
/// There are no mutating methods: a ward changes only by rebuilding the
/// registry it belongs to.
#[derive(Debug, Clone)]
pub struct Ward {
    code: String,
    name: String,
    boundary: MultiPolygon<f64>,
    attributes: WardAttributes,
    area_sq_km: f64,
    centroid: Point<f64>,
}

impl Ward {
    /// Creates a ward after validating its boundary geometry.
    ///
    /// # Errors
    ///
    /// Returns [`WardError::InvalidGeometry`] if the boundary is degenerate
    /// or not a valid simple polygon.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        boundary: MultiPolygon<f64>,
        attributes: WardAttributes,
    ) -> Result<Self, WardError> {
        let code = code.into();

        if let Err(reason) = geometry::validate(&boundary) {
            return Err(WardError::InvalidGeometry { code, reason });
        }

        let Some(centroid) = boundary.centroid() else {
            return Err(WardError::InvalidGeometry {
                code,
                reason: geometry::GeometryIssue::Empty,
            });
        };

        let area_sq_km = boundary.geodesic_area_unsigned() / 1_000_000.0;

        Ok(Self {
            code,
            name: name.into(),
            boundary,
            attributes,
            area_sq_km,
            centroid,
        })
    }

    /// Stable ward code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human-readable ward name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Boundary polygon(s) in WGS84.
    #[must_use]
    pub const fn boundary(&self) -> &MultiPolygon<f64> {
        &self.boundary
    }

    /// Baseline attributes.
    #[must_use]
    pub const fn attributes(&self) -> &WardAttributes {
        &self.attributes
    }

    /// Geodesic area in square kilometres.
    #[must_use]
    pub const fn area_sq_km(&self) -> f64 {
        self.area_sq_km
    }

    /// Boundary centroid (longitude, latitude).
    #[must_use]
    pub const fn centroid(&self) -> Point<f64> {
        self.centroid
    }

    /// Whether the boundary contains the given point.
    #[must_use]
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        self.boundary.contains(&Point::new(lng, lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::square;

    #[test]
    fn derives_area_and_centroid() {
        let ward = Ward::new("W001", "One", square(83.0, 17.0, 0.01), WardAttributes::default())
            .unwrap();

        // 0.01° x 0.01° near 17°N is roughly 1.06 km x 1.11 km.
        assert!(ward.area_sq_km() > 1.0 && ward.area_sq_km() < 1.3);
        assert!((ward.centroid().x() - 83.005).abs() < 1e-9);
        assert!((ward.centroid().y() - 17.005).abs() < 1e-9);
        assert!(ward.contains(83.005, 17.005));
        assert!(!ward.contains(83.5, 17.005));
    }

    #[test]
    fn rejects_invalid_boundary() {
        let result = Ward::new(
            "W002",
            "Two",
            MultiPolygon(vec![]),
            WardAttributes::default(),
        );
        assert!(matches!(
            result,
            Err(WardError::InvalidGeometry { code, .. }) if code == "W002"
        ));
    }
}
