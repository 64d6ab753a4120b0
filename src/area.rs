//! Flat-earth ground area of a footprint.
//!
//! The planar area in square degrees is scaled by the square of a fixed
//! degrees-to-meters factor. This is an approximation, valid for building
//! sized outlines at mid latitudes. It deliberately ignores the shrinking of
//! a longitude degree away from the equator and does no geodesic or
//! projected-CRS computation.

use crate::footprint::Footprint;
use geo::{Area, MultiPolygon};

/// Meters per degree used for both axes.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Area of a planar geometry given in degrees, in square meters.
pub fn planar_area_m2(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area() * METERS_PER_DEGREE * METERS_PER_DEGREE
}

/// Area of an optional footprint. No footprint means zero.
pub fn estimate_area_m2(footprint: Option<&Footprint>) -> f64 {
    footprint.map_or(0.0, Footprint::area_m2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(side_deg: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 2.0, y: 48.0),
            (x: 2.0 + side_deg, y: 48.0),
            (x: 2.0 + side_deg, y: 48.0 + side_deg),
            (x: 2.0, y: 48.0 + side_deg),
            (x: 2.0, y: 48.0),
        ]])
    }

    #[test]
    fn test_hundred_meter_square() {
        let area = planar_area_m2(&square(100.0 / METERS_PER_DEGREE));
        assert!((area - 10_000.0).abs() < 1e-3, "area was {}", area);
    }

    #[test]
    fn test_none_is_zero() {
        assert_eq!(estimate_area_m2(None), 0.0);
    }

    #[test]
    fn test_idempotent() {
        let footprint = Footprint::from_geometry(square(0.001)).unwrap();
        let first = estimate_area_m2(Some(&footprint));
        let second = estimate_area_m2(Some(&footprint));
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(planar_area_m2(footprint.geometry()), first);
    }
}
