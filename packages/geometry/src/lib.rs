#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry primitives for translating search shapes into bounding boxes.
//!
//! Everything here is a pure function over WGS84 degrees:
//!
//! - [`bbox_around_point`]: square-ish box covering a radius around a point.
//! - [`rectangle_from_two_points`]: box spanned by two opposite corners.
//! - [`haversine_meters`]: great-circle distance, used for sample spacing.
//! - [`densify_polyline_by_radius`]: corridor sampling so that consecutive
//!   sample boxes overlap.
//!
//! The degree conversions are planar approximations. They degrade near the
//! poles and do not wrap across the antimeridian.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Default upper bound on the number of corridor sample points.
pub const DEFAULT_MAX_POLYLINE_POINTS: usize = 200;

/// Center-to-center sample spacing as a fraction of the search radius.
const SPACING_FACTOR: f64 = 0.9;

/// A WGS84 coordinate.
///
/// Serialized as a `[lat, lon]` pair, which is the shape clients use in
/// `geometryList`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl LatLon {
    /// Creates a coordinate from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<[f64; 2]> for LatLon {
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<LatLon> for [f64; 2] {
    fn from(p: LatLon) -> Self {
        [p.lat, p.lon]
    }
}

/// An axis-aligned latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Southern latitude boundary.
    pub min_lat: f64,
    /// Western longitude boundary.
    pub min_lon: f64,
    /// Northern latitude boundary.
    pub max_lat: f64,
    /// Eastern longitude boundary.
    pub max_lon: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Formats the box the way Photon's `bbox` parameter expects it:
    /// `minLon,minLat,maxLon,maxLat`.
    #[must_use]
    pub fn photon_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }

    /// Whether `point` lies strictly inside the box.
    #[must_use]
    pub fn contains_strictly(&self, point: LatLon) -> bool {
        self.min_lat < point.lat
            && point.lat < self.max_lat
            && self.min_lon < point.lon
            && point.lon < self.max_lon
    }
}

/// Errors from geometry construction.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    /// The two corners share a latitude or a longitude.
    #[error("Invalid rectangle: min < max must hold for lat & lon.")]
    DegenerateRectangle {
        /// The offending box after min/max normalization.
        bbox: BoundingBox,
    },
}

/// Builds a box extending `radius_meters` in every direction from `center`.
///
/// One degree of latitude is taken as [`METERS_PER_DEGREE`]; the longitude
/// delta is scaled by `cos(lat)`.
#[must_use]
pub fn bbox_around_point(center: LatLon, radius_meters: f64) -> BoundingBox {
    let d_lat = radius_meters / METERS_PER_DEGREE;
    let d_lon = radius_meters / (METERS_PER_DEGREE * center.lat.to_radians().cos());

    BoundingBox::new(
        center.lat - d_lat,
        center.lon - d_lon,
        center.lat + d_lat,
        center.lon + d_lon,
    )
}

/// Builds the box spanned by two opposite corners, in either order.
///
/// # Errors
///
/// Returns [`GeometryError::DegenerateRectangle`] if the corners share a
/// latitude or a longitude (or either is NaN).
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn rectangle_from_two_points(a: LatLon, b: LatLon) -> Result<BoundingBox, GeometryError> {
    let bbox = BoundingBox::new(
        a.lat.min(b.lat),
        a.lon.min(b.lon),
        a.lat.max(b.lat),
        a.lon.max(b.lon),
    );

    if !(bbox.min_lat < bbox.max_lat) || !(bbox.min_lon < bbox.max_lon) {
        return Err(GeometryError::DegenerateRectangle { bbox });
    }

    Ok(bbox)
}

/// Great-circle distance between two points in meters.
#[must_use]
pub fn haversine_meters(a: LatLon, b: LatLon) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Linear interpolation between `a` (t = 0) and `b` (t = 1) in degree space.
#[must_use]
pub fn interpolate(a: LatLon, b: LatLon, t: f64) -> LatLon {
    LatLon::new(a.lat + (b.lat - a.lat) * t, a.lon + (b.lon - a.lon) * t)
}

/// Inserts interpolated samples along a polyline so that boxes of
/// `radius_meters` centered on consecutive samples overlap.
///
/// Samples are spaced at most `0.9 * radius_meters` apart (never less than
/// one meter). Insertion stops early once the output reaches
/// `max_points - 1`; the final input point is always appended. If the result
/// is still longer than `max_points` it is thinned by a uniform stride,
/// keeping the first and last points.
///
/// A non-positive radius or fewer than two points returns the input as-is.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::neg_cmp_op_on_partial_ord
)]
pub fn densify_polyline_by_radius(
    points: &[LatLon],
    radius_meters: f64,
    max_points: usize,
) -> Vec<LatLon> {
    if !(radius_meters > 0.0) || points.len() < 2 {
        return points.to_vec();
    }
    let last = points[points.len() - 1];

    let max_points = max_points.max(2);
    let spacing = (radius_meters * SPACING_FACTOR).max(1.0);
    let mut out = Vec::with_capacity(points.len().min(max_points));

    'segments: for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        out.push(a);

        let distance = haversine_meters(a, b);
        let inserts = ((distance / spacing).ceil() - 1.0).max(0.0) as usize;

        for k in 1..=inserts {
            out.push(interpolate(a, b, k as f64 / (inserts + 1) as f64));
            if out.len() >= max_points - 1 {
                break 'segments;
            }
        }

        if out.len() >= max_points - 1 {
            break;
        }
    }

    out.push(last);

    if out.len() > max_points {
        return thin(&out, max_points);
    }

    out
}

/// Keeps every `ceil(len / max_points)`-th point, then forces the final
/// point to be the original last one.
fn thin(points: &[LatLon], max_points: usize) -> Vec<LatLon> {
    let stride = points.len().div_ceil(max_points);
    let last_idx = points.len() - 1;

    let mut thinned: Vec<LatLon> = points.iter().step_by(stride).copied().collect();

    if (thinned.len() - 1) * stride != last_idx {
        if thinned.len() >= max_points {
            thinned.pop();
        }
        thinned.push(points[last_idx]);
    }

    thinned
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOCKHOLM: LatLon = LatLon::new(59.33, 18.06);

    #[test]
    fn bbox_around_point_matches_degree_approximation() {
        let bbox = bbox_around_point(STOCKHOLM, 500.0);

        let d_lat = bbox.max_lat - STOCKHOLM.lat;
        assert!((d_lat - 0.004_492).abs() < 1e-6, "d_lat = {d_lat}");

        let d_lon = bbox.max_lon - STOCKHOLM.lon;
        let expected = 500.0 / (METERS_PER_DEGREE * 59.33_f64.to_radians().cos());
        assert!((d_lon - expected).abs() < 1e-12);
        assert!(d_lon > d_lat);

        assert!((STOCKHOLM.lat - bbox.min_lat - d_lat).abs() < 1e-12);
        assert!((STOCKHOLM.lon - bbox.min_lon - d_lon).abs() < 1e-12);
    }

    #[test]
    fn bbox_around_point_contains_center() {
        for &(lat, lon) in &[(0.0, 0.0), (59.33, 18.06), (-33.87, 151.21), (85.0, -179.0)] {
            for &radius in &[0.5, 1.0, 200.0, 50_000.0] {
                let center = LatLon::new(lat, lon);
                let bbox = bbox_around_point(center, radius);
                assert!(
                    bbox.contains_strictly(center),
                    "{center:?} not inside {bbox:?} for r={radius}"
                );
            }
        }
    }

    #[test]
    fn rectangle_from_two_points_normalizes_corners() {
        let expected = BoundingBox::new(59.0, 18.0, 59.1, 18.2);

        let bbox =
            rectangle_from_two_points(LatLon::new(59.0, 18.0), LatLon::new(59.1, 18.2)).unwrap();
        assert_eq!(bbox, expected);

        let swapped =
            rectangle_from_two_points(LatLon::new(59.1, 18.0), LatLon::new(59.0, 18.2)).unwrap();
        assert_eq!(swapped, expected);

        for bbox in [bbox, swapped] {
            assert!(bbox.min_lat < bbox.max_lat);
            assert!(bbox.min_lon < bbox.max_lon);
        }
    }

    #[test]
    fn rectangle_from_two_points_rejects_degenerate() {
        let same_lat = rectangle_from_two_points(LatLon::new(59.0, 18.0), LatLon::new(59.0, 18.2));
        assert!(matches!(
            same_lat,
            Err(GeometryError::DegenerateRectangle { .. })
        ));

        let same_lon = rectangle_from_two_points(LatLon::new(59.0, 18.0), LatLon::new(59.1, 18.0));
        assert!(same_lon.is_err());

        let nan = rectangle_from_two_points(LatLon::new(f64::NAN, 18.0), LatLon::new(59.1, 18.2));
        assert!(nan.is_err());
    }

    #[test]
    fn photon_param_is_lon_lat_ordered() {
        let bbox = BoundingBox::new(59.0, 18.0, 59.1, 18.2);
        assert_eq!(bbox.photon_param(), "18,59,18.2,59.1");
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        let d = haversine_meters(LatLon::new(0.0, 0.0), LatLon::new(1.0, 0.0));
        assert!((d - 111_194.9).abs() < 1.0, "d = {d}");
        assert!(haversine_meters(STOCKHOLM, STOCKHOLM).abs() < f64::EPSILON);
    }

    #[test]
    fn interpolate_midpoint() {
        let mid = interpolate(LatLon::new(59.0, 18.0), LatLon::new(60.0, 20.0), 0.5);
        assert_eq!(mid, LatLon::new(59.5, 19.0));
    }

    #[test]
    fn densify_keeps_short_segments_untouched() {
        let points = vec![LatLon::new(59.33, 18.06), LatLon::new(59.3301, 18.0601)];
        let out = densify_polyline_by_radius(&points, 500.0, DEFAULT_MAX_POLYLINE_POINTS);
        assert_eq!(out, points);
    }

    #[test]
    fn densify_inserts_uniform_samples() {
        // ~1113 m apart with 200 m radius: spacing 180 m -> ceil(6.18) - 1 = 6 inserts.
        let a = LatLon::new(0.0, 0.0);
        let b = LatLon::new(0.01, 0.0);
        let out = densify_polyline_by_radius(&[a, b], 200.0, DEFAULT_MAX_POLYLINE_POINTS);

        assert_eq!(out.len(), 8);
        assert_eq!(out[0], a);
        assert_eq!(out[7], b);
        for (i, p) in out.iter().enumerate() {
            let expected = 0.01 * i as f64 / 7.0;
            assert!((p.lat - expected).abs() < 1e-12);
        }
        for pair in out.windows(2) {
            assert!(haversine_meters(pair[0], pair[1]) <= 180.0);
        }
    }

    #[test]
    fn densify_respects_max_points_and_endpoints() {
        let route = vec![
            LatLon::new(59.33, 18.06),
            LatLon::new(59.86, 17.64),
            LatLon::new(60.67, 17.14),
            LatLon::new(59.33, 18.06),
            LatLon::new(57.70, 11.97),
        ];

        for max_points in [2, 3, 5, 10, 50, 200] {
            for radius in [10.0, 200.0, 5_000.0] {
                let out = densify_polyline_by_radius(&route, radius, max_points);
                assert!(
                    out.len() <= max_points,
                    "len {} > {max_points} (r={radius})",
                    out.len()
                );
                assert_eq!(out.first(), route.first());
                assert_eq!(out.last(), route.last());
            }
        }
    }

    #[test]
    fn densify_with_non_positive_radius_is_identity() {
        let route = vec![LatLon::new(0.0, 0.0), LatLon::new(1.0, 1.0)];
        assert_eq!(densify_polyline_by_radius(&route, 0.0, 200), route);
        assert_eq!(densify_polyline_by_radius(&route, -5.0, 200), route);
        assert_eq!(densify_polyline_by_radius(&route, f64::NAN, 200), route);
    }

    #[test]
    fn thin_keeps_first_and_last_within_budget() {
        let points: Vec<LatLon> = (0..8).map(|i| LatLon::new(f64::from(i), 0.0)).collect();

        let out = thin(&points, 4);
        assert!(out.len() <= 4);
        assert_eq!(out.first(), points.first());
        assert_eq!(out.last(), points.last());

        let out = thin(&points, 7);
        assert!(out.len() <= 7);
        assert_eq!(out.last(), points.last());
    }

    #[test]
    fn lat_lon_deserializes_from_pair() {
        let points: Vec<LatLon> = serde_json::from_str("[[59.0, 18], [59.1, 18.2]]").unwrap();
        assert_eq!(points, vec![LatLon::new(59.0, 18.0), LatLon::new(59.1, 18.2)]);

        assert!(serde_json::from_str::<LatLon>("[59.0]").is_err());
        assert!(serde_json::from_str::<LatLon>("[59.0, 18.0, 3.0]").is_err());
        assert!(serde_json::from_str::<LatLon>("[\"59\", 18.0]").is_err());
    }
}
