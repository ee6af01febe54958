//! Mode selection and geometry validation.
//!
//! [`plan`] turns a [`CanonicalQuery`] into a [`SearchPlan`] or rejects it.
//! No upstream call is issued for a rejected request.

use geosearch_geometry::{
    BoundingBox, DEFAULT_MAX_POLYLINE_POINTS, LatLon, densify_polyline_by_radius,
    rectangle_from_two_points,
};
use geosearch_search_models::{CanonicalQuery, SearchMode};

use crate::SearchError;

/// What the executor has to do for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPlan {
    /// Forward the free-text query only.
    Autocomplete,
    /// One call constrained to a box around `center`.
    Point {
        /// The search center.
        center: LatLon,
        /// Radius in meters.
        radius: f64,
    },
    /// One call constrained to `bbox`.
    Rectangle {
        /// The rectangle spanned by the two input corners.
        bbox: BoundingBox,
    },
    /// One call per densified sample point, merged afterwards.
    Polyline {
        /// Densified corridor samples, first and last input points included.
        samples: Vec<LatLon>,
        /// Radius in meters around each sample.
        radius: f64,
    },
}

impl SearchPlan {
    /// The mode this plan executes.
    #[must_use]
    pub const fn mode(&self) -> SearchMode {
        match self {
            Self::Autocomplete => SearchMode::Autocomplete,
            Self::Point { .. } => SearchMode::Point,
            Self::Rectangle { .. } => SearchMode::Rectangle,
            Self::Polyline { .. } => SearchMode::Polyline,
        }
    }
}

/// Validates the request's mode and geometry and produces a plan.
///
/// # Errors
///
/// * [`SearchError::MissingMode`] / [`SearchError::UnsupportedMode`]
/// * [`SearchError::GeometryNotAllowed`] for autocomplete with a geometry list
/// * [`SearchError::InvalidGeometryCardinality`] for the wrong point count
/// * [`SearchError::MissingRadius`] for point/polyline without a positive radius
/// * [`SearchError::DegenerateRectangle`] for a zero-area rectangle
pub fn plan(query: &CanonicalQuery) -> Result<SearchPlan, SearchError> {
    let raw = query
        .mode
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or(SearchError::MissingMode)?;

    let mode: SearchMode = raw.parse().map_err(|_| SearchError::UnsupportedMode {
        mode: raw.to_string(),
    })?;

    match mode {
        SearchMode::Autocomplete => {
            if query.geometry_list.is_some() {
                return Err(SearchError::GeometryNotAllowed);
            }
            Ok(SearchPlan::Autocomplete)
        }
        SearchMode::Point => {
            let [center] = points_exactly::<1>(query, mode)?;
            let radius = positive_radius(query, mode)?;
            Ok(SearchPlan::Point { center, radius })
        }
        SearchMode::Rectangle => {
            let [a, b] = points_exactly::<2>(query, mode)?;
            let bbox = rectangle_from_two_points(a, b)?;
            Ok(SearchPlan::Rectangle { bbox })
        }
        SearchMode::Polyline => {
            let points = query.geometry_list.as_deref().unwrap_or_default();
            if points.len() < 2 {
                return Err(SearchError::InvalidGeometryCardinality {
                    mode,
                    expected: "2 or more",
                    actual: points.len(),
                });
            }
            let radius = positive_radius(query, mode)?;
            let max_points = query
                .max_polyline_points
                .unwrap_or(DEFAULT_MAX_POLYLINE_POINTS);
            let samples = densify_polyline_by_radius(points, radius, max_points);

            log::debug!(
                "Densified corridor of {} points to {} samples (radius={radius}m, max={max_points})",
                points.len(),
                samples.len()
            );

            Ok(SearchPlan::Polyline { samples, radius })
        }
    }
}

fn points_exactly<const N: usize>(
    query: &CanonicalQuery,
    mode: SearchMode,
) -> Result<[LatLon; N], SearchError> {
    let points = query.geometry_list.as_deref().unwrap_or_default();
    <[LatLon; N]>::try_from(points).map_err(|_| SearchError::InvalidGeometryCardinality {
        mode,
        expected: if N == 1 { "exactly 1" } else { "exactly 2" },
        actual: points.len(),
    })
}

fn positive_radius(query: &CanonicalQuery, mode: SearchMode) -> Result<f64, SearchError> {
    query
        .radius
        .filter(|r| r.is_finite() && *r > 0.0)
        .ok_or(SearchError::MissingRadius { mode })
}

#[cfg(test)]
mod tests {
    use geosearch_geometry::GeometryError;

    use super::*;

    fn with_mode(mode: &str) -> CanonicalQuery {
        CanonicalQuery {
            mode: Some(mode.to_string()),
            ..CanonicalQuery::default()
        }
    }

    fn points(pairs: &[(f64, f64)]) -> Option<Vec<LatLon>> {
        Some(pairs.iter().map(|&(lat, lon)| LatLon::new(lat, lon)).collect())
    }

    #[test]
    fn missing_mode() {
        assert!(matches!(
            plan(&CanonicalQuery::default()),
            Err(SearchError::MissingMode)
        ));
        assert!(matches!(plan(&with_mode("  ")), Err(SearchError::MissingMode)));
    }

    #[test]
    fn unsupported_mode() {
        let err = plan(&with_mode("circle")).unwrap_err();
        assert!(matches!(err, SearchError::UnsupportedMode { ref mode } if mode == "circle"));
        assert!(err.is_client_error());
    }

    #[test]
    fn autocomplete_rejects_any_geometry_list() {
        assert_eq!(plan(&with_mode("autocomplete")).unwrap(), SearchPlan::Autocomplete);

        for geometry_list in [Some(Vec::new()), points(&[(59.0, 18.0)])] {
            let query = CanonicalQuery {
                geometry_list,
                ..with_mode("autocomplete")
            };
            assert!(matches!(plan(&query), Err(SearchError::GeometryNotAllowed)));
        }
    }

    #[test]
    fn point_requires_one_point_and_positive_radius() {
        let ok = CanonicalQuery {
            geometry_list: points(&[(59.33, 18.06)]),
            radius: Some(500.0),
            ..with_mode("point")
        };
        assert_eq!(
            plan(&ok).unwrap(),
            SearchPlan::Point {
                center: LatLon::new(59.33, 18.06),
                radius: 500.0
            }
        );

        let two_points = CanonicalQuery {
            geometry_list: points(&[(59.33, 18.06), (59.34, 18.07)]),
            ..ok.clone()
        };
        assert!(matches!(
            plan(&two_points),
            Err(SearchError::InvalidGeometryCardinality {
                mode: SearchMode::Point,
                actual: 2,
                ..
            })
        ));

        let no_geometry = CanonicalQuery {
            geometry_list: None,
            ..ok.clone()
        };
        assert!(matches!(
            plan(&no_geometry),
            Err(SearchError::InvalidGeometryCardinality { actual: 0, .. })
        ));

        for radius in [None, Some(0.0), Some(-1.0), Some(f64::NAN), Some(f64::INFINITY)] {
            let query = CanonicalQuery { radius, ..ok.clone() };
            assert!(
                matches!(plan(&query), Err(SearchError::MissingRadius { mode: SearchMode::Point })),
                "radius {radius:?} accepted"
            );
        }
    }

    #[test]
    fn rectangle_builds_normalized_box() {
        let query = CanonicalQuery {
            geometry_list: points(&[(59.1, 18.2), (59.0, 18.0)]),
            ..with_mode("rectangle")
        };
        assert_eq!(
            plan(&query).unwrap(),
            SearchPlan::Rectangle {
                bbox: BoundingBox::new(59.0, 18.0, 59.1, 18.2)
            }
        );
    }

    #[test]
    fn rectangle_rejects_bad_input() {
        let one_point = CanonicalQuery {
            geometry_list: points(&[(59.0, 18.0)]),
            ..with_mode("rectangle")
        };
        assert!(matches!(
            plan(&one_point),
            Err(SearchError::InvalidGeometryCardinality { .. })
        ));

        let flat = CanonicalQuery {
            geometry_list: points(&[(59.0, 18.0), (59.0, 18.2)]),
            ..with_mode("rectangle")
        };
        assert!(matches!(
            plan(&flat),
            Err(SearchError::DegenerateRectangle(
                GeometryError::DegenerateRectangle { .. }
            ))
        ));
    }

    #[test]
    fn rectangle_ignores_radius() {
        let query = CanonicalQuery {
            geometry_list: points(&[(59.0, 18.0), (59.1, 18.2)]),
            radius: Some(-10.0),
            ..with_mode("rectangle")
        };
        assert!(plan(&query).is_ok());
    }

    #[test]
    fn polyline_densifies_samples() {
        let query = CanonicalQuery {
            geometry_list: points(&[(0.0, 0.0), (0.01, 0.0)]),
            radius: Some(200.0),
            ..with_mode("polyline")
        };
        let SearchPlan::Polyline { samples, radius } = plan(&query).unwrap() else {
            panic!("expected a polyline plan");
        };
        assert_eq!(radius, 200.0);
        assert_eq!(samples.len(), 8);
        assert_eq!(samples[0], LatLon::new(0.0, 0.0));
        assert_eq!(samples[7], LatLon::new(0.01, 0.0));
    }

    #[test]
    fn polyline_honors_max_points() {
        let query = CanonicalQuery {
            geometry_list: points(&[(59.33, 18.06), (59.86, 17.64)]),
            radius: Some(100.0),
            max_polyline_points: Some(10),
            ..with_mode("polyline")
        };
        let SearchPlan::Polyline { samples, .. } = plan(&query).unwrap() else {
            panic!("expected a polyline plan");
        };
        assert!(samples.len() <= 10);
        assert_eq!(samples.last(), Some(&LatLon::new(59.86, 17.64)));
    }

    #[test]
    fn polyline_requires_two_points_and_radius() {
        let one_point = CanonicalQuery {
            geometry_list: points(&[(59.0, 18.0)]),
            radius: Some(200.0),
            ..with_mode("polyline")
        };
        assert!(matches!(
            plan(&one_point),
            Err(SearchError::InvalidGeometryCardinality {
                mode: SearchMode::Polyline,
                expected: "2 or more",
                actual: 1
            })
        ));

        let no_radius = CanonicalQuery {
            geometry_list: points(&[(59.0, 18.0), (59.1, 18.0)]),
            ..with_mode("polyline")
        };
        assert!(matches!(
            plan(&no_radius),
            Err(SearchError::MissingRadius {
                mode: SearchMode::Polyline
            })
        ));
    }
}
