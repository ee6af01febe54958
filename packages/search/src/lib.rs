#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry-aware search on top of a Photon instance.
//!
//! A request passes through these stages:
//!
//! 1. [`normalize`] merges query-string and JSON body fields into a
//!    [`CanonicalQuery`](geosearch_search_models::CanonicalQuery).
//! 2. [`dispatch::plan`] validates mode and geometry, producing a
//!    [`SearchPlan`](dispatch::SearchPlan). Point and rectangle plans carry a
//!    bounding box; polyline plans carry densified corridor samples.
//! 3. [`params::build_forward_params`] translates the query into Photon
//!    `/api` parameters, resolving categories through a
//!    [`CategoryTable`](categories::CategoryTable).
//! 4. [`search`] runs the plan through a
//!    [`PlaceSearchUpstream`](upstream::PlaceSearchUpstream). Corridor
//!    searches fan out one call per sample and merge the results with
//!    [`aggregate::merge_feature_collections`].

pub mod aggregate;
pub mod categories;
pub mod dispatch;
pub mod normalize;
pub mod params;
pub mod upstream;

mod execute;

pub use execute::{SearchContext, per_call_limit, search};

use geosearch_geometry::GeometryError;
use geosearch_search_models::SearchMode;
use thiserror::Error;

use crate::upstream::UpstreamError;

/// Errors produced while validating or running a search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// No `mode` given.
    #[error("Missing required `mode`. Use one of: autocomplete, point, rectangle, polyline.")]
    MissingMode,

    /// `mode` is not one of the supported modes.
    #[error(
        "Unsupported `mode` '{mode}'. Use one of: autocomplete, point, rectangle, polyline."
    )]
    UnsupportedMode {
        /// The mode as given.
        mode: String,
    },

    /// Autocomplete requests must not carry geometry.
    #[error("`geometryList` not allowed in 'autocomplete' mode.")]
    GeometryNotAllowed,

    /// Wrong number of geometry points for the mode.
    #[error("'{mode}' mode requires geometryList with {expected} [lat,lon] point(s), got {actual}.")]
    InvalidGeometryCardinality {
        /// The requested mode.
        mode: SearchMode,
        /// Human-readable expected count.
        expected: &'static str,
        /// Number of points given.
        actual: usize,
    },

    /// Point and polyline searches need a finite, positive radius.
    #[error("'{mode}' mode requires a positive `radius` (meters).")]
    MissingRadius {
        /// The requested mode.
        mode: SearchMode,
    },

    /// The two rectangle corners share a latitude or longitude.
    #[error(transparent)]
    DegenerateRectangle(#[from] GeometryError),

    /// A request field has the wrong type or shape.
    #[error("Invalid `{field}`: {message}")]
    InvalidField {
        /// Field name as sent by the client.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The upstream call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl SearchError {
    /// Whether this error was caused by the request itself rather than by
    /// the upstream or the gateway.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Upstream(_))
    }

    /// HTTP status code this error maps to.
    ///
    /// Request-shape errors are `400`. Upstream failures are `504` on
    /// timeout, `502` when unreachable and `500` otherwise.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Upstream(UpstreamError::Timeout { .. }) => 504,
            Self::Upstream(UpstreamError::Unreachable { .. }) => 502,
            Self::Upstream(UpstreamError::Http { .. } | UpstreamError::Parse { .. }) => 500,
            Self::MissingMode
            | Self::UnsupportedMode { .. }
            | Self::GeometryNotAllowed
            | Self::InvalidGeometryCardinality { .. }
            | Self::MissingRadius { .. }
            | Self::DegenerateRectangle(_)
            | Self::InvalidField { .. } => 400,
        }
    }
}
