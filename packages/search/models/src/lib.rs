#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request and response types for the geo-search gateway.
//!
//! A [`CanonicalQuery`] is the single, typed view of one client request
//! after query-string and body fields have been merged. The mode is kept as
//! the raw (lowercased) string the client sent, since deciding whether it
//! is valid belongs to the dispatcher, not to the type.

use geosearch_geometry::LatLon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default total result limit for corridor searches.
pub const DEFAULT_POLYLINE_LIMIT: u32 = 20;

/// How a request's geometry is turned into upstream calls.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SearchMode {
    /// Free-text only, no geometry.
    Autocomplete,
    /// One point plus a radius.
    Point,
    /// Two opposite corners.
    Rectangle,
    /// A corridor of two or more points plus a radius.
    Polyline,
}

impl SearchMode {
    /// All modes, in the order they are listed to clients.
    pub const ALL: &[Self] = &[
        Self::Autocomplete,
        Self::Point,
        Self::Rectangle,
        Self::Polyline,
    ];

    /// The `source` label attached to responses for this mode.
    #[must_use]
    pub const fn source(self) -> ResponseSource {
        match self {
            Self::Autocomplete => ResponseSource::Forward,
            Self::Point | Self::Rectangle => ResponseSource::ForwardBbox,
            Self::Polyline => ResponseSource::ForwardBboxMulti,
        }
    }
}

/// Which upstream strategy produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
pub enum ResponseSource {
    /// A single unconstrained `/api` call.
    #[serde(rename = "photon-forward")]
    #[strum(serialize = "photon-forward")]
    Forward,
    /// A single `/api` call constrained by a bounding box.
    #[serde(rename = "photon-forward-bbox")]
    #[strum(serialize = "photon-forward-bbox")]
    ForwardBbox,
    /// Many bbox-constrained calls merged into one result.
    #[serde(rename = "photon-forward-bbox-multi")]
    #[strum(serialize = "photon-forward-bbox-multi")]
    ForwardBboxMulti,
}

/// OSM tag filters: key to ordered, de-duplicated values.
///
/// Keys keep their first-insertion order, which decides the fallback search
/// term and the order of the emitted `osm_tag` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsmTagSet {
    entries: Vec<(String, Vec<String>)>,
}

impl OsmTagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `key` without any value, if it is not present yet.
    pub fn insert_key(&mut self, key: &str) {
        if !self.entries.iter().any(|(k, _)| k == key) {
            self.entries.push((key.to_string(), Vec::new()));
        }
    }

    /// Adds `value` under `key`. Duplicate values are ignored.
    pub fn insert(&mut self, key: &str, value: &str) {
        if let Some((_, values)) = self.entries.iter_mut().find(|(k, _)| k == key) {
            if !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        } else {
            self.entries
                .push((key.to_string(), vec![value.to_string()]));
        }
    }

    /// Whether no key has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(key, values)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, values)| (k.as_str(), values.as_slice()))
    }

    /// Iterates the `key:value` pairs as sent in Photon's `osm_tag`
    /// parameter. Keys without values contribute nothing.
    pub fn osm_tag_values(&self) -> impl Iterator<Item = String> + '_ {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| format!("{k}:{v}")))
    }

    /// The first value of the first key, or else the first key itself.
    #[must_use]
    pub fn first_term(&self) -> Option<&str> {
        let (key, values) = self.entries.first()?;
        Some(values.first().map_or(key.as_str(), String::as_str))
    }
}

/// One client request after field merging and type coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalQuery {
    /// Free-text search term (`q`).
    pub q: Option<String>,
    /// Place name; used as the search term when `q` is blank.
    pub name: Option<String>,
    /// Requested result limit.
    pub limit: Option<u32>,
    /// Result language tag.
    pub lang: Option<String>,
    /// Explicit location bias latitude.
    pub lat: Option<f64>,
    /// Explicit location bias longitude.
    pub lon: Option<f64>,
    /// Raw bounding box string, forwarded as-is.
    pub bbox: Option<String>,
    /// Photon `layer` filters.
    pub layer: Vec<String>,
    /// Photon `osm_key` filters.
    pub osm_key: Vec<String>,
    /// Photon `osm_value` filters.
    pub osm_value: Vec<String>,
    /// Photon `osm_tag` filters, passed through verbatim.
    pub osm_tag: Vec<String>,
    /// Ordered geometry points; `None` when the client sent no list.
    pub geometry_list: Option<Vec<LatLon>>,
    /// Search radius in meters.
    pub radius: Option<f64>,
    /// Lowercased mode string, validated later.
    pub mode: Option<String>,
    /// Human category labels (e.g. `"cafe"`).
    pub categories: Vec<String>,
    /// Explicit OSM tag mapping; takes precedence over `categories`.
    pub osm_tags: Option<OsmTagSet>,
    /// Whether diagnostics are embedded in the response.
    pub debug: bool,
    /// Cap on corridor sample points.
    pub max_polyline_points: Option<usize>,
}

/// A successful search response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Which upstream strategy produced `data`.
    pub source: ResponseSource,
    /// The mode that was executed.
    pub mode: SearchMode,
    /// Diagnostics, present only when the client asked for them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
    /// The upstream feature collection.
    pub data: serde_json::Value,
}
