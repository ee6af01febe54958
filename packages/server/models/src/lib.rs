#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API response types for the geosearch server.
//!
//! The search response itself lives in `geosearch_search_models`; these are
//! the surrounding envelopes served by the HTTP layer.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable message. `"Upstream error"` for upstream failures.
    pub error: String,
    /// Underlying upstream failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Attempted upstream URL and body preview, only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
}

impl ApiError {
    /// An error with only a message.
    #[must_use]
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            debug: None,
        }
    }
}

/// A category label and the OSM tag it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCategory {
    /// Category label as accepted in `categories`.
    pub label: String,
    /// OSM key (e.g. `amenity`).
    pub key: String,
    /// OSM value (e.g. `cafe`).
    pub value: String,
}
