//! Merging of feature collections from several upstream calls.

use std::collections::BTreeSet;

use serde_json::Value;

/// Identity of an upstream feature for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureKey {
    /// `properties.osm_type` + `properties.osm_id`.
    Osm {
        /// OSM element type (`N`, `W`, `R`, …).
        osm_type: String,
        /// OSM element id.
        osm_id: String,
    },
    /// The feature's own `id`.
    Id(String),
    /// The serialized `geometry` (or `null` when absent).
    Geometry(String),
}

/// Computes the identity key of a feature.
///
/// Uses `(osm_type, osm_id)` when both are present and non-empty, then the
/// feature `id`, then the serialized geometry. Features with none of these
/// all share one key.
#[must_use]
pub fn feature_key(feature: &Value) -> FeatureKey {
    let properties = feature.get("properties");
    let osm_type = properties.and_then(|p| p.get("osm_type")).filter(|v| truthy(v));
    let osm_id = properties.and_then(|p| p.get("osm_id")).filter(|v| truthy(v));

    if let (Some(osm_type), Some(osm_id)) = (osm_type, osm_id) {
        return FeatureKey::Osm {
            osm_type: key_string(osm_type),
            osm_id: key_string(osm_id),
        };
    }

    if let Some(id) = feature.get("id").filter(|v| !v.is_null()) {
        return FeatureKey::Id(key_string(id));
    }

    FeatureKey::Geometry(feature.get("geometry").unwrap_or(&Value::Null).to_string())
}

/// Drops features whose identity key was already seen, keeping the first
/// occurrence and the original order.
#[must_use]
pub fn dedup_features(features: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut seen = BTreeSet::new();
    features
        .into_iter()
        .filter(|feature| seen.insert(feature_key(feature)))
        .collect()
}

/// Concatenates the `features` of each body in order, de-duplicates them
/// and keeps at most `limit`, wrapped as a `FeatureCollection`.
///
/// A body without a `features` array contributes nothing.
#[must_use]
pub fn merge_feature_collections(bodies: impl IntoIterator<Item = Value>, limit: usize) -> Value {
    let collected = bodies.into_iter().flat_map(|mut body| {
        match body.get_mut("features").map(Value::take) {
            Some(Value::Array(features)) => features,
            _ => Vec::new(),
        }
    });

    let mut features = dedup_features(collected);
    features.truncate(limit);

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn key_string(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn osm(osm_type: &str, osm_id: i64, name: &str) -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [18.06, 59.33]},
            "properties": {"osm_type": osm_type, "osm_id": osm_id, "name": name},
        })
    }

    #[test]
    fn key_prefers_osm_identity() {
        assert_eq!(
            feature_key(&osm("N", 42, "a")),
            FeatureKey::Osm {
                osm_type: "N".to_string(),
                osm_id: "42".to_string()
            }
        );
    }

    #[test]
    fn key_falls_back_to_id_then_geometry() {
        let with_id = json!({"id": "abc", "properties": {"osm_type": "N"}});
        assert_eq!(feature_key(&with_id), FeatureKey::Id("abc".to_string()));

        let zero_id = json!({"id": 7, "properties": {"osm_type": "N", "osm_id": 0}});
        assert_eq!(feature_key(&zero_id), FeatureKey::Id("7".to_string()));

        let geometry_only = json!({"geometry": {"type": "Point", "coordinates": [1.0, 2.0]}});
        assert!(matches!(feature_key(&geometry_only), FeatureKey::Geometry(_)));
        assert_eq!(feature_key(&geometry_only), feature_key(&geometry_only.clone()));
    }

    #[test]
    fn duplicates_collapse_at_first_index() {
        let features = vec![
            osm("N", 1, "first"),
            osm("W", 2, "second"),
            osm("N", 1, "duplicate"),
            osm("N", 3, "third"),
            osm("W", 2, "duplicate"),
        ];

        let deduped = dedup_features(features);
        let names: Vec<&str> = deduped
            .iter()
            .map(|f| f["properties"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn same_id_different_type_is_distinct() {
        let deduped = dedup_features(vec![osm("N", 1, "node"), osm("W", 1, "way")]);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn merge_concatenates_dedups_and_truncates() {
        let bodies = vec![
            json!({"type": "FeatureCollection", "features": [osm("N", 1, "a"), osm("N", 2, "b")]}),
            json!({"type": "FeatureCollection"}),
            json!({"type": "FeatureCollection", "features": [osm("N", 2, "b2"), osm("N", 3, "c"), osm("N", 4, "d")]}),
        ];

        let merged = merge_feature_collections(bodies, 3);
        assert_eq!(merged["type"], "FeatureCollection");

        let names: Vec<&str> = merged["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["properties"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_with_zero_limit_is_empty() {
        let merged = merge_feature_collections(
            vec![json!({"features": [osm("N", 1, "a")]})],
            0,
        );
        assert_eq!(merged["features"], json!([]));
    }
}
