//! Merging of query-string and body fields into a [`CanonicalQuery`].
//!
//! Precedence, lowest to highest:
//!
//! 1. Query-string pairs. A key that repeats becomes a JSON array of its
//!    values in order.
//! 2. Top-level fields of a JSON object body. A body field replaces the
//!    query field of the same name entirely.
//! 3. Aliases from [`FIELD_ALIASES`] fill a canonical field that is still
//!    missing or blank.
//!
//! After merging, `mode` is lowercased. [`canonical_query`] then coerces the
//! untyped map into typed fields; it does not check whether the mode or
//! geometry make sense, which is the dispatcher's job.

use geosearch_geometry::LatLon;
use geosearch_search_models::{CanonicalQuery, OsmTagSet};
use serde_json::Value;

use crate::SearchError;

/// Untyped request fields after merging.
pub type FieldMap = serde_json::Map<String, Value>;

/// `(alias, canonical)` pairs. The alias is copied into the canonical field
/// when the canonical field is absent or blank; the alias itself is kept.
pub const FIELD_ALIASES: &[(&str, &str)] = &[("name", "q")];

/// Merges query-string pairs and an optional JSON body into one map.
///
/// A body that is not a JSON object is ignored.
#[must_use]
pub fn merge_fields(query_pairs: &[(String, String)], body: Option<Value>) -> FieldMap {
    let mut merged = FieldMap::new();

    for (key, value) in query_pairs {
        let value = Value::String(value.clone());
        match merged.get_mut(key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                merged.insert(key.clone(), value);
            }
        }
    }

    if let Some(Value::Object(body)) = body {
        for (key, value) in body {
            merged.insert(key, value);
        }
    }

    for &(alias, canonical) in FIELD_ALIASES {
        let canonical_blank = merged.get(canonical).is_none_or(is_blank);
        if canonical_blank {
            if let Some(value) = merged.get(alias).filter(|v| !is_blank(v)).cloned() {
                merged.insert(canonical.to_string(), value);
            }
        }
    }

    if let Some(mode) = merged.get_mut("mode") {
        lowercase_in_place(mode);
    }

    merged
}

/// Merges the two field sources and coerces them into a [`CanonicalQuery`].
///
/// # Errors
///
/// Returns [`SearchError::InvalidField`] if a field has the wrong type.
pub fn normalize(
    query_pairs: &[(String, String)],
    body: Option<Value>,
) -> Result<CanonicalQuery, SearchError> {
    canonical_query(&merge_fields(query_pairs, body))
}

/// Coerces merged fields into typed values.
///
/// Numbers may be JSON numbers or numeric strings, booleans may be JSON
/// booleans or `true`/`false`/`1`/`0`/`yes`/`no`, and list fields accept an
/// array, a single string, or repeated query keys. `geometryList` and
/// `osmTags` may also arrive as JSON-encoded strings (the only way to send
/// them in a query string). A scalar field sent as a list takes its last
/// value.
///
/// # Errors
///
/// Returns [`SearchError::InvalidField`] naming the first field that cannot
/// be coerced.
pub fn canonical_query(fields: &FieldMap) -> Result<CanonicalQuery, SearchError> {
    Ok(CanonicalQuery {
        q: string_field(fields, "q")?,
        name: string_field(fields, "name")?,
        limit: u32_field(fields, "limit")?,
        lang: string_field(fields, "lang")?,
        lat: f64_field(fields, "lat")?,
        lon: f64_field(fields, "lon")?,
        bbox: string_field(fields, "bbox")?,
        layer: list_field(fields, "layer")?,
        osm_key: list_field(fields, "osm_key")?,
        osm_value: list_field(fields, "osm_value")?,
        osm_tag: list_field(fields, "osm_tag")?,
        geometry_list: geometry_field(fields)?,
        radius: f64_field(fields, "radius")?,
        mode: string_field(fields, "mode")?.map(|m| m.trim().to_lowercase()),
        categories: categories_field(fields)?,
        osm_tags: osm_tags_field(fields)?,
        debug: bool_field(fields, "debug")?.unwrap_or(false),
        max_polyline_points: usize_field(fields, "maxPolylinePoints")?,
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn lowercase_in_place(value: &mut Value) {
    match value {
        Value::String(s) => *s = s.to_lowercase(),
        Value::Array(values) => values.iter_mut().for_each(lowercase_in_place),
        _ => {}
    }
}

fn invalid(field: &'static str, message: &str) -> SearchError {
    SearchError::InvalidField {
        field,
        message: message.to_string(),
    }
}

/// The field's value, with `null` treated as absent and a list reduced to
/// its last non-null element.
fn scalar<'a>(fields: &'a FieldMap, key: &str) -> Option<&'a Value> {
    match fields.get(key)? {
        Value::Null => None,
        Value::Array(values) => values.iter().rev().find(|v| !v.is_null()),
        value => Some(value),
    }
}

fn string_field(fields: &FieldMap, key: &'static str) -> Result<Option<String>, SearchError> {
    match scalar(fields, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
        Some(_) => Err(invalid(key, "expected a string")),
    }
}

fn f64_field(fields: &FieldMap, key: &'static str) -> Result<Option<f64>, SearchError> {
    match scalar(fields, key) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a number")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(key, "expected a number")),
        Some(_) => Err(invalid(key, "expected a number")),
    }
}

fn u64_field(fields: &FieldMap, key: &'static str) -> Result<Option<u64>, SearchError> {
    const MESSAGE: &str = "expected a non-negative integer";
    match scalar(fields, key) {
        None => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| invalid(key, MESSAGE)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| invalid(key, MESSAGE)),
        Some(_) => Err(invalid(key, MESSAGE)),
    }
}

fn u32_field(fields: &FieldMap, key: &'static str) -> Result<Option<u32>, SearchError> {
    u64_field(fields, key)?
        .map(|n| u32::try_from(n).map_err(|_| invalid(key, "value is too large")))
        .transpose()
}

fn usize_field(fields: &FieldMap, key: &'static str) -> Result<Option<usize>, SearchError> {
    u64_field(fields, key)?
        .map(|n| usize::try_from(n).map_err(|_| invalid(key, "value is too large")))
        .transpose()
}

fn bool_field(fields: &FieldMap, key: &'static str) -> Result<Option<bool>, SearchError> {
    const MESSAGE: &str = "expected a boolean";
    match scalar(fields, key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::Number(n)) => Ok(Some(n.as_f64().is_some_and(|v| v != 0.0))),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(invalid(key, MESSAGE)),
        },
        Some(_) => Err(invalid(key, MESSAGE)),
    }
}

fn list_field(fields: &FieldMap, key: &'static str) -> Result<Vec<String>, SearchError> {
    const MESSAGE: &str = "expected a string or a list of strings";
    match fields.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                Value::Number(_) | Value::Bool(_) => Ok(v.to_string()),
                _ => Err(invalid(key, MESSAGE)),
            })
            .collect(),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(vec![v.to_string()]),
        Some(Value::Object(_)) => Err(invalid(key, MESSAGE)),
    }
}

/// Categories additionally accept a comma-separated string.
fn categories_field(fields: &FieldMap) -> Result<Vec<String>, SearchError> {
    Ok(list_field(fields, "categories")?
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::to_string)
        .collect())
}

fn geometry_field(fields: &FieldMap) -> Result<Option<Vec<LatLon>>, SearchError> {
    const FIELD: &str = "geometryList";
    const MESSAGE: &str = "expected a list of [lat, lon] number pairs";

    let parsed = match fields.get(FIELD) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => serde_json::from_str::<Vec<LatLon>>(s),
        Some(value) => serde_json::from_value::<Vec<LatLon>>(value.clone()),
    };

    parsed.map(Some).map_err(|_| invalid(FIELD, MESSAGE))
}

fn osm_tags_field(fields: &FieldMap) -> Result<Option<OsmTagSet>, SearchError> {
    const FIELD: &str = "osmTags";
    const MESSAGE: &str = "expected an object mapping OSM keys to a value or list of values";

    let decoded;
    let object = match fields.get(FIELD) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(object)) => object,
        Some(Value::String(s)) => {
            decoded = serde_json::from_str::<Value>(s).map_err(|_| invalid(FIELD, MESSAGE))?;
            decoded.as_object().ok_or_else(|| invalid(FIELD, MESSAGE))?
        }
        Some(_) => return Err(invalid(FIELD, MESSAGE)),
    };

    let mut tags = OsmTagSet::new();
    for (key, values) in object {
        match values {
            Value::Null => tags.insert_key(key),
            Value::String(value) => tags.insert(key, value),
            Value::Array(values) if values.is_empty() => tags.insert_key(key),
            Value::Array(values) => {
                for value in values {
                    match value {
                        Value::String(value) => tags.insert(key, value),
                        Value::Number(_) | Value::Bool(_) => tags.insert(key, &value.to_string()),
                        _ => return Err(invalid(FIELD, MESSAGE)),
                    }
                }
            }
            _ => return Err(invalid(FIELD, MESSAGE)),
        }
    }

    Ok((!tags.is_empty()).then_some(tags))
}
