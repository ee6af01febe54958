//! Translation of a [`CanonicalQuery`] into Photon `/api` query parameters.

use geosearch_search_models::{CanonicalQuery, OsmTagSet};

use crate::categories::CategoryTable;

/// Search term used when nothing else in the request suggests one.
pub const FALLBACK_TERM: &str = "poi";

/// Ordered, multi-valued query parameters.
///
/// Mirrors the semantics of a URL search-params list: [`Self::set`]
/// replaces every occurrence of a key (keeping the first one's position),
/// [`Self::append`] adds another occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardParams {
    pairs: Vec<(String, String)>,
}

impl ForwardParams {
    /// Creates an empty parameter list.
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Sets `key` to a single `value`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut idx = 0;
                self.pairs.retain(|(k, _)| {
                    let keep = idx <= first || k != key;
                    idx += 1;
                    keep
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    /// Adds another `value` under `key`.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.pairs.push((key.to_string(), value.into()));
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// The first value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Iterates all pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Explicit `osmTags` win; otherwise the categories are looked up.
#[must_use]
pub fn resolve_osm_tags(query: &CanonicalQuery, categories: &CategoryTable) -> Option<OsmTagSet> {
    query
        .osm_tags
        .clone()
        .or_else(|| categories.resolve(&query.categories))
}

/// Picks the free-text term sent as `q`.
///
/// In order: non-blank `q`, non-blank `name`, the first category label
/// (lowercased), the first value (or else key) of the first tag mapping,
/// then [`FALLBACK_TERM`].
#[must_use]
pub fn pick_fallback_query(query: &CanonicalQuery, osm_tags: Option<&OsmTagSet>) -> String {
    let non_blank = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(q) = non_blank(&query.q) {
        return q;
    }
    if let Some(name) = non_blank(&query.name) {
        return name;
    }
    if let Some(category) = query
        .categories
        .first()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
    {
        return category;
    }
    if let Some(term) = osm_tags.and_then(OsmTagSet::first_term) {
        return term.to_string();
    }

    FALLBACK_TERM.to_string()
}

/// Builds the upstream parameters for `query`.
///
/// `limit_override` replaces the client's `limit`; corridor searches use it
/// to bound each sub-call without touching the query itself.
#[must_use]
pub fn build_forward_params(
    query: &CanonicalQuery,
    categories: &CategoryTable,
    limit_override: Option<u32>,
) -> ForwardParams {
    let osm_tags = resolve_osm_tags(query, categories);
    let mut params = ForwardParams::new();

    params.set("q", pick_fallback_query(query, osm_tags.as_ref()));

    if let Some(limit) = limit_override.or(query.limit) {
        params.set("limit", limit.to_string());
    }
    if let Some(lang) = &query.lang {
        params.set("lang", lang.as_str());
    }
    if let Some(lat) = query.lat {
        params.set("lat", lat.to_string());
    }
    if let Some(lon) = query.lon {
        params.set("lon", lon.to_string());
    }
    if let Some(bbox) = &query.bbox {
        params.set("bbox", bbox.as_str());
    }

    for (key, values) in [
        ("layer", &query.layer),
        ("osm_key", &query.osm_key),
        ("osm_value", &query.osm_value),
        ("osm_tag", &query.osm_tag),
    ] {
        for value in values {
            params.append(key, value.as_str());
        }
    }

    for tag in osm_tags.iter().flat_map(OsmTagSet::osm_tag_values) {
        params.append("osm_tag", tag);
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> CanonicalQuery {
        CanonicalQuery::default()
    }

    fn tags(pairs: &[(&str, &str)]) -> OsmTagSet {
        let mut set = OsmTagSet::new();
        for (k, v) in pairs {
            set.insert(k, v);
        }
        set
    }

    #[test]
    fn set_replaces_all_occurrences_in_place() {
        let mut params = ForwardParams::new();
        params.append("osm_tag", "a");
        params.append("q", "x");
        params.append("osm_tag", "b");
        params.set("osm_tag", "c");

        let pairs: Vec<(&str, &str)> = params.iter().collect();
        assert_eq!(pairs, vec![("osm_tag", "c"), ("q", "x")]);
    }

    #[test]
    fn fallback_prefers_trimmed_q() {
        let q = CanonicalQuery {
            q: Some("  kaffe  ".to_string()),
            name: Some("Vasamuseet".to_string()),
            categories: vec!["museum".to_string()],
            ..query()
        };
        assert_eq!(pick_fallback_query(&q, Some(&tags(&[("amenity", "bank")]))), "kaffe");
    }

    #[test]
    fn fallback_uses_name_when_q_blank() {
        let q = CanonicalQuery {
            q: Some("   ".to_string()),
            name: Some(" Vasamuseet ".to_string()),
            categories: vec!["museum".to_string()],
            ..query()
        };
        assert_eq!(pick_fallback_query(&q, None), "Vasamuseet");
    }

    #[test]
    fn fallback_uses_first_category_lowercased() {
        let q = CanonicalQuery {
            categories: vec![" Museum ".to_string(), "cafe".to_string()],
            ..query()
        };
        assert_eq!(
            pick_fallback_query(&q, Some(&tags(&[("amenity", "bank")]))),
            "museum"
        );
    }

    #[test]
    fn fallback_uses_first_tag_value_then_key() {
        let q = query();
        assert_eq!(
            pick_fallback_query(&q, Some(&tags(&[("amenity", "bank"), ("shop", "bakery")]))),
            "bank"
        );

        let mut key_only = OsmTagSet::new();
        key_only.insert_key("tourism");
        assert_eq!(pick_fallback_query(&q, Some(&key_only)), "tourism");
    }

    #[test]
    fn fallback_defaults_to_poi() {
        assert_eq!(pick_fallback_query(&query(), None), FALLBACK_TERM);

        let blank_category = CanonicalQuery {
            categories: vec!["  ".to_string()],
            ..query()
        };
        assert_eq!(pick_fallback_query(&blank_category, None), "poi");
    }

    #[test]
    fn builds_standard_and_passthrough_params() {
        let q = CanonicalQuery {
            q: Some("pizza".to_string()),
            limit: Some(7),
            lang: Some("sv".to_string()),
            lat: Some(59.33),
            lon: Some(18.0),
            bbox: Some("18,59,18.2,59.1".to_string()),
            layer: vec!["house".to_string(), "street".to_string()],
            osm_key: vec!["amenity".to_string()],
            osm_tag: vec!["!shop".to_string()],
            ..query()
        };

        let params = build_forward_params(&q, &CategoryTable::builtin(), None);
        assert_eq!(params.get("q"), Some("pizza"));
        assert_eq!(params.get("limit"), Some("7"));
        assert_eq!(params.get("lang"), Some("sv"));
        assert_eq!(params.get("lat"), Some("59.33"));
        assert_eq!(params.get("lon"), Some("18"));
        assert_eq!(params.get("bbox"), Some("18,59,18.2,59.1"));
        assert_eq!(params.get_all("layer"), vec!["house", "street"]);
        assert_eq!(params.get_all("osm_key"), vec!["amenity"]);
        assert_eq!(params.get_all("osm_tag"), vec!["!shop"]);
        assert!(!params.has("osm_value"));
    }

    #[test]
    fn categories_become_osm_tags() {
        let q = CanonicalQuery {
            categories: vec!["cafe".to_string(), "unknown".to_string(), "museum".to_string()],
            ..query()
        };

        let params = build_forward_params(&q, &CategoryTable::builtin(), None);
        assert_eq!(params.get("q"), Some("cafe"));
        assert_eq!(
            params.get_all("osm_tag"),
            vec!["amenity:cafe", "tourism:museum"]
        );
        assert!(!params.has("limit"));
    }

    #[test]
    fn explicit_osm_tags_override_categories() {
        let q = CanonicalQuery {
            name: Some(String::new()),
            categories: vec!["cafe".to_string()],
            osm_tags: Some(tags(&[("shop", "bakery")])),
            ..query()
        };

        let params = build_forward_params(&q, &CategoryTable::builtin(), None);
        assert_eq!(params.get_all("osm_tag"), vec!["shop:bakery"]);
        assert_eq!(params.get("q"), Some("cafe"));
    }

    #[test]
    fn limit_override_wins() {
        let q = CanonicalQuery {
            limit: Some(20),
            ..query()
        };
        let params = build_forward_params(&q, &CategoryTable::builtin(), Some(10));
        assert_eq!(params.get_all("limit"), vec!["10"]);
    }
}
