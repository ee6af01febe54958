//! Runs a [`SearchPlan`] against the upstream.

use std::time::Duration;

use futures::stream::{self, StreamExt as _, TryStreamExt as _};
use geosearch_geometry::{LatLon, bbox_around_point};
use geosearch_search_models::{CanonicalQuery, DEFAULT_POLYLINE_LIMIT, SearchMode, SearchResponse};

use crate::SearchError;
use crate::aggregate::merge_feature_collections;
use crate::categories::CategoryTable;
use crate::dispatch::{SearchPlan, plan};
use crate::params::{ForwardParams, build_forward_params};
use crate::upstream::{PlaceSearchUpstream, UpstreamError};

/// Everything a search needs besides the query itself.
pub struct SearchContext<'a> {
    /// Upstream engine.
    pub upstream: &'a dyn PlaceSearchUpstream,
    /// Category → tag table.
    pub categories: &'a CategoryTable,
    /// Maximum corridor sub-calls in flight at once.
    pub concurrency: usize,
    /// Deadline for the whole search, all sub-calls included.
    pub deadline: Duration,
}

/// Validates `query`, runs it within the context's deadline and returns
/// the response.
///
/// # Errors
///
/// Returns the dispatcher's validation error before any upstream call, or
/// the first upstream failure. Running past the deadline yields
/// [`UpstreamError::Timeout`] and abandons all outstanding calls.
pub async fn search(
    query: &CanonicalQuery,
    ctx: &SearchContext<'_>,
) -> Result<SearchResponse, SearchError> {
    let plan = plan(query)?;

    if let Ok(result) = tokio::time::timeout(ctx.deadline, execute(query, &plan, ctx)).await {
        result
    } else {
        log::warn!(
            "Search in {} mode exceeded deadline of {:?}",
            plan.mode(),
            ctx.deadline
        );
        Err(UpstreamError::Timeout { url: None }.into())
    }
}

async fn execute(
    query: &CanonicalQuery,
    plan: &SearchPlan,
    ctx: &SearchContext<'_>,
) -> Result<SearchResponse, SearchError> {
    match plan {
        SearchPlan::Autocomplete => {
            let params = build_forward_params(query, ctx.categories, None);
            forward_single(query, SearchMode::Autocomplete, &params, ctx).await
        }
        SearchPlan::Point { center, radius } => {
            let mut params = build_forward_params(query, ctx.categories, None);
            bias_towards(&mut params, *center);
            params.set("bbox", bbox_around_point(*center, *radius).photon_param());
            forward_single(query, SearchMode::Point, &params, ctx).await
        }
        SearchPlan::Rectangle { bbox } => {
            let mut params = build_forward_params(query, ctx.categories, None);
            params.set("bbox", bbox.photon_param());
            forward_single(query, SearchMode::Rectangle, &params, ctx).await
        }
        SearchPlan::Polyline { samples, radius } => {
            forward_corridor(query, samples, *radius, ctx).await
        }
    }
}

/// Per-sub-call limit for a corridor search with total `limit`.
#[must_use]
pub const fn per_call_limit(limit: u32) -> u32 {
    let half = limit.div_ceil(2);
    if half > 5 { half } else { 5 }
}

/// Sets `lat`/`lon` to `point` unless the client gave them explicitly.
fn bias_towards(params: &mut ForwardParams, point: LatLon) {
    if !params.has("lat") {
        params.set("lat", point.lat.to_string());
    }
    if !params.has("lon") {
        params.set("lon", point.lon.to_string());
    }
}

async fn forward_single(
    query: &CanonicalQuery,
    mode: SearchMode,
    params: &ForwardParams,
    ctx: &SearchContext<'_>,
) -> Result<SearchResponse, SearchError> {
    let response = ctx.upstream.search(params).await?;

    Ok(SearchResponse {
        source: mode.source(),
        mode,
        debug: query
            .debug
            .then(|| serde_json::json!({ "url": response.url })),
        data: response.body,
    })
}

/// Issues one bbox-constrained call per sample and merges the features.
///
/// Calls run concurrently but results are consumed in sample order, so the
/// first occurrence of a duplicate is always the one from the earliest
/// sample. The first failed call (in sample order) fails the search.
async fn forward_corridor(
    query: &CanonicalQuery,
    samples: &[LatLon],
    radius: f64,
    ctx: &SearchContext<'_>,
) -> Result<SearchResponse, SearchError> {
    let total_limit = query.limit.unwrap_or(DEFAULT_POLYLINE_LIMIT);
    let base = build_forward_params(query, ctx.categories, Some(per_call_limit(total_limit)));

    log::debug!(
        "Corridor search: {} samples, radius={radius}m, limit={total_limit}",
        samples.len()
    );

    let calls = samples.iter().enumerate().map(|(idx, &sample)| {
        let mut params = base.clone();
        bias_towards(&mut params, sample);
        params.set("bbox", bbox_around_point(sample, radius).photon_param());

        async move {
            ctx.upstream
                .search(&params)
                .await
                .map(|response| response.body)
                .inspect_err(|e| {
                    log::warn!(
                        "Corridor sample {idx} ({}, {}) failed: {e}",
                        sample.lat,
                        sample.lon
                    );
                })
        }
    });

    let bodies: Vec<serde_json::Value> = stream::iter(calls)
        .buffered(ctx.concurrency.max(1))
        .try_collect()
        .await?;

    let data = merge_feature_collections(bodies, total_limit as usize);

    Ok(SearchResponse {
        source: SearchMode::Polyline.source(),
        mode: SearchMode::Polyline,
        debug: query.debug.then(|| {
            serde_json::json!({
                "note": format!(
                    "per-point /api with auto densify (radius={radius}m, points={})",
                    samples.len()
                ),
            })
        }),
        data,
    })
}
