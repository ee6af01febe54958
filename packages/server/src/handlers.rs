//! HTTP handler functions for the geosearch API.

use actix_web::http::{Method, StatusCode, header};
use actix_web::{HttpRequest, HttpResponse, web};
use geosearch_search::SearchError;
use geosearch_search::normalize::normalize;
use geosearch_server_models::{ApiCategory, ApiError, ApiHealth};

use crate::{AppState, MAX_SEARCH_BODY_BYTES};

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/categories`
///
/// Lists the active category table.
pub async fn categories(state: web::Data<AppState>) -> HttpResponse {
    let categories: Vec<ApiCategory> = state
        .categories
        .iter()
        .map(|(label, tag)| ApiCategory {
            label: label.to_string(),
            key: tag.key.clone(),
            value: tag.value.clone(),
        })
        .collect();

    HttpResponse::Ok().json(categories)
}

/// `GET|POST /api/search`
///
/// Merges query-string and JSON body fields and runs the search.
pub async fn search(
    req: HttpRequest,
    body: Result<web::Bytes, actix_web::Error>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let body = match body {
        Ok(body) => body,
        Err(e) => return payload_error_response(&e),
    };

    let query_pairs = web::Query::<Vec<(String, String)>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_else(|e| {
            log::debug!("Ignoring malformed query string: {e}");
            Vec::new()
        });

    let json_body = if *req.method() != Method::GET && is_json(&req) {
        serde_json::from_slice(&body)
            .inspect_err(|e| log::debug!("Ignoring unparsable JSON body: {e}"))
            .ok()
    } else {
        None
    };

    let query = match normalize(&query_pairs, json_body) {
        Ok(query) => query,
        Err(e) => return error_response(&e, false),
    };

    match geosearch_search::search(&query, &state.search_context()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e, query.debug),
    }
}

/// `OPTIONS /api/search` without CORS preflight headers.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Any other method on `/api/search`.
pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::BadRequest().json(ApiError::message("Use GET or POST."))
}

fn is_json(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
}

fn payload_error_response(err: &actix_web::Error) -> HttpResponse {
    let status = err.as_response_error().status_code();
    log::debug!("Rejected search request body: {err}");

    let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        format!("Request body exceeds {MAX_SEARCH_BODY_BYTES} bytes.")
    } else {
        format!("Failed to read request body: {err}")
    };

    HttpResponse::build(status).json(ApiError::message(message))
}

fn error_response(err: &SearchError, debug: bool) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = match err {
        SearchError::Upstream(upstream) => {
            log::error!("Search failed upstream: {upstream}");
            ApiError {
                error: "Upstream error".to_string(),
                details: Some(upstream.to_string()),
                debug: debug.then(|| upstream.debug_payload()),
            }
        }
        _ => {
            log::debug!("Rejected search request: {err}");
            ApiError::message(err.to_string())
        }
    };

    HttpResponse::build(status).json(body)
}
