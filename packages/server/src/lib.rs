#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web gateway in front of a Photon geocoder.
//!
//! Serves `/api/search`, which accepts autocomplete, point, rectangle and
//! polyline searches and translates them into Photon `/api` calls. The
//! category table and the upstream client are built once at startup and
//! shared read-only by every worker.

pub mod config;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use geosearch_search::SearchContext;
use geosearch_search::categories::{CategoryTable, CategoryTableError};
use geosearch_search::upstream::{PhotonClient, PhotonClientError, PlaceSearchUpstream};
use thiserror::Error;

use crate::config::{AllowedOrigins, ServerConfig};

/// Largest accepted `/api/search` request body, in bytes.
pub const MAX_SEARCH_BODY_BYTES: usize = 1024 * 1024;

/// Request headers clients may send cross-origin.
const CORS_ALLOWED_HEADERS: [&str; 4] = ["authorization", "x-client-info", "apikey", "content-type"];

/// Errors starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The category table file could not be loaded.
    #[error(transparent)]
    Categories(#[from] CategoryTableError),
    /// The Photon base URL is unusable.
    #[error(transparent)]
    PhotonClient(#[from] PhotonClientError),
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// Binding or serving failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared application state.
pub struct AppState {
    /// Upstream search engine.
    pub upstream: Arc<dyn PlaceSearchUpstream>,
    /// Category → OSM tag table.
    pub categories: Arc<CategoryTable>,
    /// Maximum corridor sub-calls in flight per request.
    pub concurrency: usize,
    /// Deadline for one search.
    pub deadline: Duration,
}

impl AppState {
    /// Borrows the state as a search context.
    #[must_use]
    pub fn search_context(&self) -> SearchContext<'_> {
        SearchContext {
            upstream: self.upstream.as_ref(),
            categories: self.categories.as_ref(),
            concurrency: self.concurrency,
            deadline: self.deadline,
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/categories", web::get().to(handlers::categories))
            .service(
                web::resource("/search")
                    .app_data(web::PayloadConfig::new(MAX_SEARCH_BODY_BYTES))
                    .route(web::get().to(handlers::search))
                    .route(web::post().to(handlers::search))
                    .route(web::method(actix_web::http::Method::OPTIONS).to(handlers::preflight))
                    .default_service(web::to(handlers::method_not_allowed)),
            ),
    );
}

/// Builds the CORS middleware for `origins`.
#[must_use]
pub fn cors(origins: &AllowedOrigins) -> Cors {
    match origins {
        AllowedOrigins::Any => Cors::permissive(),
        AllowedOrigins::List(list) => list
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(["GET", "POST", "OPTIONS"])
            .allowed_headers(CORS_ALLOWED_HEADERS)
            .max_age(3600),
    }
}

/// Loads the category table, builds the Photon client and serves HTTP
/// until shutdown.
///
/// The caller provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if the category file cannot be loaded, the
/// Photon base URL is invalid, or the server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let categories = match &config.categories_path {
        Some(path) => {
            log::info!("Loading category table from {}", path.display());
            CategoryTable::from_file(path)?
        }
        None => CategoryTable::builtin(),
    };
    log::info!("Loaded {} categories", categories.len());

    let client = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()?;
    let photon = PhotonClient::new(client, &config.photon_base_url)?;
    log::info!("Forwarding searches to {}", photon.api_base());

    let state = web::Data::new(AppState {
        upstream: Arc::new(photon),
        categories: Arc::new(categories),
        concurrency: config.upstream_concurrency,
        deadline: config.upstream_timeout,
    });

    match &config.allowed_origins {
        AllowedOrigins::Any => log::info!("CORS: any origin"),
        AllowedOrigins::List(list) => log::info!("CORS: {}", list.join(", ")),
    }
    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    let origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&origins))
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
