#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Entry point for the geosearch gateway.

use std::path::PathBuf;

use clap::Parser;
use geosearch_server::config::{AllowedOrigins, ServerConfig};

#[derive(Parser)]
#[command(name = "geosearch_server", about = "Geometry-aware search gateway for Photon")]
struct Cli {
    /// Photon base URL (overrides `PHOTON_BASE_URL`)
    #[arg(long)]
    photon_base_url: Option<String>,
    /// Comma-separated CORS origins, or `*` (overrides `ALLOWED_ORIGINS`)
    #[arg(long)]
    allowed_origins: Option<String>,
    /// Address to bind to (overrides `BIND_ADDR`)
    #[arg(long)]
    bind_addr: Option<String>,
    /// Port to listen on (overrides `PORT`)
    #[arg(long)]
    port: Option<u16>,
    /// Deadline for one search in milliseconds (overrides `UPSTREAM_TIMEOUT_MS`)
    #[arg(long)]
    upstream_timeout_ms: Option<u64>,
    /// Maximum concurrent corridor sub-calls (overrides `UPSTREAM_CONCURRENCY`)
    #[arg(long)]
    upstream_concurrency: Option<usize>,
    /// Category table TOML file (overrides `GEOSEARCH_CATEGORIES`)
    #[arg(long)]
    categories: Option<PathBuf>,
}

impl Cli {
    /// Loads the environment, with flags taking precedence.
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let photon_base_url = self.photon_base_url;
        let mut config = ServerConfig::from_lookup(|name| match name {
            "PHOTON_BASE_URL" => photon_base_url
                .clone()
                .or_else(|| std::env::var(name).ok()),
            _ => std::env::var(name).ok(),
        })?;

        if let Some(origins) = self.allowed_origins {
            config.allowed_origins = AllowedOrigins::parse(&origins)?;
        }
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.upstream_timeout_ms.filter(|ms| *ms > 0) {
            config.upstream_timeout = std::time::Duration::from_millis(ms);
        }
        if let Some(concurrency) = self.upstream_concurrency {
            config.upstream_concurrency = concurrency.max(1);
        }
        if let Some(path) = self.categories {
            config.categories_path = Some(path);
        }

        Ok(config)
    }
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = Cli::parse().into_config()?;
    geosearch_server::run_server(config).await?;

    Ok(())
}
