//! Server configuration from environment variables.
//!
//! | Variable               | Default     |
//! |------------------------|-------------|
//! | `PHOTON_BASE_URL`      | (required)  |
//! | `ALLOWED_ORIGINS`      | `*`         |
//! | `BIND_ADDR`            | `127.0.0.1` |
//! | `PORT`                 | `8080`      |
//! | `UPSTREAM_TIMEOUT_MS`  | `15000`     |
//! | `UPSTREAM_CONCURRENCY` | `4`         |
//! | `GEOSEARCH_CATEGORIES` | built-in    |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
/// Default port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default deadline for one search, all upstream calls included.
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 15_000;
/// Default number of corridor sub-calls in flight.
pub const DEFAULT_UPSTREAM_CONCURRENCY: usize = 4;

/// Errors loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("Missing {name}")]
    Missing {
        /// Variable name.
        name: &'static str,
    },

    /// A variable is set to something unusable.
    #[error("Invalid {name}='{value}': {message}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// The value as set.
        value: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Origins allowed by CORS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin (`*`).
    Any,
    /// Only these exact origins.
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parses a comma-separated origin list. `*` anywhere in the list, or a
    /// list with no entries, allows any origin.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an entry is not an absolute URL.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let entries: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if entries.is_empty() || entries.contains(&"*") {
            return Ok(Self::Any);
        }

        entries
            .into_iter()
            .map(|origin| {
                reqwest::Url::parse(origin)
                    .map(|_| origin.trim_end_matches('/').to_string())
                    .map_err(|e| ConfigError::Invalid {
                        name: "ALLOWED_ORIGINS",
                        value: origin.to_string(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::List)
    }
}

/// Complete server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Photon instance base URL, with or without `/api`.
    pub photon_base_url: String,
    /// CORS origins.
    pub allowed_origins: AllowedOrigins,
    /// Address to bind to.
    pub bind_addr: String,
    /// Port to listen on.
    pub port: u16,
    /// Deadline for one search.
    pub upstream_timeout: Duration,
    /// Maximum corridor sub-calls in flight.
    pub upstream_concurrency: usize,
    /// Category table file replacing the built-in one.
    pub categories_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `PHOTON_BASE_URL` is missing or any
    /// variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through `lookup`, which returns a
    /// variable's value if set.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let photon_base_url = var("PHOTON_BASE_URL").ok_or(ConfigError::Missing {
            name: "PHOTON_BASE_URL",
        })?;

        let allowed_origins = var("ALLOWED_ORIGINS")
            .map_or(Ok(AllowedOrigins::Any), |v| AllowedOrigins::parse(&v))?;

        let timeout_ms: u64 = parse_var("UPSTREAM_TIMEOUT_MS", var("UPSTREAM_TIMEOUT_MS"))?
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "UPSTREAM_TIMEOUT_MS",
                value: "0".to_string(),
                message: "must be positive".to_string(),
            });
        }

        let upstream_concurrency: usize =
            parse_var("UPSTREAM_CONCURRENCY", var("UPSTREAM_CONCURRENCY"))?
                .unwrap_or(DEFAULT_UPSTREAM_CONCURRENCY)
                .max(1);

        Ok(Self {
            photon_base_url,
            allowed_origins,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            port: parse_var("PORT", var("PORT"))?.unwrap_or(DEFAULT_PORT),
            upstream_timeout: Duration::from_millis(timeout_ms),
            upstream_concurrency,
            categories_path: var("GEOSEARCH_CATEGORIES").map(PathBuf::from),
        })
    }
}

fn parse_var<T>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                message: e.to_string(),
                value: v,
            })
        })
        .transpose()
}
