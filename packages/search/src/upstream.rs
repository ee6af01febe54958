//! Photon `/api` client.
//!
//! [`PlaceSearchUpstream`] is the seam between the executor and the
//! network: one call is one GET with a fully built parameter list.
//! [`PhotonClient`] is the `reqwest` implementation.
//!
//! See <https://github.com/komoot/photon#search-api>

use thiserror::Error;

use crate::params::ForwardParams;

/// Maximum length of the response body preview kept on HTTP errors.
const BODY_PREVIEW_LEN: usize = 500;

/// A decoded upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// The full URL that was requested.
    pub url: String,
    /// The JSON body, unmodified.
    pub body: serde_json::Value,
}

/// Failures talking to the upstream search engine.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Upstream answered with a non-2xx status.
    #[error("Photon /api error: {status}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
        /// Start of the response body.
        body_preview: String,
    },

    /// Upstream answered 2xx with a body that is not JSON.
    #[error("Photon /api returned malformed JSON: {message}")]
    Parse {
        /// Requested URL.
        url: String,
        /// Decoder error.
        message: String,
    },

    /// The call, or the whole search, ran past its deadline.
    #[error("Photon /api request timed out")]
    Timeout {
        /// Requested URL, when a single call timed out.
        url: Option<String>,
    },

    /// The request could not be sent or the response could not be read.
    #[error("Photon /api unreachable: {message}")]
    Unreachable {
        /// Requested URL.
        url: String,
        /// Transport error.
        message: String,
    },
}

/// Errors building a [`PhotonClient`].
#[derive(Debug, Error)]
pub enum PhotonClientError {
    /// The configured base URL cannot be parsed.
    #[error("Invalid Photon base URL '{base_url}': {message}")]
    InvalidBaseUrl {
        /// The configured value.
        base_url: String,
        /// Parser error.
        message: String,
    },
}

impl UpstreamError {
    /// The URL that was being requested, if known.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Http { url, .. } | Self::Parse { url, .. } | Self::Unreachable { url, .. } => {
                Some(url)
            }
            Self::Timeout { url } => url.as_deref(),
        }
    }

    /// Diagnostic payload embedded in error responses when the client
    /// asked for debug output.
    #[must_use]
    pub fn debug_payload(&self) -> serde_json::Value {
        let mut payload = serde_json::Map::new();
        if let Some(url) = self.url() {
            payload.insert("url".to_string(), url.into());
        }
        if let Self::Http { body_preview, .. } = self {
            payload.insert("body".to_string(), body_preview.as_str().into());
        }
        serde_json::Value::Object(payload)
    }
}

/// One upstream search call.
#[async_trait::async_trait]
pub trait PlaceSearchUpstream: Send + Sync {
    /// Issues a search with exactly these parameters.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] if the call fails, the status is not 2xx,
    /// or the body is not JSON.
    async fn search(&self, params: &ForwardParams) -> Result<UpstreamResponse, UpstreamError>;
}

/// Normalizes a configured base URL to the `/api` endpoint.
///
/// A trailing `/api` (any case, optional slash) and a trailing slash are
/// stripped before `/api` is appended, so `http://host:2322`,
/// `http://host:2322/` and `http://host:2322/API/` all map to
/// `http://host:2322/api`.
#[must_use]
pub fn photon_api_base(base_url: &str) -> String {
    let mut base = base_url.trim();
    let lower = base.to_ascii_lowercase();
    if lower.ends_with("/api/") {
        base = &base[..base.len() - "/api/".len()];
    } else if lower.ends_with("/api") {
        base = &base[..base.len() - "/api".len()];
    }
    let base = base.strip_suffix('/').unwrap_or(base);
    format!("{base}/api")
}

/// `reqwest`-backed Photon client.
#[derive(Debug, Clone)]
pub struct PhotonClient {
    client: reqwest::Client,
    api_base: reqwest::Url,
}

impl PhotonClient {
    /// Creates a client for the Photon instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PhotonClientError::InvalidBaseUrl`] if the normalized URL
    /// does not parse.
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, PhotonClientError> {
        let api_base = photon_api_base(base_url);
        let api_base =
            reqwest::Url::parse(&api_base).map_err(|e| PhotonClientError::InvalidBaseUrl {
                base_url: base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { client, api_base })
    }

    /// The `/api` endpoint requests are sent to.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_base.as_str()
    }

    /// The full request URL for `params`.
    #[must_use]
    pub fn request_url(&self, params: &ForwardParams) -> reqwest::Url {
        let mut url = self.api_base.clone();
        url.query_pairs_mut().extend_pairs(params.iter());
        url
    }
}

#[async_trait::async_trait]
impl PlaceSearchUpstream for PhotonClient {
    async fn search(&self, params: &ForwardParams) -> Result<UpstreamResponse, UpstreamError> {
        let url = self.request_url(params);
        let url_str = url.to_string();
        log::debug!("Photon request: {url_str}");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport(&url_str, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            log::warn!("Photon returned status {status} for {url_str}");
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                url: url_str,
                body_preview: text.chars().take(BODY_PREVIEW_LEN).collect(),
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| classify_transport(&url_str, &e))?;

        let body = parse_body(&url_str, &text)?;
        Ok(UpstreamResponse { url: url_str, body })
    }
}

fn classify_transport(url: &str, e: &reqwest::Error) -> UpstreamError {
    log::warn!("Photon request failed for {url}: {e}");
    if e.is_timeout() {
        UpstreamError::Timeout {
            url: Some(url.to_string()),
        }
    } else {
        UpstreamError::Unreachable {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

fn parse_body(url: &str, text: &str) -> Result<serde_json::Value, UpstreamError> {
    serde_json::from_str(text).map_err(|e| UpstreamError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })
}
