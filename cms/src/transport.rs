use crate::config::CmsConfig;
use crate::provider::{CmsError, CmsResult};
use crate::query::{Method, RequestDescriptor};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

/// Outcome of a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResult {
    Success { status: u16, body: String },
    /// The backend answered with a non-2xx status.
    HttpError { status: u16, status_text: String },
    /// The backend was never reached, or the connection broke mid-response.
    NetworkError { cause: String },
}

impl RawResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RawResult::Success { .. })
    }
}

/// Executes request descriptors against a backend. One call is one
/// attempt; implementations do not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &RequestDescriptor) -> RawResult;

    fn base_url(&self) -> &str;
}

/// `reqwest`-backed transport carrying the base URL and optional bearer
/// token it was constructed with.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    authorization: Option<HeaderValue>,
}

impl HttpTransport {
    pub fn new(config: &CmsConfig) -> CmsResult<Self> {
        config
            .validate()
            .map_err(|msg| CmsError::InvalidConfig { message: msg })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CmsError::InvalidConfig {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let authorization = match &config.api_token {
            Some(token) => Some(
                HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                    CmsError::InvalidConfig {
                        message: "API token contains characters not allowed in a header"
                            .to_string(),
                    }
                })?,
            ),
            None => None,
        };

        Ok(Self {
            client,
            base_url: config.trimmed_base_url().to_string(),
            authorization,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.authorization.is_some()
    }

    /// Caller headers first, then the JSON content type and the bearer
    /// token, so neither default can be removed or replaced by the caller.
    pub fn build_headers(&self, extra: &[(String, String)]) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for (name, value) in extra {
            let parsed = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            );
            match parsed {
                (Ok(name), Ok(value)) => {
                    if name == CONTENT_TYPE {
                        debug!("Ignoring caller Content-Type override");
                        continue;
                    }
                    headers.append(name, value);
                }
                _ => warn!("Skipping invalid header: {}", name),
            }
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(value) = &self.authorization {
            headers.insert(AUTHORIZATION, value.clone());
        }

        headers
    }

    fn describe_error(err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("Request timeout: {}", err)
        } else if err.is_connect() {
            format!("Cannot connect to CMS: {}", err)
        } else {
            err.to_string()
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &RequestDescriptor) -> RawResult {
        let url = format!("{}{}", self.base_url, request.path);
        debug!("{} {} ({} params)", request.method, url, request.params.len());

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .headers(self.build_headers(&request.headers));

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} {} failed: {}", request.method, url, e);
                return RawResult::NetworkError {
                    cause: Self::describe_error(&e),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!("{} {} returned {}", request.method, url, status);
            return RawResult::HttpError {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            };
        }

        match response.text().await {
            Ok(body) => RawResult::Success {
                status: status.as_u16(),
                body,
            },
            Err(e) => RawResult::NetworkError {
                cause: Self::describe_error(&e),
            },
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// True when `url` starts with `scheme:` (RFC 3986: a letter followed by
/// letters, digits, `+`, `-` or `.`).
pub fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };

    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Absolute URLs come back unchanged; anything else is joined onto
/// `base_url` with exactly one `/` between them.
pub fn resolve_media_url(base_url: &str, url: &str) -> String {
    if has_scheme(url) {
        return url.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        format!("{}/{}", base, url)
    }
}
