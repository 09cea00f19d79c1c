//! Transport layer for bot API calls.
//!
//! Provides the [`Transport`] trait, which abstracts the HTTP stack away from
//! query execution, and [`ReqwestTransport`], the standard implementation.
//!
//! A transport reports connection-level failures as [`TransportError`] and
//! returns every HTTP response, whatever its status, as a [`ClientResponse`].
//! Classifying error statuses is the query's job.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{ClientError, ClientResult, TransportError};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://botapi.tamtam.chat";

/// Environment variable holding the bot access token.
pub const TOKEN_ENV: &str = "TAMTAM_TOKEN";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "TAMTAM_BASE_URL";

/// Query parameter carrying the access token.
const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Multipart field name expected by upload endpoints.
const UPLOAD_FIELD: &str = "data";

/// A streamed request body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// An API call described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Path relative to the configured base URL, e.g. `/messages`.
    pub path: String,
    /// Query-string parameters (the access token is added by the transport).
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
    /// Deadline for this request, overriding the transport default.
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// Value of the first query parameter named `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A multipart file upload to an absolute URL obtained from `POST /uploads`.
pub struct UploadRequest {
    pub url: String,
    pub file_name: String,
    /// File content; consumed exactly once.
    pub body: ByteStream,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("url", &self.url)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// Raw HTTP response: status, headers and the full body.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ClientResponse {
    /// A response with a JSON body and no headers.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from(body.to_string()),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Transport abstraction for bot API calls.
///
/// Implementations own connection-level concerns (pooling, TLS, multipart
/// encoding). They must be safe to call from many tasks at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform an API call.
    async fn send(&self, request: TransportRequest) -> Result<ClientResponse, TransportError>;

    /// Stream a file to an upload URL as multipart form data.
    async fn upload(&self, request: UploadRequest) -> Result<ClientResponse, TransportError>;
}

/// Configuration for [`ReqwestTransport`].
#[derive(Clone)]
pub struct TransportConfig {
    /// API endpoint. Defaults to [`DEFAULT_BASE_URL`].
    pub base_url: String,
    /// Bot access token, sent as the `access_token` query parameter.
    pub access_token: Option<String>,
    /// Default deadline of API calls. Defaults to 60 seconds.
    pub timeout: Duration,
    /// Deadline for establishing a connection. Defaults to 10 seconds.
    pub connect_timeout: Duration,
    /// Deadline of file uploads. Defaults to 10 minutes.
    pub upload_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Additional HTTP headers to include on every request.
    pub headers: HashMap<String, String>,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("upload_timeout", &self.upload_timeout)
            .field("user_agent", &self.user_agent)
            .field("headers", &self.headers)
            .finish()
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(600),
            user_agent: concat!("tamtam-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: HashMap::new(),
        }
    }
}

impl TransportConfig {
    /// Default configuration with the given access token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Read the token from `TAMTAM_TOKEN` and, optionally, the endpoint from
    /// `TAMTAM_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `TAMTAM_TOKEN` is unset or empty.
    pub fn from_env() -> ClientResult<Self> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ClientError::validation(format!("environment variable {TOKEN_ENV} is not set"))
            })?;

        let mut config = Self::with_token(token);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }
        Ok(config)
    }
}

/// HTTP transport using `reqwest`.
///
/// Sends API calls to `{base_url}{path}` with the access token appended as a
/// query parameter, and uploads as `multipart/form-data` with the file in the
/// `data` field.
///
/// # Example
///
/// ```no_run
/// use tamtam_rs::client::{ReqwestTransport, TransportConfig};
///
/// let transport = ReqwestTransport::new(TransportConfig::with_token("secret")).unwrap();
/// assert_eq!(transport.base_url(), "https://botapi.tamtam.chat");
/// ```
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Create a transport with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the HTTP client cannot be initialized
    /// (e.g. the TLS backend fails to load).
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                default_headers.insert(name, val);
            }
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(default_headers)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a transport around an existing `reqwest::Client`.
    ///
    /// Useful to share a connection pool or configure TLS externally. The
    /// client's own headers are used; `config.headers` is ignored.
    pub fn with_client(config: TransportConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// The API endpoint.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

async fn into_client_response(
    response: reqwest::Response,
) -> Result<ClientResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();
    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::io(format!("failed to read response body: {e}")))?;

    Ok(ClientResponse {
        status,
        headers,
        body,
    })
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<ClientResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), self.url(&request.path))
            .query(&request.query)
            .timeout(request.timeout.unwrap_or(self.config.timeout));

        if let Some(token) = &self.config.access_token {
            builder = builder.query(&[(ACCESS_TOKEN_PARAM, token)]);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        into_client_response(response).await
    }

    async fn upload(&self, request: UploadRequest) -> Result<ClientResponse, TransportError> {
        let part = reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(request.body))
            .file_name(request.file_name);
        let form = reqwest::multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&request.url)
            .multipart(form)
            .timeout(self.config.upload_timeout)
            .send()
            .await?;
        into_client_response(response).await
    }
}
