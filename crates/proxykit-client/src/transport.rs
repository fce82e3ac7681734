//! Request transport for the credential API.
//!
//! The registry only needs four verbs over API-relative paths, each answered
//! by the tagged envelope `{ success, message?, data? }`. [`Transport`] is
//! that contract; [`HttpTransport`] fulfils it over HTTPS with bearer
//! authentication and retry middleware.
//!
//! # Status handling
//!
//! - 2xx: the body is parsed as an [`ApiResponse`]; an empty body counts as
//!   success without data
//! - 404: [`ClientError::NotFound`], so lookups can report absence
//! - other statuses: [`ClientError::RemoteRejection`] carrying the envelope's
//!   message, the raw body, or a generic description, in that order

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_retry_after::RetryAfterMiddleware;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use url::Url;

use proxykit_common::{Config, RetryConfig};

use crate::error::{ClientError, ErrorResponse, Result};

/// Tagged response envelope used by every endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the API considers the call successful.
    pub success: bool,
    /// Human-readable status or failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Endpoint-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    /// A successful envelope carrying `data`.
    #[must_use]
    pub const fn success(data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    /// A failed envelope carrying `message`.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Unwrap the payload of a successful envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RemoteRejection`] when `success` is false.
    pub fn into_result(self) -> Result<Option<serde_json::Value>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ClientError::rejection(None, self.message))
        }
    }

    /// Deserialize the payload of a successful envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RemoteRejection`] when `success` is false,
    /// [`ClientError::InvalidResponse`] when the payload is missing, and
    /// [`ClientError::SerializationError`] when it has the wrong shape.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        self.into_optional_data()?.ok_or_else(|| {
            ClientError::InvalidResponse("successful response carried no data".to_string())
        })
    }

    /// Deserialize the payload of a successful envelope, if there is one.
    ///
    /// # Errors
    ///
    /// Same as [`ApiResponse::into_data`], except a missing payload is `None`.
    pub fn into_optional_data<T: DeserializeOwned>(self) -> Result<Option<T>> {
        match self.into_result()? {
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

/// Request contract the registry relies on.
///
/// Paths are relative to the API base (`proxies`, `proxies/u1`). Failures
/// must surface as [`ClientError`]s; a 404-equivalent must be reported as
/// [`ClientError::NotFound`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET path`.
    async fn get(&self, path: &str) -> Result<ApiResponse>;

    /// `POST path` with a JSON body.
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse>;

    /// `PATCH path` with a JSON body.
    async fn patch(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse>;

    /// `DELETE path`.
    async fn delete(&self, path: &str) -> Result<ApiResponse>;
}

/// HTTP implementation of [`Transport`].
///
/// The underlying middleware client is created on first use and owned by
/// this instance; clones of an `Arc<HttpTransport>` share it.
pub struct HttpTransport {
    client: OnceCell<ClientWithMiddleware>,
    api_token: Arc<SecretString>,
    base_url: Url,
    timeout: Option<Duration>,
    user_agent: String,
    retry_config: RetryConfig,
}

// Custom Debug implementation to avoid exposing the API token
impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_token", &"[REDACTED]")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("initialized", &self.client.initialized())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the API token is missing
    /// or the base URL cannot be used as a base.
    pub fn new(config: &Config) -> Result<Self> {
        let api_token = config
            .api_token
            .clone()
            .ok_or_else(|| ClientError::ConfigurationError("API token is required".to_string()))?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid base URL '{}': {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::ConfigurationError(format!(
                "Base URL cannot carry paths: {base_url}"
            )));
        }

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("proxykit-client/{}", env!("CARGO_PKG_VERSION")));

        Ok(Self {
            client: OnceCell::new(),
            api_token: Arc::new(api_token),
            base_url,
            timeout: config.timeout_seconds.map(Duration::from_secs),
            user_agent,
            retry_config: config.retry_config.clone(),
        })
    }

    /// The API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API-relative path against the base URL.
    ///
    /// Each `/`-separated segment is percent-encoded on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the base URL cannot
    /// carry path segments.
    pub fn url(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ClientError::ConfigurationError(format!(
                    "Base URL cannot carry paths: {}",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    async fn client(&self) -> Result<&ClientWithMiddleware> {
        self.client
            .get_or_try_init(|| async { self.build_client() })
            .await
    }

    fn build_client(&self) -> Result<ClientWithMiddleware> {
        debug!("Initializing HTTP client for {}", self.base_url);

        let reqwest_client = match self.timeout {
            Some(timeout) => reqwest::Client::builder().timeout(timeout).build()?,
            None => reqwest::Client::builder().build()?,
        };

        let mut builder = reqwest_middleware::ClientBuilder::new(reqwest_client);
        if self.retry_config.max_retries > 0 {
            let max_delay = self
                .retry_config
                .max_delay
                .max(self.retry_config.initial_delay);
            let retry_policy = ExponentialBackoff::builder()
                .retry_bounds(self.retry_config.initial_delay, max_delay)
                .build_with_max_retries(self.retry_config.max_retries);

            // RetryAfterMiddleware goes first so Retry-After headers win over backoff
            builder = builder
                .with(RetryAfterMiddleware::new())
                .with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(builder.build())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(path)?;
        debug!("{method} {url}");

        let mut request = self
            .client()
            .await?
            .request(method.clone(), url.clone())
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.api_token.expose_secret()),
            )
            .header(USER_AGENT, &self.user_agent);

        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_string(body)?);
        }

        let response = request.send().await.map_err(from_middleware)?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            warn!("Failed to read response body from {url}: {e}");
            ClientError::NetworkError(e)
        })?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(ApiResponse::success(None));
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let message = extract_message(&text);

        if status == StatusCode::NOT_FOUND {
            debug!("{method} {url} returned 404");
            return Err(ClientError::NotFound(
                message.unwrap_or_else(|| path.to_string()),
            ));
        }

        error!(
            "{method} {url} failed with status {}: {}",
            status.as_u16(),
            message.as_deref().unwrap_or("<no message>")
        );
        Err(ClientError::rejection(Some(status.as_u16()), message))
    }
}

/// Pull a message out of an error body: the envelope's `message`, else the raw
/// text.
fn extract_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => parsed.message,
        Err(parse_err) => {
            debug!("Error body is not an envelope ({parse_err}); using raw text");
            Some(body.to_string())
        }
    }
}

/// Connection-level failures keep their `reqwest` error.
fn from_middleware(err: reqwest_middleware::Error) -> ClientError {
    match err {
        reqwest_middleware::Error::Reqwest(e) => ClientError::NetworkError(e),
        other => ClientError::MiddlewareError(other),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, None).await
    }
}
