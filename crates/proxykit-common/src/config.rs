//! Client configuration.
//!
//! Configuration can be assembled with the `with_*` builder methods or read
//! from TOML:
//!
//! ```toml
//! base_url = "https://api.proxykit.io/v1"
//! api_token_env = "PROXYKIT_API_TOKEN"
//! timeout_seconds = 30
//!
//! [proxy]
//! host = "proxy.proxykit.io"
//! http_port = 8080
//! https_port = 8443
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.proxykit.io/v1";

/// Default proxy gateway host.
pub const DEFAULT_PROXY_HOST: &str = "proxy.proxykit.io";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Default plain HTTP proxy port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default HTTPS proxy port.
pub const DEFAULT_HTTPS_PORT: u16 = 8443;

/// Scheme used when formatting a proxy URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP proxying.
    #[default]
    Http,
    /// HTTPS proxying.
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

impl FromStr for Protocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            _ => anyhow::bail!("Unknown proxy protocol: {s}"),
        }
    }
}

/// Where the proxy gateway listens. Shared by every credential of a client.
///
/// # Examples
///
/// ```
/// use proxykit_common::ProxyConnectionConfig;
///
/// let connection = ProxyConnectionConfig::builder()
///     .host("proxy.example.io")
///     .http_port(8080)
///     .build();
/// assert_eq!(connection.https_port, 8443);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ProxyConnectionConfig {
    /// Gateway host name.
    #[builder(default = DEFAULT_PROXY_HOST.to_string(), setter(into))]
    #[serde(default = "default_proxy_host")]
    pub host: String,
    /// Port for `http://` proxy URLs.
    #[builder(default = DEFAULT_HTTP_PORT)]
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Port for `https://` proxy URLs.
    #[builder(default = DEFAULT_HTTPS_PORT)]
    #[serde(default = "default_https_port")]
    pub https_port: u16,
}

fn default_proxy_host() -> String {
    DEFAULT_PROXY_HOST.to_string()
}

const fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

const fn default_https_port() -> u16 {
    DEFAULT_HTTPS_PORT
}

impl Default for ProxyConnectionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ProxyConnectionConfig {
    /// Port matching `protocol`.
    #[must_use]
    pub const fn port_for(&self, protocol: Protocol) -> u16 {
        match protocol {
            Protocol::Http => self.http_port,
            Protocol::Https => self.https_port,
        }
    }
}

/// Exponential backoff settings for the HTTP transport.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts before failing.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
        }
    }
}

/// Configuration for a ProxyKit client.
///
/// # Security
///
/// The API token is a `SecretString` and is never serialized.
///
/// # Examples
///
/// ```
/// use proxykit_common::Config;
///
/// let config = Config::new()
///     .with_api_token("pk_live_...")
///     .with_timeout(10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API endpoint, e.g. `https://api.proxykit.io/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token for the API.
    #[serde(skip_serializing, default)]
    pub api_token: Option<SecretString>,
    /// Environment variable to read the token from when loading a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token_env: Option<String>,
    /// Request timeout in seconds. `None` disables the timeout.
    #[serde(default = "default_timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// Custom `User-Agent` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Retry behaviour of the HTTP transport.
    #[serde(skip)]
    pub retry_config: RetryConfig,
    /// Proxy gateway used when formatting credential URLs.
    #[serde(default)]
    pub proxy: ProxyConnectionConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[allow(clippy::unnecessary_wraps)]
const fn default_timeout() -> Option<u64> {
    Some(DEFAULT_TIMEOUT_SECONDS)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            api_token_env: None,
            timeout_seconds: default_timeout(),
            user_agent: None,
            retry_config: RetryConfig::default(),
            proxy: ProxyConnectionConfig::default(),
        }
    }
}

impl Config {
    /// Configuration with every default applied and no token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    ///
    /// When `api_token_env` is set and no token was supplied inline, the token
    /// is read from that environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML, if the named
    /// environment variable is unset, or if [`Config::validate`] fails.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(content)?;

        if config.api_token.is_none()
            && let Some(var) = config.api_token_env.as_deref()
        {
            let token = std::env::var(var).map_err(|_| {
                anyhow::anyhow!("Environment variable {var} is not set (api_token_env)")
            })?;
            config.api_token = Some(SecretString::new(token.into()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
        log::debug!("Loaded client configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the bearer token.
    ///
    /// The token is stored as a `SecretString`.
    #[must_use]
    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::new(api_token.into().into()));
        self
    }

    /// Sets the request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Removes the request timeout.
    #[must_use]
    pub const fn without_timeout(mut self) -> Self {
        self.timeout_seconds = None;
        self
    }

    /// Sets a custom `User-Agent`.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Sets the proxy gateway.
    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyConnectionConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `base_url` is not an absolute `http`/`https` URL
    /// - the proxy host is empty
    /// - either proxy port is zero
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid base URL '{}': {e}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Base URL must use http or https, got {}", url.scheme());
        }

        if self.proxy.host.trim().is_empty() {
            anyhow::bail!("Proxy host must not be empty");
        }

        if self.proxy.http_port == 0 || self.proxy.https_port == 0 {
            anyhow::bail!("Proxy ports must be non-zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.proxy.http_port, 8080);
        assert_eq!(config.proxy.https_port, 8443);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn protocol_parsing() {
        assert_eq!("http".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("HTTPS".parse::<Protocol>().unwrap(), Protocol::Https);
        assert!("socks5".parse::<Protocol>().is_err());
        assert_eq!(Protocol::default(), Protocol::Http);
        assert_eq!(Protocol::Https.to_string(), "https");
    }

    #[test]
    fn port_for_protocol() {
        let connection = ProxyConnectionConfig::builder()
            .host("proxy.example.io")
            .http_port(3128)
            .https_port(3129)
            .build();
        assert_eq!(connection.port_for(Protocol::Http), 3128);
        assert_eq!(connection.port_for(Protocol::Https), 3129);
    }

    #[test]
    fn toml_with_inline_sections() {
        let config = Config::from_toml_str(
            r#"
            base_url = "http://localhost:9000/api"
            timeout_seconds = 5

            [proxy]
            host = "proxy.example.io"
            http_port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:9000/api");
        assert_eq!(config.timeout_seconds, Some(5));
        assert_eq!(config.proxy.host, "proxy.example.io");
        assert_eq!(config.proxy.https_port, DEFAULT_HTTPS_PORT);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn toml_reads_token_from_env() {
        let Ok(expected) = std::env::var("PATH") else {
            return;
        };

        let config = Config::from_toml_str(r#"api_token_env = "PATH""#).unwrap();
        assert_eq!(config.api_token.as_ref().unwrap().expose_secret(), expected);
    }

    #[test]
    fn toml_missing_env_is_an_error() {
        let result = Config::from_toml_str(
            r#"api_token_env = "PROXYKIT_TEST_TOKEN_THAT_IS_NEVER_SET""#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn toml_rejects_bad_base_url() {
        assert!(Config::from_toml_str(r#"base_url = "not a url""#).is_err());
        assert!(Config::from_toml_str(r#"base_url = "ftp://example.com""#).is_err());
    }

    #[test]
    fn validate_rejects_empty_host_and_zero_ports() {
        let config = Config::new().with_proxy(
            ProxyConnectionConfig::builder().host("  ").build(),
        );
        assert!(config.validate().is_err());

        let config = Config::new().with_proxy(ProxyConnectionConfig::builder().http_port(0).build());
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_is_never_serialized() {
        let config = Config::new().with_api_token("pk_secret");
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("pk_secret"));
        assert!(!format!("{config:?}").contains("pk_secret"));
    }

    #[test]
    fn disabled_retry_has_no_attempts() {
        assert_eq!(RetryConfig::disabled().max_retries, 0);
    }

}

#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn port_validation(http in any::<u16>(), https in any::<u16>()) {
            let config = Config::new().with_proxy(
                ProxyConnectionConfig::builder().http_port(http).https_port(https).build(),
            );
            assert_eq!(config.validate().is_ok(), http != 0 && https != 0);
        }

        #[test]
        fn timeout_builder_preserves_value(timeout in any::<u64>()) {
            let config = Config::new().with_timeout(timeout);
            assert_eq!(config.timeout_seconds, Some(timeout));
        }
    }
}
