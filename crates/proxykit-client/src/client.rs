//! Entry point tying configuration, transport and registry together.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use proxykit_common::{Config, ProxyConnectionConfig, SessionTokenSource, UsageReport};

use crate::error::{ClientError, Result};
use crate::registry::CredentialRegistry;
use crate::transport::{HttpTransport, Transport};

const USAGE_PATH: &str = "usage";

/// Client for the ProxyKit management API.
///
/// # Examples
///
/// ```no_run
/// use proxykit_client::ProxyKitClient;
/// use proxykit_common::Config;
///
/// # async fn run() -> proxykit_client::Result<()> {
/// let client = ProxyKitClient::new(Config::new().with_api_token("pk_live_..."))?;
/// for proxy in client.credentials().create(2).await? {
///     println!("{}", proxy.username());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProxyKitClient {
    transport: Arc<HttpTransport>,
    registry: CredentialRegistry,
    config: Arc<Config>,
}

impl ProxyKitClient {
    /// Create a client from a validated configuration.
    ///
    /// No request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the configuration is
    /// invalid or carries no API token.
    pub fn new(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ClientError::ConfigurationError(format!("{e:#}")))?;

        let transport = Arc::new(HttpTransport::new(&config)?);
        let registry = CredentialRegistry::new(transport.clone(), config.proxy.clone());
        info!("ProxyKit client targeting {}", transport.base_url());

        Ok(Self {
            transport,
            registry,
            config: Arc::new(config),
        })
    }

    /// Load the configuration from a TOML file and create a client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the file cannot be read
    /// or parsed, and otherwise behaves like [`ProxyKitClient::new`].
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(path.as_ref())
            .map_err(|e| ClientError::ConfigurationError(format!("{e:#}")))?;
        Self::new(config)
    }

    /// Replace the session token source.
    ///
    /// This starts a fresh, empty credential cache.
    #[must_use]
    pub fn with_token_source(mut self, tokens: Arc<dyn SessionTokenSource>) -> Self {
        let transport: Arc<dyn Transport> = self.transport.clone();
        self.registry =
            CredentialRegistry::with_token_source(transport, self.config.proxy.clone(), tokens);
        self
    }

    /// Credential registry backed by this client.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialRegistry {
        &self.registry
    }

    /// Proxy gateway used for credential URLs.
    #[must_use]
    pub fn connection(&self) -> &ProxyConnectionConfig {
        &self.config.proxy
    }

    /// Configuration the client was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Traffic usage of the account for the current billing period.
    ///
    /// # Errors
    ///
    /// Propagates transport and remote failures.
    pub async fn usage(&self) -> Result<UsageReport> {
        let report: UsageReport = self.transport.get(USAGE_PATH).await?.into_data()?;
        debug!(
            "Usage: {} bytes in {} requests",
            report.bytes_used, report.requests
        );
        Ok(report)
    }
}
