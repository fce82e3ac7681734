//! Caller-facing view of one credential.

use log::debug;
use serde::{Deserialize, Serialize};

use proxykit_common::{CredentialRecord, FeatureFlags, Protocol};

use crate::error::Result;
use crate::registry::CredentialRegistry;

/// Plain projection of a credential for display or export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialView {
    /// Composed username to present to the gateway.
    pub username: String,
    /// Password issued with the credential.
    pub password: String,
    /// Proxy gateway host.
    pub host: String,
    /// Gateway port for `http` proxy URLs.
    pub http_port: u16,
    /// Gateway port for `https` proxy URLs.
    pub https_port: u16,
    /// Sticky sessions enabled.
    pub sticky_enabled: bool,
    /// Smart routing enabled.
    pub smart_routing_enabled: bool,
}

/// One credential bound to the registry that issued it.
///
/// Feature toggles change the handle first and then push both flags to the
/// API through the registry. A failed push is returned as an error but the
/// handle keeps its new state, so the handle may disagree with the API until
/// the next successful toggle. The registry cache only follows confirmed
/// changes.
///
/// ```no_run
/// # async fn run(client: proxykit_client::ProxyKitClient) -> proxykit_client::Result<()> {
/// use proxykit_common::Protocol;
///
/// if let Some(mut proxy) = client.credentials().load_first().await? {
///     proxy.enable_sticky().await?.enable_smart_routing().await?;
///     println!("{}", proxy.to_url(Protocol::Https));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProxyHandle {
    record: CredentialRecord,
    registry: CredentialRegistry,
}

impl ProxyHandle {
    pub(crate) const fn new(record: CredentialRecord, registry: CredentialRegistry) -> Self {
        Self { record, registry }
    }

    /// Username with the suffixes for the current feature state.
    #[must_use]
    pub fn username(&self) -> String {
        self.record.composed_username()
    }

    /// Canonical username without suffixes.
    #[must_use]
    pub fn base_username(&self) -> &str {
        self.record.username()
    }

    /// Password issued with the credential.
    #[must_use]
    pub fn password(&self) -> &str {
        self.record.password()
    }

    /// Whether sticky sessions are enabled on this handle.
    #[must_use]
    pub const fn is_sticky(&self) -> bool {
        self.record.sticky_enabled()
    }

    /// Whether smart routing is enabled on this handle.
    #[must_use]
    pub const fn is_smart_routing(&self) -> bool {
        self.record.smart_routing_enabled()
    }

    /// Current session token, present only while sticky is enabled.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.record.session_token()
    }

    /// Both feature flags as last set on this handle.
    #[must_use]
    pub const fn features(&self) -> FeatureFlags {
        self.record.features()
    }

    /// The underlying record as last seen by this handle.
    #[must_use]
    pub const fn record(&self) -> &CredentialRecord {
        &self.record
    }

    /// Enable sticky sessions with a newly generated token.
    ///
    /// Calling this again while sticky is already on rotates the token.
    ///
    /// # Errors
    ///
    /// Returns the registry's error if the API rejects the change or cannot
    /// be reached. The handle keeps the new token either way.
    pub async fn enable_sticky(&mut self) -> Result<&mut Self> {
        let token = self.registry.next_token();
        self.record.enable_sticky(token.clone());
        self.sync(Some(token)).await
    }

    /// Disable sticky sessions and drop the token.
    ///
    /// # Errors
    ///
    /// See [`ProxyHandle::enable_sticky`].
    pub async fn disable_sticky(&mut self) -> Result<&mut Self> {
        self.record.disable_sticky();
        self.sync(None).await
    }

    /// Enable smart routing. The session token is kept.
    ///
    /// # Errors
    ///
    /// See [`ProxyHandle::enable_sticky`].
    pub async fn enable_smart_routing(&mut self) -> Result<&mut Self> {
        self.record.set_smart_routing(true);
        self.sync_current().await
    }

    /// Disable smart routing. The session token is kept.
    ///
    /// # Errors
    ///
    /// See [`ProxyHandle::enable_sticky`].
    pub async fn disable_smart_routing(&mut self) -> Result<&mut Self> {
        self.record.set_smart_routing(false);
        self.sync_current().await
    }

    async fn sync_current(&mut self) -> Result<&mut Self> {
        let token = self.record.session_token().map(ToString::to_string);
        self.sync(token).await
    }

    async fn sync(&mut self, token: Option<String>) -> Result<&mut Self> {
        debug!(
            "Syncing {} with {:?}",
            self.record.username(),
            self.record.features()
        );
        self.registry
            .sync(self.record.username(), self.record.features().into(), token)
            .await?;
        Ok(self)
    }

    /// Proxy URL with the composed username and password embedded.
    ///
    /// `http` uses the gateway's HTTP port and `https` its HTTPS port.
    #[must_use]
    pub fn to_url(&self, protocol: Protocol) -> String {
        let connection = self.registry.connection();
        format!(
            "{protocol}://{}:{}@{}:{}",
            self.username(),
            self.password(),
            connection.host,
            connection.port_for(protocol)
        )
    }

    /// A [`reqwest::Proxy`] routing all traffic through this credential.
    ///
    /// Credentials are attached as basic auth rather than embedded in the
    /// URL, so passwords need no escaping.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClientError::NetworkError`] if the gateway address is
    /// not a valid proxy URL.
    pub fn to_reqwest_proxy(&self, protocol: Protocol) -> Result<reqwest::Proxy> {
        let connection = self.registry.connection();
        let proxy = reqwest::Proxy::all(format!(
            "{protocol}://{}:{}",
            connection.host,
            connection.port_for(protocol)
        ))?;
        Ok(proxy.basic_auth(&self.username(), self.password()))
    }

    /// Delete this credential remotely and from the registry cache.
    ///
    /// # Errors
    ///
    /// Propagates the registry's error; the cache is untouched on failure.
    pub async fn delete(&self) -> Result<()> {
        self.registry.delete(self.record.username()).await
    }

    /// Snapshot of the credential and gateway settings.
    #[must_use]
    pub fn describe(&self) -> CredentialView {
        let connection = self.registry.connection();
        CredentialView {
            username: self.username(),
            password: self.password().to_string(),
            host: connection.host.clone(),
            http_port: connection.http_port,
            https_port: connection.https_port,
            sticky_enabled: self.is_sticky(),
            smart_routing_enabled: self.is_smart_routing(),
        }
    }
}
