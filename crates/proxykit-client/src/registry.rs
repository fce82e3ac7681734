//! Local credential cache kept coherent with the API.
//!
//! The registry is the only place that talks to the [`Transport`]. Every
//! operation canonicalizes the username it is given, so decorated names
//! (`u1-session-AbC123xy-routing-smart`) and plain names address the same
//! cache entry.
//!
//! # Cache policy
//!
//! - The cache is filled by [`CredentialRegistry::load_first`],
//!   [`CredentialRegistry::find`], [`CredentialRegistry::create`] and
//!   [`CredentialRegistry::refresh`].
//! - [`CredentialRegistry::all`] only reports what is cached and never calls
//!   the API. Use [`CredentialRegistry::refresh`] to load the remote list.
//! - Entries change only after the API confirms success. The one exception is
//!   a [`ProxyHandle`] toggle, which updates the handle before syncing.
//! - Flags written by [`CredentialRegistry::update`] are the ones the API
//!   echoes back, not the ones requested.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::RwLock;

use proxykit_common::{
    CreateProxiesRequest, CredentialRecord, FeatureUpdate, ProxyConnectionConfig, ProxyOptions,
    ProxyRecord, RandomTokenSource, SessionTokenSource, UpdateProxyEcho, UpdateProxyRequest,
    username,
};

use crate::error::{ClientError, Result};
use crate::handle::ProxyHandle;
use crate::transport::Transport;

/// Largest number of credentials a single [`CredentialRegistry::create`] call
/// may request.
pub const MAX_CREATE_COUNT: usize = 100;

const PROXIES_PATH: &str = "proxies";

/// Owner of the local credential cache.
///
/// Cloning is cheap; clones share the cache and the transport.
#[derive(Clone)]
pub struct CredentialRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    transport: Arc<dyn Transport>,
    connection: ProxyConnectionConfig,
    tokens: Arc<dyn SessionTokenSource>,
    cache: RwLock<Vec<CredentialRecord>>,
}

impl std::fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRegistry")
            .field("connection", &self.inner.connection)
            .finish_non_exhaustive()
    }
}

impl CredentialRegistry {
    /// Create an empty registry using random session tokens.
    pub fn new(transport: Arc<dyn Transport>, connection: ProxyConnectionConfig) -> Self {
        Self::with_token_source(transport, connection, Arc::new(RandomTokenSource))
    }

    /// Create an empty registry drawing session tokens from `tokens`.
    pub fn with_token_source(
        transport: Arc<dyn Transport>,
        connection: ProxyConnectionConfig,
        tokens: Arc<dyn SessionTokenSource>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                transport,
                connection,
                tokens,
                cache: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Proxy gateway shared by every credential.
    #[must_use]
    pub fn connection(&self) -> &ProxyConnectionConfig {
        &self.inner.connection
    }

    pub(crate) fn next_token(&self) -> String {
        self.inner.tokens.next_token()
    }

    /// Fetch the most recently issued credential.
    ///
    /// All remote credentials are listed and the one with the latest
    /// `created_at` is cached and returned. Ties keep the earliest entry in
    /// the response. Returns `None` if the account has no credentials.
    ///
    /// # Errors
    ///
    /// Propagates any transport or remote failure.
    pub async fn load_first(&self) -> Result<Option<ProxyHandle>> {
        let records: Vec<ProxyRecord> = self.inner.transport.get(PROXIES_PATH).await?.into_data()?;
        debug!("Listed {} remote credentials", records.len());

        let Some(latest) = select_latest(records) else {
            return Ok(None);
        };

        let record = self.ingest(latest);
        self.upsert(record.clone()).await;
        Ok(Some(self.handle(record)))
    }

    /// Look up a credential by username, decorated or not.
    ///
    /// Cached credentials are returned without a remote call. Otherwise the
    /// API is asked; a 404 yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ValidationError`] for an empty username and
    /// propagates every other failure.
    pub async fn find(&self, raw_username: &str) -> Result<Option<ProxyHandle>> {
        let base = canonical(raw_username)?;

        if let Some(record) = self.cached(base).await {
            debug!("Cache hit for {base}");
            return Ok(Some(self.handle(record)));
        }

        debug!("Cache miss for {base}, querying API");
        let wire: ProxyRecord = match self.inner.transport.get(&proxy_path(base)).await {
            Ok(response) => response.into_data()?,
            Err(e) if e.is_not_found() => {
                debug!("Credential {base} does not exist");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let record = self.ingest(wire);
        self.upsert(record.clone()).await;
        Ok(Some(self.handle(record)))
    }

    /// Issue `count` new credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ValidationError`] unless
    /// `1 <= count <= MAX_CREATE_COUNT`, and propagates remote failures.
    pub async fn create(&self, count: usize) -> Result<Vec<ProxyHandle>> {
        if !(1..=MAX_CREATE_COUNT).contains(&count) {
            return Err(ClientError::ValidationError(format!(
                "count must be between 1 and {MAX_CREATE_COUNT}, got {count}"
            )));
        }

        let body = serde_json::to_value(CreateProxiesRequest { count })?;
        let records: Vec<ProxyRecord> = self
            .inner
            .transport
            .post(PROXIES_PATH, &body)
            .await?
            .into_data()?;

        if records.len() != count {
            warn!(
                "Requested {count} credentials, API issued {}",
                records.len()
            );
        }

        let records: Vec<CredentialRecord> =
            records.into_iter().map(|r| self.ingest(r)).collect();
        self.inner
            .cache
            .write()
            .await
            .extend(records.iter().cloned());
        info!("Created {} proxy credentials", records.len());

        Ok(records.into_iter().map(|r| self.handle(r)).collect())
    }

    /// Change feature flags of a credential.
    ///
    /// On success the cached entry takes the flags the API echoes back.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ValidationError`] for an empty username or an
    /// empty update, and [`ClientError::RemoteRejection`] with the API's
    /// message when the API refuses.
    pub async fn update(&self, raw_username: &str, update: FeatureUpdate) -> Result<()> {
        self.sync(raw_username, update, None).await
    }

    /// Push flags to the API and reconcile the cache.
    ///
    /// `session_token` is the token the caller already composed into its
    /// username; it becomes the cached token when the API confirms sticky.
    pub(crate) async fn sync(
        &self,
        raw_username: &str,
        update: FeatureUpdate,
        session_token: Option<String>,
    ) -> Result<()> {
        let base = canonical(raw_username)?;
        if update.is_empty() {
            return Err(ClientError::ValidationError(
                "update must change at least one feature".to_string(),
            ));
        }

        let body = serde_json::to_value(UpdateProxyRequest {
            options: update.into(),
        })?;
        let echo: Option<UpdateProxyEcho> = self
            .inner
            .transport
            .patch(&proxy_path(base), &body)
            .await?
            .into_optional_data()?;
        let options = echo.map_or_else(|| ProxyOptions::from(update), |e| e.options);

        let mut cache = self.inner.cache.write().await;
        let mut reconciled = 0usize;
        for record in cache.iter_mut().filter(|r| r.username() == base) {
            match session_token.as_deref() {
                Some(token) if options.use_sticky == Some(true) => {
                    record.enable_sticky(token);
                    record.apply_options(
                        ProxyOptions {
                            use_sticky: None,
                            ..options
                        },
                        String::new,
                    );
                }
                _ => record.apply_options(options, || self.next_token()),
            }
            reconciled += 1;
        }
        dedupe(&mut cache);

        if reconciled == 0 {
            debug!("Updated {base} remotely; not cached locally");
        } else {
            debug!("Reconciled {base} with remote options {options:?}");
        }
        Ok(())
    }

    /// Delete a credential.
    ///
    /// Cached entries are removed only after the API confirms.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ValidationError`] for an empty username and
    /// propagates remote failures, leaving the cache untouched.
    pub async fn delete(&self, raw_username: &str) -> Result<()> {
        let base = canonical(raw_username)?;
        self.inner
            .transport
            .delete(&proxy_path(base))
            .await?
            .into_result()?;

        let mut cache = self.inner.cache.write().await;
        let before = cache.len();
        cache.retain(|r| !r.matches(base));
        info!(
            "Deleted credential {base} ({} cached entries removed)",
            before - cache.len()
        );
        Ok(())
    }

    /// Handles for every cached credential, in cache order.
    ///
    /// Never calls the API; an empty cache yields an empty list.
    pub async fn all(&self) -> Vec<ProxyHandle> {
        self.inner
            .cache
            .read()
            .await
            .iter()
            .cloned()
            .map(|r| self.handle(r))
            .collect()
    }

    /// Replace the cache with the full remote list.
    ///
    /// # Errors
    ///
    /// Propagates any transport or remote failure; the cache is unchanged on
    /// error.
    pub async fn refresh(&self) -> Result<Vec<ProxyHandle>> {
        let records: Vec<ProxyRecord> = self.inner.transport.get(PROXIES_PATH).await?.into_data()?;
        let mut records: Vec<CredentialRecord> =
            records.into_iter().map(|r| self.ingest(r)).collect();
        dedupe(&mut records);

        *self.inner.cache.write().await = records.clone();
        info!("Loaded {} credentials", records.len());

        Ok(records.into_iter().map(|r| self.handle(r)).collect())
    }

    /// Number of cached credentials.
    pub async fn len(&self) -> usize {
        self.inner.cache.read().await.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.inner.cache.read().await.is_empty()
    }

    /// Drop every cached credential. Remote state is unaffected.
    pub async fn clear(&self) {
        self.inner.cache.write().await.clear();
    }

    fn ingest(&self, record: ProxyRecord) -> CredentialRecord {
        CredentialRecord::from_wire(record, self.inner.tokens.as_ref())
    }

    fn handle(&self, record: CredentialRecord) -> ProxyHandle {
        ProxyHandle::new(record, self.clone())
    }

    async fn cached(&self, base: &str) -> Option<CredentialRecord> {
        self.inner
            .cache
            .read()
            .await
            .iter()
            .find(|r| r.username() == base)
            .cloned()
    }

    /// Replace the entry with the same canonical username, or append.
    async fn upsert(&self, record: CredentialRecord) {
        let mut cache = self.inner.cache.write().await;
        match cache.iter().position(|r| r.username() == record.username()) {
            Some(index) => cache[index] = record,
            None => cache.push(record),
        }
        dedupe(&mut cache);
    }
}

/// Canonicalize and validate a caller-supplied username.
fn canonical(raw_username: &str) -> Result<&str> {
    let trimmed = raw_username.trim();
    let base = username::strip(trimmed);
    if !username::is_canonical(trimmed) {
        debug!("Canonicalized {trimmed} to {base}");
    }
    if base.is_empty() {
        return Err(ClientError::ValidationError(
            "username must not be empty".to_string(),
        ));
    }
    // Dot segments would be resolved away in the request path.
    if base == "." || base == ".." {
        return Err(ClientError::ValidationError(format!(
            "username must not be a path segment: {base:?}"
        )));
    }
    if base.contains('/') || base.chars().any(char::is_whitespace) {
        return Err(ClientError::ValidationError(format!(
            "username contains invalid characters: {base:?}"
        )));
    }
    Ok(base)
}

fn proxy_path(base: &str) -> String {
    format!("{PROXIES_PATH}/{base}")
}

/// Latest `created_at` wins; ties keep the first record. Missing timestamps
/// sort before any timestamp.
fn select_latest(records: Vec<ProxyRecord>) -> Option<ProxyRecord> {
    records.into_iter().reduce(|best, candidate| {
        if candidate.created_at > best.created_at {
            candidate
        } else {
            best
        }
    })
}

/// Keep the first entry for each canonical username.
fn dedupe(records: &mut Vec<CredentialRecord>) {
    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.username().to_string()));
}
