//! Local representation of a proxy credential and its feature state.
//!
//! A [`CredentialRecord`] always stores the canonical username; feature
//! suffixes are derived on demand by [`CredentialRecord::composed_username`].
//! The session token is present exactly when sticky sessions are enabled.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionTokenSource;
use crate::username;
use crate::wire::{ProxyOptions, ProxyRecord};

/// Snapshot of the two independent feature flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Sticky sessions enabled.
    pub sticky: bool,
    /// Smart routing enabled.
    pub smart_routing: bool,
}

impl From<FeatureFlags> for ProxyOptions {
    fn from(flags: FeatureFlags) -> Self {
        Self {
            use_sticky: Some(flags.sticky),
            use_smart_routing: Some(flags.smart_routing),
        }
    }
}

/// Partial feature change. `None` leaves a flag as it is.
///
/// # Examples
///
/// ```
/// use proxykit_common::FeatureUpdate;
///
/// let update = FeatureUpdate::new().with_sticky(true);
/// assert_eq!(update.sticky, Some(true));
/// assert_eq!(update.smart_routing, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUpdate {
    /// Requested sticky flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky: Option<bool>,
    /// Requested smart routing flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_routing: Option<bool>,
}

impl FeatureUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sticky: None,
            smart_routing: None,
        }
    }

    /// Request a sticky flag value.
    #[must_use]
    pub const fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = Some(sticky);
        self
    }

    /// Request a smart routing flag value.
    #[must_use]
    pub const fn with_smart_routing(mut self, smart_routing: bool) -> Self {
        self.smart_routing = Some(smart_routing);
        self
    }

    /// Returns `true` if neither flag is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sticky.is_none() && self.smart_routing.is_none()
    }
}

impl From<FeatureFlags> for FeatureUpdate {
    fn from(flags: FeatureFlags) -> Self {
        Self {
            sticky: Some(flags.sticky),
            smart_routing: Some(flags.smart_routing),
        }
    }
}

impl From<FeatureUpdate> for ProxyOptions {
    fn from(update: FeatureUpdate) -> Self {
        Self {
            use_sticky: update.sticky,
            use_smart_routing: update.smart_routing,
        }
    }
}

/// One proxy credential held in the local cache.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    username: String,
    password: String,
    sticky_enabled: bool,
    smart_routing_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("sticky_enabled", &self.sticky_enabled)
            .field("smart_routing_enabled", &self.smart_routing_enabled)
            .field("session_token", &self.session_token)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl CredentialRecord {
    /// Create a record with both features disabled.
    ///
    /// The username is canonicalized; any suffix it carries is dropped.
    pub fn new(username: impl AsRef<str>, password: impl Into<String>) -> Self {
        Self {
            username: username::strip(username.as_ref()).to_string(),
            password: password.into(),
            sticky_enabled: false,
            smart_routing_enabled: false,
            session_token: None,
            created_at: None,
        }
    }

    /// Ingest a record returned by the API.
    ///
    /// The username is canonicalized. Flags come from `options`, falling back
    /// to the suffixes on the decorated username when a key is absent. A
    /// sticky record reuses the token carried by its username, or draws a
    /// fresh one from `tokens`.
    pub fn from_wire(record: ProxyRecord, tokens: &dyn SessionTokenSource) -> Self {
        let decoded = username::decode(&record.username);
        let sticky = record
            .options
            .use_sticky
            .unwrap_or(decoded.session_token.is_some());
        let smart_routing = record
            .options
            .use_smart_routing
            .unwrap_or(decoded.smart_routing);
        let session_token = sticky.then(|| {
            decoded
                .session_token
                .map_or_else(|| tokens.next_token(), ToString::to_string)
        });

        Self {
            username: decoded.base.to_string(),
            password: record.password,
            sticky_enabled: sticky,
            smart_routing_enabled: smart_routing,
            session_token,
            created_at: record.created_at,
        }
    }

    /// Set the issue timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Canonical username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password issued with the credential.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether sticky sessions are enabled.
    #[must_use]
    pub const fn sticky_enabled(&self) -> bool {
        self.sticky_enabled
    }

    /// Whether smart routing is enabled.
    #[must_use]
    pub const fn smart_routing_enabled(&self) -> bool {
        self.smart_routing_enabled
    }

    /// Current session token, present only while sticky is enabled.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Issue time reported by the API.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Both feature flags.
    #[must_use]
    pub const fn features(&self) -> FeatureFlags {
        FeatureFlags {
            sticky: self.sticky_enabled,
            smart_routing: self.smart_routing_enabled,
        }
    }

    /// Username with the suffixes for the current feature state.
    #[must_use]
    pub fn composed_username(&self) -> String {
        username::compose(
            &self.username,
            self.sticky_enabled,
            self.session_token.as_deref(),
            self.smart_routing_enabled,
        )
    }

    /// Returns `true` if `raw` canonicalizes to this record's username.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        username::strip(raw) == self.username
    }

    /// Enable sticky sessions with a new token.
    ///
    /// The token replaces any previous one, also when sticky was already on.
    pub fn enable_sticky(&mut self, token: impl Into<String>) {
        self.sticky_enabled = true;
        self.session_token = Some(token.into());
    }

    /// Disable sticky sessions and drop the token.
    pub fn disable_sticky(&mut self) {
        self.sticky_enabled = false;
        self.session_token = None;
    }

    /// Toggle smart routing. Sticky state is untouched.
    pub const fn set_smart_routing(&mut self, enabled: bool) {
        self.smart_routing_enabled = enabled;
    }

    /// Overwrite flags with the values the API reports.
    ///
    /// Keys absent from `options` leave the flag unchanged. A transition of
    /// sticky from disabled to enabled takes its token from `fresh_token`; a
    /// record that stays sticky keeps its token.
    pub fn apply_options(&mut self, options: ProxyOptions, fresh_token: impl FnOnce() -> String) {
        match options.use_sticky {
            Some(true) if !self.sticky_enabled || self.session_token.is_none() => {
                self.enable_sticky(fresh_token());
            }
            Some(false) => self.disable_sticky(),
            _ => {}
        }

        if let Some(smart_routing) = options.use_smart_routing {
            self.smart_routing_enabled = smart_routing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(token: &'static str) -> impl SessionTokenSource {
        move || token.to_string()
    }

    #[test]
    fn new_record_is_canonical_and_plain() {
        let record = CredentialRecord::new("u1-session-abc123-routing-smart", "p1");
        assert_eq!(record.username(), "u1");
        assert_eq!(record.features(), FeatureFlags::default());
        assert_eq!(record.session_token(), None);
        assert_eq!(record.composed_username(), "u1");
    }

    #[test]
    fn from_wire_canonicalizes_decorated_username() {
        let wire = ProxyRecord {
            username: "u1-routing-smart".to_string(),
            password: "p1".to_string(),
            options: ProxyOptions::default(),
            created_at: None,
        };
        let record = CredentialRecord::from_wire(wire, &fixed("UNUSED00"));
        assert_eq!(record.username(), "u1");
        assert!(record.smart_routing_enabled());
        assert!(!record.sticky_enabled());
        assert_eq!(record.composed_username(), "u1-routing-smart");
    }

    #[test]
    fn from_wire_reuses_token_from_username() {
        let wire = ProxyRecord {
            username: "u1-session-KEEPME12".to_string(),
            password: "p1".to_string(),
            options: ProxyOptions {
                use_sticky: Some(true),
                use_smart_routing: Some(false),
            },
            created_at: None,
        };
        let record = CredentialRecord::from_wire(wire, &fixed("FRESH000"));
        assert_eq!(record.session_token(), Some("KEEPME12"));
    }

    #[test]
    fn from_wire_generates_token_for_sticky_option() {
        let wire = ProxyRecord {
            username: "u1".to_string(),
            password: "p1".to_string(),
            options: ProxyOptions {
                use_sticky: Some(true),
                use_smart_routing: None,
            },
            created_at: None,
        };
        let record = CredentialRecord::from_wire(wire, &fixed("FRESH000"));
        assert!(record.sticky_enabled());
        assert_eq!(record.composed_username(), "u1-session-FRESH000");
    }

    #[test]
    fn from_wire_options_override_suffixes() {
        let wire = ProxyRecord {
            username: "u1-session-STALE000".to_string(),
            password: "p1".to_string(),
            options: ProxyOptions {
                use_sticky: Some(false),
                use_smart_routing: Some(false),
            },
            created_at: None,
        };
        let record = CredentialRecord::from_wire(wire, &fixed("FRESH000"));
        assert!(!record.sticky_enabled());
        assert_eq!(record.session_token(), None);
    }

    #[test]
    fn token_present_iff_sticky() {
        let mut record = CredentialRecord::new("u1", "p1");
        record.enable_sticky("AAAAAAAA");
        assert_eq!(record.session_token(), Some("AAAAAAAA"));
        record.disable_sticky();
        assert_eq!(record.session_token(), None);
        assert!(!record.sticky_enabled());
    }

    #[test]
    fn features_are_independent() {
        let mut record = CredentialRecord::new("u1", "p1");
        record.enable_sticky("AAAAAAAA");
        record.set_smart_routing(true);
        assert_eq!(record.composed_username(), "u1-session-AAAAAAAA-routing-smart");

        record.set_smart_routing(false);
        assert_eq!(record.session_token(), Some("AAAAAAAA"));

        record.set_smart_routing(true);
        record.disable_sticky();
        assert!(record.smart_routing_enabled());
        assert_eq!(record.composed_username(), "u1-routing-smart");
    }

    #[test]
    fn apply_options_follows_remote_values() {
        let mut record = CredentialRecord::new("u1", "p1");
        record.apply_options(
            ProxyOptions {
                use_sticky: Some(true),
                use_smart_routing: Some(true),
            },
            || "NEWTOKEN".to_string(),
        );
        assert_eq!(record.composed_username(), "u1-session-NEWTOKEN-routing-smart");

        record.apply_options(
            ProxyOptions {
                use_sticky: Some(true),
                use_smart_routing: None,
            },
            || "IGNORED0".to_string(),
        );
        assert_eq!(record.session_token(), Some("NEWTOKEN"));
        assert!(record.smart_routing_enabled());

        record.apply_options(
            ProxyOptions {
                use_sticky: Some(false),
                use_smart_routing: None,
            },
            || "IGNORED0".to_string(),
        );
        assert_eq!(record.composed_username(), "u1-routing-smart");
    }

    #[test]
    fn matches_by_canonical_username() {
        let record = CredentialRecord::new("u1", "p1");
        assert!(record.matches("u1"));
        assert!(record.matches("u1-session-XYZ-routing-smart"));
        assert!(!record.matches("u10"));
    }

    #[test]
    fn debug_hides_password() {
        let record = CredentialRecord::new("u1", "s3cret");
        assert!(!format!("{record:?}").contains("s3cret"));
    }
}
