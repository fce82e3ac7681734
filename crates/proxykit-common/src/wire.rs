//! Request and response bodies exchanged with the credential API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feature options as they appear on the wire.
///
/// Absent keys mean "unchanged" in requests and "unknown" in responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyOptions {
    /// Sticky session flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_sticky: Option<bool>,
    /// Smart routing flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_smart_routing: Option<bool>,
}

/// A proxy credential as returned by the API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    /// Username, possibly decorated with feature suffixes.
    pub username: String,
    /// Password issued with the credential.
    pub password: String,
    /// Feature options.
    #[serde(default)]
    pub options: ProxyOptions,
    /// Issue time, used to pick the most recent credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for ProxyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRecord")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("options", &self.options)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Body of `POST proxies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProxiesRequest {
    /// Number of credentials to issue.
    pub count: usize,
}

/// Body of `PATCH proxies/{username}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProxyRequest {
    /// Options to change.
    pub options: ProxyOptions,
}

/// Response data of `PATCH proxies/{username}`.
///
/// Servers may echo only the options or the whole record; both shapes
/// deserialize into this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProxyEcho {
    /// Username the server applied the update to, when echoed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Options as stored by the server.
    #[serde(default)]
    pub options: ProxyOptions,
}

/// Account traffic summary returned by `GET usage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Bytes transferred through the proxy during the period.
    #[serde(default)]
    pub bytes_used: u64,
    /// Number of proxied requests during the period.
    #[serde(default)]
    pub requests: u64,
    /// Byte allowance for the period, if the plan is metered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_limit: Option<u64>,
    /// Start of the reporting period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_start: Option<DateTime<Utc>>,
    /// End of the reporting period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<DateTime<Utc>>,
}

impl UsageReport {
    /// Remaining bytes in the period, when the plan has a limit.
    #[must_use]
    pub const fn bytes_remaining(&self) -> Option<u64> {
        match self.bytes_limit {
            Some(limit) => Some(limit.saturating_sub(self.bytes_used)),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn record_parses_minimal_shape() {
        let record: ProxyRecord =
            serde_json::from_str(r#"{"username":"u1","password":"p1"}"#).unwrap();
        assert_eq!(record.username, "u1");
        assert_eq!(record.options, ProxyOptions::default());
        assert!(record.created_at.is_none());
    }

    #[test]
    fn record_parses_options_and_timestamp() {
        let record: ProxyRecord = serde_json::from_value(serde_json::json!({
            "username": "u1-routing-smart",
            "password": "p1",
            "options": { "use_sticky": false, "use_smart_routing": true },
            "created_at": "2024-03-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.options.use_smart_routing, Some(true));
        assert_eq!(record.options.use_sticky, Some(false));
        assert!(record.created_at.is_some());
    }

    #[test]
    fn update_request_omits_unchanged_keys() {
        let body = UpdateProxyRequest {
            options: ProxyOptions {
                use_sticky: Some(true),
                use_smart_routing: None,
            },
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({ "options": { "use_sticky": true } })
        );
    }

    #[test]
    fn update_echo_accepts_full_record() {
        let echo: UpdateProxyEcho = serde_json::from_value(serde_json::json!({
            "username": "u1",
            "password": "p1",
            "options": { "use_sticky": true }
        }))
        .unwrap();
        assert_eq!(echo.username.as_deref(), Some("u1"));
        assert_eq!(echo.options.use_sticky, Some(true));
    }

    #[test]
    fn record_debug_hides_password() {
        let record = ProxyRecord {
            username: "u1".to_string(),
            password: "hunter2".to_string(),
            options: ProxyOptions::default(),
            created_at: None,
        };
        let debug = format!("{record:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn usage_remaining_saturates() {
        let usage: UsageReport = serde_json::from_value(serde_json::json!({
            "bytes_used": 1500,
            "requests": 12,
            "bytes_limit": 1000
        }))
        .unwrap();
        assert_eq!(usage.bytes_remaining(), Some(0));

        let unmetered: UsageReport = serde_json::from_str("{}").unwrap();
        assert_eq!(unmetered.bytes_remaining(), None);
    }
}
