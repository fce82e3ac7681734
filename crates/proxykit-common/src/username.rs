//! Username suffix encoding.
//!
//! Feature state travels to the upstream proxy inside the username itself:
//!
//! ```text
//! alice123-session-ab12CD34-routing-smart
//! └──┬───┘└────────┬───────┘└─────┬─────┘
//!  base      sticky session   smart routing
//! ```
//!
//! The session suffix always precedes the routing suffix. [`strip`] accepts
//! either attachment order so that decorated usernames coming back from the
//! API (or from callers) resolve to the same canonical name.
//!
//! # Examples
//!
//! ```
//! use proxykit_common::username::{compose, strip};
//!
//! assert_eq!(strip("alice123-session-ab12CD34-routing-smart"), "alice123");
//! assert_eq!(
//!     compose("alice123", true, Some("ab12CD34"), true),
//!     "alice123-session-ab12CD34-routing-smart"
//! );
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// Marker that introduces a sticky session token.
pub const SESSION_MARKER: &str = "-session-";

/// Suffix appended when smart routing is enabled.
pub const ROUTING_SUFFIX: &str = "-routing-smart";

static SESSION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-session-[A-Za-z0-9]+$")
        .unwrap_or_else(|_| unreachable!("session suffix pattern is a valid regex"))
});

/// Remove every trailing feature suffix from `username`.
///
/// Session (`-session-<alphanumeric>`) and routing (`-routing-smart`)
/// suffixes are removed in whichever order they were attached. Removal
/// repeats until neither suffix is present, so `strip(strip(x)) == strip(x)`
/// holds for every input.
#[must_use]
pub fn strip(username: &str) -> &str {
    decode(username).base
}

/// Feature state recovered from a decorated username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedUsername<'a> {
    /// Canonical username, identical to [`strip`].
    pub base: &'a str,
    /// Session token, when a session suffix was attached.
    pub session_token: Option<&'a str>,
    /// Whether a routing suffix was attached.
    pub smart_routing: bool,
}

/// Split `username` into its canonical base and attached feature state.
///
/// When a suffix was attached more than once, the outermost session token
/// wins.
#[must_use]
pub fn decode(username: &str) -> DecodedUsername<'_> {
    let mut base = username;
    let mut session_token = None;
    let mut smart_routing = false;
    loop {
        if let Some(rest) = base.strip_suffix(ROUTING_SUFFIX) {
            smart_routing = true;
            base = rest;
        } else if let Some(found) = SESSION_SUFFIX.find(base) {
            session_token.get_or_insert(&base[found.start() + SESSION_MARKER.len()..]);
            base = &base[..found.start()];
        } else {
            return DecodedUsername {
                base,
                session_token,
                smart_routing,
            };
        }
    }
}

/// Returns `true` when `username` carries no feature suffix.
#[must_use]
pub fn is_canonical(username: &str) -> bool {
    strip(username).len() == username.len()
}

/// Build the username sent to the proxy server.
///
/// Starts from [`strip`]ped `base`, appends `-session-<token>` when sticky is
/// enabled and a token is available, then `-routing-smart` when smart
/// routing is enabled. A sticky flag without a token contributes nothing;
/// tokens are never fabricated here.
#[must_use]
pub fn compose(
    base: &str,
    sticky_enabled: bool,
    session_token: Option<&str>,
    smart_routing_enabled: bool,
) -> String {
    let base = strip(base);
    let mut username = String::with_capacity(base.len() + 32);
    username.push_str(base);

    if sticky_enabled
        && let Some(token) = session_token.filter(|t| !t.is_empty())
    {
        username.push_str(SESSION_MARKER);
        username.push_str(token);
    }

    if smart_routing_enabled {
        username.push_str(ROUTING_SUFFIX);
    }

    username
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_both_orders() {
        assert_eq!(strip("alice123-session-ab12CD34-routing-smart"), "alice123");
        assert_eq!(strip("alice123-routing-smart-session-ab12CD34"), "alice123");
    }

    #[test]
    fn strip_removes_single_suffix() {
        assert_eq!(strip("alice123-session-ab12CD34"), "alice123");
        assert_eq!(strip("alice123-routing-smart"), "alice123");
    }

    #[test]
    fn strip_leaves_plain_usernames_alone() {
        assert_eq!(strip("alice123"), "alice123");
        assert_eq!(strip(""), "");
        assert_eq!(strip("user-with-dashes"), "user-with-dashes");
    }

    #[test]
    fn strip_requires_a_token_after_session_marker() {
        assert_eq!(strip("alice-session-"), "alice-session-");
        assert_eq!(strip("alice-session-ab_12"), "alice-session-ab_12");
    }

    #[test]
    fn strip_only_touches_trailing_suffixes() {
        assert_eq!(
            strip("alice-routing-smart-admin"),
            "alice-routing-smart-admin"
        );
        assert_eq!(strip("alice-session-abc-admin"), "alice-session-abc-admin");
    }

    #[test]
    fn strip_collapses_duplicated_suffixes() {
        assert_eq!(strip("bob-routing-smart-routing-smart"), "bob");
        assert_eq!(strip("bob-session-AAAA-session-BBBB"), "bob");
    }

    #[test]
    fn decode_recovers_feature_state() {
        let decoded = decode("alice123-routing-smart-session-ab12CD34");
        assert_eq!(decoded.base, "alice123");
        assert_eq!(decoded.session_token, Some("ab12CD34"));
        assert!(decoded.smart_routing);

        let plain = decode("alice123");
        assert_eq!(plain.session_token, None);
        assert!(!plain.smart_routing);
    }

    #[test]
    fn decode_keeps_outermost_token() {
        let decoded = decode("bob-session-INNER-session-OUTER");
        assert_eq!(decoded.base, "bob");
        assert_eq!(decoded.session_token, Some("OUTER"));
    }

    #[test]
    fn is_canonical_detects_suffixes() {
        assert!(is_canonical("alice123"));
        assert!(!is_canonical("alice123-routing-smart"));
        assert!(!is_canonical("alice123-session-x1"));
    }

    #[test]
    fn compose_plain() {
        assert_eq!(compose("u1", false, None, false), "u1");
    }

    #[test]
    fn compose_session_precedes_routing() {
        assert_eq!(
            compose("u1", true, Some("AAAAAAAA"), true),
            "u1-session-AAAAAAAA-routing-smart"
        );
    }

    #[test]
    fn compose_restrips_decorated_base() {
        assert_eq!(
            compose("u1-routing-smart-session-OLDTOKEN", true, Some("NEWTOKEN"), false),
            "u1-session-NEWTOKEN"
        );
    }

    #[test]
    fn compose_sticky_without_token_adds_nothing() {
        assert_eq!(compose("u1", true, None, false), "u1");
        assert_eq!(compose("u1", true, Some(""), true), "u1-routing-smart");
    }

    #[test]
    fn compose_ignores_token_when_not_sticky() {
        assert_eq!(compose("u1", false, Some("AAAAAAAA"), false), "u1");
    }
}
