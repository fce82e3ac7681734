//! # proxykit-common
//!
//! Transport-independent building blocks of the ProxyKit SDK.
//!
//! ProxyKit credentials are plain username/password pairs for an HTTP(S)
//! proxy gateway. Optional features are requested by decorating the
//! username that is sent to the gateway:
//! - sticky sessions append `-session-<token>` with a random 8 character token
//! - smart routing appends `-routing-smart`
//!
//! This crate holds the username codec, the session token generator, the
//! cached credential record, the wire types of the management API and the
//! client configuration.
//!
//! ## Example
//!
//! ```
//! use proxykit_common::{CredentialRecord, username};
//!
//! let mut record = CredentialRecord::new("u1", "p1");
//! record.enable_sticky("AAAAAAAA");
//! record.set_smart_routing(true);
//!
//! assert_eq!(record.composed_username(), "u1-session-AAAAAAAA-routing-smart");
//! assert_eq!(username::strip(&record.composed_username()), "u1");
//! ```

/// Client configuration and proxy gateway settings.
pub mod config;
/// Cached credential records and feature flags.
pub mod credential;
/// Sticky session token generation.
pub mod session;
/// Username suffix codec.
pub mod username;
/// Request and response bodies of the management API.
pub mod wire;

pub use config::{Config, Protocol, ProxyConnectionConfig, RetryConfig};
pub use credential::{CredentialRecord, FeatureFlags, FeatureUpdate};
pub use session::{RandomTokenSource, SessionTokenSource, generate_session_token};
pub use wire::{
    CreateProxiesRequest, ProxyOptions, ProxyRecord, UpdateProxyEcho, UpdateProxyRequest,
    UsageReport,
};
