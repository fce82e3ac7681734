//! # proxykit-client
//!
//! Async client for managing ProxyKit proxy credentials.
//!
//! The [`CredentialRegistry`] issues, looks up, updates and deletes
//! credentials through the management API and keeps a local cache of them.
//! Each credential is handed out as a [`ProxyHandle`] that can:
//! - toggle sticky sessions and smart routing
//! - render a proxy URL for `http` or `https`
//! - build a ready-to-use [`reqwest::Proxy`]
//!
//! ## Example
//!
//! ```no_run
//! use proxykit_client::ProxyKitClient;
//! use proxykit_common::{Config, Protocol};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new().with_api_token("your-api-token");
//! let client = ProxyKitClient::new(config)?;
//!
//! let mut proxy = client
//!     .credentials()
//!     .create(1)
//!     .await?
//!     .pop()
//!     .ok_or_else(|| anyhow::anyhow!("no credential issued"))?;
//!
//! proxy.enable_sticky().await?;
//! println!("{}", proxy.to_url(Protocol::Http));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod handle;
pub mod registry;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::ProxyKitClient;
pub use error::{ClientError, Result};
pub use handle::{CredentialView, ProxyHandle};
pub use registry::{CredentialRegistry, MAX_CREATE_COUNT};
pub use transport::{ApiResponse, HttpTransport, Transport};
