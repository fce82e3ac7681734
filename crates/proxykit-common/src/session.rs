//! Sticky session token generation.
//!
//! A session token is an 8 character `[A-Za-z0-9]` discriminator appended to
//! the username. It only pins routing on the upstream proxy and is not a
//! secret, so a thread-local non-cryptographic generator is sufficient.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Number of characters in a generated session token.
pub const SESSION_TOKEN_LEN: usize = 8;

/// Source of fresh sticky session tokens.
///
/// Every call must produce a new token. Closures returning `String` implement
/// this trait, which makes deterministic sources easy to inject:
///
/// ```
/// use proxykit_common::session::SessionTokenSource;
///
/// let fixed = || "AAAAAAAA".to_string();
/// assert_eq!(fixed.next_token(), "AAAAAAAA");
/// ```
pub trait SessionTokenSource: Send + Sync {
    /// Produce a new token.
    fn next_token(&self) -> String;
}

impl<F> SessionTokenSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_token(&self) -> String {
        self()
    }
}

/// Default token source drawing uniformly from the 62 alphanumeric symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenSource;

impl SessionTokenSource for RandomTokenSource {
    fn next_token(&self) -> String {
        generate_session_token()
    }
}

/// Generate a random session token of [`SESSION_TOKEN_LEN`] characters.
#[must_use]
pub fn generate_session_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}
