//! User addresses and `acct:` URIs
//!
//! `alice@social.example` names an account on another server; a bare
//! `alice` names one hosted here.

use std::fmt;

use crate::error::AppError;

const ACCT_SCHEME: &str = "acct:";

/// A `user@host` pair. An empty host means this server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserAddr {
    pub preferred_username: String,
    pub host: String,
}

impl UserAddr {
    pub fn new(preferred_username: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            preferred_username: preferred_username.into(),
            host: host.into(),
        }
    }

    /// Whether the address names an account on `local_host`.
    pub fn is_local(&self, local_host: &str) -> bool {
        self.host.is_empty() || self.host.eq_ignore_ascii_case(local_host)
    }

    /// `acct:user@host` form used as a WebFinger resource
    pub fn acct_uri(&self) -> String {
        format!("{}{}", ACCT_SCHEME, self)
    }
}

impl fmt::Display for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            write!(f, "{}", self.preferred_username)
        } else {
            write!(f, "{}@{}", self.preferred_username, self.host)
        }
    }
}

/// Split `user@host` into its parts.
///
/// One trailing `@` is dropped and the split happens at the first `@`, so
/// anything after it (including further `@`s) is the host. Never fails.
pub fn parse_user_addr(s: &str) -> UserAddr {
    let s = s.strip_suffix('@').unwrap_or(s);
    match s.split_once('@') {
        Some((user, host)) => UserAddr::new(user, host),
        None => UserAddr::new(s, ""),
    }
}

/// Parse an `acct:user@host` URI.
pub fn parse_acct_scheme(s: &str) -> Result<UserAddr, AppError> {
    let rest = s
        .strip_prefix(ACCT_SCHEME)
        .ok_or_else(|| AppError::InvalidAddress(format!("not an acct URI: {}", s)))?;
    Ok(parse_user_addr(rest))
}

/// Parse a user address, filling an empty host with `local_host`.
pub fn complement_user_addr(s: &str, local_host: &str) -> UserAddr {
    let mut addr = parse_user_addr(s);
    if addr.host.is_empty() {
        addr.host = local_host.to_string();
    }
    addr
}
