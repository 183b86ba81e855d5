//! Account id to URL mapping
//!
//! Every federation URL this server hands out is built here, so the inverse
//! (`local_account_id`) can stay exact.

use crate::config::ServerConfig;

/// Builds actor, key, collection and activity URLs from one prefix.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    host: String,
    prefix: String,
}

impl UrlResolver {
    pub fn new(scheme: &str, host: &str) -> Self {
        Self {
            host: host.to_string(),
            prefix: format!("{}://{}", scheme, host),
        }
    }

    pub fn from_config(server: &ServerConfig) -> Self {
        Self::new(&server.protocol, &server.domain)
    }

    /// This server's host (with port when configured)
    pub fn host(&self) -> &str {
        &self.host
    }

    /// `{scheme}://{host}`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn actor_url(&self, account_id: &str) -> String {
        format!("{}/u/{}", self.prefix, account_id)
    }

    /// Key id advertised in signatures and the actor document
    pub fn main_key_url(&self, account_id: &str) -> String {
        format!("{}/main-key", self.actor_url(account_id))
    }

    pub fn inbox_url(&self, account_id: &str) -> String {
        format!("{}/inbox", self.actor_url(account_id))
    }

    pub fn outbox_url(&self, account_id: &str) -> String {
        format!("{}/outbox", self.actor_url(account_id))
    }

    pub fn followers_url(&self, account_id: &str) -> String {
        format!("{}/followers", self.actor_url(account_id))
    }

    pub fn following_url(&self, account_id: &str) -> String {
        format!("{}/following", self.actor_url(account_id))
    }

    pub fn activity_url(&self, activity_id: &str) -> String {
        format!("{}/a/{}", self.prefix, activity_id)
    }

    /// HTML profile page; remote users keep their host in the path.
    pub fn profile_url(&self, username: &str, host: &str) -> String {
        if host.is_empty() || host.eq_ignore_ascii_case(&self.host) {
            format!("{}/@{}", self.prefix, username)
        } else {
            format!("{}/@{}@{}", self.prefix, username, host)
        }
    }

    /// Account id for a URL of exactly the form `{prefix}/u/{id}`.
    pub fn local_account_id<'a>(&self, url: &'a str) -> Option<&'a str> {
        let id = url.strip_prefix(&self.prefix)?.strip_prefix("/u/")?;
        if id.is_empty() || id.contains('/') {
            return None;
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UrlResolver {
        UrlResolver::new("https", "social.example")
    }

    #[test]
    fn builds_actor_urls() {
        let urls = resolver();
        assert_eq!(urls.prefix(), "https://social.example");
        assert_eq!(urls.actor_url("abc"), "https://social.example/u/abc");
        assert_eq!(
            urls.main_key_url("abc"),
            "https://social.example/u/abc/main-key"
        );
        assert_eq!(urls.inbox_url("abc"), "https://social.example/u/abc/inbox");
        assert_eq!(
            urls.outbox_url("abc"),
            "https://social.example/u/abc/outbox"
        );
        assert_eq!(
            urls.followers_url("abc"),
            "https://social.example/u/abc/followers"
        );
        assert_eq!(
            urls.following_url("abc"),
            "https://social.example/u/abc/following"
        );
        assert_eq!(urls.activity_url("01H"), "https://social.example/a/01H");
    }

    #[test]
    fn profile_url_omits_local_host() {
        let urls = resolver();
        assert_eq!(urls.profile_url("alice", ""), "https://social.example/@alice");
        assert_eq!(
            urls.profile_url("alice", "social.example"),
            "https://social.example/@alice"
        );
        assert_eq!(
            urls.profile_url("bob", "other.example"),
            "https://social.example/@bob@other.example"
        );
    }

    #[test]
    fn inverse_only_matches_exact_actor_urls() {
        let urls = resolver();
        let actor = urls.actor_url("abc");
        assert_eq!(urls.local_account_id(&actor), Some("abc"));
        assert_eq!(urls.local_account_id(&urls.inbox_url("abc")), None);
        assert_eq!(urls.local_account_id("https://other.example/u/abc"), None);
        assert_eq!(urls.local_account_id("https://social.example/u/"), None);
    }
}
