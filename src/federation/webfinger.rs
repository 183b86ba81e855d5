//! WebFinger protocol implementation
//!
//! Used to discover ActivityPub actor URIs from addresses.

use serde::{Deserialize, Serialize};

use super::activity::ACTIVITY_JSON;
use crate::error::AppError;

pub const PROFILE_PAGE_REL: &str = "http://webfinger.net/rel/profile-page";

/// WebFinger JRD response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebFingerResponse {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    #[serde(default)]
    pub links: Vec<WebFingerLink>,
}

/// WebFinger link
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebFingerLink {
    pub rel: String,
    #[serde(rename = "type")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl WebFingerResponse {
    /// Actor id from the first `self` link of type `application/activity+json`.
    pub fn find_actor_id(&self) -> Result<&str, AppError> {
        self.links
            .iter()
            .find(|link| link.rel == "self" && link.link_type.as_deref() == Some(ACTIVITY_JSON))
            .and_then(|link| link.href.as_deref())
            .ok_or_else(|| AppError::Remote {
                status: None,
                message: format!("no ActivityPub actor link for {}", self.subject),
            })
    }
}

/// Generate WebFinger response for a local account.
///
/// # Arguments
/// * `subject` - `acct:` URI that was asked for
/// * `actor_url` - ActivityPub actor URL
/// * `profile_url` - HTML profile page
pub fn generate_webfinger_response(
    subject: String,
    actor_url: String,
    profile_url: String,
) -> WebFingerResponse {
    WebFingerResponse {
        subject,
        aliases: Some(vec![actor_url.clone()]),
        links: vec![
            WebFingerLink {
                rel: "self".to_string(),
                link_type: Some(ACTIVITY_JSON.to_string()),
                href: Some(actor_url),
                template: None,
            },
            WebFingerLink {
                rel: PROFILE_PAGE_REL.to_string(),
                link_type: Some("text/html".to_string()),
                href: Some(profile_url),
                template: None,
            },
        ],
    }
}
