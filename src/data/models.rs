//! Data models
//!
//! Rust structs representing database entities and the transient actor view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Used for follow rows and activity URLs so both sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque account id: 32 lowercase hex characters.
pub fn generate_account_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A locally hosted account
///
/// Created on signup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    /// bcrypt hash
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// RSA private key (PKCS8 PEM)
    #[serde(skip_serializing)]
    pub private_key_pem: String,
    pub created_at: DateTime<Utc>,
}

/// Resolved view of any identity, local or remote.
///
/// Remote actors are built from a fetched actor document and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    /// Actor URL
    pub id: String,
    pub username: String,
    /// Authority the actor lives on, with port when explicit
    pub host: String,
    pub public_key_pem: String,
    pub inbox: String,
}

/// Follow relationship state for an ordered (from, to) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Following,
    Pending,
    /// No row exists
    Unfollowing,
}

impl FollowStatus {
    /// Map a stored status column to the state machine.
    ///
    /// A missing row is `Unfollowing`; this is the only place that mapping
    /// happens.
    pub fn from_row(stored: Option<&str>) -> Result<Self, AppError> {
        match stored {
            None => Ok(FollowStatus::Unfollowing),
            Some("following") => Ok(FollowStatus::Following),
            Some("pending") => Ok(FollowStatus::Pending),
            Some(other) => Err(AppError::Internal(anyhow::anyhow!(
                "unknown follow status stored: {}",
                other
            ))),
        }
    }

    /// Stored column value; `None` for `Unfollowing`, which is never stored.
    pub fn as_stored(&self) -> Option<&'static str> {
        match self {
            FollowStatus::Following => Some("following"),
            FollowStatus::Pending => Some("pending"),
            FollowStatus::Unfollowing => None,
        }
    }
}

/// A stored follow edge between two actor URLs
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FollowEdge {
    pub id: String,
    /// Follower actor URL
    pub from_id: String,
    /// Followed actor URL
    pub to_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_row_is_unfollowing() {
        assert_eq!(
            FollowStatus::from_row(None).unwrap(),
            FollowStatus::Unfollowing
        );
        assert_eq!(
            FollowStatus::from_row(Some("pending")).unwrap(),
            FollowStatus::Pending
        );
        assert!(FollowStatus::from_row(Some("blocked")).is_err());
        assert_eq!(FollowStatus::Unfollowing.as_stored(), None);
    }

    #[test]
    fn account_ids_are_32_hex_chars() {
        let id = generate_account_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_account_id());
    }

    #[test]
    fn entity_ids_sort_by_creation() {
        let first = EntityId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = EntityId::new();
        assert!(first.0 < second.0);
    }
}
