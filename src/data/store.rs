//! Storage contracts consumed by the processor.
//!
//! `Database` implements both; tests may substitute their own.

use async_trait::async_trait;

use super::models::{Account, FollowStatus};
use crate::error::AppError;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find by account id. Absence is `NotFound`.
    async fn find(&self, id: &str) -> Result<Account, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Account, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Account, AppError>;

    /// Insert a new account. Duplicate username or email is `Conflict`.
    async fn save(&self, account: &Account) -> Result<(), AppError>;
}

/// Follow edges keyed by (follower actor URL, followed actor URL).
#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Upsert the edge as Following.
    async fn follow(&self, from_id: &str, to_id: &str) -> Result<(), AppError>;

    /// Upsert the edge as Pending.
    async fn request_follow(&self, from_id: &str, to_id: &str) -> Result<(), AppError>;

    /// Remove the edge. Succeeds when nothing was there.
    async fn unfollow(&self, from_id: &str, to_id: &str) -> Result<(), AppError>;

    async fn find_follow_status(&self, from_id: &str, to_id: &str)
    -> Result<FollowStatus, AppError>;

    /// Actor URLs that follow `id`, Following edges only.
    async fn list_followers(&self, id: &str) -> Result<Vec<String>, AppError>;

    /// Actor URLs that `id` follows, Following edges only.
    async fn list_follows(&self, id: &str) -> Result<Vec<String>, AppError>;
}
