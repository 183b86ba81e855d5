//! Follow state machine and activity dispatch
//!
//! Per ordered pair of actors the edge is Unfollowing (no row), Pending or
//! Following. Local follows are confirmed immediately; remote follows go
//! through Follow/Accept.

use super::Processor;
use crate::config::FollowMode;
use crate::data::{Account, Actor, FollowStatus};
use crate::error::AppError;
use crate::federation::{
    Accept, ActivityHeader, Follow, ObjectValue, Undo, complement_user_addr, decode_activity,
};
use crate::metrics::ACTIVITIES_RECEIVED;

const FOLLOW: &str = "Follow";
const ACCEPT: &str = "Accept";
const UNDO: &str = "Undo";

/// Metric label for an inbound activity type, bounded to what we handle.
fn activity_label(kind: &str) -> &'static str {
    match kind {
        FOLLOW => FOLLOW,
        ACCEPT => ACCEPT,
        UNDO => UNDO,
        _ => "unsupported",
    }
}

impl Processor {
    /// Follow `acct` (`user` or `user@host`) as `account_id`.
    ///
    /// Returns the resulting state of the edge.
    pub async fn follow(&self, account_id: &str, acct: &str) -> Result<FollowStatus, AppError> {
        let account = self.accounts.find(account_id).await?;
        let addr = complement_user_addr(acct, self.urls.host());
        let target = self.find_actor(Some(&account), &addr).await?;
        self.follow_actor(&account, &target).await
    }

    /// Stop following `acct` as `account_id`.
    pub async fn unfollow(&self, account_id: &str, acct: &str) -> Result<(), AppError> {
        let account = self.accounts.find(account_id).await?;
        let addr = complement_user_addr(acct, self.urls.host());
        let target = self.find_actor(Some(&account), &addr).await?;
        self.unfollow_actor(&account, &target).await
    }

    pub async fn follow_actor(
        &self,
        account: &Account,
        target: &Actor,
    ) -> Result<FollowStatus, AppError> {
        let follower_id = self.urls.actor_url(&account.id);

        if self.is_local_actor(target) {
            self.follows.follow(&follower_id, &target.id).await?;
            tracing::info!(from = %follower_id, to = %target.id, "Local follow");
            return Ok(FollowStatus::Following);
        }

        let current = self
            .follows
            .find_follow_status(&follower_id, &target.id)
            .await?;
        if current == FollowStatus::Following {
            tracing::debug!(from = %follower_id, to = %target.id, "Already following");
            return Ok(current);
        }

        let follow = Follow::new(
            self.new_activity_url(),
            follower_id.clone(),
            target.id.clone(),
        );

        match self.follow_mode {
            FollowMode::Pending => {
                // Recorded first: the Accept may arrive before delivery returns.
                self.follows
                    .request_follow(&follower_id, &target.id)
                    .await?;

                if let Err(error) = self.deliver(account, &target.inbox, FOLLOW, &follow).await {
                    if current == FollowStatus::Unfollowing {
                        if let Err(cleanup) = self.follows.unfollow(&follower_id, &target.id).await
                        {
                            tracing::warn!(%cleanup, "Failed to remove pending follow");
                        }
                    }
                    return Err(error);
                }

                let status = self
                    .follows
                    .find_follow_status(&follower_id, &target.id)
                    .await?;
                tracing::info!(from = %follower_id, to = %target.id, ?status, "Follow sent");
                Ok(status)
            }
            FollowMode::Optimistic => {
                self.deliver(account, &target.inbox, FOLLOW, &follow).await?;
                self.follows.follow(&follower_id, &target.id).await?;
                tracing::info!(from = %follower_id, to = %target.id, "Follow sent, recorded optimistically");
                Ok(FollowStatus::Following)
            }
        }
    }

    /// Remove the edge to `target`, telling remote servers with an Undo.
    pub async fn unfollow_actor(&self, account: &Account, target: &Actor) -> Result<(), AppError> {
        let follower_id = self.urls.actor_url(&account.id);

        if !self.is_local_actor(target) {
            let current = self
                .follows
                .find_follow_status(&follower_id, &target.id)
                .await?;

            if current != FollowStatus::Unfollowing {
                let follow = Follow::new(
                    self.new_activity_url(),
                    follower_id.clone(),
                    target.id.clone(),
                );
                let undo = Undo::new(self.new_activity_url(), follower_id.clone(), &follow)?;
                self.deliver(account, &target.inbox, UNDO, &undo).await?;
            }
        }

        self.follows.unfollow(&follower_id, &target.id).await?;
        tracing::info!(from = %follower_id, to = %target.id, "Unfollowed");
        Ok(())
    }

    /// Handle an activity delivered to `account_id`'s inbox.
    pub async fn receive_inbox(&self, account_id: &str, body: &[u8]) -> Result<(), AppError> {
        let account = self.accounts.find(account_id).await?;
        let header: ActivityHeader = decode_activity(body)?;
        ACTIVITIES_RECEIVED
            .with_label_values(&["inbox", activity_label(&header.kind)])
            .inc();

        match header.kind.as_str() {
            FOLLOW => self.receive_follow(&account, body).await,
            ACCEPT => self.receive_accept(&account, body).await,
            UNDO => self.receive_undo(&account, body).await,
            other => Err(AppError::UnsupportedActivityType(other.to_string())),
        }
    }

    /// Handle an activity posted by `account_id` to its own outbox.
    pub async fn receive_outbox(&self, account_id: &str, body: &[u8]) -> Result<(), AppError> {
        let account = self.accounts.find(account_id).await?;
        let header: ActivityHeader = decode_activity(body)?;
        ACTIVITIES_RECEIVED
            .with_label_values(&["outbox", activity_label(&header.kind)])
            .inc();

        match header.kind.as_str() {
            FOLLOW => {
                let follow: Follow = decode_activity(body)?;
                self.check_outbox_actor(&account, &follow.actor)?;
                let target_url = follow
                    .object
                    .as_ref()
                    .map(|object| object.primary())
                    .ok_or_else(|| AppError::Validation("follow has no object".to_string()))?;

                let target = self.find_actor_by_url(&account, target_url).await?;
                self.follow_actor(&account, &target).await.map(|_| ())
            }
            UNDO => {
                let undo: Undo = decode_activity(body)?;
                self.check_outbox_actor(&account, &undo.actor)?;
                let follow = embedded_follow(&undo.object)?;
                let target_url = follow
                    .target()
                    .ok_or_else(|| AppError::Validation("undone follow has no target".to_string()))?;

                let target = self.find_actor_by_url(&account, target_url).await?;
                self.unfollow_actor(&account, &target).await
            }
            other => Err(AppError::UnsupportedActivityType(other.to_string())),
        }
    }

    fn check_outbox_actor(&self, account: &Account, actor: &str) -> Result<(), AppError> {
        if actor != self.urls.actor_url(&account.id) {
            return Err(AppError::Validation(format!(
                "outbox activity actor {} is not the outbox owner",
                actor
            )));
        }
        Ok(())
    }

    /// Record the sender as a follower and answer with an Accept that echoes
    /// the Follow verbatim.
    async fn receive_follow(&self, account: &Account, body: &[u8]) -> Result<(), AppError> {
        let follow: Follow = decode_activity(body)?;
        let local_actor = self.urls.actor_url(&account.id);

        if let Some(object) = &follow.object {
            if object.primary() != local_actor {
                return Err(AppError::Validation(format!(
                    "follow object {} is not {}",
                    object.primary(),
                    local_actor
                )));
            }
        }

        let follower = self.client.get_actor(account, &follow.actor).await?;
        if follower.id != follow.actor {
            return Err(AppError::Validation(format!(
                "actor document {} does not match follow actor {}",
                follower.id, follow.actor
            )));
        }

        self.follows.follow(&follow.actor, &local_actor).await?;
        tracing::info!(from = %follow.actor, to = %local_actor, "Accepted follower");

        let original = std::str::from_utf8(body)
            .map_err(|e| AppError::Validation(format!("follow is not UTF-8: {}", e)))?;
        let accept = Accept::new(
            self.new_activity_url(),
            local_actor,
            ObjectValue::embedded_raw(original)?,
        );
        self.deliver(account, &follower.inbox, ACCEPT, &accept)
            .await
    }

    /// Confirm a follow this account sent.
    async fn receive_accept(&self, account: &Account, body: &[u8]) -> Result<(), AppError> {
        let accept: Accept = decode_activity(body)?;
        let local_actor = self.urls.actor_url(&account.id);

        let target = match &accept.object {
            // A bare link only confirms a request we sent.
            ObjectValue::Link(link) => {
                match self
                    .follows
                    .find_follow_status(&local_actor, &accept.actor)
                    .await?
                {
                    FollowStatus::Pending => accept.actor.clone(),
                    FollowStatus::Following => {
                        tracing::debug!(from = %local_actor, to = %accept.actor, "Accept for a confirmed follow");
                        return Ok(());
                    }
                    FollowStatus::Unfollowing => {
                        return Err(AppError::Validation(format!(
                            "accept {} from {} matches no pending follow",
                            link, accept.actor
                        )));
                    }
                }
            }
            ObjectValue::Embedded(_) => {
                let follow = embedded_follow(&accept.object)?;
                if follow.actor != local_actor {
                    return Err(AppError::Validation(format!(
                        "accepted follow was sent by {}, not {}",
                        follow.actor, local_actor
                    )));
                }

                let target = follow
                    .target()
                    .ok_or_else(|| AppError::Validation("accepted follow has no target".to_string()))?;
                if target != accept.actor {
                    return Err(AppError::Validation(format!(
                        "accept from {} for a follow of {}",
                        accept.actor, target
                    )));
                }
                target.to_string()
            }
        };

        self.follows.follow(&local_actor, &target).await?;
        tracing::info!(from = %local_actor, to = %target, "Follow accepted");
        Ok(())
    }

    /// A remote actor withdrew its follow of this account.
    async fn receive_undo(&self, account: &Account, body: &[u8]) -> Result<(), AppError> {
        let undo: Undo = decode_activity(body)?;
        let follow = embedded_follow(&undo.object)?;

        if follow.actor != undo.actor {
            return Err(AppError::Validation(format!(
                "undo by {} of a follow by {}",
                undo.actor, follow.actor
            )));
        }

        let local_actor = self.urls.actor_url(&account.id);
        self.follows.unfollow(&follow.actor, &local_actor).await?;
        tracing::info!(from = %follow.actor, to = %local_actor, "Follower removed");
        Ok(())
    }
}

/// Decode an embedded Follow; other embedded types are unsupported.
fn embedded_follow(object: &ObjectValue) -> Result<Follow, AppError> {
    match object.embedded_type()? {
        None => Err(AppError::Validation(
            "expected an embedded activity".to_string(),
        )),
        Some(kind) if kind == FOLLOW => object.decode(),
        Some(kind) => Err(AppError::UnsupportedActivityType(kind)),
    }
}
