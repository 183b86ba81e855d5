//! Actor resolution and local document rendering

use serde::Serialize;

use super::Processor;
use crate::data::{Account, Actor, FollowStatus};
use crate::error::AppError;
use crate::federation::{
    ActorDocument, MainKeyDocument, PublicKeyDocument, UserAddr, WebFingerResponse, actor_context,
    complement_user_addr, generate_webfinger_response, parse_acct_scheme, public_key_pem,
};

/// An actor together with the follow state between it and the viewer.
#[derive(Debug, Clone, Serialize)]
pub struct ViewResult {
    pub actor: Actor,
    /// viewer -> actor
    pub following: FollowStatus,
    /// actor -> viewer
    pub followed_by: FollowStatus,
}

impl Processor {
    /// Resolve `addr` to an actor, locally or over the network.
    ///
    /// Remote lookups are signed by `account`; without one they are `NotFound`.
    pub async fn find_actor(
        &self,
        account: Option<&Account>,
        addr: &UserAddr,
    ) -> Result<Actor, AppError> {
        if addr.is_local(self.urls.host()) {
            return self.find_local_actor(addr).await?.ok_or(AppError::NotFound);
        }

        let Some(account) = account else {
            tracing::debug!(addr = %addr, "Remote lookup without a signing account");
            return Err(AppError::NotFound);
        };

        let jrd = self
            .client
            .get_webfinger(&addr.host, &addr.acct_uri())
            .await?;
        let actor_id = jrd.find_actor_id()?;
        let document = self.client.get_actor(account, actor_id).await?;
        Ok(remote_actor(document, addr.host.clone()))
    }

    /// Local lookup by username. Absence is `Ok(None)`.
    async fn find_local_actor(&self, addr: &UserAddr) -> Result<Option<Actor>, AppError> {
        match self
            .accounts
            .find_by_username(&addr.preferred_username)
            .await
        {
            Ok(account) => self.local_actor(&account).map(Some),
            Err(AppError::NotFound) => {
                tracing::debug!(username = %addr.preferred_username, "user not found");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Resolve an actor URL: this server's actor URLs map straight to
    /// accounts, anything else is fetched as `account`.
    pub async fn find_actor_by_url(&self, account: &Account, url: &str) -> Result<Actor, AppError> {
        if let Some(account_id) = self.urls.local_account_id(url) {
            let target = self.accounts.find(account_id).await?;
            return self.local_actor(&target);
        }

        let document = self.client.get_actor(account, url).await?;
        let host = document.host()?;
        Ok(remote_actor(document, host))
    }

    pub(crate) fn local_actor(&self, account: &Account) -> Result<Actor, AppError> {
        Ok(Actor {
            id: self.urls.actor_url(&account.id),
            username: account.username.clone(),
            host: self.urls.host().to_string(),
            public_key_pem: public_key_pem(&account.private_key_pem)?,
            inbox: self.urls.inbox_url(&account.id),
        })
    }

    pub(crate) fn is_local_actor(&self, actor: &Actor) -> bool {
        self.urls.local_account_id(&actor.id).is_some()
    }

    /// Look up `acct` and report follow state both ways relative to the viewer.
    ///
    /// Without a viewer only local actors resolve and both states are
    /// `Unfollowing`.
    pub async fn view(&self, account_id: Option<&str>, acct: &str) -> Result<ViewResult, AppError> {
        let account = match account_id {
            Some(id) => Some(self.accounts.find(id).await?),
            None => None,
        };

        let addr = complement_user_addr(acct, self.urls.host());
        let actor = self.find_actor(account.as_ref(), &addr).await?;

        let (following, followed_by) = match &account {
            Some(account) => {
                let viewer = self.urls.actor_url(&account.id);
                (
                    self.follows.find_follow_status(&viewer, &actor.id).await?,
                    self.follows.find_follow_status(&actor.id, &viewer).await?,
                )
            }
            None => (FollowStatus::Unfollowing, FollowStatus::Unfollowing),
        };

        Ok(ViewResult {
            actor,
            following,
            followed_by,
        })
    }

    /// Answer a WebFinger query for an account hosted here.
    pub async fn webfinger(&self, resource: &str) -> Result<WebFingerResponse, AppError> {
        let addr = parse_acct_scheme(resource)?;
        if !addr.is_local(self.urls.host()) {
            return Err(AppError::NotFound);
        }

        let account = self
            .accounts
            .find_by_username(&addr.preferred_username)
            .await?;

        Ok(generate_webfinger_response(
            format!("acct:{}@{}", account.username, self.urls.host()),
            self.urls.actor_url(&account.id),
            self.urls.profile_url(&account.username, ""),
        ))
    }

    pub async fn local_actor_document(&self, account_id: &str) -> Result<ActorDocument, AppError> {
        let account = self.accounts.find(account_id).await?;
        let actor_url = self.urls.actor_url(&account.id);

        Ok(ActorDocument {
            context: Some(actor_context()),
            id: actor_url.clone(),
            kind: "Person".to_string(),
            name: Some(account.username.clone()),
            preferred_username: account.username.clone(),
            url: Some(actor_url),
            inbox: self.urls.inbox_url(&account.id),
            outbox: Some(self.urls.outbox_url(&account.id)),
            followers: Some(self.urls.followers_url(&account.id)),
            following: Some(self.urls.following_url(&account.id)),
            public_key: self.public_key_document(&account)?,
            discoverable: Some(true),
        })
    }

    pub async fn main_key_document(&self, account_id: &str) -> Result<MainKeyDocument, AppError> {
        let account = self.accounts.find(account_id).await?;

        Ok(MainKeyDocument {
            context: actor_context(),
            id: self.urls.actor_url(&account.id),
            kind: "Person".to_string(),
            preferred_username: account.username.clone(),
            public_key: self.public_key_document(&account)?,
        })
    }

    fn public_key_document(&self, account: &Account) -> Result<PublicKeyDocument, AppError> {
        Ok(PublicKeyDocument {
            id: self.urls.main_key_url(&account.id),
            owner: self.urls.actor_url(&account.id),
            public_key_pem: public_key_pem(&account.private_key_pem)?,
        })
    }

    /// Actor URLs following the account (Following edges only)
    pub async fn list_followers(&self, account_id: &str) -> Result<Vec<String>, AppError> {
        let account = self.accounts.find(account_id).await?;
        self.follows
            .list_followers(&self.urls.actor_url(&account.id))
            .await
    }

    /// Actor URLs the account follows (Following edges only)
    pub async fn list_follows(&self, account_id: &str) -> Result<Vec<String>, AppError> {
        let account = self.accounts.find(account_id).await?;
        self.follows
            .list_follows(&self.urls.actor_url(&account.id))
            .await
    }
}

fn remote_actor(document: ActorDocument, host: String) -> Actor {
    Actor {
        id: document.id,
        username: document.preferred_username,
        host,
        public_key_pem: document.public_key.public_key_pem,
        inbox: document.inbox,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{HOST, processor};
    use crate::config::FollowMode;
    use crate::data::FollowStatus;
    use crate::error::AppError;
    use crate::federation::UserAddr;

    #[tokio::test]
    async fn webfinger_answers_local_accounts_only() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;
        let id = processor
            .signup("alice@mail.test", "alice", "secret")
            .await
            .unwrap();

        let jrd = processor.webfinger("acct:alice@local.test").await.unwrap();
        assert_eq!(jrd.subject, "acct:alice@local.test");
        assert_eq!(
            jrd.find_actor_id().unwrap(),
            format!("https://{}/u/{}", HOST, id)
        );

        // An empty host means this server.
        assert!(processor.webfinger("acct:alice").await.is_ok());

        assert!(matches!(
            processor.webfinger("acct:alice@elsewhere.test").await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            processor.webfinger("acct:nobody@local.test").await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            processor.webfinger("alice@local.test").await,
            Err(AppError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn actor_and_key_documents_share_the_key() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;
        let id = processor
            .signup("alice@mail.test", "alice", "secret")
            .await
            .unwrap();

        let actor = processor.local_actor_document(&id).await.unwrap();
        let key = processor.main_key_document(&id).await.unwrap();

        assert_eq!(actor.kind, "Person");
        assert_eq!(actor.preferred_username, "alice");
        assert_eq!(actor.inbox, format!("https://{}/u/{}/inbox", HOST, id));
        assert_eq!(actor.public_key.id, format!("https://{}/u/{}/main-key", HOST, id));
        assert_eq!(actor.public_key.owner, actor.id);
        assert_eq!(actor.public_key, key.public_key);
        assert_eq!(actor.discoverable, Some(true));
    }

    #[tokio::test]
    async fn unknown_local_user_is_not_found() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;
        let result = processor
            .find_actor(None, &UserAddr::new("ghost", HOST))
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn remote_lookup_requires_signing_account() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;
        let result = processor
            .find_actor(None, &UserAddr::new("bob", "remote.test"))
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
        assert_eq!(processor.client().request_count(), 0);
    }

    #[tokio::test]
    async fn view_reports_both_directions() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;
        let alice = processor
            .signup("alice@mail.test", "alice", "secret")
            .await
            .unwrap();
        let bob = processor
            .signup("bob@mail.test", "bob", "secret")
            .await
            .unwrap();

        processor.follow(&bob, "alice").await.unwrap();

        let view = processor.view(Some(&alice), "bob").await.unwrap();
        assert_eq!(view.actor.username, "bob");
        assert_eq!(view.following, FollowStatus::Unfollowing);
        assert_eq!(view.followed_by, FollowStatus::Following);

        let anonymous = processor.view(None, "bob").await.unwrap();
        assert_eq!(anonymous.following, FollowStatus::Unfollowing);
    }

    #[tokio::test]
    async fn collections_list_following_edges() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;
        let alice = processor
            .signup("alice@mail.test", "alice", "secret")
            .await
            .unwrap();
        let bob = processor
            .signup("bob@mail.test", "bob", "secret")
            .await
            .unwrap();

        processor.follow(&alice, "bob").await.unwrap();

        let bob_url = processor.urls().actor_url(&bob);
        let alice_url = processor.urls().actor_url(&alice);
        assert_eq!(processor.list_follows(&alice).await.unwrap(), vec![bob_url]);
        assert_eq!(processor.list_followers(&bob).await.unwrap(), vec![alice_url]);
        assert!(processor.list_followers(&alice).await.unwrap().is_empty());
        assert!(matches!(
            processor.list_followers("missing").await,
            Err(AppError::NotFound)
        ));
    }
}
