//! Service layer
//!
//! The `Processor` is the orchestration core: it resolves actors, drives
//! signup and login, interprets and produces Follow/Accept/Undo activities
//! and mutates follow state. It holds no mutable state across calls.

mod account;
mod follow;
mod processor;

use std::sync::Arc;

use serde::Serialize;

pub use processor::ViewResult;

use crate::config::{AccountsConfig, FederationConfig, FollowMode};
use crate::data::{Account, AccountStore, EntityId, FollowStore};
use crate::error::AppError;
use crate::federation::{FederationClient, UrlResolver};
use crate::metrics::ACTIVITIES_SENT;

pub struct Processor {
    urls: UrlResolver,
    client: Arc<FederationClient>,
    accounts: Arc<dyn AccountStore>,
    follows: Arc<dyn FollowStore>,
    follow_mode: FollowMode,
    key_bits: usize,
    password_cost: u32,
}

impl Processor {
    pub fn new(
        urls: UrlResolver,
        client: Arc<FederationClient>,
        accounts: Arc<dyn AccountStore>,
        follows: Arc<dyn FollowStore>,
        federation: &FederationConfig,
        accounts_config: &AccountsConfig,
    ) -> Self {
        Self {
            urls,
            client,
            accounts,
            follows,
            follow_mode: federation.follow_mode,
            key_bits: accounts_config.key_bits,
            password_cost: accounts_config.password_cost,
        }
    }

    pub fn urls(&self) -> &UrlResolver {
        &self.urls
    }

    pub fn client(&self) -> &FederationClient {
        &self.client
    }

    fn new_activity_url(&self) -> String {
        self.urls.activity_url(&EntityId::new().0)
    }

    /// POST an activity to a remote inbox and count it.
    async fn deliver<T: Serialize + ?Sized>(
        &self,
        account: &Account,
        inbox: &str,
        kind: &'static str,
        activity: &T,
    ) -> Result<(), AppError> {
        self.client.post_inbox(account, inbox, activity).await?;
        ACTIVITIES_SENT.with_label_values(&[kind]).inc();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{AccountsConfig, FederationConfig};
    use crate::data::Database;
    use crate::federation::SignatureAlgorithm;
    use tempfile::TempDir;

    pub const HOST: &str = "local.test";

    /// Processor over a temp database. Remote hosts are unreachable.
    pub async fn processor(follow_mode: FollowMode) -> (Processor, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("processor.db"))
                .await
                .unwrap(),
        );

        let federation = FederationConfig {
            software_name: "actorhub-test".to_string(),
            follow_mode,
            signature_algorithms: vec![SignatureAlgorithm::RsaSha256],
            signature_expiry_seconds: 30,
            request_timeout_seconds: 2,
            remote_scheme: "http".to_string(),
        };
        let accounts = AccountsConfig {
            key_bits: 1024,
            password_cost: 4,
        };

        let urls = UrlResolver::new("https", HOST);
        let client = Arc::new(FederationClient::new(&federation, urls.clone()).unwrap());
        let processor = Processor::new(
            urls,
            client,
            db.clone(),
            db.clone(),
            &federation,
            &accounts,
        );
        (processor, db, temp_dir)
    }
}
