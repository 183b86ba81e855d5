//! Account lifecycle: signup and login

use chrono::Utc;

use super::Processor;
use crate::data::{Account, generate_account_id};
use crate::error::AppError;
use crate::federation::generate_private_key_pem;

fn validate_signup(email: &str, username: &str, password: &str) -> Result<(), AppError> {
    if username.is_empty() {
        return Err(AppError::Validation("username must not be empty".to_string()));
    }
    if username.contains(['@', '/']) || username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(format!(
            "username {:?} contains a reserved character",
            username
        )));
    }
    if !email.contains('@') {
        return Err(AppError::Validation(format!("invalid email {:?}", email)));
    }
    if password.is_empty() {
        return Err(AppError::Validation("password must not be empty".to_string()));
    }
    Ok(())
}

/// `Ok(true)` when the lookup found something, `Ok(false)` on `NotFound`.
fn exists(lookup: Result<Account, AppError>) -> Result<bool, AppError> {
    match lookup {
        Ok(_) => Ok(true),
        Err(AppError::NotFound) => Ok(false),
        Err(error) => Err(error),
    }
}

impl Processor {
    /// Create an account and return its id.
    ///
    /// Key generation and password hashing run on the blocking pool.
    pub async fn signup(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<String, AppError> {
        let email = email.trim();
        let username = username.trim();
        validate_signup(email, username, password)?;

        if exists(self.accounts.find_by_username(username).await)? {
            return Err(AppError::Conflict(format!(
                "username {} is already taken",
                username
            )));
        }
        if exists(self.accounts.find_by_email(email).await)? {
            return Err(AppError::Conflict("email is already registered".to_string()));
        }

        let key_bits = self.key_bits;
        let cost = self.password_cost;
        let password = password.to_string();
        let (private_key_pem, password_hash) = tokio::task::spawn_blocking(move || {
            let key = generate_private_key_pem(key_bits)?;
            let hash = bcrypt::hash(password, cost)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash password: {}", e)))?;
            Ok::<_, AppError>((key, hash))
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("signup task failed: {}", e)))??;

        let account = Account {
            id: generate_account_id(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            private_key_pem,
            created_at: Utc::now(),
        };
        self.accounts.save(&account).await?;

        tracing::info!(account_id = %account.id, username = %account.username, "Account created");
        Ok(account.id)
    }

    /// Verify credentials and return the account id.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AppError> {
        let account = match self.accounts.find_by_email(email.trim()).await {
            Ok(account) => account,
            Err(AppError::NotFound) => {
                tracing::debug!("login for unknown email");
                return Err(AppError::AuthenticationFailure);
            }
            Err(error) => return Err(error),
        };

        let password = password.to_string();
        let hash = account.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("login task failed: {}", e)))?;

        match verified {
            Ok(true) => Ok(account.id),
            Ok(false) => {
                tracing::debug!(account_id = %account.id, "wrong password");
                Err(AppError::AuthenticationFailure)
            }
            Err(error) => {
                tracing::warn!(account_id = %account.id, %error, "stored password hash is unusable");
                Err(AppError::AuthenticationFailure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::processor;
    use crate::config::FollowMode;
    use crate::data::AccountStore;
    use crate::error::AppError;
    use crate::federation::public_key_pem;

    #[tokio::test]
    async fn signup_then_login() {
        let (processor, db, _dir) = processor(FollowMode::Pending).await;
        let id = processor
            .signup(" alice@mail.test ", "alice", "correct horse")
            .await
            .unwrap();
        assert_eq!(id.len(), 32);

        let stored = db.find(&id).await.unwrap();
        assert_eq!(stored.email, "alice@mail.test");
        assert_ne!(stored.password_hash, "correct horse");
        assert!(public_key_pem(&stored.private_key_pem).is_ok());

        assert_eq!(
            processor
                .login("alice@mail.test", "correct horse")
                .await
                .unwrap(),
            id
        );
    }

    #[tokio::test]
    async fn login_failures_look_the_same() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;
        processor
            .signup("alice@mail.test", "alice", "secret")
            .await
            .unwrap();

        assert!(matches!(
            processor.login("alice@mail.test", "wrong").await,
            Err(AppError::AuthenticationFailure)
        ));
        assert!(matches!(
            processor.login("nobody@mail.test", "secret").await,
            Err(AppError::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;
        processor
            .signup("alice@mail.test", "alice", "secret")
            .await
            .unwrap();

        assert!(matches!(
            processor.signup("other@mail.test", "alice", "secret").await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            processor.signup("alice@mail.test", "alice2", "secret").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn signup_rejects_bad_input() {
        let (processor, _db, _dir) = processor(FollowMode::Pending).await;

        for (email, username, password) in [
            ("a@mail.test", "", "pw"),
            ("a@mail.test", "bob@host", "pw"),
            ("a@mail.test", "bo b", "pw"),
            ("not-an-email", "bob", "pw"),
            ("a@mail.test", "bob", ""),
        ] {
            assert!(
                matches!(
                    processor.signup(email, username, password).await,
                    Err(AppError::Validation(_))
                ),
                "{email} {username} {password}"
            );
        }
    }
}
