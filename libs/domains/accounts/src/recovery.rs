use crate::error::{AccountError, AccountResult};
use crate::models::{ChangePassword, UserSnapshot, VerifyUser};
use crate::repository::{ChecksUniqueEmail, UserRepository};
use crate::service::AccountService;
use crate::tokens::{TokenRepository, TokenValidator};

/// Token-gated flows: email verification and password recovery.
///
/// Both resolve a link token to an account, then drive the verify and
/// change-password commands. The token is consumed only after the commands
/// succeed, so a failed attempt can be retried with the same link within its
/// window. Neither flow establishes a session afterwards; the caller's read
/// model may not yet reflect the write.
pub struct RecoveryFlow<T, R, C>
where
    T: TokenRepository,
    R: UserRepository,
    C: ChecksUniqueEmail,
{
    validator: TokenValidator<T, R>,
    service: AccountService<R, C>,
}

impl<T, R, C> RecoveryFlow<T, R, C>
where
    T: TokenRepository,
    R: UserRepository,
    C: ChecksUniqueEmail,
{
    pub fn new(validator: TokenValidator<T, R>, service: AccountService<R, C>) -> Self {
        Self { validator, service }
    }

    /// Activate an account from a verification link and set its first
    /// password. Fails with `AlreadyVerified` when the link was already used
    /// for an activated account.
    pub async fn verify(&self, token: &str, new_password: &str) -> AccountResult<UserSnapshot> {
        let user = self.validator.validate(token).await?;

        // Inactive accounts look exactly like unknown tokens.
        if !user.active {
            return Err(AccountError::InvalidToken);
        }

        if user.verified {
            return Err(AccountError::AlreadyVerified);
        }

        self.service
            .verify_user(VerifyUser { user_id: user.id })
            .await?;

        let snapshot = self
            .service
            .change_password(ChangePassword {
                user_id: user.id,
                new_password: new_password.to_string(),
            })
            .await?;

        self.validator.consume(token).await?;
        tracing::info!(user_id = %user.id, "Account verified via token");

        Ok(snapshot)
    }

    /// Reset a forgotten password from a recovery link. Completing the reset
    /// proves control of the email, so an unverified account is verified
    /// first.
    pub async fn recover_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> AccountResult<UserSnapshot> {
        let user = self.validator.validate(token).await?;

        if !user.active {
            return Err(AccountError::InvalidToken);
        }

        if !user.verified {
            self.service
                .verify_user(VerifyUser { user_id: user.id })
                .await?;
        }

        let snapshot = self
            .service
            .change_password(ChangePassword {
                user_id: user.id,
                new_password: new_password.to_string(),
            })
            .await?;

        self.validator.consume(token).await?;
        tracing::info!(user_id = %user.id, "Password reset via token");

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use crate::models::{AdminAddUser, Email, Name, Role, User, UserId};
    use crate::repository::InMemoryUserRepository;
    use crate::tokens::InMemoryTokenRepository;

    /// Wraps the in-memory repository and records every save, so tests can
    /// assert the order of observable writes.
    #[derive(Clone)]
    struct RecordingRepository {
        inner: InMemoryUserRepository,
        saves: Arc<RwLock<Vec<(bool, String)>>>,
    }

    impl RecordingRepository {
        fn new(inner: InMemoryUserRepository) -> Self {
            Self {
                inner,
                saves: Arc::new(RwLock::new(Vec::new())),
            }
        }

        async fn recorded_saves(&self) -> Vec<(bool, String)> {
            self.saves.read().await.clone()
        }
    }

    #[async_trait]
    impl UserRepository for RecordingRepository {
        async fn save(&self, user: User) -> crate::error::AccountResult<User> {
            self.saves
                .write()
                .await
                .push((user.verified, user.password_hash.as_str().to_string()));
            self.inner.save(user).await
        }

        async fn find_by_id(&self, id: UserId) -> crate::error::AccountResult<Option<User>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_email(
            &self,
            email: &Email,
        ) -> crate::error::AccountResult<Option<User>> {
            self.inner.find_by_email(email).await
        }
    }

    struct Setup {
        flow: RecoveryFlow<InMemoryTokenRepository, RecordingRepository, InMemoryUserRepository>,
        repo: RecordingRepository,
        user_id: UserId,
        token: String,
    }

    /// Build a flow around one stored account and one issued token.
    async fn setup(active: bool, verified: bool) -> Setup {
        let inner = InMemoryUserRepository::new();
        let repo = RecordingRepository::new(inner.clone());
        let service = AccountService::new(repo.clone(), inner.clone());

        let outcome = service
            .admin_add_user(AdminAddUser {
                user_id: UserId::new(),
                email: Email::new("jane@example.com").unwrap(),
                password: None,
                role: Role::User,
                active,
                first_name: Name::new("Jane").unwrap(),
                last_name: Name::new("Doe").unwrap(),
                send_invite: true,
            })
            .await
            .unwrap();
        let user_id = outcome.user.id;

        if verified {
            service.verify_user(VerifyUser { user_id }).await.unwrap();
        }

        let validator = TokenValidator::new(InMemoryTokenRepository::new(), repo.clone());
        let token = validator.issue(user_id).await.unwrap();

        // Only the saves made by the flow under test matter.
        repo.saves.write().await.clear();

        Setup {
            flow: RecoveryFlow::new(validator, service),
            repo,
            user_id,
            token,
        }
    }

    #[tokio::test]
    async fn recover_reset_verifies_before_changing_password() {
        let s = setup(true, false).await;
        let before = s.repo.find_by_id(s.user_id).await.unwrap().unwrap();
        let original_hash = before.password_hash.as_str().to_string();

        let snapshot = s
            .flow
            .recover_reset(&s.token, "a-brand-new-password")
            .await
            .unwrap();
        assert!(snapshot.verified);

        let saves = s.repo.recorded_saves().await;
        assert_eq!(saves.len(), 2);
        // First write flips the flag and leaves the credential alone.
        assert!(saves[0].0);
        assert_eq!(saves[0].1, original_hash);
        // Second write replaces the credential.
        assert!(saves[1].0);
        assert_ne!(saves[1].1, original_hash);
    }

    #[tokio::test]
    async fn recover_reset_skips_verification_when_already_verified() {
        let s = setup(true, true).await;

        let snapshot = s
            .flow
            .recover_reset(&s.token, "a-brand-new-password")
            .await
            .unwrap();
        assert!(snapshot.verified);

        // Only the password write.
        let saves = s.repo.recorded_saves().await;
        assert_eq!(saves.len(), 1);
    }

    #[tokio::test]
    async fn recover_reset_consumes_the_token() {
        let s = setup(true, false).await;

        s.flow
            .recover_reset(&s.token, "a-brand-new-password")
            .await
            .unwrap();

        let retry = s.flow.recover_reset(&s.token, "a-brand-new-password").await;
        assert!(matches!(retry, Err(AccountError::InvalidToken)));
    }

    #[tokio::test]
    async fn failed_reset_leaves_the_token_usable() {
        let s = setup(true, true).await;

        let rejected = s.flow.recover_reset(&s.token, "short").await;
        assert!(matches!(rejected, Err(AccountError::Validation(_))));

        let retry = s.flow.recover_reset(&s.token, "a-brand-new-password").await;
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn verify_flow_activates_and_sets_password() {
        let s = setup(true, false).await;
        let before = s.repo.find_by_id(s.user_id).await.unwrap().unwrap();
        let original_hash = before.password_hash.as_str().to_string();

        let snapshot = s.flow.verify(&s.token, "a-brand-new-password").await.unwrap();
        assert!(snapshot.verified);

        let after = s.repo.find_by_id(s.user_id).await.unwrap().unwrap();
        assert_ne!(after.password_hash.as_str(), original_hash);
    }

    #[tokio::test]
    async fn verify_flow_rejects_already_verified_accounts() {
        let s = setup(true, true).await;
        let before = s.repo.find_by_id(s.user_id).await.unwrap().unwrap();

        let result = s.flow.verify(&s.token, "a-brand-new-password").await;
        assert!(matches!(result, Err(AccountError::AlreadyVerified)));

        // Nothing was written and the credential is untouched.
        assert!(s.repo.recorded_saves().await.is_empty());
        let after = s.repo.find_by_id(s.user_id).await.unwrap().unwrap();
        assert_eq!(after.password_hash, before.password_hash);

        // The token was not consumed either.
        let retry = s.flow.verify(&s.token, "a-brand-new-password").await;
        assert!(matches!(retry, Err(AccountError::AlreadyVerified)));
    }

    #[tokio::test]
    async fn inactive_accounts_look_like_unknown_tokens() {
        let s = setup(false, false).await;

        let verify = s.flow.verify(&s.token, "a-brand-new-password").await;
        assert!(matches!(verify, Err(AccountError::InvalidToken)));

        let reset = s.flow.recover_reset(&s.token, "a-brand-new-password").await;
        assert!(matches!(reset, Err(AccountError::InvalidToken)));
    }

    #[tokio::test]
    async fn unknown_token_fails_both_flows() {
        let s = setup(true, false).await;

        let result = s.flow.verify("no-such-token", "a-brand-new-password").await;
        assert!(matches!(result, Err(AccountError::InvalidToken)));
    }
}
