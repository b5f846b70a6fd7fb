use std::sync::Arc;
use tracing::instrument;

use crate::error::{AccountError, AccountResult};
use crate::models::{
    AdminAddUser, AdminAddUserOutcome, AdminUpdateUser, ChangePassword, Email, RegisterUser, User,
    UserId, UserSnapshot, VerifyUser,
};
use crate::password::{LengthPolicy, PasswordEncoder, PasswordStrengthPolicy};
use crate::repository::{ChecksUniqueEmail, UserRepository};
use crate::tokens::TokenGenerator;

/// Command handlers for the account lifecycle. One method per command; each
/// runs its precondition checks before any mutation or persistence, so a
/// failed check leaves no observable write.
#[derive(Clone)]
pub struct AccountService<R: UserRepository, C: ChecksUniqueEmail> {
    repository: Arc<R>,
    uniqueness: Arc<C>,
    encoder: PasswordEncoder,
    generator: TokenGenerator,
    policy: Arc<dyn PasswordStrengthPolicy>,
}

impl<R: UserRepository, C: ChecksUniqueEmail> AccountService<R, C> {
    pub fn new(repository: R, uniqueness: C) -> Self {
        Self {
            repository: Arc::new(repository),
            uniqueness: Arc::new(uniqueness),
            encoder: PasswordEncoder::new(),
            generator: TokenGenerator::new(),
            policy: Arc::new(LengthPolicy),
        }
    }

    /// Swap in a host-provided strength policy (breach checks and the like).
    pub fn with_policy(mut self, policy: impl PasswordStrengthPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Create an account on a user's behalf.
    ///
    /// The uniqueness check runs first; on a hit nothing else happens: no
    /// password minting, no encoding, no save. Without an explicit password
    /// a random one is minted, which leaves the account unusable until the
    /// invite/reset flow completes.
    #[instrument(skip(self, command), fields(user_id = %command.user_id, email = %command.email))]
    pub async fn admin_add_user(
        &self,
        command: AdminAddUser,
    ) -> AccountResult<AdminAddUserOutcome> {
        if let Some(existing) = self.uniqueness.check(&command.email).await? {
            tracing::warn!(existing_user_id = %existing, "Email already claimed");
            return Err(AccountError::DuplicateEmail(command.email));
        }

        let plaintext = match &command.password {
            Some(password) => {
                self.policy.check(password)?;
                password.clone()
            }
            None => self.generator.generate(),
        };

        let password_hash = self.encoder.encode(command.role, &plaintext)?;

        let user = User::new(
            command.user_id,
            command.email,
            command.first_name,
            command.last_name,
            command.role,
            password_hash,
            command.active,
        );

        let saved = self.repository.save(user).await?;
        tracing::info!(user_id = %saved.id, "Admin added user");

        Ok(AdminAddUserOutcome {
            user: UserSnapshot::from(&saved),
            send_invite: command.send_invite,
        })
    }

    /// Self-service registration. Always an active, unverified account with
    /// the base role.
    #[instrument(skip(self, command), fields(email = %command.email))]
    pub async fn register_user(&self, command: RegisterUser) -> AccountResult<UserSnapshot> {
        if let Some(existing) = self.uniqueness.check(&command.email).await? {
            tracing::warn!(existing_user_id = %existing, "Email already claimed");
            return Err(AccountError::DuplicateEmail(command.email));
        }

        self.policy.check(&command.password)?;
        let password_hash = self
            .encoder
            .encode(crate::models::Role::User, &command.password)?;

        let user = User::new(
            UserId::new(),
            command.email,
            command.first_name,
            command.last_name,
            crate::models::Role::User,
            password_hash,
            true,
        );

        let saved = self.repository.save(user).await?;
        tracing::info!(user_id = %saved.id, "Registered user");

        Ok(UserSnapshot::from(&saved))
    }

    /// Admin edit of an existing account. The credential is only re-encoded
    /// when the command explicitly asks for it.
    #[instrument(skip(self, command), fields(user_id = %command.user_id))]
    pub async fn admin_update_user(&self, command: AdminUpdateUser) -> AccountResult<UserSnapshot> {
        let mut user = self
            .repository
            .find_by_id(command.user_id)
            .await?
            .ok_or(AccountError::UserNotFound(command.user_id))?;

        if command.email != user.email {
            if let Some(existing) = self.uniqueness.check(&command.email).await? {
                if existing != user.id {
                    return Err(AccountError::DuplicateEmail(command.email));
                }
            }
        }

        if command.change_password {
            let password = command.password.as_deref().ok_or_else(|| {
                AccountError::Validation("A password is required to change it".to_string())
            })?;
            self.policy.check(password)?;
            let hash = self.encoder.encode(command.role, password)?;
            user.set_password_hash(hash);
        }

        user.email = command.email;
        user.first_name = command.first_name;
        user.last_name = command.last_name;
        user.role = command.role;
        user.updated_at = chrono::Utc::now();

        let saved = self.repository.save(user).await?;
        tracing::info!(user_id = %saved.id, "Admin updated user");

        Ok(UserSnapshot::from(&saved))
    }

    /// Replace an account's credential. Encodes exactly once, with the
    /// stored account's own role.
    #[instrument(skip(self, command), fields(user_id = %command.user_id))]
    pub async fn change_password(&self, command: ChangePassword) -> AccountResult<UserSnapshot> {
        let mut user = self
            .repository
            .find_by_id(command.user_id)
            .await?
            .ok_or(AccountError::UserNotFound(command.user_id))?;

        self.policy.check(&command.new_password)?;
        let hash = self.encoder.encode(user.role, &command.new_password)?;
        user.set_password_hash(hash);

        let saved = self.repository.save(user).await?;
        tracing::info!(user_id = %saved.id, "Changed password");

        Ok(UserSnapshot::from(&saved))
    }

    /// Confirm an account's email. A second confirmation is a no-op success;
    /// `verified` never reverts.
    #[instrument(skip(self, command), fields(user_id = %command.user_id))]
    pub async fn verify_user(&self, command: VerifyUser) -> AccountResult<UserSnapshot> {
        let mut user = self
            .repository
            .find_by_id(command.user_id)
            .await?
            .ok_or(AccountError::UserNotFound(command.user_id))?;

        if user.verified {
            return Ok(UserSnapshot::from(&user));
        }

        user.verify();
        let saved = self.repository.save(user).await?;
        tracing::info!(user_id = %saved.id, "Verified user");

        Ok(UserSnapshot::from(&saved))
    }

    /// Backs the caller's email-availability query.
    pub async fn email_available(&self, email: &Email) -> AccountResult<bool> {
        Ok(self.uniqueness.check(email).await?.is_none())
    }
}
