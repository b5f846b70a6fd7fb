use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use argon2::password_hash::rand_core::{OsRng, RngCore};

use crate::error::{AccountError, AccountResult};
use crate::models::{User, UserId};
use crate::repository::UserRepository;

/// How long a verification/recovery link stays usable.
pub const DEFAULT_TOKEN_VALIDITY_HOURS: i64 = 24;

const TOKEN_BYTES: usize = 32;

/// Produces opaque URL-safe token strings. Also used to mint throwaway
/// passwords when an admin creates an account without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenGenerator;

impl TokenGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// A token bound to exactly one account. Expiry is judged against
/// `issued_at` by the validator, not by the store, so a known-but-stale
/// token stays distinguishable from an unknown one.
#[derive(Debug, Clone)]
pub struct AccountToken {
    pub token: String,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
}

/// Storage boundary for outstanding tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn put(&self, token: AccountToken) -> AccountResult<()>;

    async fn find(&self, token: &str) -> AccountResult<Option<AccountToken>>;

    /// Remove a token, returning whether it existed.
    async fn remove(&self, token: &str) -> AccountResult<bool>;
}

/// In-memory implementation of `TokenRepository` (for development/testing).
#[derive(Debug, Default, Clone)]
pub struct InMemoryTokenRepository {
    tokens: Arc<RwLock<HashMap<String, AccountToken>>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn put(&self, token: AccountToken) -> AccountResult<()> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find(&self, token: &str) -> AccountResult<Option<AccountToken>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(token).cloned())
    }

    async fn remove(&self, token: &str) -> AccountResult<bool> {
        let mut tokens = self.tokens.write().await;
        Ok(tokens.remove(token).is_some())
    }
}

/// Resolves opaque token strings to the account they were issued for.
///
/// Validation never consumes: the handler that performs the state change the
/// token authorized calls `consume` after it succeeds, so a resolved token
/// whose downstream command failed can be retried within its window.
#[derive(Clone)]
pub struct TokenValidator<T: TokenRepository, R: UserRepository> {
    tokens: Arc<T>,
    users: Arc<R>,
    generator: TokenGenerator,
    validity: Duration,
}

impl<T: TokenRepository, R: UserRepository> TokenValidator<T, R> {
    pub fn new(tokens: T, users: R) -> Self {
        Self {
            tokens: Arc::new(tokens),
            users: Arc::new(users),
            generator: TokenGenerator::new(),
            validity: Duration::hours(DEFAULT_TOKEN_VALIDITY_HOURS),
        }
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Issue a fresh token for an account. The caller embeds it in the
    /// verification or recovery link it sends out.
    pub async fn issue(&self, user_id: UserId) -> AccountResult<String> {
        let token = self.generator.generate();
        self.tokens
            .put(AccountToken {
                token: token.clone(),
                user_id,
                issued_at: Utc::now(),
            })
            .await?;

        tracing::info!(user_id = %user_id, "Issued account token");
        Ok(token)
    }

    /// Resolve a token to the account it was issued for.
    ///
    /// Unknown or malformed tokens fail with `InvalidToken`; known tokens
    /// past their window fail with `TokenExpired`. A token whose account no
    /// longer resolves reports `InvalidToken` as well, so existence is not
    /// revealed through error shape.
    pub async fn validate(&self, token: &str) -> AccountResult<User> {
        let record = self
            .tokens
            .find(token)
            .await?
            .ok_or(AccountError::InvalidToken)?;

        if Utc::now() - record.issued_at > self.validity {
            return Err(AccountError::TokenExpired);
        }

        self.users
            .find_by_id(record.user_id)
            .await?
            .ok_or(AccountError::InvalidToken)
    }

    /// Invalidate a token once the command it authorized has been applied.
    pub async fn consume(&self, token: &str) -> AccountResult<()> {
        self.tokens.remove(token).await?;
        Ok(())
    }
}
