use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{AccountError, AccountResult};
use crate::models::{Email, User, UserId};

/// Persistence boundary for accounts.
///
/// `save` covers both creation and update, keyed by id. Implementations must
/// enforce a unique index on the normalized email of active accounts and
/// translate conflicts into `DuplicateEmail`; the in-handler uniqueness check
/// is a fast path, the store is the authoritative guard.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist an account, creating or replacing by id.
    async fn save(&self, user: User) -> AccountResult<User>;

    /// Get an account by ID
    async fn find_by_id(&self, id: UserId) -> AccountResult<Option<User>>;

    /// Get an account by email, compared case-insensitively
    async fn find_by_email(&self, email: &Email) -> AccountResult<Option<User>>;
}

/// Service answering whether a candidate email is already claimed by an
/// active account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChecksUniqueEmail: Send + Sync {
    /// Returns the id of the active account holding this email, or `None`
    /// when the email is free.
    async fn check(&self, email: &Email) -> AccountResult<Option<UserId>>;
}

/// In-memory implementation of `UserRepository` (for development/testing).
///
/// The duplicate check runs under the same write lock as the insert, so
/// check-then-write is atomic here.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save(&self, user: User) -> AccountResult<User> {
        let mut users = self.users.write().await;

        // Uniqueness only applies among active accounts.
        if user.active {
            let conflict = users.values().any(|u| {
                u.id != user.id && u.active && u.email.normalized() == user.email.normalized()
            });
            if conflict {
                return Err(AccountError::DuplicateEmail(user.email));
            }
        }

        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, email = %user.email, "Saved user");
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> AccountResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> AccountResult<Option<User>> {
        let users = self.users.read().await;
        let user = users
            .values()
            .find(|u| u.email.normalized() == email.normalized())
            .cloned();
        Ok(user)
    }
}

#[async_trait]
impl ChecksUniqueEmail for InMemoryUserRepository {
    async fn check(&self, email: &Email) -> AccountResult<Option<UserId>> {
        let users = self.users.read().await;
        let existing = users
            .values()
            .find(|u| u.active && u.email.normalized() == email.normalized())
            .map(|u| u.id);
        Ok(existing)
    }
}
