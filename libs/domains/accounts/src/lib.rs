//! Accounts Domain
//!
//! Account identity & credential lifecycle: registration, credential change,
//! email verification and password recovery.
//!
//! # Features
//!
//! - Admin and self-service account creation
//! - Password hashing with Argon2 (role-aware cost tiers)
//! - Single-use, time-bounded verification/recovery tokens
//! - Email uniqueness enforced at the storage boundary
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ RecoveryFlow │  ← token-gated verify / recover-reset orchestration
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │   Service    │  ← command handlers, uniqueness + policy checks
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ Repositories │  ← user + token persistence (traits + in-memory impls)
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │    Models    │  ← value types, User aggregate, commands
//! └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_accounts::{
//!     repository::InMemoryUserRepository,
//!     service::AccountService,
//! };
//!
//! let repository = InMemoryUserRepository::new();
//! let service = AccountService::new(repository.clone(), repository);
//! ```

pub mod error;
pub mod models;
pub mod password;
pub mod recovery;
pub mod repository;
pub mod service;
pub mod tokens;

// Re-export commonly used types
pub use error::{AccountError, AccountResult};
pub use models::{
    AdminAddUser, AdminAddUserOutcome, AdminUpdateUser, ChangePassword, Email, Name, PasswordHash,
    RegisterUser, Role, User, UserId, UserSnapshot, VerifyUser,
};
pub use password::{LengthPolicy, PasswordEncoder, PasswordStrengthPolicy};
pub use recovery::RecoveryFlow;
pub use repository::{ChecksUniqueEmail, InMemoryUserRepository, UserRepository};
pub use service::AccountService;
pub use tokens::{
    AccountToken, InMemoryTokenRepository, TokenGenerator, TokenRepository, TokenValidator,
};
