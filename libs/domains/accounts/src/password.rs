use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};

use crate::error::{AccountError, AccountResult};
use crate::models::{PasswordHash, Role};

/// Minimum accepted password length (matches the client-side rule).
pub const PASSWORD_MIN_LENGTH: usize = 12;
/// Hard upper bound; longer inputs are rejected before any hashing work.
pub const PASSWORD_MAX_LENGTH: usize = 4096;

// Argon2id cost tiers (memory KiB, iterations, parallelism).
const USER_COST: (u32, u32, u32) = (19_456, 2, 1);
const ADMIN_COST: (u32, u32, u32) = (65_536, 3, 1);

/// Turns a plaintext password into a stored credential. Each call salts
/// freshly, so identical plaintexts never produce identical hashes. This
/// encoder never verifies passwords; authentication owns that.
#[derive(Debug, Default, Clone, Copy)]
pub struct PasswordEncoder;

impl PasswordEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, role: Role, plaintext: &str) -> AccountResult<PasswordHash> {
        if plaintext.len() > PASSWORD_MAX_LENGTH {
            return Err(AccountError::EncodingFailure(format!(
                "Password exceeds {} characters",
                PASSWORD_MAX_LENGTH
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hasher(role)?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| AccountError::EncodingFailure(e.to_string()))?;

        Ok(PasswordHash::new(hash.to_string()))
    }

    fn hasher(&self, role: Role) -> AccountResult<Argon2<'static>> {
        let (m_cost, t_cost, p_cost) = match role {
            Role::User => USER_COST,
            Role::Admin => ADMIN_COST,
        };
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AccountError::EncodingFailure(e.to_string()))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Pluggable strength check run before encoding. Host applications layer
/// breach/zxcvbn-style checkers on top of this seam; the core only enforces
/// length bounds.
#[cfg_attr(test, mockall::automock)]
pub trait PasswordStrengthPolicy: Send + Sync {
    fn check(&self, plaintext: &str) -> AccountResult<()>;
}

/// Default policy: length bounds only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LengthPolicy;

impl PasswordStrengthPolicy for LengthPolicy {
    fn check(&self, plaintext: &str) -> AccountResult<()> {
        if plaintext.len() < PASSWORD_MIN_LENGTH {
            return Err(AccountError::Validation(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_LENGTH
            )));
        }
        if plaintext.len() > PASSWORD_MAX_LENGTH {
            return Err(AccountError::Validation(format!(
                "Password cannot exceed {} characters",
                PASSWORD_MAX_LENGTH
            )));
        }
        Ok(())
    }
}
