use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::error::{AccountError, AccountResult};

/// Maximum accepted email length (matches the admin form bound).
pub const EMAIL_MAX_LENGTH: usize = 150;
/// Name length bounds, shared by first and last name.
pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 100;

/// Account identifier. Generated once at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Email address. Stored as submitted, compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String")]
pub struct Email(String);

impl Email {
    pub fn new(value: impl Into<String>) -> AccountResult<Self> {
        let value = value.into();
        if value.len() > EMAIL_MAX_LENGTH {
            return Err(AccountError::Validation(format!(
                "Email cannot exceed {} characters",
                EMAIL_MAX_LENGTH
            )));
        }
        if !value.validate_email() {
            return Err(AccountError::Validation(format!(
                "'{}' is not a valid email address",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased form used for uniqueness comparisons.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for Email {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Email {}

impl std::hash::Hash for Email {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl TryFrom<String> for Email {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Personal name, used for both first and last name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String")]
pub struct Name(String);

impl Name {
    pub fn new(value: impl Into<String>) -> AccountResult<Self> {
        let value = value.into().trim().to_string();
        let length = value.chars().count();
        if length < NAME_MIN_LENGTH {
            return Err(AccountError::Validation(format!(
                "Name must be at least {} characters",
                NAME_MIN_LENGTH
            )));
        }
        if length > NAME_MAX_LENGTH {
            return Err(AccountError::Validation(format!(
                "Name cannot exceed {} characters",
                NAME_MAX_LENGTH
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Name {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account roles. The role picks the password encoder cost tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Encoded credential. Only the password encoder produces these; the inner
/// PHC string is never serialized and the `Debug` form redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub(crate) fn new(encoded: String) -> Self {
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

/// User aggregate. All invariants on a single account are enforced here and
/// in the command handlers that load, mutate and save it.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub first_name: Name,
    pub last_name: Name,
    pub role: Role,
    pub password_hash: PasswordHash,
    pub active: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new account. Accounts always start unverified.
    pub fn new(
        id: UserId,
        email: Email,
        first_name: Name,
        last_name: Name,
        role: Role,
        password_hash: PasswordHash,
        active: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            first_name,
            last_name,
            role,
            password_hash,
            active,
            verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the stored credential with a freshly encoded one.
    pub fn set_password_hash(&mut self, hash: PasswordHash) {
        self.password_hash = hash;
        self.updated_at = Utc::now();
    }

    /// Mark the email as confirmed. Transitions false -> true only; calling
    /// this on an already-verified account changes nothing.
    pub fn verify(&mut self) {
        if self.verified {
            return;
        }
        self.verified = true;
        self.updated_at = Utc::now();
    }
}

/// Account snapshot returned to callers. Excludes the credential.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSnapshot {
    pub id: UserId,
    pub email: Email,
    pub first_name: Name,
    pub last_name: Name,
    pub role: Role,
    pub active: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserSnapshot {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            active: user.active,
            verified: user.verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Command: create an account on a user's behalf. The caller pre-generates
/// the id; a missing password makes the handler mint a random one, which
/// forces the invite/reset flow before the account is usable.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdminAddUser {
    pub user_id: UserId,
    pub email: Email,
    #[serde(default)]
    pub password: Option<String>,
    pub role: Role,
    pub active: bool,
    pub first_name: Name,
    pub last_name: Name,
    #[serde(default)]
    pub send_invite: bool,
}

/// Command: self-service registration. Always creates an active, unverified
/// account with the base role.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterUser {
    pub email: Email,
    pub password: String,
    pub first_name: Name,
    pub last_name: Name,
}

/// Command: admin edit of an existing account. The password is only touched
/// when `change_password` is set.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdminUpdateUser {
    pub user_id: UserId,
    pub email: Email,
    pub first_name: Name,
    pub last_name: Name,
    pub role: Role,
    #[serde(default)]
    pub change_password: bool,
    #[serde(default)]
    pub password: Option<String>,
}

/// Command: replace an account's credential.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePassword {
    pub user_id: UserId,
    pub new_password: String,
}

/// Command: confirm an account's email address.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct VerifyUser {
    pub user_id: UserId,
}

/// Result of `AdminAddUser`. Invite delivery belongs to the caller; the flag
/// is echoed back so it can decide.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminAddUserOutcome {
    pub user: UserSnapshot,
    pub send_invite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_accepts_valid_addresses() {
        let email = Email::new("Jane.Doe@Example.com").unwrap();
        assert_eq!(email.as_str(), "Jane.Doe@Example.com");
        assert_eq!(email.normalized(), "jane.doe@example.com");
    }

    #[test]
    fn email_rejects_invalid_addresses() {
        assert!(Email::new("not-an-email").is_err());
        assert!(Email::new("").is_err());

        let too_long = format!("{}@example.com", "a".repeat(EMAIL_MAX_LENGTH));
        assert!(Email::new(too_long).is_err());
    }

    #[test]
    fn email_compares_case_insensitively() {
        let lower = Email::new("jane@example.com").unwrap();
        let upper = Email::new("JANE@EXAMPLE.COM").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn name_enforces_bounds() {
        assert!(Name::new("J").is_err());
        assert!(Name::new("a".repeat(NAME_MAX_LENGTH + 1)).is_err());
        assert!(Name::new("Jo").is_ok());

        let trimmed = Name::new("  Jane  ").unwrap();
        assert_eq!(trimmed.as_str(), "Jane");
    }

    #[test]
    fn role_round_trips_through_display() {
        for role in [Role::User, Role::Admin] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn password_hash_debug_is_redacted() {
        let hash = PasswordHash::new("$argon2id$v=19$secret".to_string());
        assert_eq!(format!("{:?}", hash), "PasswordHash(..)");
    }

    #[test]
    fn new_users_start_unverified() {
        let user = sample_user();
        assert!(!user.verified);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn verify_is_one_way_and_idempotent() {
        let mut user = sample_user();

        user.verify();
        assert!(user.verified);
        let first_verification = user.updated_at;

        user.verify();
        assert!(user.verified);
        assert_eq!(user.updated_at, first_verification);
    }

    #[test]
    fn snapshot_carries_account_state() {
        let mut user = sample_user();
        user.verify();

        let snapshot = UserSnapshot::from(&user);
        assert_eq!(snapshot.id, user.id);
        assert_eq!(snapshot.email, user.email);
        assert!(snapshot.verified);
        assert!(snapshot.active);
    }

    fn sample_user() -> User {
        User::new(
            UserId::new(),
            Email::new("jane@example.com").unwrap(),
            Name::new("Jane").unwrap(),
            Name::new("Doe").unwrap(),
            Role::User,
            PasswordHash::new("$argon2id$v=19$hash".to_string()),
            true,
        )
    }
}
