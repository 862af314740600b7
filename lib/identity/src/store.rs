//! Collaborator contracts for account storage, session issuance, and
//! post-login observation.
//!
//! The pipeline owns none of this state; it drives the collaborators through
//! these traits so the core stays independently testable.

use async_trait::async_trait;
use hallpass_core::AccountId;
use rand::Rng;

use crate::account::Account;
use crate::claims::VerifiedClaims;
use crate::error::StoreError;
use crate::session::Session;

/// Account datastore contract.
///
/// Lookups must match exactly; the pipeline normalizes emails before
/// querying. `create` must reject a duplicate email with
/// [`StoreError::Conflict`] so concurrent first logins surface as an
/// account-creation failure instead of two accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Finds an account by email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Finds an account by its linked provider subject identifier.
    async fn find_by_subject(&self, subject: &str) -> Result<Option<Account>, StoreError>;

    /// Persists a brand-new account.
    ///
    /// The initial password is generated by the pipeline and is never
    /// transmitted or displayed; implementations store it hashed (or
    /// discard it if the backing store is password-less).
    async fn create(&self, account: &Account, initial_password: &str) -> Result<(), StoreError>;

    /// Persists changes to an existing account.
    async fn update(&self, account: &Account) -> Result<(), StoreError>;
}

/// Session collaborator contract: issue a session for a bound account,
/// remembered across requests.
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    /// Issues a new session for the given account.
    async fn issue(&self, account: AccountId) -> Result<Session, StoreError>;
}

/// Post-login notification hook.
///
/// Invoked exactly once per successful login, after session issuance.
/// Fire-and-forget: observers cannot abort or alter the login outcome.
pub trait LoginObserver: Send + Sync {
    /// Called with the bound account's ID and the verified claims.
    fn after_login(&self, account: AccountId, claims: &VerifiedClaims);
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl LoginObserver for NullObserver {
    fn after_login(&self, _account: AccountId, _claims: &VerifiedClaims) {}
}

/// Characters used for generated account passwords.
const PASSWORD_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+";

/// Length of generated account passwords.
const PASSWORD_LEN: usize = 32;

/// Generates a strong random password for a newly provisioned account.
///
/// The password is never transmitted or displayed; it only exists so the
/// account record satisfies stores that require a credential.
#[must_use]
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LEN)
        .map(|_| PASSWORD_CHARS[rng.random_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}
