//! Local account state and related structures.
//!
//! An account represents a local user the broker can issue sessions for.
//! Accounts are matched to provider identities by email or by the stored
//! external subject identifier, and carry a durable linkage to the provider
//! once established.

use chrono::{DateTime, Utc};
use hallpass_core::AccountId;
use serde::{Deserialize, Serialize};

use crate::claims::VerifiedClaims;

/// Optional profile fields filled opportunistically from verified claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Nickname / display name.
    pub nickname: Option<String>,
    /// Profile picture URL.
    pub picture_url: Option<String>,
}

/// Represents a local user account.
///
/// Created by the login pipeline when no existing account matches a verified
/// identity; thereafter mutated only by profile enrichment (fill-if-empty)
/// and role assignment. Accounts are never deleted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Internal account ID.
    id: AccountId,
    /// Email address the account was provisioned with.
    email: String,
    /// The provider's subject identifier, once linked.
    /// First-writer-wins: never overwritten after being set.
    external_subject: Option<String>,
    /// Authorization roles held by the account. Set semantics.
    roles: Vec<String>,
    /// Optional profile fields.
    profile: Profile,
    /// When the account was created.
    created_at: DateTime<Utc>,
    /// When the account was last updated.
    updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new account for the given email, with no roles, no profile,
    /// and no external linkage yet.
    #[must_use]
    pub fn new(email: String) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            email,
            external_subject: None,
            roles: Vec::new(),
            profile: Profile::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an account with all fields specified.
    ///
    /// Use this when reconstituting an account from storage.
    #[must_use]
    pub fn with_all_fields(
        id: AccountId,
        email: String,
        external_subject: Option<String>,
        roles: Vec<String>,
        profile: Profile,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            external_subject,
            roles,
            profile,
            created_at,
            updated_at,
        }
    }

    /// Returns the internal account ID.
    #[must_use]
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Returns the account's email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the linked provider subject identifier, if set.
    #[must_use]
    pub fn external_subject(&self) -> Option<&str> {
        self.external_subject.as_deref()
    }

    /// Returns the account's roles.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Returns the profile fields.
    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Returns when the account was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the account was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the lowercased domain of the account's email (the part after
    /// the last `@`), or `None` if the email has no domain.
    #[must_use]
    pub fn email_domain(&self) -> Option<String> {
        self.email
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
    }

    /// Returns true if the account holds the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Links the account to a provider subject identifier.
    ///
    /// First-writer-wins: the linkage is only established if no subject is
    /// set yet. Returns true if the account changed.
    pub fn link_subject(&mut self, subject: &str) -> bool {
        if self.external_subject.is_some() {
            return false;
        }
        self.external_subject = Some(subject.to_string());
        self.updated_at = Utc::now();
        true
    }

    /// Adds a role to the account if not already held.
    ///
    /// Returns true if the account changed. Existing roles are never removed.
    pub fn add_role(&mut self, role: &str) -> bool {
        if self.has_role(role) {
            return false;
        }
        self.roles.push(role.to_string());
        self.updated_at = Utc::now();
        true
    }

    /// Fills empty profile fields from verified claims.
    ///
    /// Fields that already hold a non-empty value are never overwritten;
    /// missing optional claims are simply skipped. Idempotent. Returns true
    /// if any field was filled.
    pub fn enrich_from(&mut self, claims: &VerifiedClaims) -> bool {
        let mut changed = false;
        changed |= fill_if_empty(&mut self.profile.first_name, claims.given_name());
        changed |= fill_if_empty(&mut self.profile.last_name, claims.family_name());
        changed |= fill_if_empty(&mut self.profile.nickname, claims.display_name());
        changed |= fill_if_empty(&mut self.profile.picture_url, claims.picture_url());
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

/// Sets `slot` to `value` only when the slot is empty and a value exists.
fn fill_if_empty(slot: &mut Option<String>, value: Option<&str>) -> bool {
    let empty = slot.as_deref().is_none_or(str::is_empty);
    match value {
        Some(v) if empty && !v.is_empty() => {
            *slot = Some(v.to_string());
            true
        }
        _ => false,
    }
}
