//! Identity verification and account binding for the hallpass login broker.
//!
//! This crate provides:
//! - The verified claim set produced by the identity provider (`VerifiedClaims`)
//! - Local account state with durable external-identity linkage (`Account`)
//! - Domain→role policy parsing and role assignment (`RolePolicy`, `assign_role`)
//! - Collaborator contracts (`IdentityVerifier`, `AccountStore`, `SessionIssuer`,
//!   `LoginObserver`)
//! - The login state machine that converts an untrusted external credential
//!   into a trusted local session (`LoginBroker`)
//!
//! # Trust Model
//!
//! Nothing client-supplied is believed directly. A credential (authorization
//! code or raw ID token) enters through an [`IdentityVerifier`], which performs
//! the provider exchange and cryptographic checks and yields a
//! [`VerifiedClaims`] value with `subject` and `email` guaranteed present.
//! Downstream components never re-check claim presence.
//!
//! # Example
//!
//! ```
//! use hallpass_identity::{Account, RolePolicy, assign_role};
//!
//! // Parse an operator-supplied domain→role policy.
//! let policy = RolePolicy::parse("corp.example=editor\npartner.example=author");
//!
//! // A bound account picks up the first matching rule.
//! let mut account = Account::new("alice@corp.example".to_string());
//! assert!(assign_role(&mut account, &policy));
//! assert!(account.has_role("editor"));
//!
//! // Assignment is idempotent.
//! assert!(!assign_role(&mut account, &policy));
//! ```

pub mod account;
pub mod claims;
pub mod error;
pub mod login;
pub mod policy;
pub mod session;
pub mod settings;
pub mod store;
pub mod verify;

// Re-export main types at crate root
pub use account::{Account, Profile};
pub use claims::VerifiedClaims;
pub use error::{LoginError, StoreError, VerificationError};
pub use login::{Credential, LoginBroker, LoginSuccess};
pub use policy::{RolePolicy, RoleRule, assign_role};
pub use session::{Session, SessionId};
pub use settings::ProviderSettings;
pub use store::{AccountStore, LoginObserver, SessionIssuer, generate_password};
pub use verify::{CodeExchangeProof, IdentityVerifier};
