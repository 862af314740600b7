//! Error types for the identity pipeline.
//!
//! Errors are designed for layered context using rootcause:
//! - `VerificationError`: credential verification failures
//! - `StoreError`: account/session store failures
//! - `LoginError`: terminal failures of one login attempt
//!
//! Every variant is terminal for the current attempt: nothing is retried
//! internally, and the boundary layer decides how to render the failure.

use std::fmt;

/// Errors from verifying an inbound credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The provider rejected the exchange (bad/expired/reused code,
    /// misconfigured credentials). Carries the provider's error code and
    /// description.
    ProviderRejected {
        code: String,
        description: Option<String>,
    },
    /// The ID token failed signature, issuer, audience, or expiry checks,
    /// or a required claim was absent.
    TokenInvalid { reason: String },
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderRejected { code, description } => match description {
                Some(description) => {
                    write!(f, "provider rejected the sign-in: {code}: {description}")
                }
                None => write!(f, "provider rejected the sign-in: {code}"),
            },
            Self::TokenInvalid { reason } => {
                write!(f, "ID token verification failed: {reason}")
            }
        }
    }
}

impl std::error::Error for VerificationError {}

/// Errors from the account/session store collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected a write because of a conflicting record
    /// (e.g. the email was claimed by a concurrent creation).
    Conflict { details: String },
    /// The store backend failed.
    Backend { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { details } => write!(f, "store conflict: {details}"),
            Self::Backend { details } => write!(f, "store backend error: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Terminal failure of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// The provider-side code exchange failed.
    ProviderRejected {
        code: String,
        description: Option<String>,
    },
    /// The ID token failed verification or lacked a required claim.
    TokenInvalid { reason: String },
    /// The account store rejected creation of a new account.
    AccountCreationFailed { reason: String },
    /// Creation of a brand-new account is gated on a non-empty role policy,
    /// and none is configured.
    PolicyBlocked,
    /// The account or session store was unavailable.
    StoreUnavailable { reason: String },
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderRejected { code, description } => match description {
                Some(description) => {
                    write!(f, "sign-in rejected by the identity provider: {code}: {description}")
                }
                None => write!(f, "sign-in rejected by the identity provider: {code}"),
            },
            Self::TokenInvalid { reason } => {
                write!(f, "identity could not be verified: {reason}")
            }
            Self::AccountCreationFailed { reason } => {
                write!(f, "account creation failed: {reason}")
            }
            Self::PolicyBlocked => {
                write!(f, "sign-ups are disabled: no role policy is configured")
            }
            Self::StoreUnavailable { reason } => {
                write!(f, "account storage is unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for LoginError {}

impl From<VerificationError> for LoginError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::ProviderRejected { code, description } => {
                Self::ProviderRejected { code, description }
            }
            VerificationError::TokenInvalid { reason } => Self::TokenInvalid { reason },
        }
    }
}

impl From<StoreError> for LoginError {
    fn from(err: StoreError) -> Self {
        match err {
            // Conflicts only arise on account creation races.
            StoreError::Conflict { details } => Self::AccountCreationFailed { reason: details },
            StoreError::Backend { details } => Self::StoreUnavailable { reason: details },
        }
    }
}
