//! Identity Verifier contract.
//!
//! The verifier wraps the external identity provider's protocol client. It
//! is the only component that handles raw credentials; everything downstream
//! sees [`VerifiedClaims`] with the required claims guaranteed present.

use async_trait::async_trait;

use crate::claims::VerifiedClaims;
use crate::error::VerificationError;

/// Proof material captured at login initiation, needed to complete the
/// authorization-code exchange (PKCE verifier and ID-token nonce).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeExchangeProof {
    /// PKCE code verifier generated when the user was redirected.
    pub pkce_verifier: String,
    /// Nonce the returned ID token must echo.
    pub nonce: String,
}

/// Verifies inbound credentials against the external identity provider.
///
/// Implementations must verify the ID token's signature, issuer, audience,
/// and expiry, and confirm the `subject` and `email` claims are present,
/// before producing [`VerifiedClaims`]. Failures must be reported without
/// logging raw tokens or full claim payloads.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Exchanges an authorization code for tokens at the provider's token
    /// endpoint and verifies the returned ID token.
    ///
    /// Fails with `ProviderRejected` if the exchange itself errors, and
    /// with `TokenInvalid` if the ID token fails verification.
    async fn exchange_code(
        &self,
        code: &str,
        proof: &CodeExchangeProof,
    ) -> Result<VerifiedClaims, VerificationError>;

    /// Verifies a client-submitted ID token directly (the one-tap path).
    ///
    /// This path is higher risk than the code exchange: the token did not
    /// travel server-to-server, so full verification rigor is mandatory.
    /// No server-side nonce exists for provider-initiated tokens, so the
    /// nonce claim is not matched on this path.
    async fn verify_id_token(&self, raw_token: &str) -> Result<VerifiedClaims, VerificationError>;
}
