//! OIDC protocol client implementation using the openidconnect crate.
//!
//! Provider metadata (including the JWKS used for signature verification)
//! is discovered once at startup and reused across requests; the only
//! per-login network call is the token exchange itself.

use async_trait::async_trait;
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreErrorResponseType, CoreIdToken, CoreIdTokenClaims,
    CoreProviderMetadata,
};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, StandardErrorResponse, TokenResponse,
};
use serde::{Deserialize, Serialize};

use hallpass_identity::{
    CodeExchangeProof, IdentityVerifier, ProviderSettings, VerificationError, VerifiedClaims,
    settings::SCOPES,
};

/// Bounded timeout for provider network calls. Expiry surfaces as a
/// provider rejection rather than hanging the login attempt.
const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// OIDC client for verifying inbound credentials against the provider.
pub struct OidcVerifier {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    http_client: reqwest::Client,
}

/// Handshake material generated at login initiation and needed to complete
/// the callback: CSRF state, PKCE verifier, and ID-token nonce.
///
/// Stored in a short-lived cookie between the redirect and the callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    pub csrf_token: String,
    pub pkce_verifier: String,
    pub nonce: String,
}

impl OidcVerifier {
    /// Creates a new verifier by discovering the provider metadata.
    pub async fn discover(settings: &ProviderSettings) -> Result<Self, OidcSetupError> {
        let issuer_url = IssuerUrl::new(settings.issuer_url().to_string())
            .map_err(|e| OidcSetupError::Configuration(format!("invalid issuer URL: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                OidcSetupError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| OidcSetupError::Discovery(format!("failed to discover provider: {}", e)))?;

        let redirect_url = RedirectUrl::new(settings.redirect_uri())
            .map_err(|e| OidcSetupError::Configuration(format!("invalid redirect URI: {}", e)))?;

        Ok(Self {
            provider_metadata,
            client_id: ClientId::new(settings.client_id().to_string()),
            client_secret: ClientSecret::new(settings.client_secret().to_string()),
            redirect_url,
            http_client,
        })
    }

    /// Generates the authorization URL for redirecting the user, plus the
    /// handshake material to stash until the callback.
    pub fn authorization_url(&self) -> (String, Handshake) {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);

        for scope in SCOPES {
            auth_request = auth_request.add_scope(Scope::new((*scope).to_string()));
        }

        let (auth_url, csrf_token, nonce) = auth_request.url();

        let handshake = Handshake {
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
            nonce: nonce.secret().clone(),
        };

        (auth_url.to_string(), handshake)
    }
}

#[async_trait]
impl IdentityVerifier for OidcVerifier {
    async fn exchange_code(
        &self,
        code: &str,
        proof: &CodeExchangeProof,
    ) -> Result<VerifiedClaims, VerificationError> {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let token_request = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| VerificationError::ProviderRejected {
                code: "configuration".to_string(),
                description: Some(format!("token endpoint error: {}", e)),
            })?;

        let token_response = token_request
            .set_pkce_verifier(PkceCodeVerifier::new(proof.pkce_verifier.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(exchange_error)?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| VerificationError::TokenInvalid {
                reason: "no ID token in provider response".to_string(),
            })?;

        // Verifies signature, issuer, audience, expiry, and the nonce
        // captured at login initiation.
        let nonce = Nonce::new(proof.nonce.clone());
        let claims = id_token
            .claims(&client.id_token_verifier(), &nonce)
            .map_err(|e| VerificationError::TokenInvalid {
                reason: e.to_string(),
            })?;

        extract_claims(claims)
    }

    async fn verify_id_token(
        &self,
        raw_token: &str,
    ) -> Result<VerifiedClaims, VerificationError> {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        );

        let id_token: CoreIdToken =
            raw_token
                .parse()
                .map_err(|e| VerificationError::TokenInvalid {
                    reason: format!("malformed ID token: {}", e),
                })?;

        // Signature, issuer, audience, and expiry are verified. No
        // server-side nonce exists for provider-initiated tokens, so the
        // nonce claim is accepted as-is on this path.
        let claims = id_token
            .claims(&client.id_token_verifier(), |_: Option<&Nonce>| Ok(()))
            .map_err(|e| VerificationError::TokenInvalid {
                reason: e.to_string(),
            })?;

        extract_claims(claims)
    }
}

/// Maps a token-endpoint failure to a provider rejection, carrying the
/// provider's error code and description when it sent a structured error.
fn exchange_error<RE>(
    err: RequestTokenError<RE, StandardErrorResponse<CoreErrorResponseType>>,
) -> VerificationError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => VerificationError::ProviderRejected {
            code: response.error().to_string(),
            description: response.error_description().cloned(),
        },
        other => VerificationError::ProviderRejected {
            code: "exchange_failed".to_string(),
            description: Some(other.to_string()),
        },
    }
}

/// Extracts the claim set from a verified ID token, enforcing presence of
/// the subject and email claims.
fn extract_claims(claims: &CoreIdTokenClaims) -> Result<VerifiedClaims, VerificationError> {
    let subject = claims.subject().as_str().to_string();
    if subject.is_empty() {
        return Err(VerificationError::TokenInvalid {
            reason: "empty subject claim".to_string(),
        });
    }

    let email = claims
        .email()
        .map(|e| e.as_str().to_string())
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| VerificationError::TokenInvalid {
            reason: "missing required email claim".to_string(),
        })?;

    let given_name = claims
        .given_name()
        .and_then(|n| n.get(None))
        .map(|n| n.as_str().to_string());
    let family_name = claims
        .family_name()
        .and_then(|n| n.get(None))
        .map(|n| n.as_str().to_string());
    let display_name = claims
        .name()
        .and_then(|n| n.get(None))
        .map(|n| n.as_str().to_string())
        .or_else(|| claims.preferred_username().map(|u| u.as_str().to_string()));
    let picture_url = claims
        .picture()
        .and_then(|p| p.get(None))
        .map(|p| p.as_str().to_string());

    Ok(VerifiedClaims::new(subject, email)
        .with_given_name(given_name)
        .with_family_name(family_name)
        .with_display_name(display_name)
        .with_picture_url(picture_url))
}

/// Errors from setting up the OIDC client.
#[derive(Debug)]
pub enum OidcSetupError {
    /// Configuration error (invalid URLs, etc.)
    Configuration(String),
    /// Failed to discover provider metadata.
    Discovery(String),
}

impl std::fmt::Display for OidcSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "OIDC configuration error: {}", msg),
            Self::Discovery(msg) => write!(f, "OIDC discovery error: {}", msg),
        }
    }
}

impl std::error::Error for OidcSetupError {}
