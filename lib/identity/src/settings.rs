//! Provider configuration consumed by the login pipeline.
//!
//! The settings are owned by the configuration collaborator (environment,
//! admin surface, ...); the pipeline only borrows an immutable snapshot for
//! the duration of one login attempt.

use serde::{Deserialize, Serialize};

/// Query parameter marking an inbound request as the OAuth code callback.
pub const OAUTH_CALLBACK_PARAM: &str = "provider_oauth_callback";

/// Query parameter marking an inbound request as a direct ID-token submission.
pub const DIRECT_TOKEN_PARAM: &str = "provider_direct_token";

/// OAuth2/OIDC scopes requested at login initiation.
pub const SCOPES: &[&str] = &["openid", "email", "profile"];

/// Immutable configuration snapshot for the external identity provider.
///
/// Holds the provider credentials and the raw domain→role policy text.
/// The callback redirect URI is derived from the login URL, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// The OIDC issuer URL (e.g., "https://accounts.google.com").
    /// Used for OIDC discovery.
    issuer_url: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// Public URL of the login endpoint (e.g., "https://app.example.com/login").
    /// The provider callback URI is derived from it.
    login_url: String,
    /// Raw domain→role policy text, one `domain=role` rule per line.
    /// First match wins.
    #[serde(default)]
    domain_role_policy: String,
    /// When true, brand-new accounts are only created if at least one
    /// role-mapping rule is configured (unknown users are rejected
    /// otherwise). Defaults to false: unconditional creation.
    #[serde(default)]
    require_role_policy: bool,
}

impl ProviderSettings {
    /// Creates a new settings snapshot with an empty role policy.
    #[must_use]
    pub fn new(
        issuer_url: String,
        client_id: String,
        client_secret: String,
        login_url: String,
    ) -> Self {
        Self {
            issuer_url,
            client_id,
            client_secret,
            login_url,
            domain_role_policy: String::new(),
            require_role_policy: false,
        }
    }

    /// Sets the raw domain→role policy text.
    #[must_use]
    pub fn with_domain_role_policy(mut self, policy: String) -> Self {
        self.domain_role_policy = policy;
        self
    }

    /// Sets whether new-account creation requires a non-empty role policy.
    #[must_use]
    pub fn with_require_role_policy(mut self, require: bool) -> Self {
        self.require_role_policy = require;
        self
    }

    /// Returns the OIDC issuer URL.
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the public URL of the login endpoint.
    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Returns the callback URI the provider must be configured to redirect
    /// to, derived deterministically from the login URL.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}?{}=1", self.login_url, OAUTH_CALLBACK_PARAM)
    }

    /// Returns the raw domain→role policy text.
    #[must_use]
    pub fn domain_role_policy(&self) -> &str {
        &self.domain_role_policy
    }

    /// Returns true if new-account creation is gated on a non-empty policy.
    #[must_use]
    pub fn require_role_policy(&self) -> bool {
        self.require_role_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProviderSettings {
        ProviderSettings::new(
            "https://accounts.example.com".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            "https://app.example.com/login".to_string(),
        )
    }

    #[test]
    fn redirect_uri_is_derived_from_login_url() {
        assert_eq!(
            settings().redirect_uri(),
            "https://app.example.com/login?provider_oauth_callback=1"
        );
    }

    #[test]
    fn new_settings_have_empty_policy_and_open_creation() {
        let settings = settings();
        assert_eq!(settings.domain_role_policy(), "");
        assert!(!settings.require_role_policy());
    }

    #[test]
    fn builder_style_setters() {
        let settings = settings()
            .with_domain_role_policy("corp.example=editor".to_string())
            .with_require_role_policy(true);
        assert_eq!(settings.domain_role_policy(), "corp.example=editor");
        assert!(settings.require_role_policy());
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "issuer_url": "https://accounts.example.com",
            "client_id": "my-client",
            "client_secret": "secret",
            "login_url": "https://app.example.com/login"
        }"#;

        let settings: ProviderSettings = serde_json::from_str(json).expect("deserialize");

        assert_eq!(settings.client_id(), "my-client");
        assert_eq!(settings.domain_role_policy(), "");
        assert!(!settings.require_role_policy());
    }
}
