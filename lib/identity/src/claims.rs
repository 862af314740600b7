//! Verified identity claims produced by the identity provider.

/// Claim set extracted from a cryptographically verified ID token.
///
/// Produced only by an [`IdentityVerifier`](crate::verify::IdentityVerifier)
/// after signature, issuer, audience, and expiry checks have passed and the
/// required claims have been confirmed present. Ephemeral: lives for the
/// duration of one login attempt and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// The provider's stable, opaque, per-user identifier.
    subject: String,
    /// Email address, trimmed and lowercased.
    email: String,
    /// Given name, if the provider supplied one.
    given_name: Option<String>,
    /// Family name, if the provider supplied one.
    family_name: Option<String>,
    /// Display name (from `name` or `preferred_username`).
    display_name: Option<String>,
    /// Profile picture URL.
    picture_url: Option<String>,
}

impl VerifiedClaims {
    /// Creates a new claim set from the required claims.
    ///
    /// The email is normalized here (trimmed, lowercased) so every
    /// downstream comparison sees one canonical form. Callers are expected
    /// to have already confirmed both values are present and non-empty.
    #[must_use]
    pub fn new(subject: String, email: String) -> Self {
        Self {
            subject,
            email: email.trim().to_ascii_lowercase(),
            given_name: None,
            family_name: None,
            display_name: None,
            picture_url: None,
        }
    }

    /// Sets the given name claim.
    #[must_use]
    pub fn with_given_name(mut self, given_name: Option<String>) -> Self {
        self.given_name = given_name;
        self
    }

    /// Sets the family name claim.
    #[must_use]
    pub fn with_family_name(mut self, family_name: Option<String>) -> Self {
        self.family_name = family_name;
        self
    }

    /// Sets the display name claim.
    #[must_use]
    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }

    /// Sets the profile picture URL claim.
    #[must_use]
    pub fn with_picture_url(mut self, picture_url: Option<String>) -> Self {
        self.picture_url = picture_url;
        self
    }

    /// Returns the provider's subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the normalized email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the given name, if present.
    #[must_use]
    pub fn given_name(&self) -> Option<&str> {
        self.given_name.as_deref()
    }

    /// Returns the family name, if present.
    #[must_use]
    pub fn family_name(&self) -> Option<&str> {
        self.family_name.as_deref()
    }

    /// Returns the display name, if present.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns the profile picture URL, if present.
    #[must_use]
    pub fn picture_url(&self) -> Option<&str> {
        self.picture_url.as_deref()
    }
}
