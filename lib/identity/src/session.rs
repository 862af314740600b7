//! Session types for authenticated accounts.
//!
//! A session is the opaque artifact issued once an account is bound and
//! authorized. The pipeline only creates sessions through the
//! [`SessionIssuer`](crate::store::SessionIssuer) collaborator; the boundary
//! decides how the session travels (cookie mechanics are out of scope here).

use chrono::{DateTime, Duration, Utc};
use hallpass_core::AccountId;
use serde::{Deserialize, Serialize};

/// Unique identifier for a session.
///
/// Session IDs are opaque strings generated during session creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session ID from a string.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    /// Returns the session ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An active authenticated session for a local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session.
    id: SessionId,
    /// The authenticated account's ID.
    account_id: AccountId,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new session valid for the given duration.
    #[must_use]
    pub fn new(id: SessionId, account_id: AccountId, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            account_id,
            created_at: now,
            expires_at: now + duration,
        }
    }

    /// Reconstitutes a session from storage.
    #[must_use]
    pub fn from_parts(
        id: SessionId,
        account_id: AccountId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            created_at,
            expires_at,
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the authenticated account's ID.
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the session is still valid (not expired).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session_id() -> SessionId {
        SessionId::new("sess_test_123".to_string())
    }

    #[test]
    fn session_id_display() {
        assert_eq!(test_session_id().to_string(), "sess_test_123");
    }

    #[test]
    fn session_id_from_str() {
        let id: SessionId = "test_session".into();
        assert_eq!(id.as_str(), "test_session");
    }

    #[test]
    fn new_session_has_correct_fields() {
        let account_id = AccountId::new();

        let before = Utc::now();
        let session = Session::new(test_session_id(), account_id, Duration::hours(1));
        let after = Utc::now();

        assert_eq!(session.id(), &test_session_id());
        assert_eq!(session.account_id(), account_id);
        assert!(session.created_at() >= before);
        assert!(session.created_at() <= after);
        assert!(session.expires_at() > session.created_at());
    }

    #[test]
    fn session_expiration() {
        // Create a session that expired in the past
        let session = Session::new(test_session_id(), AccountId::new(), Duration::seconds(-1));
        assert!(session.is_expired());
        assert!(!session.is_valid());
    }

    #[test]
    fn session_not_expired() {
        let session = Session::new(test_session_id(), AccountId::new(), Duration::hours(1));
        assert!(!session.is_expired());
        assert!(session.is_valid());
    }

    #[test]
    fn from_parts_preserves_values() {
        let account_id = AccountId::new();
        let created = Utc::now() - Duration::days(2);
        let expires = Utc::now() + Duration::days(12);

        let session = Session::from_parts(test_session_id(), account_id, created, expires);

        assert_eq!(session.created_at(), created);
        assert_eq!(session.expires_at(), expires);
        assert!(session.is_valid());
    }

    #[test]
    fn session_serialization_roundtrip() {
        let session = Session::new(test_session_id(), AccountId::new(), Duration::hours(1));
        let json = serde_json::to_string(&session).expect("serialize");
        let parsed: Session = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(session, parsed);
    }
}
