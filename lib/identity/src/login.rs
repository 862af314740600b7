//! The login state machine.
//!
//! One login attempt runs `Verifying → Binding → Authorizing →
//! SessionIssued` as a single sequential operation. Both inbound flows (an
//! authorization code from the redirect callback, or a directly submitted
//! ID token) converge on the same verified state; everything after
//! verification is identical.
//!
//! Terminal failures abort the attempt with a [`LoginError`]. No rollback
//! is needed: account creation and linkage are idempotent, so a retried
//! login converges on the same state.

use std::sync::Arc;

use hallpass_core::AccountId;

use crate::account::Account;
use crate::claims::VerifiedClaims;
use crate::error::LoginError;
use crate::policy::{RolePolicy, assign_role};
use crate::session::Session;
use crate::settings::ProviderSettings;
use crate::store::{AccountStore, LoginObserver, SessionIssuer, generate_password};
use crate::verify::{CodeExchangeProof, IdentityVerifier};

/// An inbound, as-yet untrusted credential.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Authorization code delivered via the redirect callback, together
    /// with the proof material captured at login initiation.
    AuthorizationCode {
        code: String,
        proof: CodeExchangeProof,
    },
    /// ID token submitted directly by the client (the one-tap path).
    IdToken { raw: String },
}

/// Successful outcome of a login attempt.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    /// The bound account.
    pub account_id: AccountId,
    /// The freshly issued session.
    pub session: Session,
    /// True if this login provisioned a brand-new account.
    pub is_new_account: bool,
}

/// Coordinates verification, account binding, role assignment, and session
/// issuance for one login attempt.
pub struct LoginBroker {
    verifier: Arc<dyn IdentityVerifier>,
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionIssuer>,
    observer: Arc<dyn LoginObserver>,
}

impl LoginBroker {
    /// Creates a new broker over the given collaborators.
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionIssuer>,
        observer: Arc<dyn LoginObserver>,
    ) -> Self {
        Self {
            verifier,
            accounts,
            sessions,
            observer,
        }
    }

    /// Runs one login attempt to completion.
    ///
    /// The settings snapshot is borrowed for the duration of this single
    /// operation; nothing is cached across attempts.
    pub async fn login(
        &self,
        settings: &ProviderSettings,
        credential: Credential,
    ) -> Result<LoginSuccess, LoginError> {
        let claims = match credential {
            Credential::AuthorizationCode { code, proof } => {
                self.verifier.exchange_code(&code, &proof).await?
            }
            Credential::IdToken { raw } => self.verifier.verify_id_token(&raw).await?,
        };

        let policy = RolePolicy::parse(settings.domain_role_policy());
        let (mut account, is_new_account) = self
            .bind(&claims, &policy, settings.require_role_policy())
            .await?;

        let mut dirty = account.link_subject(claims.subject());
        dirty |= account.enrich_from(&claims);
        dirty |= assign_role(&mut account, &policy);
        if dirty {
            self.accounts.update(&account).await?;
        }

        let session = self.sessions.issue(account.id()).await?;
        tracing::info!(account = %account.id(), is_new_account, "login succeeded");

        // Fire-and-forget: observers see the outcome but cannot change it.
        self.observer.after_login(account.id(), &claims);

        Ok(LoginSuccess {
            account_id: account.id(),
            session,
            is_new_account,
        })
    }

    /// Finds or creates the account for a verified identity.
    ///
    /// Lookup order: email, then linked subject, then creation. Creation is
    /// gated on a non-empty role policy when `require_policy` is set.
    async fn bind(
        &self,
        claims: &VerifiedClaims,
        policy: &RolePolicy,
        require_policy: bool,
    ) -> Result<(Account, bool), LoginError> {
        if let Some(account) = self.accounts.find_by_email(claims.email()).await? {
            return Ok((account, false));
        }
        if let Some(account) = self.accounts.find_by_subject(claims.subject()).await? {
            return Ok((account, false));
        }

        if require_policy && policy.is_empty() {
            tracing::warn!("rejected unknown user: account creation requires a role policy");
            return Err(LoginError::PolicyBlocked);
        }

        let account = Account::new(claims.email().to_string());
        let password = generate_password();
        self.accounts.create(&account, &password).await?;
        tracing::info!(account = %account.id(), "provisioned new account");
        Ok((account, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, VerificationError};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    /// Verifier that returns a canned result for either flow.
    struct FakeVerifier {
        result: Result<VerifiedClaims, VerificationError>,
    }

    impl FakeVerifier {
        fn ok(claims: VerifiedClaims) -> Arc<Self> {
            Arc::new(Self { result: Ok(claims) })
        }

        fn err(err: VerificationError) -> Arc<Self> {
            Arc::new(Self { result: Err(err) })
        }
    }

    #[async_trait]
    impl IdentityVerifier for FakeVerifier {
        async fn exchange_code(
            &self,
            _code: &str,
            _proof: &CodeExchangeProof,
        ) -> Result<VerifiedClaims, VerificationError> {
            self.result.clone()
        }

        async fn verify_id_token(
            &self,
            _raw_token: &str,
        ) -> Result<VerifiedClaims, VerificationError> {
            self.result.clone()
        }
    }

    /// In-memory account store.
    #[derive(Default)]
    struct MemoryAccounts {
        accounts: Mutex<Vec<Account>>,
        fail_create: bool,
    }

    impl MemoryAccounts {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn failing_create() -> Arc<Self> {
            Arc::new(Self {
                accounts: Mutex::new(Vec::new()),
                fail_create: true,
            })
        }

        fn seed(self: &Arc<Self>, account: Account) {
            self.accounts.lock().unwrap().push(account);
        }

        fn all(&self) -> Vec<Account> {
            self.accounts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AccountStore for MemoryAccounts {
        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.email() == email)
                .cloned())
        }

        async fn find_by_subject(&self, subject: &str) -> Result<Option<Account>, StoreError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.external_subject() == Some(subject))
                .cloned())
        }

        async fn create(
            &self,
            account: &Account,
            _initial_password: &str,
        ) -> Result<(), StoreError> {
            if self.fail_create {
                return Err(StoreError::Conflict {
                    details: "email already reserved".to_string(),
                });
            }
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.iter().any(|a| a.email() == account.email()) {
                return Err(StoreError::Conflict {
                    details: "email already reserved".to_string(),
                });
            }
            accounts.push(account.clone());
            Ok(())
        }

        async fn update(&self, account: &Account) -> Result<(), StoreError> {
            let mut accounts = self.accounts.lock().unwrap();
            let Some(slot) = accounts.iter_mut().find(|a| a.id() == account.id()) else {
                return Err(StoreError::Backend {
                    details: "account vanished".to_string(),
                });
            };
            *slot = account.clone();
            Ok(())
        }
    }

    /// In-memory session issuer.
    #[derive(Default)]
    struct MemorySessions {
        issued: Mutex<Vec<Session>>,
        fail: bool,
    }

    impl MemorySessions {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                issued: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn count(&self) -> usize {
            self.issued.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SessionIssuer for MemorySessions {
        async fn issue(&self, account: AccountId) -> Result<Session, StoreError> {
            if self.fail {
                return Err(StoreError::Backend {
                    details: "session store down".to_string(),
                });
            }
            let mut issued = self.issued.lock().unwrap();
            let session = Session::new(
                crate::session::SessionId::new(format!("sess_{}", issued.len() + 1)),
                account,
                Duration::minutes(30),
            );
            issued.push(session.clone());
            Ok(session)
        }
    }

    /// Observer that records every notification.
    #[derive(Default)]
    struct RecordingObserver {
        calls: Mutex<Vec<(AccountId, String)>>,
    }

    impl RecordingObserver {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn calls(&self) -> Vec<(AccountId, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl LoginObserver for RecordingObserver {
        fn after_login(&self, account: AccountId, claims: &VerifiedClaims) {
            self.calls
                .lock()
                .unwrap()
                .push((account, claims.subject().to_string()));
        }
    }

    fn claims(subject: &str, email: &str) -> VerifiedClaims {
        VerifiedClaims::new(subject.to_string(), email.to_string())
    }

    fn settings(policy: &str) -> ProviderSettings {
        ProviderSettings::new(
            "https://accounts.example.com".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            "https://app.example.com/login".to_string(),
        )
        .with_domain_role_policy(policy.to_string())
    }

    fn code_credential() -> Credential {
        Credential::AuthorizationCode {
            code: "auth-code".to_string(),
            proof: CodeExchangeProof {
                pkce_verifier: "pkce".to_string(),
                nonce: "nonce".to_string(),
            },
        }
    }

    fn broker(
        verifier: Arc<FakeVerifier>,
        accounts: Arc<MemoryAccounts>,
        sessions: Arc<MemorySessions>,
        observer: Arc<RecordingObserver>,
    ) -> LoginBroker {
        LoginBroker::new(verifier, accounts, sessions, observer)
    }

    #[tokio::test]
    async fn new_user_code_flow_without_policy() {
        let accounts = MemoryAccounts::new();
        let sessions = MemorySessions::new();
        let observer = RecordingObserver::new();
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@x.com")),
            accounts.clone(),
            sessions.clone(),
            observer.clone(),
        );

        let success = broker
            .login(&settings(""), code_credential())
            .await
            .expect("login should succeed");

        assert!(success.is_new_account);
        assert_eq!(success.session.account_id(), success.account_id);

        let stored = accounts.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].email(), "a@x.com");
        assert_eq!(stored[0].external_subject(), Some("sub1"));
        assert!(stored[0].roles().is_empty());

        assert_eq!(sessions.count(), 1);
        assert_eq!(observer.calls(), vec![(success.account_id, "sub1".to_string())]);
    }

    #[tokio::test]
    async fn direct_token_flow_reaches_the_same_pipeline() {
        let accounts = MemoryAccounts::new();
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@x.com")),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );

        broker
            .login(
                &settings(""),
                Credential::IdToken {
                    raw: "raw-token".to_string(),
                },
            )
            .await
            .expect("login should succeed");

        assert_eq!(accounts.all().len(), 1);
    }

    #[tokio::test]
    async fn email_match_links_unset_subject() {
        let accounts = MemoryAccounts::new();
        accounts.seed(Account::new("a@x.com".to_string()));
        let broker = broker(
            FakeVerifier::ok(claims("sub_new", "a@x.com")),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );

        let success = broker
            .login(&settings(""), code_credential())
            .await
            .expect("login should succeed");

        assert!(!success.is_new_account);
        let stored = accounts.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].external_subject(), Some("sub_new"));
    }

    #[tokio::test]
    async fn linked_subject_is_never_rewritten() {
        let accounts = MemoryAccounts::new();
        let mut existing = Account::new("a@x.com".to_string());
        existing.link_subject("sub_old");
        accounts.seed(existing);
        let broker = broker(
            FakeVerifier::ok(claims("sub_new", "a@x.com")),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );

        broker
            .login(&settings(""), code_credential())
            .await
            .expect("login should succeed");

        assert_eq!(accounts.all()[0].external_subject(), Some("sub_old"));
    }

    #[tokio::test]
    async fn subject_lookup_binds_when_email_changed() {
        let accounts = MemoryAccounts::new();
        let mut existing = Account::new("old@x.com".to_string());
        existing.link_subject("sub1");
        accounts.seed(existing);
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "new@x.com")),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );

        let success = broker
            .login(&settings(""), code_credential())
            .await
            .expect("login should succeed");

        assert!(!success.is_new_account);
        let stored = accounts.all();
        assert_eq!(stored.len(), 1);
        // The stored email is the account's, not the claim's.
        assert_eq!(stored[0].email(), "old@x.com");
    }

    #[tokio::test]
    async fn repeated_logins_bind_to_one_account() {
        let accounts = MemoryAccounts::new();
        let sessions = MemorySessions::new();
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@x.com")),
            accounts.clone(),
            sessions.clone(),
            RecordingObserver::new(),
        );

        let first = broker
            .login(&settings(""), code_credential())
            .await
            .expect("first login");
        let second = broker
            .login(&settings(""), code_credential())
            .await
            .expect("second login");

        assert!(first.is_new_account);
        assert!(!second.is_new_account);
        assert_eq!(first.account_id, second.account_id);
        assert_eq!(accounts.all().len(), 1);
        assert_eq!(sessions.count(), 2);
    }

    #[tokio::test]
    async fn policy_assigns_role_once_across_logins() {
        let accounts = MemoryAccounts::new();
        let broker = broker(
            FakeVerifier::ok(claims("sub_bob", "bob@corp.com")),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );
        let settings = settings("corp.com=editor");

        broker
            .login(&settings, code_credential())
            .await
            .expect("first login");
        broker
            .login(&settings, code_credential())
            .await
            .expect("second login");

        let stored = accounts.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].roles(), &["editor".to_string()]);
    }

    #[tokio::test]
    async fn profile_is_enriched_but_never_overwritten() {
        let accounts = MemoryAccounts::new();
        let mut existing = Account::new("a@x.com".to_string());
        existing.enrich_from(
            &VerifiedClaims::new("seed".to_string(), "a@x.com".to_string())
                .with_given_name(Some("X".to_string())),
        );
        accounts.seed(existing);

        let rich = claims("sub1", "a@x.com")
            .with_given_name(Some("Y".to_string()))
            .with_family_name(Some("Smith".to_string()));
        let broker = broker(
            FakeVerifier::ok(rich),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );

        broker
            .login(&settings(""), code_credential())
            .await
            .expect("login should succeed");

        let profile = accounts.all()[0].profile().clone();
        assert_eq!(profile.first_name.as_deref(), Some("X"));
        assert_eq!(profile.last_name.as_deref(), Some("Smith"));
    }

    #[tokio::test]
    async fn failed_verification_creates_nothing() {
        let accounts = MemoryAccounts::new();
        let sessions = MemorySessions::new();
        let observer = RecordingObserver::new();
        let broker = broker(
            FakeVerifier::err(VerificationError::TokenInvalid {
                reason: "bad signature".to_string(),
            }),
            accounts.clone(),
            sessions.clone(),
            observer.clone(),
        );

        let err = broker
            .login(&settings(""), code_credential())
            .await
            .expect_err("login must fail");

        assert!(matches!(err, LoginError::TokenInvalid { .. }));
        assert!(accounts.all().is_empty());
        assert_eq!(sessions.count(), 0);
        assert!(observer.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_rejection_propagates() {
        let broker = broker(
            FakeVerifier::err(VerificationError::ProviderRejected {
                code: "invalid_grant".to_string(),
                description: Some("code expired".to_string()),
            }),
            MemoryAccounts::new(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );

        let err = broker
            .login(&settings(""), code_credential())
            .await
            .expect_err("login must fail");

        assert!(matches!(err, LoginError::ProviderRejected { .. }));
    }

    #[tokio::test]
    async fn creation_is_blocked_without_policy_when_required() {
        let accounts = MemoryAccounts::new();
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@x.com")),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );
        let gated = settings("").with_require_role_policy(true);

        let err = broker
            .login(&gated, code_credential())
            .await
            .expect_err("login must fail");

        assert_eq!(err, LoginError::PolicyBlocked);
        assert!(accounts.all().is_empty());
    }

    #[tokio::test]
    async fn creation_proceeds_when_gated_but_policy_exists() {
        let accounts = MemoryAccounts::new();
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@corp.com")),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );
        let gated = settings("corp.com=editor").with_require_role_policy(true);

        broker
            .login(&gated, code_credential())
            .await
            .expect("login should succeed");

        assert_eq!(accounts.all().len(), 1);
    }

    #[tokio::test]
    async fn existing_account_logs_in_even_when_creation_gated() {
        let accounts = MemoryAccounts::new();
        accounts.seed(Account::new("a@x.com".to_string()));
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@x.com")),
            accounts.clone(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );
        let gated = settings("").with_require_role_policy(true);

        broker
            .login(&gated, code_credential())
            .await
            .expect("existing accounts are not gated");
    }

    #[tokio::test]
    async fn store_conflict_surfaces_as_creation_failure() {
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@x.com")),
            MemoryAccounts::failing_create(),
            MemorySessions::new(),
            RecordingObserver::new(),
        );

        let err = broker
            .login(&settings(""), code_credential())
            .await
            .expect_err("login must fail");

        assert!(matches!(err, LoginError::AccountCreationFailed { .. }));
    }

    #[tokio::test]
    async fn session_failure_surfaces_as_store_unavailable() {
        let observer = RecordingObserver::new();
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@x.com")),
            MemoryAccounts::new(),
            MemorySessions::failing(),
            observer.clone(),
        );

        let err = broker
            .login(&settings(""), code_credential())
            .await
            .expect_err("login must fail");

        assert!(matches!(err, LoginError::StoreUnavailable { .. }));
        // The hook only fires after a session actually exists.
        assert!(observer.calls().is_empty());
    }

    #[tokio::test]
    async fn observer_fires_exactly_once_per_login() {
        let observer = RecordingObserver::new();
        let broker = broker(
            FakeVerifier::ok(claims("sub1", "a@x.com")),
            MemoryAccounts::new(),
            MemorySessions::new(),
            observer.clone(),
        );

        broker
            .login(&settings(""), code_credential())
            .await
            .expect("first login");
        broker
            .login(&settings(""), code_credential())
            .await
            .expect("second login");

        assert_eq!(observer.calls().len(), 2);
    }
}
