//! Database repositories for accounts and sessions.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hallpass_core::AccountId;
use hallpass_identity::{
    Account, AccountStore, Profile, Session, SessionId, SessionIssuer, StoreError,
};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for account queries.
#[derive(FromRow)]
struct AccountRow {
    id: String,
    email: String,
    external_subject: Option<String>,
    roles: serde_json::Value,
    first_name: Option<String>,
    last_name: Option<String>,
    nickname: Option<String>,
    picture_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn try_into_account(self) -> Result<Account, StoreError> {
        let id = AccountId::from_str(&self.id).map_err(|e| StoreError::Backend {
            details: format!("invalid account id '{}': {}", self.id, e),
        })?;
        let roles: Vec<String> = serde_json::from_value(self.roles).unwrap_or_default();
        Ok(Account::with_all_fields(
            id,
            self.email,
            self.external_subject,
            roles,
            Profile {
                first_name: self.first_name,
                last_name: self.last_name,
                nickname: self.nickname,
                picture_url: self.picture_url,
            },
            self.created_at,
            self.updated_at,
        ))
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    account_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, StoreError> {
        let account_id = AccountId::from_str(&self.account_id).map_err(|e| StoreError::Backend {
            details: format!("invalid account id '{}': {}", self.account_id, e),
        })?;
        Ok(Session::from_parts(
            SessionId::new(self.id),
            account_id,
            self.created_at,
            self.expires_at,
        ))
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, external_subject, roles, first_name, last_name, \
                               nickname, picture_url, created_at, updated_at";

/// Repository for account operations.
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    /// Creates a new account repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds an account by its internal ID.
    pub async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(AccountRow::try_into_account).transpose()
    }
}

#[async_trait]
impl AccountStore for AccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(AccountRow::try_into_account).transpose()
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE external_subject = $1"
        ))
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(AccountRow::try_into_account).transpose()
    }

    async fn create(&self, account: &Account, initial_password: &str) -> Result<(), StoreError> {
        let password_hash = hash_password(initial_password)?;
        let roles_json = serde_json::to_value(account.roles()).map_err(|e| StoreError::Backend {
            details: format!("serialize roles: {}", e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, email, external_subject, roles, first_name, last_name,
                                  nickname, picture_url, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(account.id().to_string())
        .bind(account.email())
        .bind(account.external_subject())
        .bind(roles_json)
        .bind(account.profile().first_name.as_deref())
        .bind(account.profile().last_name.as_deref())
        .bind(account.profile().nickname.as_deref())
        .bind(account.profile().picture_url.as_deref())
        .bind(password_hash)
        .bind(account.created_at())
        .bind(account.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StoreError::Conflict {
                        details: "email already reserved".to_string(),
                    };
                }
            }
            backend(e)
        })?;

        Ok(())
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        let roles_json = serde_json::to_value(account.roles()).map_err(|e| StoreError::Backend {
            details: format!("serialize roles: {}", e),
        })?;

        sqlx::query(
            r#"
            UPDATE accounts
            SET external_subject = $2, roles = $3, first_name = $4, last_name = $5,
                nickname = $6, picture_url = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(account.id().to_string())
        .bind(account.external_subject())
        .bind(roles_json)
        .bind(account.profile().first_name.as_deref())
        .bind(account.profile().last_name.as_deref())
        .bind(account.profile().nickname.as_deref())
        .bind(account.profile().picture_url.as_deref())
        .bind(account.updated_at())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }
}

/// Repository for session operations.
pub struct SessionRepository {
    pool: PgPool,
    duration: Duration,
}

impl SessionRepository {
    /// Creates a new session repository issuing sessions of the given
    /// duration.
    pub fn new(pool: PgPool, duration_minutes: i64) -> Self {
        Self {
            pool,
            duration: Duration::minutes(duration_minutes),
        }
    }

    /// Finds a session by ID.
    pub async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, created_at, expires_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(SessionRow::try_into_session).transpose()
    }

    /// Deletes a session by ID (logout).
    pub async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }

    /// Deletes expired sessions, returning how many were removed.
    pub async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionIssuer for SessionRepository {
    async fn issue(&self, account: AccountId) -> Result<Session, StoreError> {
        let session = Session::new(generate_session_id(), account, self.duration);

        sqlx::query(
            r#"
            INSERT INTO sessions (id, account_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.id().as_str())
        .bind(session.account_id().to_string())
        .bind(session.created_at())
        .bind(session.expires_at())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(session)
    }
}

/// Generates a unique session ID using ULID.
pub fn generate_session_id() -> SessionId {
    SessionId::new(ulid::Ulid::new().to_string())
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend {
        details: e.to_string(),
    }
}

/// Hashes a generated account password with Argon2 for storage at rest.
fn hash_password(password: &str) -> Result<String, StoreError> {
    use argon2::password_hash::{SaltString, rand_core::OsRng};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Backend {
            details: format!("failed to hash account password: {}", e),
        })
}
