//! Authentication extractors for Axum routes.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use hallpass_identity::{Account, Session, SessionId};
use std::sync::Arc;

use crate::{
    AppState,
    db::{AccountRepository, SessionRepository},
    routes::SESSION_COOKIE,
};

/// The authenticated account context extracted from the request.
#[derive(Debug, Clone)]
pub struct CurrentAccount {
    /// The current session.
    session: Session,
    /// The account the session belongs to.
    account: Account,
}

impl CurrentAccount {
    /// Creates a new authenticated account context.
    #[must_use]
    pub fn new(session: Session, account: Account) -> Self {
        Self { session, account }
    }

    /// Returns the current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the account record.
    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }
}

/// Extractor for requiring an authenticated account.
///
/// Unauthenticated requests are redirected to the login page.
pub struct RequireAuth(pub CurrentAccount);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRejection::InternalError)?;

        let session_cookie = jar
            .get(SESSION_COOKIE)
            .ok_or(AuthRejection::NotAuthenticated)?;

        let session_id = SessionId::new(session_cookie.value().to_string());

        let sessions = SessionRepository::new(
            app_state.db_pool.clone(),
            app_state.session.duration_minutes,
        );
        let session = sessions
            .find_by_id(&session_id)
            .await
            .map_err(|_| AuthRejection::InternalError)?
            .ok_or(AuthRejection::NotAuthenticated)?;

        if session.is_expired() {
            // Expired sessions are cleared eagerly.
            let _ = sessions.delete(&session_id).await;
            return Err(AuthRejection::SessionExpired);
        }

        let accounts = AccountRepository::new(app_state.db_pool.clone());
        let account = accounts
            .find_by_id(session.account_id())
            .await
            .map_err(|_| AuthRejection::InternalError)?
            .ok_or(AuthRejection::NotAuthenticated)?;

        Ok(RequireAuth(CurrentAccount::new(session, account)))
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    /// No valid session accompanied the request.
    NotAuthenticated,
    /// The session exists but has expired.
    SessionExpired,
    /// Session or account lookup failed.
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated | Self::SessionExpired => {
                Redirect::to("/login").into_response()
            }
            Self::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
