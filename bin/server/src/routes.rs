//! HTTP routes for login, direct token submission, logout, and the
//! post-login destination.
//!
//! Both credential flows land on the same pipeline:
//! - `GET /login?provider_oauth_callback=1&code=...` completes the
//!   redirect-based code flow
//! - `POST /login?provider_direct_token=1` with an `id_token` form field
//!   completes the direct-token flow
//! - `GET /login` without callback parameters initiates the redirect to
//!   the provider

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration as TimeDuration;

use hallpass_identity::{CodeExchangeProof, Credential, LoginError, LoginSuccess, SessionId};

use crate::{AppState, db::SessionRepository, middleware::RequireAuth, oidc::Handshake};

/// Session cookie name.
pub(crate) const SESSION_COOKIE: &str = "session";

/// Handshake cookie name (CSRF state, PKCE verifier, and nonce kept
/// between login initiation and the provider callback).
const HANDSHAKE_COOKIE: &str = "login_handshake";

/// Fixed post-login destination.
const POST_LOGIN_DESTINATION: &str = "/admin";

/// Query parameters for `GET /login`.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    provider_oauth_callback: Option<String>,
    code: Option<String>,
    state: Option<String>,
}

/// Query parameters for `POST /login`.
#[derive(Debug, Deserialize)]
pub struct DirectTokenQuery {
    provider_direct_token: Option<String>,
}

/// Form body for the direct-token flow.
#[derive(Debug, Deserialize)]
pub struct DirectTokenForm {
    id_token: String,
}

/// Handles `GET /login`: either completes the provider callback or
/// initiates the redirect to the provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Result<Response, LoginFailure> {
    if query.provider_oauth_callback.is_some() {
        let code = query
            .code
            .filter(|code| !code.is_empty())
            .ok_or(LoginFailure::MissingCode)?;
        complete_code_flow(state, jar, code, query.state).await
    } else {
        Ok(initiate(&state, jar))
    }
}

/// Handles `POST /login?provider_direct_token=1` with an `id_token` form
/// field (the one-tap path).
pub async fn direct_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DirectTokenQuery>,
    jar: CookieJar,
    Form(form): Form<DirectTokenForm>,
) -> Result<Response, LoginFailure> {
    if query.provider_direct_token.is_none() {
        return Err(LoginFailure::UnknownAction);
    }

    let success = state
        .broker
        .login(&state.settings, Credential::IdToken { raw: form.id_token })
        .await
        .map_err(LoginFailure::Login)?;

    Ok(finish_login(&state, jar, &success))
}

/// Redirects the user to the provider, stashing the handshake material in
/// a short-lived cookie for validation on the callback.
fn initiate(state: &AppState, jar: CookieJar) -> Response {
    let (auth_url, handshake) = state.oidc.authorization_url();

    let handshake_json = serde_json::to_string(&handshake).expect("serialize handshake");
    let cookie = Cookie::build((HANDSHAKE_COOKIE, handshake_json))
        .path("/")
        .http_only(true)
        .secure(state.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(10));

    (jar.add(cookie), Redirect::to(&auth_url)).into_response()
}

/// Completes the code flow after the provider redirected back.
async fn complete_code_flow(
    state: Arc<AppState>,
    jar: CookieJar,
    code: String,
    state_param: Option<String>,
) -> Result<Response, LoginFailure> {
    let handshake_cookie = jar
        .get(HANDSHAKE_COOKIE)
        .ok_or(LoginFailure::MissingHandshake)?;

    let handshake: Handshake = serde_json::from_str(handshake_cookie.value())
        .map_err(|_| LoginFailure::InvalidHandshake)?;

    // Validate CSRF state before anything touches the provider.
    if state_param.as_deref() != Some(handshake.csrf_token.as_str()) {
        return Err(LoginFailure::StateMismatch);
    }

    let credential = Credential::AuthorizationCode {
        code,
        proof: CodeExchangeProof {
            pkce_verifier: handshake.pkce_verifier,
            nonce: handshake.nonce,
        },
    };

    let success = state
        .broker
        .login(&state.settings, credential)
        .await
        .map_err(LoginFailure::Login)?;

    Ok(finish_login(&state, jar, &success))
}

/// Sets the persistent session cookie, drops the handshake cookie, and
/// redirects to the post-login destination.
fn finish_login(state: &AppState, jar: CookieJar, success: &LoginSuccess) -> Response {
    let session_cookie = Cookie::build((
        SESSION_COOKIE,
        success.session.id().as_str().to_string(),
    ))
    .path("/")
    .http_only(true)
    .secure(state.session.secure_cookies)
    .same_site(SameSite::Lax)
    .max_age(TimeDuration::minutes(state.session.duration_minutes));

    let remove_handshake = Cookie::build((HANDSHAKE_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    let jar = jar.add(session_cookie).add(remove_handshake);

    (jar, Redirect::to(POST_LOGIN_DESTINATION)).into_response()
}

/// Logs out by deleting the session row and clearing the cookie.
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        let session_id = SessionId::new(session_cookie.value().to_string());
        let sessions =
            SessionRepository::new(state.db_pool.clone(), state.session.duration_minutes);
        let _ = sessions.delete(&session_id).await;
    }

    let remove_session = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    (jar.add(remove_session), Redirect::to("/login"))
}

/// The fixed post-login destination. Requires a valid session.
pub async fn admin_home(RequireAuth(current): RequireAuth) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<body>\n<h1>hallpass</h1>\n<p>Signed in as {}</p>\n\
         <p><a href=\"/logout\">Sign out</a></p>\n</body>\n</html>\n",
        escape_html(current.account().email())
    ))
}

/// Minimal escaping for the one provider-controlled value we render.
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Failure of a login request, rendered as a blocking error page.
#[derive(Debug)]
pub enum LoginFailure {
    /// Callback request without an authorization code.
    MissingCode,
    /// No handshake cookie accompanied the callback.
    MissingHandshake,
    /// The handshake cookie could not be parsed.
    InvalidHandshake,
    /// The state parameter did not match the handshake.
    StateMismatch,
    /// POST to the login URL without the direct-token marker.
    UnknownAction,
    /// The pipeline reported a terminal failure.
    Login(LoginError),
}

impl IntoResponse for LoginFailure {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingCode => (
                StatusCode::BAD_REQUEST,
                "Missing authorization code".to_string(),
            ),
            Self::MissingHandshake => {
                (StatusCode::BAD_REQUEST, "Missing login state".to_string())
            }
            Self::InvalidHandshake => {
                (StatusCode::BAD_REQUEST, "Invalid login state".to_string())
            }
            Self::StateMismatch => (
                StatusCode::BAD_REQUEST,
                "State parameter mismatch".to_string(),
            ),
            Self::UnknownAction => (StatusCode::NOT_FOUND, "Unknown login action".to_string()),
            Self::Login(err) => {
                // Diagnostic detail is logged at debug; raw tokens and
                // claim payloads never reach the log stream.
                match &err {
                    LoginError::ProviderRejected { code, .. } => {
                        tracing::debug!(provider_error = %code, "login failed at the provider");
                    }
                    other => {
                        tracing::debug!(error = %other, "login failed");
                    }
                }
                let status = match &err {
                    LoginError::ProviderRejected { .. } => StatusCode::BAD_GATEWAY,
                    LoginError::TokenInvalid { .. } => StatusCode::UNAUTHORIZED,
                    LoginError::PolicyBlocked => StatusCode::FORBIDDEN,
                    LoginError::AccountCreationFailed { .. }
                    | LoginError::StoreUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, format!("Sign-in failed: {}", err))
            }
        };

        (status, message).into_response()
    }
}
