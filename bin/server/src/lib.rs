//! Web server boundary for the hallpass login broker.
//!
//! This crate wires the identity pipeline to the outside world:
//! - OIDC protocol client backed by the openidconnect crate
//! - Postgres-backed account and session repositories
//! - Axum routes for the two inbound credential flows
//! - Session cookie handling and the post-login redirect

pub mod config;
pub mod db;
pub mod middleware;
pub mod observer;
pub mod oidc;
pub mod routes;

use std::sync::Arc;

use hallpass_identity::{LoginBroker, ProviderSettings};
use sqlx::PgPool;

use crate::config::SessionConfig;
use crate::oidc::OidcVerifier;

/// Shared application state.
pub struct AppState {
    /// Database connection pool.
    pub db_pool: PgPool,
    /// OIDC protocol client; doubles as the broker's identity verifier.
    pub oidc: Arc<OidcVerifier>,
    /// The login pipeline.
    pub broker: LoginBroker,
    /// Read-only provider configuration snapshot.
    pub settings: ProviderSettings,
    /// Session configuration.
    pub session: SessionConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        db_pool: PgPool,
        oidc: Arc<OidcVerifier>,
        broker: LoginBroker,
        settings: ProviderSettings,
        session: SessionConfig,
    ) -> Self {
        Self {
            db_pool,
            oidc,
            broker,
            settings,
            session,
        }
    }
}
