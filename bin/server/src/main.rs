use std::sync::Arc;

use axum::{Router, routing::get};
use hallpass_identity::LoginBroker;
use hallpass_server::{
    AppState,
    config::ServerConfig,
    db::{AccountRepository, SessionRepository},
    observer::TracingObserver,
    oidc::OidcVerifier,
    routes,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Cleanup expired sessions on startup
    let session_duration = config.session.duration_minutes;
    let session_repo = SessionRepository::new(db_pool.clone(), session_duration);
    match session_repo.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(
                deleted_sessions = count,
                "Cleaned up expired sessions on startup"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions on startup");
        }
    }

    // Spawn periodic session cleanup task
    let cleanup_pool = db_pool.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            let repo = SessionRepository::new(cleanup_pool.clone(), session_duration);
            match repo.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    // Discover the identity provider (fetches metadata and signing keys once)
    tracing::info!("Discovering OIDC provider...");
    let oidc = Arc::new(
        OidcVerifier::discover(&config.provider)
            .await
            .expect("failed to discover OIDC provider"),
    );

    // Wire the login pipeline
    let accounts = Arc::new(AccountRepository::new(db_pool.clone()));
    let sessions = Arc::new(SessionRepository::new(db_pool.clone(), session_duration));
    let broker = LoginBroker::new(oidc.clone(), accounts, sessions, Arc::new(TracingObserver));

    tracing::info!(
        callback = %config.provider.redirect_uri(),
        "Configure the provider to redirect to this URI"
    );

    let app_state = Arc::new(AppState::new(
        db_pool,
        oidc,
        broker,
        config.provider,
        config.session,
    ));

    let app = Router::new()
        .route("/login", get(routes::login).post(routes::direct_token))
        .route("/logout", get(routes::logout))
        .route("/admin", get(routes::admin_home))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
