//! Revyze Backend
//!
//! REST service for the Revyze collaborative design review platform:
//! projects, versioned plan documents, audience-tagged comments, sharing,
//! billing, referrals, feedback campaigns, and analytics over SQLite.

mod api;
mod auth;
mod billing;
mod campaigns;
mod config;
mod db;
mod engagement;
mod errors;
mod jobs;
mod mailer;
mod models;
mod roles;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use billing::StripeClient;
use config::Config;
use db::Repository;
use mailer::Mailer;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
    pub stripe: Arc<StripeClient>,
    pub mailer: Arc<Mailer>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Revyze Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Storage path: {:?}", config.storage_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.uses_dev_jwt_secret() {
        tracing::warn!("REVYZE_JWT_SECRET not set; using the development fallback secret!");
    }
    if config.stripe_secret_key.is_none() {
        tracing::warn!("Stripe is not configured; billing routes will fail");
    }
    if config.sendgrid_api_key.is_none() {
        tracing::warn!("SendGrid is not configured; mail goes to the outbox table");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);

    let stripe = StripeClient::new(
        config.stripe_secret_key.clone(),
        config.stripe_price_id.clone(),
    );
    let mailer = Mailer::new(
        config.sendgrid_api_key.clone(),
        config.mail_from.clone(),
        repo.clone(),
    );

    // Create application state
    let state = AppState {
        repo: Arc::new(repo.clone()),
        config: Arc::new(config.clone()),
        stripe: Arc::new(stripe),
        mailer: Arc::new(mailer.clone()),
    };

    // Background jobs: daily analytics rollup, hourly email sweep.
    tokio::spawn(jobs::run_analytics_rollup(repo.clone()));
    tokio::spawn(jobs::run_email_sweep(repo, mailer));

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Auth
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login))
        .route("/auth/me", get(api::me))
        // Projects
        .route("/projects", post(api::create_project))
        .route("/projects", get(api::list_projects))
        .route("/projects/{id}", get(api::get_project))
        .route("/projects/{id}", delete(api::delete_project))
        .route("/projects/{id}/collaborators", post(api::invite_collaborator))
        .route("/projects/{id}/versions", post(api::upload_version))
        .route(
            "/projects/{id}/versions/{versionId}/current",
            put(api::set_current_version),
        )
        // Comments
        .route(
            "/projects/{id}/versions/{versionId}/comments",
            post(api::create_comment),
        )
        .route(
            "/projects/{id}/versions/{versionId}/comments/{commentId}/replies",
            post(api::create_reply),
        )
        .route(
            "/projects/{id}/versions/{versionId}/comments/{commentId}/resolve",
            post(api::resolve_comment),
        )
        .route(
            "/projects/{id}/versions/{versionId}/comments/{commentId}",
            delete(api::delete_comment),
        )
        // Sharing
        .route("/projects/{id}/share", post(api::create_share_link))
        .route("/projects/{id}/share", delete(api::disable_share_link))
        .route("/shared/{token}", get(api::get_shared_project))
        .route("/shared/{token}/files/{documentId}", get(api::get_shared_file))
        // Files
        .route("/files/{documentId}", get(api::get_file))
        // Billing
        .route("/billing/checkout", post(api::create_checkout))
        .route("/billing/pricing", get(api::get_pricing))
        // Engagement
        .route("/engagement/recompute", post(api::recompute_engagement))
        // Feedback
        .route("/feedback/active", get(api::feedback_active))
        .route("/feedback/answer", post(api::feedback_answer))
        .route(
            "/admin/feedback/campaigns",
            post(api::admin_create_campaign),
        )
        // Referrals & features
        .route("/referrals/me", get(api::referrals_me))
        .route("/features", get(api::list_features))
        .route("/features/{key}/vote", post(api::vote_feature))
        .route(
            "/admin/features/{key}/cost",
            put(api::admin_set_feature_cost),
        )
        // Analytics
        .route("/admin/analytics/rebuild", post(api::rebuild_analytics))
        .route("/admin/analytics/daily", get(api::get_daily_stats))
        // Notifications
        .route("/notifications", get(api::list_notifications))
        .route(
            "/notifications/{id}/read",
            post(api::mark_notification_read),
        );

    // Webhook and health live outside /api.
    let public_routes = Router::new()
        .route("/stripe/webhook", post(api::stripe_webhook))
        .route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(public_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
