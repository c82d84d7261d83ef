//! Configuration module for the Revyze backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.
//! Integration credentials (Stripe, SendGrid) are optional; the features they
//! power degrade gracefully when unset.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Fallback JWT secret for local development. `main` warns loudly when used.
const DEV_JWT_SECRET: &str = "revyze-dev-secret-change-me";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory holding uploaded plan documents
    pub storage_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// HMAC secret for signing access tokens
    pub jwt_secret: String,
    /// Access token lifetime in hours
    pub token_expiry_hours: i64,
    /// Emails granted the admin flag at registration
    pub admin_emails: Vec<String>,
    /// Tokens credited to a referrer per rewarded referral
    pub referral_reward_tokens: i64,
    /// Stripe API secret key (billing disabled when unset)
    pub stripe_secret_key: Option<String>,
    /// Stripe price id for the pro plan
    pub stripe_price_id: Option<String>,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: Option<String>,
    /// SendGrid API key (mail falls back to the outbox table when unset)
    pub sendgrid_api_key: Option<String>,
    /// Sender address for outgoing mail
    pub mail_from: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("REVYZE_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let storage_path = env::var("REVYZE_STORAGE_PATH")
            .unwrap_or_else(|_| "./data/storage".to_string())
            .into();

        let bind_addr = env::var("REVYZE_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid REVYZE_BIND_ADDR format");

        let log_level = env::var("REVYZE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let jwt_secret =
            env::var("REVYZE_JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string());

        let token_expiry_hours = env::var("REVYZE_TOKEN_EXPIRY_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);

        let admin_emails = env::var("REVYZE_ADMIN_EMAILS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let referral_reward_tokens = env::var("REVYZE_REFERRAL_REWARD_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);

        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").ok();
        let stripe_price_id = env::var("STRIPE_PRO_PRICE_ID").ok();
        let stripe_webhook_secret = env::var("STRIPE_WEBHOOK_SECRET").ok();

        let sendgrid_api_key = env::var("SENDGRID_API_KEY").ok();
        let mail_from =
            env::var("REVYZE_MAIL_FROM").unwrap_or_else(|_| "noreply@revyze.app".to_string());

        Self {
            db_path,
            storage_path,
            bind_addr,
            log_level,
            jwt_secret,
            token_expiry_hours,
            admin_emails,
            referral_reward_tokens,
            stripe_secret_key,
            stripe_price_id,
            stripe_webhook_secret,
            sendgrid_api_key,
            mail_from,
        }
    }

    /// Whether the JWT secret is still the development fallback.
    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
