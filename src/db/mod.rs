//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data. Denormalized
//! document fields (collaborator lists, version/comment arrays, segment
//! rules) are stored as JSON in TEXT columns.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            plan TEXT NOT NULL DEFAULT 'free',
            is_admin INTEGER NOT NULL DEFAULT 0,
            stripe_customer_id TEXT,
            referral_code TEXT NOT NULL UNIQUE,
            referred_by TEXT,
            token_balance INTEGER NOT NULL DEFAULT 0,
            login_count INTEGER NOT NULL DEFAULT 0,
            project_count INTEGER NOT NULL DEFAULT 0,
            share_count_guest INTEGER NOT NULL DEFAULT 0,
            share_count_pro INTEGER NOT NULL DEFAULT 0,
            engagement_score INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_login_at TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            collaborators TEXT NOT NULL DEFAULT '[]',
            versions TEXT NOT NULL DEFAULT '[]',
            share TEXT,
            share_token TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            storage_path TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_activity (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback_campaigns (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            prompt TEXT NOT NULL,
            segment TEXT NOT NULL,
            frequency_cap_days INTEGER NOT NULL DEFAULT 14,
            active_from TEXT NOT NULL,
            active_until TEXT,
            targeted_user_ids TEXT NOT NULL DEFAULT '[]',
            force_show INTEGER NOT NULL DEFAULT 0,
            impressions INTEGER NOT NULL DEFAULT 0,
            answer_count INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaign_attribution (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            shown_at TEXT NOT NULL,
            answered_at TEXT,
            UNIQUE (campaign_id, user_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback_answers (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            answer TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS referrals (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            referrer_id TEXT NOT NULL,
            referred_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'applied',
            reward_tokens INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            tokens INTEGER NOT NULL DEFAULT 0,
            reference TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS features (
            key TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            cost_tokens INTEGER NOT NULL DEFAULT 0,
            vote_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feature_votes (
            id TEXT PRIMARY KEY,
            feature_key TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plan_limits (
            plan TEXT PRIMARY KEY,
            max_projects INTEGER NOT NULL,
            max_guest_collaborators INTEGER NOT NULL,
            max_pro_collaborators INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Seed defaults; -1 means unlimited.
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO plan_limits (plan, max_projects, max_guest_collaborators, max_pro_collaborators)
        VALUES ('free', 3, 1, 1), ('pro', -1, -1, -1);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scheduled_emails (
            id TEXT PRIMARY KEY,
            recipient TEXT NOT NULL,
            template TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{}',
            reference TEXT,
            due_at TEXT NOT NULL,
            sent_at TEXT,
            cancelled_at TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notification_queue (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            message TEXT NOT NULL,
            project_id TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mail_outbox (
            id TEXT PRIMARY KEY,
            recipient TEXT NOT NULL,
            subject TEXT NOT NULL,
            template TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analytics_daily_stats (
            date TEXT PRIMARY KEY,
            new_users INTEGER NOT NULL DEFAULT 0,
            active_users INTEGER NOT NULL DEFAULT 0,
            projects_created INTEGER NOT NULL DEFAULT 0,
            versions_uploaded INTEGER NOT NULL DEFAULT 0,
            comments_created INTEGER NOT NULL DEFAULT 0,
            feedback_answers INTEGER NOT NULL DEFAULT 0,
            computed_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);
        CREATE INDEX IF NOT EXISTS idx_projects_share_token ON projects(share_token);
        CREATE INDEX IF NOT EXISTS idx_activity_user ON user_activity(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_attribution_user ON campaign_attribution(user_id);
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notification_queue(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_scheduled_emails_due ON scheduled_emails(due_at);
        CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
