//! Background jobs: daily analytics rollup and the hourly scheduled-email
//! sweep.
//!
//! Plain spawned interval loops. There is no cancellation, retry, or overlap
//! guard; per-item failures are logged and the batch continues, and a rerun
//! can resend an email that failed between delivery and the sent stamp.

use std::time::Duration;

use chrono::Utc;

use crate::db::Repository;
use crate::mailer::Mailer;

const ROLLUP_INTERVAL: Duration = Duration::from_secs(24 * 3600);
const EMAIL_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Days of history the periodic rollup recomputes.
const ROLLUP_DAYS: i64 = 30;

/// Run the daily analytics rollup loop.
pub async fn run_analytics_rollup(repo: Repository) {
    tracing::info!(
        interval_secs = ROLLUP_INTERVAL.as_secs(),
        days = ROLLUP_DAYS,
        "Analytics rollup job started"
    );

    let mut interval = tokio::time::interval(ROLLUP_INTERVAL);
    loop {
        interval.tick().await;
        rebuild_daily_stats(&repo, ROLLUP_DAYS).await;
    }
}

/// Recompute and upsert the rollup for the trailing `days` days.
///
/// Shared with the admin rebuild endpoint. Per-day errors are logged and the
/// batch continues.
pub async fn rebuild_daily_stats(repo: &Repository, days: i64) -> i64 {
    let today = Utc::now().date_naive();
    let mut updated = 0;

    for offset in 0..days {
        let date = (today - chrono::Duration::days(offset)).to_string();
        match repo.compute_daily_stats(&date).await {
            Ok(stats) => match repo.upsert_daily_stats(&stats).await {
                Ok(()) => updated += 1,
                Err(e) => tracing::error!("Failed to store rollup for {}: {}", date, e),
            },
            Err(e) => tracing::error!("Failed to compute rollup for {}: {}", date, e),
        }
    }

    tracing::info!(updated, "Analytics rollup finished");
    updated
}

/// Run the hourly scheduled-email sweep loop.
pub async fn run_email_sweep(repo: Repository, mailer: Mailer) {
    tracing::info!(
        interval_secs = EMAIL_SWEEP_INTERVAL.as_secs(),
        "Scheduled email sweep started"
    );

    let mut interval = tokio::time::interval(EMAIL_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        sweep_due_emails(&repo, &mailer).await;
    }
}

/// Send every due scheduled email, stamping each as sent afterwards.
pub async fn sweep_due_emails(repo: &Repository, mailer: &Mailer) -> i64 {
    let now = Utc::now().to_rfc3339();
    let due = match repo.list_due_emails(&now).await {
        Ok(due) => due,
        Err(e) => {
            tracing::error!("Failed to list due emails: {}", e);
            return 0;
        }
    };

    let mut sent = 0;
    for email in due {
        let subject = subject_for_template(&email.template);
        match mailer
            .send(&email.recipient, subject, &email.template, &email.payload)
            .await
        {
            Ok(()) => {
                if let Err(e) = repo.mark_email_sent(&email.id).await {
                    tracing::error!("Failed to stamp email {} as sent: {}", email.id, e);
                } else {
                    sent += 1;
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to send scheduled {} mail to {}: {}",
                    email.template,
                    email.recipient,
                    e
                );
            }
        }
    }

    if sent > 0 {
        tracing::info!(sent, "Scheduled email sweep delivered mail");
    }
    sent
}

fn subject_for_template(template: &str) -> &'static str {
    match template {
        "invite_followup" => "Your design review invitation is waiting",
        "collaborator_invite" => "You have been invited to a design review",
        _ => "Revyze update",
    }
}
