//! Database repository for all persistence operations.
//!
//! Mutations are independent read-then-write sequences issued per request;
//! multi-row invariants (campaign impressions, token debits) are deliberately
//! not guarded by transactions, matching the behavior of the original
//! document store.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    ActivityEvent, ActivityKind, CampaignAttribution, CollaboratorRole, CreateCampaignRequest,
    DailyStats, Document, Feature, FeedbackAnswer, FeedbackCampaign, Notification, Plan,
    PlanLimits, Project, Referral, ReferralStatus, ScheduledEmail, SegmentRule, Transaction,
    TransactionKind, User,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Create a new user account.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password_hash: &str,
        is_admin: bool,
        referral_code: &str,
        referred_by: Option<&str>,
    ) -> Result<User, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO users (id, email, display_name, password_hash, plan, is_admin, referral_code, referred_by, created_at) \
             VALUES (?, ?, ?, ?, 'free', ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .bind(is_admin as i32)
        .bind(referral_code)
        .bind(referred_by)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email is already registered".to_string())
            }
            other => other.into(),
        })?;

        self.get_user(&id)
            .await?
            .ok_or_else(|| AppError::Internal("User vanished after insert".to_string()))
    }

    /// Get a user by id.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", USER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("{} WHERE lower(email) = lower(?)", USER_SELECT))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// Get a user by their referral code.
    pub async fn get_user_by_referral_code(&self, code: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("{} WHERE referral_code = ?", USER_SELECT))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// Get a user by their Stripe customer id.
    pub async fn get_user_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("{} WHERE stripe_customer_id = ?", USER_SELECT))
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// Bump the login counter and stamp the login time.
    pub async fn record_login(&self, id: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE users SET login_count = login_count + 1, last_login_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Change a user's plan, optionally storing the Stripe customer id.
    pub async fn set_plan(
        &self,
        id: &str,
        plan: &Plan,
        stripe_customer_id: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET plan = ?, stripe_customer_id = COALESCE(?, stripe_customer_id) WHERE id = ?",
        )
        .bind(plan.as_str())
        .bind(stripe_customer_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }
        Ok(())
    }

    /// Apply a signed delta to a user's token balance.
    ///
    /// Callers check the balance first; the check and this update are separate
    /// statements, so concurrent redemptions can race.
    pub async fn adjust_token_balance(&self, id: &str, delta: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET token_balance = token_balance + ? WHERE id = ?")
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a freshly computed engagement score.
    pub async fn set_engagement_score(&self, id: &str, score: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET engagement_score = ? WHERE id = ?")
            .bind(score)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump the lifetime project counter.
    pub async fn increment_project_count(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET project_count = project_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bump the share counter for the given collaborator role.
    pub async fn increment_share_count(
        &self,
        id: &str,
        role: CollaboratorRole,
    ) -> Result<(), AppError> {
        let sql = match role {
            CollaboratorRole::Guest => {
                "UPDATE users SET share_count_guest = share_count_guest + 1 WHERE id = ?"
            }
            CollaboratorRole::Professional => {
                "UPDATE users SET share_count_pro = share_count_pro + 1 WHERE id = ?"
            }
        };
        sqlx::query(sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    // ==================== PROJECT OPERATIONS ====================

    /// Create an empty project.
    pub async fn create_project(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO projects (id, owner_id, name, description, collaborators, versions, created_at, updated_at) \
             VALUES (?, ?, ?, ?, '[]', '[]', ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_project(&id)
            .await?
            .ok_or_else(|| AppError::Internal("Project vanished after insert".to_string()))
    }

    /// Get a project by id.
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, AppError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", PROJECT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(project_from_row))
    }

    /// Get a project by its share-link token.
    pub async fn get_project_by_share_token(
        &self,
        token: &str,
    ) -> Result<Option<Project>, AppError> {
        let row = sqlx::query(&format!("{} WHERE share_token = ?", PROJECT_SELECT))
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(project_from_row))
    }

    /// List projects the user owns or was invited to.
    ///
    /// Collaborators are matched by a pattern over the denormalized JSON
    /// column, mirroring how the original filtered embedded arrays.
    pub async fn list_projects_for_user(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<Vec<Project>, AppError> {
        let pattern = format!("%\"email\":\"{}\"%", email.to_lowercase());
        let rows = sqlx::query(&format!(
            "{} WHERE owner_id = ? OR lower(collaborators) LIKE ? ORDER BY updated_at DESC",
            PROJECT_SELECT
        ))
        .bind(user_id)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(project_from_row).collect())
    }

    /// Count projects owned by a user.
    pub async fn count_projects_owned(&self, owner_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM projects WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Write a mutated project document back whole.
    pub async fn update_project(&self, project: &Project) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let collaborators = serde_json::to_string(&project.collaborators)?;
        let versions = serde_json::to_string(&project.versions)?;
        let share = project
            .share
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        // Kept in a dedicated column so share-link lookups stay indexable.
        let share_token = project
            .share
            .as_ref()
            .filter(|s| s.enabled)
            .map(|s| s.token.clone());

        let result = sqlx::query(
            "UPDATE projects SET name = ?, description = ?, collaborators = ?, versions = ?, share = ?, share_token = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&project.name)
        .bind(&project.description)
        .bind(&collaborators)
        .bind(&versions)
        .bind(&share)
        .bind(&share_token)
        .bind(&now)
        .bind(&project.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Project {} not found",
                project.id
            )));
        }
        Ok(())
    }

    /// Delete a project.
    pub async fn delete_project(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Project {} not found", id)));
        }
        Ok(())
    }

    // ==================== DOCUMENT OPERATIONS ====================

    /// Store metadata for an uploaded plan document.
    pub async fn insert_document(&self, doc: &Document) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO documents (id, project_id, filename, content_type, size_bytes, storage_path, uploaded_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.project_id)
        .bind(&doc.filename)
        .bind(&doc.content_type)
        .bind(doc.size_bytes)
        .bind(&doc.storage_path)
        .bind(&doc.uploaded_by)
        .bind(&doc.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get document metadata by id.
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>, AppError> {
        let row = sqlx::query(
            "SELECT id, project_id, filename, content_type, size_bytes, storage_path, uploaded_by, created_at \
             FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(document_from_row))
    }

    // ==================== ACTIVITY OPERATIONS ====================

    /// Record a discrete activity event for the engagement window.
    pub async fn record_activity(
        &self,
        user_id: &str,
        kind: ActivityKind,
    ) -> Result<ActivityEvent, AppError> {
        let event = ActivityEvent {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            created_at: Utc::now().to_rfc3339(),
        };
        sqlx::query("INSERT INTO user_activity (id, user_id, kind, created_at) VALUES (?, ?, ?, ?)")
            .bind(&event.id)
            .bind(&event.user_id)
            .bind(event.kind.as_str())
            .bind(&event.created_at)
            .execute(&self.pool)
            .await?;
        Ok(event)
    }

    /// List all activity events for a user, newest first.
    pub async fn list_activity_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ActivityEvent>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_id, kind, created_at FROM user_activity WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(activity_from_row).collect())
    }

    // ==================== CAMPAIGN OPERATIONS ====================

    /// Store an admin-authored feedback campaign.
    pub async fn create_campaign(
        &self,
        request: &CreateCampaignRequest,
        created_by: &str,
    ) -> Result<FeedbackCampaign, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let active_from = request.active_from.clone().unwrap_or_else(|| now.clone());
        let segment = serde_json::to_string(&request.segment)?;
        let targeted = serde_json::to_string(&request.targeted_user_ids)?;

        sqlx::query(
            "INSERT INTO feedback_campaigns (id, name, prompt, segment, frequency_cap_days, active_from, active_until, targeted_user_ids, force_show, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.prompt)
        .bind(&segment)
        .bind(request.frequency_cap_days)
        .bind(&active_from)
        .bind(&request.active_until)
        .bind(&targeted)
        .bind(request.force_show as i32)
        .bind(created_by)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_campaign(&id)
            .await?
            .ok_or_else(|| AppError::Internal("Campaign vanished after insert".to_string()))
    }

    /// Get a campaign by id.
    pub async fn get_campaign(&self, id: &str) -> Result<Option<FeedbackCampaign>, AppError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", CAMPAIGN_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(campaign_from_row))
    }

    /// List all campaigns, newest active_from first.
    pub async fn list_campaigns(&self) -> Result<Vec<FeedbackCampaign>, AppError> {
        let rows = sqlx::query(&format!("{} ORDER BY active_from DESC", CAMPAIGN_SELECT))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(campaign_from_row).collect())
    }

    /// List the user's attribution records.
    pub async fn list_attributions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<CampaignAttribution>, AppError> {
        let rows = sqlx::query(
            "SELECT id, campaign_id, user_id, shown_at, answered_at FROM campaign_attribution WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(attribution_from_row).collect())
    }

    /// Record that a campaign was shown: refresh the attribution row and bump
    /// the impression counter.
    ///
    /// Two independent statements, not a transaction; concurrent requests can
    /// double-count impressions.
    pub async fn record_impression(&self, campaign_id: &str, user_id: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO campaign_attribution (id, campaign_id, user_id, shown_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (campaign_id, user_id) DO UPDATE SET shown_at = excluded.shown_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(campaign_id)
        .bind(user_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE feedback_campaigns SET impressions = impressions + 1 WHERE id = ?")
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record an answer: store it, stamp the attribution, bump the counter.
    pub async fn record_answer(
        &self,
        campaign_id: &str,
        user_id: &str,
        answer: &str,
    ) -> Result<FeedbackAnswer, AppError> {
        let now = Utc::now().to_rfc3339();
        let row = FeedbackAnswer {
            id: uuid::Uuid::new_v4().to_string(),
            campaign_id: campaign_id.to_string(),
            user_id: user_id.to_string(),
            answer: answer.to_string(),
            created_at: now.clone(),
        };

        sqlx::query(
            "INSERT INTO feedback_answers (id, campaign_id, user_id, answer, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.campaign_id)
        .bind(&row.user_id)
        .bind(&row.answer)
        .bind(&row.created_at)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "UPDATE campaign_attribution SET answered_at = ? WHERE campaign_id = ? AND user_id = ?",
        )
        .bind(&now)
        .bind(campaign_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE feedback_campaigns SET answer_count = answer_count + 1 WHERE id = ?")
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;

        Ok(row)
    }

    // ==================== REFERRAL & TRANSACTION OPERATIONS ====================

    /// Store a referral record.
    pub async fn insert_referral(
        &self,
        code: &str,
        referrer_id: &str,
        referred_id: &str,
        reward_tokens: i64,
        status: ReferralStatus,
    ) -> Result<Referral, AppError> {
        let referral = Referral {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.to_string(),
            referrer_id: referrer_id.to_string(),
            referred_id: referred_id.to_string(),
            status,
            reward_tokens,
            created_at: Utc::now().to_rfc3339(),
        };
        sqlx::query(
            "INSERT INTO referrals (id, code, referrer_id, referred_id, status, reward_tokens, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&referral.id)
        .bind(&referral.code)
        .bind(&referral.referrer_id)
        .bind(&referral.referred_id)
        .bind(referral.status.as_str())
        .bind(referral.reward_tokens)
        .bind(&referral.created_at)
        .execute(&self.pool)
        .await?;
        Ok(referral)
    }

    /// List referrals made by a user, newest first.
    pub async fn list_referrals_for_referrer(
        &self,
        referrer_id: &str,
    ) -> Result<Vec<Referral>, AppError> {
        let rows = sqlx::query(
            "SELECT id, code, referrer_id, referred_id, status, reward_tokens, created_at \
             FROM referrals WHERE referrer_id = ? ORDER BY created_at DESC",
        )
        .bind(referrer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(referral_from_row).collect())
    }

    /// Append a ledger entry.
    pub async fn insert_transaction(
        &self,
        user_id: &str,
        kind: TransactionKind,
        tokens: i64,
        reference: Option<&str>,
    ) -> Result<Transaction, AppError> {
        let tx = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            tokens,
            reference: reference.map(|s| s.to_string()),
            created_at: Utc::now().to_rfc3339(),
        };
        sqlx::query(
            "INSERT INTO transactions (id, user_id, kind, tokens, reference, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&tx.id)
        .bind(&tx.user_id)
        .bind(tx.kind.as_str())
        .bind(tx.tokens)
        .bind(&tx.reference)
        .bind(&tx.created_at)
        .execute(&self.pool)
        .await?;
        Ok(tx)
    }

    // ==================== FEATURE OPERATIONS ====================

    /// List all votable features.
    pub async fn list_features(&self) -> Result<Vec<Feature>, AppError> {
        let rows = sqlx::query(
            "SELECT key, title, description, cost_tokens, vote_count, created_at FROM features ORDER BY vote_count DESC, key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(feature_from_row).collect())
    }

    /// Get a feature by key.
    pub async fn get_feature(&self, key: &str) -> Result<Option<Feature>, AppError> {
        let row = sqlx::query(
            "SELECT key, title, description, cost_tokens, vote_count, created_at FROM features WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(feature_from_row))
    }

    /// Set a feature's vote cost, creating the feature when new.
    pub async fn set_feature_cost(
        &self,
        key: &str,
        cost_tokens: i64,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Feature, AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO features (key, title, description, cost_tokens, created_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (key) DO UPDATE SET cost_tokens = excluded.cost_tokens, \
             title = COALESCE(?, features.title), description = COALESCE(?, features.description)",
        )
        .bind(key)
        .bind(title.unwrap_or(key))
        .bind(description)
        .bind(cost_tokens)
        .bind(&now)
        .bind(title)
        .bind(description)
        .execute(&self.pool)
        .await?;

        self.get_feature(key)
            .await?
            .ok_or_else(|| AppError::Internal("Feature vanished after upsert".to_string()))
    }

    /// Whether the user already voted for this feature.
    pub async fn has_voted(&self, feature_key: &str, user_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM feature_votes WHERE feature_key = ? AND user_id = ?",
        )
        .bind(feature_key)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }

    /// Record a vote and bump the feature's counter.
    pub async fn record_vote(&self, feature_key: &str, user_id: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO feature_votes (id, feature_key, user_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(feature_key)
        .bind(user_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE features SET vote_count = vote_count + 1 WHERE key = ?")
            .bind(feature_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== PLAN LIMITS ====================

    /// Load the limits for a plan.
    pub async fn get_plan_limits(&self, plan: &Plan) -> Result<PlanLimits, AppError> {
        let row = sqlx::query(
            "SELECT plan, max_projects, max_guest_collaborators, max_pro_collaborators FROM plan_limits WHERE plan = ?",
        )
        .bind(plan.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(limits_from_row).ok_or_else(|| {
            AppError::Internal(format!("Plan limits missing for {}", plan.as_str()))
        })
    }

    // ==================== SCHEDULED EMAILS & MAIL OUTBOX ====================

    /// Queue an email for a later sweep.
    pub async fn schedule_email(
        &self,
        recipient: &str,
        template: &str,
        payload: &serde_json::Value,
        reference: Option<&str>,
        due_at: &str,
    ) -> Result<ScheduledEmail, AppError> {
        let email = ScheduledEmail {
            id: uuid::Uuid::new_v4().to_string(),
            recipient: recipient.to_string(),
            template: template.to_string(),
            payload: payload.clone(),
            reference: reference.map(|s| s.to_string()),
            due_at: due_at.to_string(),
            sent_at: None,
            cancelled_at: None,
            created_at: Utc::now().to_rfc3339(),
        };
        sqlx::query(
            "INSERT INTO scheduled_emails (id, recipient, template, payload, reference, due_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&email.id)
        .bind(&email.recipient)
        .bind(&email.template)
        .bind(serde_json::to_string(&email.payload)?)
        .bind(&email.reference)
        .bind(&email.due_at)
        .bind(&email.created_at)
        .execute(&self.pool)
        .await?;
        Ok(email)
    }

    /// List unsent, uncancelled emails whose due time has passed.
    pub async fn list_due_emails(&self, now: &str) -> Result<Vec<ScheduledEmail>, AppError> {
        let rows = sqlx::query(
            "SELECT id, recipient, template, payload, reference, due_at, sent_at, cancelled_at, created_at \
             FROM scheduled_emails WHERE sent_at IS NULL AND cancelled_at IS NULL AND due_at <= ? ORDER BY due_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(scheduled_email_from_row).collect())
    }

    /// Stamp a scheduled email as sent.
    pub async fn mark_email_sent(&self, id: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE scheduled_emails SET sent_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Cancel all pending emails sharing a reference (invite followups).
    pub async fn cancel_scheduled_emails(&self, reference: &str) -> Result<u64, AppError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE scheduled_emails SET cancelled_at = ? WHERE reference = ? AND sent_at IS NULL AND cancelled_at IS NULL",
        )
        .bind(&now)
        .bind(reference)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Write an email to the outbox table (used when SendGrid is unconfigured).
    pub async fn insert_mail(
        &self,
        recipient: &str,
        subject: &str,
        template: &str,
        payload: &serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO mail_outbox (id, recipient, subject, template, payload, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(recipient)
        .bind(subject)
        .bind(template)
        .bind(serde_json::to_string(payload)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    /// Queue an in-app notification.
    pub async fn insert_notification(
        &self,
        user_id: &str,
        kind: &str,
        message: &str,
        project_id: Option<&str>,
    ) -> Result<Notification, AppError> {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            message: message.to_string(),
            project_id: project_id.map(|s| s.to_string()),
            read: false,
            created_at: Utc::now().to_rfc3339(),
        };
        sqlx::query(
            "INSERT INTO notification_queue (id, user_id, kind, message, project_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&notification.id)
        .bind(&notification.user_id)
        .bind(&notification.kind)
        .bind(&notification.message)
        .bind(&notification.project_id)
        .bind(&notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(notification)
    }

    /// List a user's notifications, newest first.
    pub async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_id, kind, message, project_id, is_read, created_at \
             FROM notification_queue WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(notification_from_row).collect())
    }

    /// Mark one of the user's notifications as read.
    pub async fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE notification_queue SET is_read = 1 WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    // ==================== ANALYTICS OPERATIONS ====================

    /// Recompute one day's rollup row from the base tables.
    pub async fn compute_daily_stats(&self, date: &str) -> Result<DailyStats, AppError> {
        let new_users: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM users WHERE substr(created_at, 1, 10) = ?")
                .bind(date)
                .fetch_one(&self.pool)
                .await?
                .get("n");

        let active_users: i64 = sqlx::query(
            "SELECT COUNT(DISTINCT user_id) AS n FROM user_activity WHERE substr(created_at, 1, 10) = ?",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?
        .get("n");

        let projects_created: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM projects WHERE substr(created_at, 1, 10) = ?")
                .bind(date)
                .fetch_one(&self.pool)
                .await?
                .get("n");

        let versions_uploaded: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM user_activity WHERE kind = 'upload' AND substr(created_at, 1, 10) = ?",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?
        .get("n");

        let comments_created: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM user_activity WHERE kind = 'comment' AND substr(created_at, 1, 10) = ?",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?
        .get("n");

        let feedback_answers: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM feedback_answers WHERE substr(created_at, 1, 10) = ?",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?
        .get("n");

        Ok(DailyStats {
            date: date.to_string(),
            new_users,
            active_users,
            projects_created,
            versions_uploaded,
            comments_created,
            feedback_answers,
            computed_at: Utc::now().to_rfc3339(),
        })
    }

    /// Upsert a rollup row by date.
    pub async fn upsert_daily_stats(&self, stats: &DailyStats) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO analytics_daily_stats (date, new_users, active_users, projects_created, versions_uploaded, comments_created, feedback_answers, computed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (date) DO UPDATE SET new_users = excluded.new_users, active_users = excluded.active_users, \
             projects_created = excluded.projects_created, versions_uploaded = excluded.versions_uploaded, \
             comments_created = excluded.comments_created, feedback_answers = excluded.feedback_answers, \
             computed_at = excluded.computed_at",
        )
        .bind(&stats.date)
        .bind(stats.new_users)
        .bind(stats.active_users)
        .bind(stats.projects_created)
        .bind(stats.versions_uploaded)
        .bind(stats.comments_created)
        .bind(stats.feedback_answers)
        .bind(&stats.computed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read the trailing rollup rows, newest first.
    pub async fn list_daily_stats(&self, days: i64) -> Result<Vec<DailyStats>, AppError> {
        let rows = sqlx::query(
            "SELECT date, new_users, active_users, projects_created, versions_uploaded, comments_created, feedback_answers, computed_at \
             FROM analytics_daily_stats ORDER BY date DESC LIMIT ?",
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(stats_from_row).collect())
    }
}

// ==================== ROW MAPPING ====================

const USER_SELECT: &str = "SELECT id, email, display_name, password_hash, plan, is_admin, stripe_customer_id, referral_code, referred_by, token_balance, login_count, project_count, share_count_guest, share_count_pro, engagement_score, created_at, last_login_at FROM users";

const PROJECT_SELECT: &str = "SELECT id, owner_id, name, description, collaborators, versions, share, created_at, updated_at FROM projects";

const CAMPAIGN_SELECT: &str = "SELECT id, name, prompt, segment, frequency_cap_days, active_from, active_until, targeted_user_ids, force_show, impressions, answer_count, created_by, created_at FROM feedback_campaigns";

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    let plan: String = row.get("plan");
    User {
        id: row.get("id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        plan: Plan::from_str(&plan).unwrap_or(Plan::Free),
        is_admin: row.get::<i64, _>("is_admin") != 0,
        stripe_customer_id: row.get("stripe_customer_id"),
        referral_code: row.get("referral_code"),
        referred_by: row.get("referred_by"),
        token_balance: row.get("token_balance"),
        login_count: row.get("login_count"),
        project_count: row.get("project_count"),
        share_count_guest: row.get("share_count_guest"),
        share_count_pro: row.get("share_count_pro"),
        engagement_score: row.get("engagement_score"),
        created_at: row.get("created_at"),
        last_login_at: row.get("last_login_at"),
    }
}

fn project_from_row(row: &sqlx::sqlite::SqliteRow) -> Project {
    let collaborators: String = row.get("collaborators");
    let versions: String = row.get("versions");
    let share: Option<String> = row.get("share");
    Project {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        description: row.get("description"),
        collaborators: serde_json::from_str(&collaborators).unwrap_or_default(),
        versions: serde_json::from_str(&versions).unwrap_or_default(),
        share: share.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        project_id: row.get("project_id"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        storage_path: row.get("storage_path"),
        uploaded_by: row.get("uploaded_by"),
        created_at: row.get("created_at"),
    }
}

fn activity_from_row(row: &sqlx::sqlite::SqliteRow) -> ActivityEvent {
    let kind: String = row.get("kind");
    ActivityEvent {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: ActivityKind::from_str(&kind).unwrap_or(ActivityKind::Comment),
        created_at: row.get("created_at"),
    }
}

fn campaign_from_row(row: &sqlx::sqlite::SqliteRow) -> FeedbackCampaign {
    let segment: String = row.get("segment");
    let targeted: String = row.get("targeted_user_ids");
    FeedbackCampaign {
        id: row.get("id"),
        name: row.get("name"),
        prompt: row.get("prompt"),
        segment: serde_json::from_str(&segment).unwrap_or(SegmentRule::All),
        frequency_cap_days: row.get("frequency_cap_days"),
        active_from: row.get("active_from"),
        active_until: row.get("active_until"),
        targeted_user_ids: serde_json::from_str(&targeted).unwrap_or_default(),
        force_show: row.get::<i64, _>("force_show") != 0,
        impressions: row.get("impressions"),
        answer_count: row.get("answer_count"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

fn attribution_from_row(row: &sqlx::sqlite::SqliteRow) -> CampaignAttribution {
    CampaignAttribution {
        id: row.get("id"),
        campaign_id: row.get("campaign_id"),
        user_id: row.get("user_id"),
        shown_at: row.get("shown_at"),
        answered_at: row.get("answered_at"),
    }
}

fn referral_from_row(row: &sqlx::sqlite::SqliteRow) -> Referral {
    let status: String = row.get("status");
    Referral {
        id: row.get("id"),
        code: row.get("code"),
        referrer_id: row.get("referrer_id"),
        referred_id: row.get("referred_id"),
        status: ReferralStatus::from_str(&status).unwrap_or(ReferralStatus::Applied),
        reward_tokens: row.get("reward_tokens"),
        created_at: row.get("created_at"),
    }
}

fn feature_from_row(row: &sqlx::sqlite::SqliteRow) -> Feature {
    Feature {
        key: row.get("key"),
        title: row.get("title"),
        description: row.get("description"),
        cost_tokens: row.get("cost_tokens"),
        vote_count: row.get("vote_count"),
        created_at: row.get("created_at"),
    }
}

fn limits_from_row(row: &sqlx::sqlite::SqliteRow) -> PlanLimits {
    let plan: String = row.get("plan");
    PlanLimits {
        plan: Plan::from_str(&plan).unwrap_or(Plan::Free),
        max_projects: row.get("max_projects"),
        max_guest_collaborators: row.get("max_guest_collaborators"),
        max_pro_collaborators: row.get("max_pro_collaborators"),
    }
}

fn scheduled_email_from_row(row: &sqlx::sqlite::SqliteRow) -> ScheduledEmail {
    let payload: String = row.get("payload");
    ScheduledEmail {
        id: row.get("id"),
        recipient: row.get("recipient"),
        template: row.get("template"),
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
        reference: row.get("reference"),
        due_at: row.get("due_at"),
        sent_at: row.get("sent_at"),
        cancelled_at: row.get("cancelled_at"),
        created_at: row.get("created_at"),
    }
}

fn notification_from_row(row: &sqlx::sqlite::SqliteRow) -> Notification {
    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: row.get("kind"),
        message: row.get("message"),
        project_id: row.get("project_id"),
        read: row.get::<i64, _>("is_read") != 0,
        created_at: row.get("created_at"),
    }
}

fn stats_from_row(row: &sqlx::sqlite::SqliteRow) -> DailyStats {
    DailyStats {
        date: row.get("date"),
        new_users: row.get("new_users"),
        active_users: row.get("active_users"),
        projects_created: row.get("projects_created"),
        versions_uploaded: row.get("versions_uploaded"),
        comments_created: row.get("comments_created"),
        feedback_answers: row.get("feedback_answers"),
        computed_at: row.get("computed_at"),
    }
}
