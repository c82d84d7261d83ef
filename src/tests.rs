//! Integration tests for the Revyze backend.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::billing::sign_webhook_payload;
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::mailer::Mailer;
use crate::{billing::StripeClient, create_router, AppState};

const WEBHOOK_SECRET: &str = "whsec_test_secret";
const ADMIN_EMAIL: &str = "admin@revyze.test";

/// Test fixture that boots a real server on an ephemeral port.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let storage_path = temp_dir.path().join("storage");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Repository::new(pool);

        let config = Config {
            db_path,
            storage_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            jwt_secret: "integration-test-secret".to_string(),
            token_expiry_hours: 24,
            admin_emails: vec![ADMIN_EMAIL.to_string()],
            referral_reward_tokens: 50,
            stripe_secret_key: None,
            stripe_price_id: None,
            stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            sendgrid_api_key: None,
            mail_from: "noreply@revyze.test".to_string(),
        };

        let stripe = StripeClient::new(None, None);
        let mailer = Mailer::new(None, config.mail_from.clone(), repo.clone());

        let state = AppState {
            repo: Arc::new(repo),
            config: Arc::new(config),
            stripe: Arc::new(stripe),
            mailer: Arc::new(mailer),
        };

        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register an account and return (token, profile).
    async fn register(&self, email: &str, referral_code: Option<&str>) -> (String, Value) {
        let mut body = json!({
            "email": email,
            "password": "a-long-enough-password",
            "displayName": email.split('@').next().unwrap(),
        });
        if let Some(code) = referral_code {
            body["referralCode"] = json!(code);
        }

        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "registration should succeed");
        let envelope: Value = resp.json().await.unwrap();
        let token = envelope["data"]["token"].as_str().unwrap().to_string();
        let profile = envelope["data"]["user"].clone();
        (token, profile)
    }

    async fn login(&self, email: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": "a-long-enough-password" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let envelope: Value = resp.json().await.unwrap();
        envelope["data"]["token"].as_str().unwrap().to_string()
    }

    async fn get_json(&self, path: &str, token: &str) -> (reqwest::StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn post_json(
        &self,
        path: &str,
        token: &str,
        body: Value,
    ) -> (reqwest::StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn create_project(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post_json("/api/projects", token, json!({ "name": name }))
            .await;
        assert_eq!(status, 200);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Upload a version; returns (version_id, document_id).
    async fn upload_version(
        &self,
        token: &str,
        project_id: &str,
        category: &str,
    ) -> (String, String) {
        let resp = self
            .client
            .post(self.url(&format!("/api/projects/{}/versions", project_id)))
            .bearer_auth(token)
            .query(&[("category", category), ("filename", "plan.pdf")])
            .header("content-type", "application/pdf")
            .body(b"%PDF-1.4 fake plan bytes".to_vec())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "upload should succeed");
        let envelope: Value = resp.json().await.unwrap();
        let versions = envelope["data"]["versions"].as_array().unwrap();
        let current = versions
            .iter()
            .find(|v| v["isCurrent"].as_bool() == Some(true))
            .expect("exactly one current version");
        (
            current["id"].as_str().unwrap().to_string(),
            current["documentId"].as_str().unwrap().to_string(),
        )
    }
}

// ==================== HEALTH & AUTH ====================

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;
    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_register_login_me() {
    let fixture = TestFixture::new().await;
    let (token, profile) = fixture.register("ada@example.com", None).await;
    assert_eq!(profile["email"], "ada@example.com");
    assert_eq!(profile["plan"], "free");
    assert_eq!(profile["isAdmin"], false);
    assert!(!profile["referralCode"].as_str().unwrap().is_empty());

    let (status, body) = fixture.get_json("/api/auth/me", &token).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["email"], "ada@example.com");

    let login_token = fixture.login("ada@example.com").await;
    assert!(!login_token.is_empty());
}

#[tokio::test]
async fn test_duplicate_email_conflict() {
    let fixture = TestFixture::new().await;
    fixture.register("dup@example.com", None).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/register"))
        .json(&json!({
            "email": "dup@example.com",
            "password": "a-long-enough-password",
            "displayName": "dup",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let fixture = TestFixture::new().await;
    fixture.register("eve@example.com", None).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": "eve@example.com", "password": "not-the-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let fixture = TestFixture::new().await;
    let resp = fixture
        .client
        .get(fixture.url("/api/projects"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
}

// ==================== REFERRALS ====================

#[tokio::test]
async fn test_referral_rewards_referrer() {
    let fixture = TestFixture::new().await;
    let (alice_token, alice) = fixture.register("alice@example.com", None).await;
    let code = alice["referralCode"].as_str().unwrap();

    fixture.register("bob@example.com", Some(code)).await;

    let (status, body) = fixture.get_json("/api/referrals/me", &alice_token).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["tokenBalance"], 50);
    let referrals = body["data"]["referrals"].as_array().unwrap();
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0]["status"], "rewarded");
    assert_eq!(referrals[0]["rewardTokens"], 50);
}

#[tokio::test]
async fn test_unknown_referral_code_is_best_effort() {
    let fixture = TestFixture::new().await;
    // Registration must succeed even though the code matches nobody.
    let (_, profile) = fixture
        .register("carol@example.com", Some("NOSUCHCODE"))
        .await;
    assert_eq!(profile["email"], "carol@example.com");
    assert_eq!(profile["tokenBalance"], 0);
}

// ==================== PROJECTS, LIMITS, VERSIONS ====================

#[tokio::test]
async fn test_free_plan_project_limit() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.register("builder@example.com", None).await;

    for i in 0..3 {
        fixture.create_project(&token, &format!("House {}", i)).await;
    }
    let (status, body) = fixture
        .post_json("/api/projects", &token, json!({ "name": "One too many" }))
        .await;
    assert_eq!(status, 412);
    assert_eq!(body["error"]["code"], "FAILED_PRECONDITION");
}

#[tokio::test]
async fn test_collaborator_limit_not_persisted() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.register("owner@example.com", None).await;
    let project_id = fixture.create_project(&token, "Lakehouse").await;

    // Free plan: one guest and one professional.
    let (status, _) = fixture
        .post_json(
            &format!("/api/projects/{}/collaborators", project_id),
            &token,
            json!({ "email": "guest@example.com", "role": "guest" }),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = fixture
        .post_json(
            &format!("/api/projects/{}/collaborators", project_id),
            &token,
            json!({ "email": "pro@example.com", "role": "professional" }),
        )
        .await;
    assert_eq!(status, 200);

    // Second guest is rejected and not persisted.
    let (status, body) = fixture
        .post_json(
            &format!("/api/projects/{}/collaborators", project_id),
            &token,
            json!({ "email": "guest2@example.com", "role": "guest" }),
        )
        .await;
    assert_eq!(status, 412);
    assert_eq!(body["error"]["code"], "FAILED_PRECONDITION");

    let (_, body) = fixture
        .get_json(&format!("/api/projects/{}", project_id), &token)
        .await;
    let collaborators = body["data"]["project"]["collaborators"].as_array().unwrap();
    assert_eq!(collaborators.len(), 2);
}

#[tokio::test]
async fn test_version_numbering_per_category() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.register("arch@example.com", None).await;
    let project_id = fixture.create_project(&token, "Numbering").await;

    fixture.upload_version(&token, &project_id, "floor").await;
    fixture.upload_version(&token, &project_id, "floor").await;
    fixture.upload_version(&token, &project_id, "elevation").await;

    let (_, body) = fixture
        .get_json(&format!("/api/projects/{}", project_id), &token)
        .await;
    let versions = body["data"]["project"]["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 3);

    let numbers: Vec<(String, i64)> = versions
        .iter()
        .map(|v| {
            (
                v["category"].as_str().unwrap().to_string(),
                v["categoryVersionNumber"].as_i64().unwrap(),
            )
        })
        .collect();
    assert!(numbers.contains(&("floor".to_string(), 1)));
    assert!(numbers.contains(&("floor".to_string(), 2)));
    assert!(numbers.contains(&("elevation".to_string(), 1)));

    // Exactly one current version, the most recent upload.
    let current: Vec<&Value> = versions
        .iter()
        .filter(|v| v["isCurrent"].as_bool() == Some(true))
        .collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["category"], "elevation");
}

#[tokio::test]
async fn test_move_current_version_flag() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.register("mover@example.com", None).await;
    let project_id = fixture.create_project(&token, "Current").await;

    let (first_version, _) = fixture.upload_version(&token, &project_id, "floor").await;
    fixture.upload_version(&token, &project_id, "floor").await;

    let resp = fixture
        .client
        .put(fixture.url(&format!(
            "/api/projects/{}/versions/{}/current",
            project_id, first_version
        )))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let versions = body["data"]["versions"].as_array().unwrap();
    let current: Vec<&Value> = versions
        .iter()
        .filter(|v| v["isCurrent"].as_bool() == Some(true))
        .collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["id"], first_version.as_str());
}

#[tokio::test]
async fn test_file_download_roundtrip() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.register("dl@example.com", None).await;
    let project_id = fixture.create_project(&token, "Files").await;
    let (_, document_id) = fixture.upload_version(&token, &project_id, "floor").await;

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/files/{}", document_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"%PDF-1.4 fake plan bytes");

    // Strangers cannot fetch it.
    let (stranger_token, _) = fixture.register("stranger@example.com", None).await;
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/files/{}", document_id)))
        .bearer_auth(&stranger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

// ==================== COMMENTS & VISIBILITY ====================

/// Owner project with one guest and one professional, one version uploaded.
async fn visibility_fixture(
    fixture: &TestFixture,
) -> (String, String, String, String, String) {
    let (owner, _) = fixture.register("owner@vis.com", None).await;
    let project_id = fixture.create_project(&owner, "Visibility").await;
    let (version_id, _) = fixture.upload_version(&owner, &project_id, "floor").await;

    for (email, role) in [("guest@vis.com", "guest"), ("pro@vis.com", "professional")] {
        let (status, _) = fixture
            .post_json(
                &format!("/api/projects/{}/collaborators", project_id),
                &owner,
                json!({ "email": email, "role": role }),
            )
            .await;
        assert_eq!(status, 200);
    }
    let (guest, _) = fixture.register("guest@vis.com", None).await;
    let (pro, _) = fixture.register("pro@vis.com", None).await;
    (owner, guest, pro, project_id, version_id)
}

#[tokio::test]
async fn test_comment_audience_channels() {
    let fixture = TestFixture::new().await;
    let (owner, guest, pro, project_id, version_id) = visibility_fixture(&fixture).await;
    let comments_path = format!(
        "/api/projects/{}/versions/{}/comments",
        project_id, version_id
    );

    // Guests post into their channel regardless of what they ask for.
    let (status, body) = fixture
        .post_json(
            &comments_path,
            &guest,
            json!({ "body": "guest note", "audience": "public" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["audience"], "guest-owner");

    let (status, body) = fixture
        .post_json(&comments_path, &pro, json!({ "body": "pro note" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["audience"], "pro-owner");

    // Owners default to public.
    let (status, body) = fixture
        .post_json(&comments_path, &owner, json!({ "body": "owner note" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["audience"], "public");

    let comment_bodies = |body: &Value| -> Vec<String> {
        body["data"]["project"]["versions"][0]["comments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["body"].as_str().unwrap().to_string())
            .collect()
    };

    // Owner sees all three; guest and pro each see their channel plus public.
    let (_, body) = fixture
        .get_json(&format!("/api/projects/{}", project_id), &owner)
        .await;
    assert_eq!(comment_bodies(&body).len(), 3);

    let (_, body) = fixture
        .get_json(&format!("/api/projects/{}", project_id), &guest)
        .await;
    let guest_view = comment_bodies(&body);
    assert!(guest_view.contains(&"guest note".to_string()));
    assert!(guest_view.contains(&"owner note".to_string()));
    assert!(!guest_view.contains(&"pro note".to_string()));

    let (_, body) = fixture
        .get_json(&format!("/api/projects/{}", project_id), &pro)
        .await;
    let pro_view = comment_bodies(&body);
    assert!(pro_view.contains(&"pro note".to_string()));
    assert!(!pro_view.contains(&"guest note".to_string()));
}

#[tokio::test]
async fn test_resolve_and_soft_delete() {
    let fixture = TestFixture::new().await;
    let (owner, guest, _, project_id, version_id) = visibility_fixture(&fixture).await;
    let comments_path = format!(
        "/api/projects/{}/versions/{}/comments",
        project_id, version_id
    );

    let (_, body) = fixture
        .post_json(&comments_path, &guest, json!({ "body": "fix the stairs" }))
        .await;
    let comment_id = body["data"]["id"].as_str().unwrap().to_string();

    // Owner resolves.
    let (status, body) = fixture
        .post_json(
            &format!("{}/{}/resolve", comments_path, comment_id),
            &owner,
            json!({}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["resolved"], true);

    // Author soft-deletes; owner still sees the flagged record, guest does not.
    let resp = fixture
        .client
        .delete(fixture.url(&format!("{}/{}", comments_path, comment_id)))
        .bearer_auth(&guest)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (_, body) = fixture
        .get_json(&format!("/api/projects/{}", project_id), &owner)
        .await;
    let owner_comments = body["data"]["project"]["versions"][0]["comments"]
        .as_array()
        .unwrap();
    assert_eq!(owner_comments.len(), 1);
    assert_eq!(owner_comments[0]["deleted"], true);

    let (_, body) = fixture
        .get_json(&format!("/api/projects/{}", project_id), &guest)
        .await;
    assert_eq!(
        body["data"]["project"]["versions"][0]["comments"]
            .as_array()
            .unwrap()
            .len(),
        0
    );
}

#[tokio::test]
async fn test_comment_notifies_owner() {
    let fixture = TestFixture::new().await;
    let (owner, guest, _, project_id, version_id) = visibility_fixture(&fixture).await;

    fixture
        .post_json(
            &format!(
                "/api/projects/{}/versions/{}/comments",
                project_id, version_id
            ),
            &guest,
            json!({ "body": "ping" }),
        )
        .await;

    let (status, body) = fixture.get_json("/api/notifications", &owner).await;
    assert_eq!(status, 200);
    let notifications = body["data"].as_array().unwrap();
    let comment_note = notifications
        .iter()
        .find(|n| n["kind"] == "comment")
        .expect("owner should be notified of the comment");
    assert_eq!(comment_note["read"], false);

    let id = comment_note["id"].as_str().unwrap();
    let (status, _) = fixture
        .post_json(&format!("/api/notifications/{}/read", id), &owner, json!({}))
        .await;
    assert_eq!(status, 200);
}

// ==================== SHARING ====================

#[tokio::test]
async fn test_share_link_filters_by_link_role() {
    let fixture = TestFixture::new().await;
    let (owner, _, pro, project_id, version_id) = visibility_fixture(&fixture).await;
    let comments_path = format!(
        "/api/projects/{}/versions/{}/comments",
        project_id, version_id
    );

    fixture
        .post_json(&comments_path, &pro, json!({ "body": "pro-only detail" }))
        .await;
    fixture
        .post_json(
            &comments_path,
            &owner,
            json!({ "body": "for everyone", "audience": "public" }),
        )
        .await;

    let (status, body) = fixture
        .post_json(
            &format!("/api/projects/{}/share", project_id),
            &owner,
            json!({ "role": "guest" }),
        )
        .await;
    assert_eq!(status, 200);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    // Link access needs no auth; guest-role link hides the pro channel.
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/shared/{}", token)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "guest");
    let bodies: Vec<&str> = body["data"]["project"]["versions"][0]["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["body"].as_str().unwrap())
        .collect();
    assert!(bodies.contains(&"for everyone"));
    assert!(!bodies.contains(&"pro-only detail"));
    // Share settings are not leaked through the link.
    assert!(body["data"]["project"]["share"].is_null());
}

#[tokio::test]
async fn test_disabled_or_unknown_share_token() {
    let fixture = TestFixture::new().await;
    let (owner, _) = fixture.register("sharer@example.com", None).await;
    let project_id = fixture.create_project(&owner, "Shared").await;

    let (_, body) = fixture
        .post_json(
            &format!("/api/projects/{}/share", project_id),
            &owner,
            json!({ "role": "guest" }),
        )
        .await;
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/projects/{}/share", project_id)))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    for bad in [token.as_str(), "not-a-token"] {
        let resp = fixture
            .client
            .get(fixture.url(&format!("/api/shared/{}", bad)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }
}

// ==================== ENGAGEMENT ====================

#[tokio::test]
async fn test_engagement_scenario() {
    let fixture = TestFixture::new().await;
    fixture.register("score@example.com", None).await;

    // loginCount=5, projectCount=1, shareCountGuest=1, no activity events.
    for _ in 0..4 {
        fixture.login("score@example.com").await;
    }
    let token = fixture.login("score@example.com").await;
    let project_id = fixture.create_project(&token, "Scored").await;
    fixture
        .post_json(
            &format!("/api/projects/{}/share", project_id),
            &token,
            json!({ "role": "guest" }),
        )
        .await;

    let (status, body) = fixture
        .post_json("/api/engagement/recompute", &token, json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["rawScore"], 40);
    assert_eq!(body["data"]["score"], 13);

    // Persisted on the profile.
    let (_, body) = fixture.get_json("/api/auth/me", &token).await;
    assert_eq!(body["data"]["engagementScore"], 13);
}

// ==================== FEEDBACK CAMPAIGNS ====================

#[tokio::test]
async fn test_feedback_active_selection_and_cap() {
    let fixture = TestFixture::new().await;
    let (admin, _) = fixture.register(ADMIN_EMAIL, None).await;
    let (user, _) = fixture.register("asked@example.com", None).await;

    let (status, body) = fixture
        .post_json(
            "/api/admin/feedback/campaigns",
            &admin,
            json!({
                "name": "onboarding",
                "prompt": "How was your first week?",
                "segment": { "kind": "all" },
                "frequencyCapDays": 14,
            }),
        )
        .await;
    assert_eq!(status, 200);
    let campaign_id = body["data"]["id"].as_str().unwrap().to_string();

    // First request shows the campaign and records the impression.
    let (status, body) = fixture.get_json("/api/feedback/active", &user).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["id"], campaign_id.as_str());

    // Second request is inside the frequency-cap window.
    let (status, body) = fixture.get_json("/api/feedback/active", &user).await;
    assert_eq!(status, 200);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_expired_campaign_not_shown() {
    let fixture = TestFixture::new().await;
    let (admin, _) = fixture.register(ADMIN_EMAIL, None).await;
    let (user, _) = fixture.register("nobody@example.com", None).await;

    let past = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();
    let long_ago = (chrono::Utc::now() - chrono::Duration::days(30)).to_rfc3339();
    let (status, _) = fixture
        .post_json(
            "/api/admin/feedback/campaigns",
            &admin,
            json!({
                "name": "over",
                "prompt": "Too late",
                "activeFrom": long_ago,
                "activeUntil": past,
                "forceShow": true,
            }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, body) = fixture.get_json("/api/feedback/active", &user).await;
    assert_eq!(status, 200);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_feedback_answer_lifts_engagement() {
    let fixture = TestFixture::new().await;
    let (admin, _) = fixture.register(ADMIN_EMAIL, None).await;
    let (user, _) = fixture.register("answerer@example.com", None).await;

    let (_, body) = fixture
        .post_json(
            "/api/admin/feedback/campaigns",
            &admin,
            json!({ "name": "nps", "prompt": "Would you recommend us?", "forceShow": true }),
        )
        .await;
    let campaign_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = fixture.get_json("/api/feedback/active", &user).await;
    assert_eq!(body["data"]["id"], campaign_id.as_str());

    let (status, _) = fixture
        .post_json(
            "/api/feedback/answer",
            &user,
            json!({ "campaignId": campaign_id, "answer": "Absolutely" }),
        )
        .await;
    assert_eq!(status, 200);

    // Survey answers are worth 15 raw points inside the window.
    let (_, body) = fixture
        .post_json("/api/engagement/recompute", &user, json!({}))
        .await;
    assert_eq!(body["data"]["rawScore"], 15);
}

// ==================== FEATURE VOTES ====================

#[tokio::test]
async fn test_feature_vote_debits_tokens() {
    let fixture = TestFixture::new().await;
    let (admin, _) = fixture.register(ADMIN_EMAIL, None).await;

    let resp = fixture
        .client
        .put(fixture.url("/api/admin/features/dark-mode/cost"))
        .bearer_auth(&admin)
        .json(&json!({ "costTokens": 30, "title": "Dark mode" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // A broke user cannot vote.
    let (broke, _) = fixture.register("broke@example.com", None).await;
    let (status, body) = fixture
        .post_json("/api/features/dark-mode/vote", &broke, json!({}))
        .await;
    assert_eq!(status, 412);
    assert_eq!(body["error"]["code"], "FAILED_PRECONDITION");

    // A referrer has 50 tokens; voting spends 30 exactly once.
    let (rich_token, rich) = fixture.register("rich@example.com", None).await;
    let code = rich["referralCode"].as_str().unwrap();
    fixture.register("friend@example.com", Some(code)).await;

    let (status, body) = fixture
        .post_json("/api/features/dark-mode/vote", &rich_token, json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["voteCount"], 1);

    let (_, body) = fixture.get_json("/api/referrals/me", &rich_token).await;
    assert_eq!(body["data"]["tokenBalance"], 20);

    // Voting twice is a conflict.
    let (status, _) = fixture
        .post_json("/api/features/dark-mode/vote", &rich_token, json!({}))
        .await;
    assert_eq!(status, 409);

    // Feature list is public.
    let resp = fixture
        .client
        .get(fixture.url("/api/features"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// ==================== BILLING WEBHOOK ====================

#[tokio::test]
async fn test_webhook_bad_signature_rejected() {
    let fixture = TestFixture::new().await;
    let (_, profile) = fixture.register("payer@example.com", None).await;

    let payload = json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "client_reference_id": profile["id"],
            "customer": "cus_test_1",
        }},
    })
    .to_string();

    let resp = fixture
        .client
        .post(fixture.url("/stripe/webhook"))
        .header("stripe-signature", "t=0,v1=deadbeef")
        .body(payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // No state change: still on the free plan.
    let token = fixture.login("payer@example.com").await;
    let (_, body) = fixture.get_json("/api/auth/me", &token).await;
    assert_eq!(body["data"]["plan"], "free");
}

#[tokio::test]
async fn test_webhook_checkout_upgrades_plan() {
    let fixture = TestFixture::new().await;
    let (token, profile) = fixture.register("upgrader@example.com", None).await;

    let payload = json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_2",
            "client_reference_id": profile["id"],
            "customer": "cus_test_2",
        }},
    })
    .to_string();
    let signature =
        sign_webhook_payload(WEBHOOK_SECRET, payload.as_bytes(), chrono::Utc::now().timestamp());

    let resp = fixture
        .client
        .post(fixture.url("/stripe/webhook"))
        .header("stripe-signature", signature)
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (_, body) = fixture.get_json("/api/auth/me", &token).await;
    assert_eq!(body["data"]["plan"], "pro");

    // Subscription deletion downgrades back to free.
    let payload = json!({
        "type": "customer.subscription.deleted",
        "data": { "object": { "customer": "cus_test_2" } },
    })
    .to_string();
    let signature =
        sign_webhook_payload(WEBHOOK_SECRET, payload.as_bytes(), chrono::Utc::now().timestamp());
    let resp = fixture
        .client
        .post(fixture.url("/stripe/webhook"))
        .header("stripe-signature", signature)
        .body(payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let (_, body) = fixture.get_json("/api/auth/me", &token).await;
    assert_eq!(body["data"]["plan"], "free");
}

#[tokio::test]
async fn test_checkout_unconfigured_fails_precondition() {
    let fixture = TestFixture::new().await;
    let (token, _) = fixture.register("nocheckout@example.com", None).await;
    let (status, body) = fixture
        .post_json("/api/billing/checkout", &token, json!({}))
        .await;
    assert_eq!(status, 412);
    assert_eq!(body["error"]["code"], "FAILED_PRECONDITION");
}

// ==================== ADMIN GUARDS & ANALYTICS ====================

#[tokio::test]
async fn test_admin_routes_reject_non_admins() {
    let fixture = TestFixture::new().await;
    let (user, _) = fixture.register("pleb@example.com", None).await;

    let (status, body) = fixture
        .post_json(
            "/api/admin/feedback/campaigns",
            &user,
            json!({ "name": "x", "prompt": "y" }),
        )
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");

    let (status, _) = fixture
        .post_json("/api/admin/analytics/rebuild", &user, json!({}))
        .await;
    assert_eq!(status, 403);

    let (status, _) = fixture.get_json("/api/admin/analytics/daily", &user).await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn test_analytics_rebuild_counts_activity() {
    let fixture = TestFixture::new().await;
    let (admin, _) = fixture.register(ADMIN_EMAIL, None).await;
    let (user, _) = fixture.register("active@example.com", None).await;
    let project_id = fixture.create_project(&user, "Counted").await;
    let (version_id, _) = fixture.upload_version(&user, &project_id, "floor").await;
    fixture
        .post_json(
            &format!(
                "/api/projects/{}/versions/{}/comments",
                project_id, version_id
            ),
            &user,
            json!({ "body": "count me" }),
        )
        .await;

    let (status, body) = fixture
        .post_json("/api/admin/analytics/rebuild", &admin, json!({ "days": 2 }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["daysUpdated"], 2);

    let (status, body) = fixture
        .get_json("/api/admin/analytics/daily?days=2", &admin)
        .await;
    assert_eq!(status, 200);
    let stats = body["data"].as_array().unwrap();
    assert_eq!(stats.len(), 2);
    let today = &stats[0];
    assert!(today["newUsers"].as_i64().unwrap() >= 2);
    assert_eq!(today["projectsCreated"], 1);
    assert_eq!(today["versionsUploaded"], 1);
    assert_eq!(today["commentsCreated"], 1);
    assert!(today["activeUsers"].as_i64().unwrap() >= 1);
}

// ==================== ADMIN ROLE INJECTION ====================

#[tokio::test]
async fn test_admin_view_as_override() {
    let fixture = TestFixture::new().await;
    let (admin, _) = fixture.register(ADMIN_EMAIL, None).await;
    let (owner, _) = fixture.register("ownr@example.com", None).await;
    let project_id = fixture.create_project(&owner, "Inspected").await;

    // Admins have no derived role, so plain access is denied.
    let (status, _) = fixture
        .get_json(&format!("/api/projects/{}", project_id), &admin)
        .await;
    assert_eq!(status, 403);

    // The explicit injection point grants the requested role.
    let (status, body) = fixture
        .get_json(
            &format!("/api/projects/{}?viewAs=guest", project_id),
            &admin,
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["role"], "guest");

    // Non-admins cannot inject a role.
    let (stranger, _) = fixture.register("nosy@example.com", None).await;
    let (status, _) = fixture
        .get_json(
            &format!("/api/projects/{}?viewAs=owner", project_id),
            &stranger,
        )
        .await;
    assert_eq!(status, 403);
}
