//! Billing endpoints: checkout sessions, pricing, and the Stripe webhook.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use super::{load_user, success, ApiResult};
use crate::auth::AuthUser;
use crate::billing::{verify_webhook_signature, WebhookEvent};
use crate::errors::AppError;
use crate::models::{CheckoutResponse, Plan, PriceInfo, TransactionKind};
use crate::AppState;

const DEFAULT_SUCCESS_URL: &str = "https://app.revyze.app/billing/success";
const DEFAULT_CANCEL_URL: &str = "https://app.revyze.app/billing/cancelled";

/// Request body for `POST /api/billing/checkout`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// POST /api/billing/checkout - Create a pro-plan checkout session.
pub async fn create_checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<CheckoutResponse> {
    let user = load_user(&state, &auth.user_id).await?;
    if user.plan == Plan::Pro {
        return Err(AppError::FailedPrecondition(
            "Already subscribed to the pro plan".to_string(),
        ));
    }

    let session = state
        .stripe
        .create_checkout_session(
            &user,
            request.success_url.as_deref().unwrap_or(DEFAULT_SUCCESS_URL),
            request.cancel_url.as_deref().unwrap_or(DEFAULT_CANCEL_URL),
        )
        .await?;
    success(session)
}

/// GET /api/billing/pricing - List active prices. Public.
pub async fn get_pricing(State(state): State<AppState>) -> ApiResult<Vec<PriceInfo>> {
    let prices = state.stripe.list_prices().await?;
    success(prices)
}

/// POST /stripe/webhook - Signature-verified Stripe event sink. Public.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<&'static str> {
    let secret = state.config.stripe_webhook_secret.as_deref().ok_or_else(|| {
        AppError::FailedPrecondition("Stripe webhook secret is not configured".to_string())
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::InvalidArgument("Missing Stripe-Signature header".to_string())
        })?;

    verify_webhook_signature(secret, signature, &body, chrono::Utc::now().timestamp())?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidArgument(format!("Malformed webhook payload: {}", e)))?;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let object = &event.data.object;
            let user_id = object
                .get("client_reference_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    AppError::InvalidArgument("Session lacks client_reference_id".to_string())
                })?;
            let customer = object.get("customer").and_then(|v| v.as_str());
            let session_id = object.get("id").and_then(|v| v.as_str());

            state.repo.set_plan(user_id, &Plan::Pro, customer).await?;
            state
                .repo
                .insert_transaction(user_id, TransactionKind::Subscription, 0, session_id)
                .await?;
            tracing::info!("User {} upgraded to pro via checkout", user_id);
        }
        "customer.subscription.deleted" => {
            let customer = event
                .data
                .object
                .get("customer")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    AppError::InvalidArgument("Subscription lacks customer".to_string())
                })?;

            if let Some(user) = state.repo.get_user_by_stripe_customer(customer).await? {
                state.repo.set_plan(&user.id, &Plan::Free, None).await?;
                state
                    .repo
                    .insert_transaction(&user.id, TransactionKind::Subscription, 0, Some(customer))
                    .await?;
                tracing::info!("User {} downgraded to free", user.id);
            } else {
                tracing::warn!("Subscription deleted for unknown customer {}", customer);
            }
        }
        other => {
            // Acknowledge everything else so Stripe stops retrying.
            tracing::debug!("Ignoring webhook event type {}", other);
        }
    }

    success("ok")
}
