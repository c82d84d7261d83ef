//! Stripe integration: checkout sessions, price lookup, webhook verification.
//!
//! A thin REST client over `reqwest`; no SDK. Billing routes fail with
//! `failed-precondition` when the secret key is not configured.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::auth::constant_time_compare;
use crate::errors::AppError;
use crate::models::{CheckoutResponse, PriceInfo, User};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook signature timestamp, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Thin Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: Option<String>,
    price_id: Option<String>,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct PriceList {
    data: Vec<StripePrice>,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    product: String,
    currency: String,
    unit_amount: Option<i64>,
    nickname: Option<String>,
    recurring: Option<StripeRecurring>,
}

#[derive(Debug, Deserialize)]
struct StripeRecurring {
    interval: String,
}

impl StripeClient {
    pub fn new(secret_key: Option<String>, price_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            price_id,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    fn key(&self) -> Result<&str, AppError> {
        self.secret_key.as_deref().ok_or_else(|| {
            AppError::FailedPrecondition("Stripe is not configured".to_string())
        })
    }

    /// Create a hosted checkout session for the pro plan.
    pub async fn create_checkout_session(
        &self,
        user: &User,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutResponse, AppError> {
        let key = self.key()?;
        let price_id = self.price_id.as_deref().ok_or_else(|| {
            AppError::FailedPrecondition("Pro plan price is not configured".to_string())
        })?;

        let form = [
            ("mode", "subscription"),
            ("client_reference_id", &user.id),
            ("customer_email", &user.email),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.api_base))
            .bearer_auth(key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Stripe checkout creation failed ({}): {}", status, body);
            return Err(AppError::Internal(
                "Stripe checkout creation failed".to_string(),
            ));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe response parse failed: {}", e)))?;

        Ok(CheckoutResponse {
            session_id: session.id,
            url: session.url,
        })
    }

    /// List active prices for the public pricing page.
    pub async fn list_prices(&self) -> Result<Vec<PriceInfo>, AppError> {
        let key = self.key()?;

        let response = self
            .http
            .get(format!("{}/prices?active=true", self.api_base))
            .bearer_auth(key)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal("Stripe price lookup failed".to_string()));
        }

        let list: PriceList = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe response parse failed: {}", e)))?;

        Ok(list
            .data
            .into_iter()
            .map(|p| PriceInfo {
                id: p.id,
                product: p.product,
                currency: p.currency,
                unit_amount: p.unit_amount.unwrap_or(0),
                interval: p.recurring.map(|r| r.interval),
                nickname: p.nickname,
            })
            .collect())
    }
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// The header has the form `t=<unix>,v1=<hex hmac>,...`; v1 is
/// HMAC-SHA256 over `"{t}.{body}"` with the webhook secret. Timestamps older
/// than the tolerance are rejected to limit replay.
pub fn verify_webhook_signature(
    secret: &str,
    signature_header: &str,
    payload: &[u8],
    now_unix: i64,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        AppError::InvalidArgument("Malformed Stripe-Signature header".to_string())
    })?;
    if signatures.is_empty() {
        return Err(AppError::InvalidArgument(
            "Malformed Stripe-Signature header".to_string(),
        ));
    }

    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::InvalidArgument(
            "Stripe-Signature timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC init failed: {}", e)))?;
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    let expected = hex_encode(&mac.finalize().into_bytes());

    if signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(
            "Stripe-Signature verification failed".to_string(),
        ))
    }
}

/// Build a valid signature header for a payload. Test support.
#[cfg(test)]
pub fn sign_webhook_payload(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex_encode(&mac.finalize().into_bytes()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// The webhook event fields the handler cares about.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign_webhook_payload(SECRET, payload, now);
        assert!(verify_webhook_signature(SECRET, &header, payload, now).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"{}";
        let now = chrono::Utc::now().timestamp();
        let header = sign_webhook_payload("whsec_other", payload, now);
        assert!(verify_webhook_signature(SECRET, &header, payload, now).is_err());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = chrono::Utc::now().timestamp();
        let header = sign_webhook_payload(SECRET, b"{\"a\":1}", now);
        assert!(verify_webhook_signature(SECRET, &header, b"{\"a\":2}", now).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let now = chrono::Utc::now().timestamp();
        let stale = now - SIGNATURE_TOLERANCE_SECS - 1;
        let header = sign_webhook_payload(SECRET, payload, stale);
        assert!(verify_webhook_signature(SECRET, &header, payload, now).is_err());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let payload = b"{}";
        let now = chrono::Utc::now().timestamp();
        assert!(verify_webhook_signature(SECRET, "garbage", payload, now).is_err());
        assert!(verify_webhook_signature(SECRET, "t=abc,v1=", payload, now).is_err());
        assert!(verify_webhook_signature(SECRET, "v1=deadbeef", payload, now).is_err());
    }
}
