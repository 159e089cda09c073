use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// A single paid line on a checkout session. Amount is in the
/// smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Deserialized webhook event. `data.object` stays untyped because
/// each event type carries a different object shape.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutObject {
    pub id: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Seam between the payment flow and Stripe. Mocked in tests so no
/// network traffic is needed to exercise checkout and webhook logic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        line_item: CheckoutLineItem,
        metadata: HashMap<String, String>,
    ) -> Result<CheckoutSession>;

    fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str)
        -> Result<StripeEvent>;
}

/// Minimal Stripe REST client built on reqwest. Only the checkout
/// session endpoint is needed; the official SDK would be overkill.
pub struct StripeClient {
    http: Client,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            http: Client::new(),
            secret_key,
            webhook_secret,
            success_url,
            cancel_url,
        }
    }

    fn checkout_form(
        &self,
        line_item: &CheckoutLineItem,
        metadata: &HashMap<String, String>,
    ) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            (
                "line_items[0][price_data][currency]".to_string(),
                line_item.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                line_item.name.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                line_item.amount.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }
        form
    }
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        line_item: CheckoutLineItem,
        metadata: HashMap<String, String>,
    ) -> Result<CheckoutSession> {
        let form = self.checkout_form(&line_item, &metadata);
        let response = self
            .http
            .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .context("stripe checkout request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Stripe rejected checkout session");
            bail!("stripe returned {}", status);
        }

        let session: CheckoutSession = response
            .json()
            .await
            .context("stripe checkout response was not valid JSON")?;
        Ok(session)
    }

    /// Verifies the `Stripe-Signature` header: HMAC-SHA256 over
    /// `"{timestamp}.{payload}"` with the webhook secret, compared in
    /// constant time against the `v1` entry.
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        let mut timestamp = None;
        let mut signature = None;
        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(value) = part.strip_prefix("t=") {
                timestamp = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("v1=") {
                signature = Some(value.to_string());
            }
        }
        let timestamp = timestamp.ok_or_else(|| anyhow!("missing timestamp in signature header"))?;
        let signature = signature.ok_or_else(|| anyhow!("missing v1 entry in signature header"))?;

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .context("webhook secret rejected by HMAC")?;
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();

        let provided = hex::decode(&signature).context("signature is not valid hex")?;
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            bail!("webhook signature mismatch");
        }

        let event: StripeEvent =
            serde_json::from_slice(payload).context("webhook payload was not valid JSON")?;
        Ok(event)
    }
}
