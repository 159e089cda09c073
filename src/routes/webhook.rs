use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::json;

use crate::error::{Error, Result};
use crate::AppState;

/// Stripe webhook receiver. The body must stay raw bytes: the
/// signature covers the exact payload as sent.
#[axum::debug_handler]
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let event = state.payment_service.verify_event(&body, signature)?;
    state.payment_service.apply_event(&event).await?;

    Ok(Json(json!({ "msg": "Webhook processed" })))
}
