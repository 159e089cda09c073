use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A purchasable listing tier. Price is the smallest currency unit,
/// matching what Stripe expects in `unit_amount`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentType {
    pub code: String,
    pub name: String,
    pub price: i64,
    pub currency: String,
    pub active_months: i32,
    pub benefits: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger of checkout sessions already applied to an offer. The
/// primary key on `session_id` is what makes webhook replays no-ops.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentEvent {
    pub session_id: String,
    pub offer_id: Uuid,
    pub operation: String,
    pub active_months: i32,
    pub applied_at: DateTime<Utc>,
}
