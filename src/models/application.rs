use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A submitted application. The CV itself is mailed to the offer
/// owner and never stored; only the original filename is kept.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub introduction: Option<String>,
    pub cv_filename: String,
    pub created_at: DateTime<Utc>,
}
