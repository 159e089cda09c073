use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for a job offer. Serialization is used by the listing
/// cache, so the field set must stay in sync with the offers table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Offer {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub company_name: String,
    pub logo_key: Option<String>,
    pub logo_url: Option<String>,
    pub logo_name: Option<String>,
    pub redirect_link: Option<String>,
    pub experience: String,
    pub localization: String,
    pub employment_type: String,
    pub contract_type: String,
    pub technologies: Vec<String>,
    pub min_salary: Decimal,
    pub max_salary: Decimal,
    pub currency: String,
    pub min_salary_year: Option<Decimal>,
    pub max_salary_year: Option<Decimal>,
    pub pricing: String,
    pub is_paid: bool,
    pub active_until: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
