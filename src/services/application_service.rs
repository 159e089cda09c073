use bytes::Bytes;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::offer::Offer;
use crate::services::mailer_service::MailerService;

pub struct ApplicationInput {
    pub offer_id: Uuid,
    pub name: String,
    pub email: String,
    pub introduction: Option<String>,
    pub cv_filename: String,
    pub cv_data: Bytes,
    pub user_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
    mailer: MailerService,
}

impl ApplicationService {
    pub fn new(pool: PgPool, mailer: MailerService) -> Self {
        Self { pool, mailer }
    }

    /// Mails the CV to the offer owner, then records the application.
    /// The mail goes first: an application that was never delivered
    /// must not appear in anyone's history.
    pub async fn submit(&self, input: ApplicationInput) -> Result<()> {
        let offer = sqlx::query_as::<_, Offer>(
            "SELECT id, title, content, company_name, logo_key, logo_url, logo_name, \
             redirect_link, experience, localization, employment_type, contract_type, \
             technologies, min_salary, max_salary, currency, min_salary_year, max_salary_year, \
             pricing, is_paid, active_until, is_deleted, deleted_at, expire_at, user_id, \
             created_at, updated_at FROM offers WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(input.offer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::internal("Failed to submit application", e))?
        .ok_or_else(|| Error::NotFound("Offer not found".to_string()))?;

        if offer.redirect_link.is_some() {
            return Err(Error::BadRequest(
                "This offer accepts applications through an external link".to_string(),
            ));
        }

        let owner_email = sqlx::query_scalar::<_, String>(
            "SELECT email FROM users WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(offer.user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::internal("Failed to submit application", e))?
        .ok_or_else(|| Error::NotFound("Offer owner not found".to_string()))?;

        self.mailer
            .send_application(
                &owner_email,
                &offer.title,
                &input.name,
                &input.email,
                input.introduction.as_deref(),
                &input.cv_filename,
                &input.cv_data,
            )
            .await?;

        sqlx::query(
            "INSERT INTO applications (offer_id, user_id, name, email, introduction, cv_filename) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(input.offer_id)
        .bind(input.user_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.introduction)
        .bind(&input.cv_filename)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::internal("Failed to submit application", e))?;

        info!(offer_id = %input.offer_id, "Application recorded");
        Ok(())
    }
}
