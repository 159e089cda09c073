use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::database::cache::{offers_page_key, ListingCache, OFFERS_TOTAL_KEY};
use crate::dto::offer_dto::{CreateOfferData, UpdateOfferPayload};
use crate::error::{Error, Result};
use crate::filters::{build_predicate, BindValue, OfferFilter, OfferSort};
use crate::models::offer::Offer;

const OFFER_COLUMNS: &str = "id, title, content, company_name, logo_key, logo_url, logo_name, \
     redirect_link, experience, localization, employment_type, contract_type, technologies, \
     min_salary, max_salary, currency, min_salary_year, max_salary_year, pricing, is_paid, \
     active_until, is_deleted, deleted_at, expire_at, user_id, created_at, updated_at";

/// Unpaid offers are kept around this long so the poster can still
/// complete the checkout, then the sweep purges them.
pub const ABANDONED_OFFER_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct OfferPageResult {
    pub offers: Vec<Offer>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
    pub from_cache: Option<bool>,
}

#[derive(Clone)]
pub struct OfferService {
    pool: PgPool,
    cache: ListingCache,
}

impl OfferService {
    pub fn new(pool: PgPool, cache: ListingCache) -> Self {
        Self { pool, cache }
    }

    /// Public listing with pagination, filters and sorting. Only the
    /// unfiltered, default-sorted listing goes through the cache; a
    /// filter set is too unlikely to repeat to be worth storing.
    pub async fn list(
        &self,
        page: i64,
        limit: i64,
        filters: &[OfferFilter],
        sort: OfferSort,
    ) -> Result<OfferPageResult> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) * limit;
        let cacheable = filters.is_empty() && sort == OfferSort::Latest;

        if cacheable {
            if let Some(hit) = self.cached_page(page, limit) {
                return Ok(hit);
            }
        }

        let predicate = build_predicate(filters);
        let where_clause = predicate.where_clause();
        let items_sql = format!(
            "SELECT {} FROM offers {} ORDER BY {} LIMIT ${} OFFSET ${}",
            OFFER_COLUMNS,
            where_clause,
            sort.order_clause(),
            predicate.next_placeholder(),
            predicate.next_placeholder() + 1,
        );
        let total_sql = format!("SELECT COUNT(*) FROM offers {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, Offer>(&items_sql);
        for value in &predicate.binds {
            items_statement = match value {
                BindValue::Text(text) => items_statement.bind(text),
                BindValue::TextArray(values) => items_statement.bind(values),
                BindValue::Salary(amount) => items_statement.bind(amount),
            };
        }
        items_statement = items_statement.bind(limit).bind(offset);

        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_sql);
        for value in &predicate.binds {
            total_statement = match value {
                BindValue::Text(text) => total_statement.bind(text),
                BindValue::TextArray(values) => total_statement.bind(values),
                BindValue::Salary(amount) => total_statement.bind(amount),
            };
        }

        let (offers, total) = tokio::try_join!(
            items_statement.fetch_all(&self.pool),
            total_statement.fetch_one(&self.pool),
        )
        .map_err(|e| Error::internal("Failed to retrieve offers", e))?;

        let pages = page_count(total, limit);

        if cacheable {
            self.store_page(page, limit, &offers, total);
        }

        Ok(OfferPageResult {
            offers,
            total,
            page,
            limit,
            pages,
            from_cache: if cacheable { Some(false) } else { None },
        })
    }

    fn cached_page(&self, page: i64, limit: i64) -> Option<OfferPageResult> {
        let offers_json = self.cache.get(&offers_page_key(page, limit))?;
        let total_raw = self.cache.get(OFFERS_TOTAL_KEY)?;

        let offers: Vec<Offer> = serde_json::from_str(&offers_json)
            .map_err(|e| warn!(error = %e, "Discarding unreadable cached listing page"))
            .ok()?;
        let total: i64 = total_raw.parse().ok()?;

        Some(OfferPageResult {
            offers,
            total,
            page,
            limit,
            pages: page_count(total, limit),
            from_cache: Some(true),
        })
    }

    fn store_page(&self, page: i64, limit: i64, offers: &[Offer], total: i64) {
        match serde_json::to_string(offers) {
            Ok(serialized) => {
                self.cache.set(&offers_page_key(page, limit), serialized);
                self.cache.set(OFFERS_TOTAL_KEY, total.to_string());
            }
            Err(e) => warn!(error = %e, "Failed to serialize listing page for cache"),
        }
    }

    /// Any non-deleted offer, paid or not, so a poster can preview
    /// their listing before completing the checkout.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Offer> {
        let sql = format!(
            "SELECT {} FROM offers WHERE id = $1 AND is_deleted = FALSE",
            OFFER_COLUMNS
        );
        sqlx::query_as::<_, Offer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Offer not found".to_string()))
    }

    /// Like [`get_by_id`] but additionally enforces ownership.
    ///
    /// [`get_by_id`]: OfferService::get_by_id
    pub async fn get_owned(&self, id: Uuid, user_id: Uuid) -> Result<Offer> {
        let offer = self.get_by_id(id).await?;
        if offer.user_id != user_id {
            return Err(Error::Forbidden("You do not own this offer".to_string()));
        }
        Ok(offer)
    }

    pub async fn create(&self, user_id: Uuid, data: CreateOfferData) -> Result<Offer> {
        let expire_at = Utc::now() + Duration::days(ABANDONED_OFFER_TTL_DAYS);
        let (logo_key, logo_url, logo_name) = match &data.logo {
            Some(logo) => (
                Some(logo.key.clone()),
                Some(logo.url.clone()),
                Some(logo.name.clone()),
            ),
            None => (None, None, None),
        };

        let sql = format!(
            "INSERT INTO offers (title, content, company_name, logo_key, logo_url, logo_name, \
             redirect_link, experience, localization, employment_type, contract_type, \
             technologies, min_salary, max_salary, currency, min_salary_year, max_salary_year, \
             pricing, expire_at, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20) \
             RETURNING {}",
            OFFER_COLUMNS
        );
        let offer = sqlx::query_as::<_, Offer>(&sql)
            .bind(&data.title)
            .bind(&data.content)
            .bind(&data.company_name)
            .bind(&logo_key)
            .bind(&logo_url)
            .bind(&logo_name)
            .bind(&data.redirect_link)
            .bind(&data.experience)
            .bind(&data.localization)
            .bind(&data.employment_type)
            .bind(&data.contract_type)
            .bind(&data.technologies)
            .bind(data.min_salary)
            .bind(data.max_salary)
            .bind(&data.currency)
            .bind(data.min_salary_year)
            .bind(data.max_salary_year)
            .bind(&data.pricing)
            .bind(expire_at)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to create offer", e))?;

        Ok(offer)
    }

    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        payload: &UpdateOfferPayload,
    ) -> Result<Offer> {
        let current = self.get_owned(id, user_id).await?;

        let effective_min = payload.min_salary.unwrap_or(current.min_salary);
        let effective_max = payload.max_salary.unwrap_or(current.max_salary);
        if effective_min >= effective_max {
            return Err(Error::BadRequest(
                "minSalary must be lower than maxSalary".to_string(),
            ));
        }

        let sql = format!(
            "UPDATE offers SET \
             title = COALESCE($2, title), \
             content = COALESCE($3, content), \
             company_name = COALESCE($4, company_name), \
             redirect_link = COALESCE($5, redirect_link), \
             experience = COALESCE($6, experience), \
             localization = COALESCE($7, localization), \
             employment_type = COALESCE($8, employment_type), \
             contract_type = COALESCE($9, contract_type), \
             technologies = COALESCE($10, technologies), \
             min_salary = COALESCE($11, min_salary), \
             max_salary = COALESCE($12, max_salary), \
             currency = COALESCE($13, currency), \
             min_salary_year = COALESCE($14, min_salary_year), \
             max_salary_year = COALESCE($15, max_salary_year), \
             updated_at = NOW() \
             WHERE id = $1 AND is_deleted = FALSE \
             RETURNING {}",
            OFFER_COLUMNS
        );
        let offer = sqlx::query_as::<_, Offer>(&sql)
            .bind(id)
            .bind(&payload.title)
            .bind(&payload.content)
            .bind(&payload.company_name)
            .bind(&payload.redirect_link)
            .bind(&payload.experience)
            .bind(&payload.localization)
            .bind(&payload.employment_type)
            .bind(&payload.contract_type)
            .bind(&payload.technologies)
            .bind(payload.min_salary)
            .bind(payload.max_salary)
            .bind(&payload.currency)
            .bind(payload.min_salary_year)
            .bind(payload.max_salary_year)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to update offer", e))?;

        Ok(offer)
    }

    pub async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        self.get_owned(id, user_id).await?;

        sqlx::query(
            "UPDATE offers SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::internal("Failed to delete offer", e))?;

        Ok(())
    }

    /// Everything the account posted, including unpaid and expired
    /// offers, newest first.
    pub async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Offer>> {
        let sql = format!(
            "SELECT {} FROM offers WHERE user_id = $1 AND is_deleted = FALSE \
             ORDER BY created_at DESC",
            OFFER_COLUMNS
        );
        let offers = sqlx::query_as::<_, Offer>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to retrieve your offers", e))?;
        Ok(offers)
    }

    /// Offers the account has applied to, most recent application
    /// first.
    pub async fn list_applied(&self, user_id: Uuid) -> Result<Vec<Offer>> {
        let columns = OFFER_COLUMNS
            .split(", ")
            .map(|column| format!("o.{}", column))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM offers o \
             JOIN applications a ON a.offer_id = o.id \
             WHERE a.user_id = $1 AND o.is_deleted = FALSE \
             ORDER BY a.created_at DESC",
            columns
        );
        let offers = sqlx::query_as::<_, Offer>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::internal("Failed to retrieve your applications", e))?;
        Ok(offers)
    }
}

fn page_count(total: i64, limit: i64) -> i64 {
    (total as f64 / limit as f64).ceil() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::cache::OFFERS_CACHE_TTL;
    use rust_decimal::Decimal;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@127.0.0.1:1/unused")
            .expect("lazy pool")
    }

    fn sample_offer() -> Offer {
        Offer {
            id: Uuid::new_v4(),
            title: "Senior Rust Developer".to_string(),
            content: "Build backend services.".to_string(),
            company_name: "Acme".to_string(),
            logo_key: None,
            logo_url: None,
            logo_name: None,
            redirect_link: None,
            experience: "Senior".to_string(),
            localization: "Remote".to_string(),
            employment_type: "Full-time".to_string(),
            contract_type: "B2B".to_string(),
            technologies: vec!["Rust".to_string()],
            min_salary: Decimal::new(18_000, 0),
            max_salary: Decimal::new(24_000, 0),
            currency: "EUR".to_string(),
            min_salary_year: None,
            max_salary_year: None,
            pricing: "standard".to_string(),
            is_paid: true,
            active_until: None,
            is_deleted: false,
            deleted_at: None,
            expire_at: None,
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(95, 20), 5);
    }

    #[tokio::test]
    async fn cached_pages_round_trip_with_from_cache_flag() {
        let service = OfferService::new(lazy_pool(), ListingCache::new(OFFERS_CACHE_TTL));
        let offers = vec![sample_offer()];

        assert!(service.cached_page(1, 10).is_none());

        service.store_page(1, 10, &offers, 1);
        let hit = service.cached_page(1, 10).expect("cache hit");

        assert_eq!(hit.from_cache, Some(true));
        assert_eq!(hit.total, 1);
        assert_eq!(hit.pages, 1);
        assert_eq!(hit.offers.len(), 1);
        assert_eq!(hit.offers[0].title, "Senior Rust Developer");
    }

    #[tokio::test]
    async fn cache_miss_when_only_total_is_present() {
        let service = OfferService::new(lazy_pool(), ListingCache::new(OFFERS_CACHE_TTL));
        let offers = vec![sample_offer()];

        // Pages are keyed by page and limit; a different limit must miss.
        service.store_page(1, 10, &offers, 1);

        assert!(service.cached_page(1, 25).is_none());
        assert!(service.cached_page(2, 10).is_none());
    }
}
