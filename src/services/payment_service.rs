use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::offer::Offer;
use crate::models::payment::PaymentType;
use crate::services::stripe_service::{
    CheckoutLineItem, CheckoutSession, StripeCheckoutObject, StripeEvent, StripeGateway,
};
use crate::utils::time;

pub const CHECKOUT_COMPLETED_EVENT: &str = "checkout.session.completed";

const METADATA_OFFER_ID: &str = "offer_id";
const METADATA_OPERATION: &str = "operation";
const METADATA_ACTIVE_MONTHS: &str = "active_months";
const METADATA_CURRENT_ACTIVE_UNTIL: &str = "current_active_until";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOperation {
    Activation,
    Extend,
}

impl PaymentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOperation::Activation => "activation",
            PaymentOperation::Extend => "extend",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "activation" => Some(PaymentOperation::Activation),
            "extend" => Some(PaymentOperation::Extend),
            _ => None,
        }
    }
}

/// Everything the webhook needs to apply a payment, carried on the
/// checkout session itself so the handler has no session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub offer_id: Uuid,
    pub operation: PaymentOperation,
    pub active_months: i32,
    /// For extensions: the expiry stored when the session was
    /// created. The new window chains from here, not from "now".
    pub current_active_until: Option<DateTime<Utc>>,
}

impl CheckoutMetadata {
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(METADATA_OFFER_ID.to_string(), self.offer_id.to_string());
        map.insert(
            METADATA_OPERATION.to_string(),
            self.operation.as_str().to_string(),
        );
        map.insert(
            METADATA_ACTIVE_MONTHS.to_string(),
            self.active_months.to_string(),
        );
        if let Some(current) = self.current_active_until {
            map.insert(
                METADATA_CURRENT_ACTIVE_UNTIL.to_string(),
                time::to_rfc3339(current),
            );
        }
        map
    }

    pub fn from_map(map: &HashMap<String, String>) -> std::result::Result<Self, String> {
        let offer_id = map
            .get(METADATA_OFFER_ID)
            .ok_or_else(|| format!("{} is missing", METADATA_OFFER_ID))?;
        let offer_id = Uuid::parse_str(offer_id)
            .map_err(|_| format!("{} is not a valid UUID", METADATA_OFFER_ID))?;

        let operation = map
            .get(METADATA_OPERATION)
            .ok_or_else(|| format!("{} is missing", METADATA_OPERATION))?;
        let operation = PaymentOperation::parse(operation)
            .ok_or_else(|| format!("{} is not a known operation", METADATA_OPERATION))?;

        let active_months = map
            .get(METADATA_ACTIVE_MONTHS)
            .ok_or_else(|| format!("{} is missing", METADATA_ACTIVE_MONTHS))?;
        let active_months: i32 = active_months
            .parse()
            .map_err(|_| format!("{} is not a number", METADATA_ACTIVE_MONTHS))?;

        let current_active_until = match map.get(METADATA_CURRENT_ACTIVE_UNTIL) {
            Some(raw) => Some(
                time::from_rfc3339(raw)
                    .map_err(|_| format!("{} is not a valid timestamp", METADATA_CURRENT_ACTIVE_UNTIL))?,
            ),
            None => None,
        };

        Ok(CheckoutMetadata {
            offer_id,
            operation,
            active_months,
            current_active_until,
        })
    }
}

/// Calendar-month addition; `None` when months is negative or the
/// result leaves the representable range.
pub fn add_active_months(base: DateTime<Utc>, months: i32) -> Option<DateTime<Utc>> {
    if months < 0 {
        return None;
    }
    base.checked_add_months(Months::new(months as u32))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        offer_id: Uuid,
        active_until: DateTime<Utc>,
    },
    Duplicate {
        offer_id: Uuid,
    },
    Ignored,
}

#[derive(Clone)]
pub struct PaymentService {
    pool: PgPool,
    gateway: Arc<dyn StripeGateway>,
}

impl PaymentService {
    pub fn new(pool: PgPool, gateway: Arc<dyn StripeGateway>) -> Self {
        Self { pool, gateway }
    }

    pub async fn get_payment_type(&self, code: &str) -> Result<PaymentType> {
        sqlx::query_as::<_, PaymentType>(
            "SELECT code, name, price, currency, active_months, benefits, created_at \
             FROM payment_types WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::internal("Failed to look up pricing tier", e))?
        .ok_or_else(|| Error::NotFound(format!("Unknown pricing tier: {}", code)))
    }

    /// Opens a checkout session for activating or extending an offer
    /// and returns the session id for the frontend redirect.
    pub async fn start_checkout(
        &self,
        offer: &Offer,
        tier: &PaymentType,
        operation: PaymentOperation,
    ) -> Result<String> {
        let current_active_until = match operation {
            PaymentOperation::Activation => None,
            PaymentOperation::Extend => Some(offer.active_until.ok_or_else(|| {
                Error::BadRequest("Offer has no active period to extend".to_string())
            })?),
        };
        let metadata = CheckoutMetadata {
            offer_id: offer.id,
            operation,
            active_months: tier.active_months,
            current_active_until,
        };
        let line_item = CheckoutLineItem {
            name: format!("{} listing: {}", tier.name, offer.title),
            amount: tier.price,
            currency: tier.currency.clone(),
        };

        let session: CheckoutSession = self
            .gateway
            .create_checkout_session(line_item, metadata.to_map())
            .await
            .map_err(|e| Error::internal("Failed to create checkout session", e))?;

        info!(
            offer_id = %offer.id,
            session_id = %session.id,
            operation = operation.as_str(),
            "Checkout session created"
        );
        Ok(session.id)
    }

    pub fn verify_event(&self, payload: &[u8], signature_header: &str) -> Result<StripeEvent> {
        self.gateway
            .verify_webhook_signature(payload, signature_header)
            .map_err(|e| {
                warn!(error = %e, "Stripe webhook signature rejected");
                Error::BadRequest("Invalid webhook signature".to_string())
            })
    }

    /// Applies a verified event. Anything other than a completed
    /// checkout is acknowledged and dropped.
    pub async fn apply_event(&self, event: &StripeEvent) -> Result<WebhookOutcome> {
        if event.event_type != CHECKOUT_COMPLETED_EVENT {
            debug!(event_type = %event.event_type, "Ignoring unrelated Stripe event");
            return Ok(WebhookOutcome::Ignored);
        }

        let object: StripeCheckoutObject = serde_json::from_value(event.data.object.clone())
            .map_err(|_| Error::BadRequest("Malformed checkout session payload".to_string()))?;
        let session_id = object
            .id
            .ok_or_else(|| Error::BadRequest("Checkout session id is missing".to_string()))?;
        let metadata_map = object
            .metadata
            .ok_or_else(|| Error::BadRequest("Checkout session metadata is missing".to_string()))?;
        let metadata = CheckoutMetadata::from_map(&metadata_map)
            .map_err(|reason| Error::BadRequest(format!("Invalid checkout metadata: {}", reason)))?;

        self.apply_completed_session(&session_id, &metadata).await
    }

    /// The ledger insert and offer update share one transaction, and
    /// the primary key on `session_id` turns redelivery into a no-op.
    pub async fn apply_completed_session(
        &self,
        session_id: &str,
        metadata: &CheckoutMetadata,
    ) -> Result<WebhookOutcome> {
        let new_active_until = match metadata.operation {
            PaymentOperation::Activation => add_active_months(Utc::now(), metadata.active_months),
            PaymentOperation::Extend => {
                let base = metadata.current_active_until.ok_or_else(|| {
                    Error::BadRequest(
                        "Extension metadata is missing the current expiry".to_string(),
                    )
                })?;
                add_active_months(base, metadata.active_months)
            }
        }
        .ok_or_else(|| {
            Error::BadRequest("Active duration is outside the supported range".to_string())
        })?;

        let mut tx = self.pool.begin().await?;

        let recorded = sqlx::query(
            "INSERT INTO payment_events (session_id, offer_id, operation, active_months) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (session_id) DO NOTHING",
        )
        .bind(session_id)
        .bind(metadata.offer_id)
        .bind(metadata.operation.as_str())
        .bind(metadata.active_months)
        .execute(&mut *tx)
        .await?;
        if recorded.rows_affected() == 0 {
            tx.rollback().await?;
            info!(
                session_id,
                offer_id = %metadata.offer_id,
                "Duplicate webhook delivery ignored"
            );
            return Ok(WebhookOutcome::Duplicate {
                offer_id: metadata.offer_id,
            });
        }

        // Extensions also set is_paid in case the sweep revoked the
        // offer between session creation and webhook delivery.
        let updated = sqlx::query(
            "UPDATE offers SET is_paid = TRUE, active_until = $2, expire_at = NULL, \
             updated_at = NOW() WHERE id = $1 AND is_deleted = FALSE",
        )
        .bind(metadata.offer_id)
        .bind(new_active_until)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::NotFound("Offer not found".to_string()));
        }

        tx.commit().await?;

        info!(
            offer_id = %metadata.offer_id,
            active_until = %new_active_until,
            operation = metadata.operation.as_str(),
            "Offer payment applied"
        );
        Ok(WebhookOutcome::Applied {
            offer_id: metadata.offer_id,
            active_until: new_active_until,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stripe_service::MockStripeGateway;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@127.0.0.1:1/unused")
            .expect("lazy pool")
    }

    fn sample_offer(active_until: Option<DateTime<Utc>>) -> Offer {
        Offer {
            id: Uuid::new_v4(),
            title: "Backend Engineer".to_string(),
            content: "Ship things.".to_string(),
            company_name: "Acme".to_string(),
            logo_key: None,
            logo_url: None,
            logo_name: None,
            redirect_link: None,
            experience: "Mid".to_string(),
            localization: "Remote".to_string(),
            employment_type: "Full-time".to_string(),
            contract_type: "B2B".to_string(),
            technologies: vec!["Rust".to_string()],
            min_salary: Decimal::new(10_000, 0),
            max_salary: Decimal::new(15_000, 0),
            currency: "EUR".to_string(),
            min_salary_year: None,
            max_salary_year: None,
            pricing: "basic".to_string(),
            is_paid: active_until.is_some(),
            active_until,
            is_deleted: false,
            deleted_at: None,
            expire_at: None,
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_tier() -> PaymentType {
        PaymentType {
            code: "basic".to_string(),
            name: "Basic".to_string(),
            price: 4_900,
            currency: "EUR".to_string(),
            active_months: 1,
            benefits: vec!["30 days of visibility".to_string()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn metadata_round_trips_through_the_string_map() {
        let metadata = CheckoutMetadata {
            offer_id: Uuid::new_v4(),
            operation: PaymentOperation::Extend,
            active_months: 3,
            current_active_until: Some(Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()),
        };

        let restored = CheckoutMetadata::from_map(&metadata.to_map()).unwrap();

        assert_eq!(restored, metadata);
    }

    #[test]
    fn activation_metadata_omits_the_current_expiry() {
        let metadata = CheckoutMetadata {
            offer_id: Uuid::new_v4(),
            operation: PaymentOperation::Activation,
            active_months: 1,
            current_active_until: None,
        };

        let map = metadata.to_map();

        assert!(!map.contains_key("current_active_until"));
        assert_eq!(map.get("operation").map(String::as_str), Some("activation"));
    }

    #[test]
    fn malformed_metadata_is_reported_by_field() {
        let metadata = CheckoutMetadata {
            offer_id: Uuid::new_v4(),
            operation: PaymentOperation::Activation,
            active_months: 1,
            current_active_until: None,
        };

        let mut missing_offer = metadata.to_map();
        missing_offer.remove("offer_id");
        assert!(CheckoutMetadata::from_map(&missing_offer)
            .unwrap_err()
            .contains("offer_id"));

        let mut bad_months = metadata.to_map();
        bad_months.insert("active_months".to_string(), "three".to_string());
        assert!(CheckoutMetadata::from_map(&bad_months)
            .unwrap_err()
            .contains("active_months"));

        let mut bad_operation = metadata.to_map();
        bad_operation.insert("operation".to_string(), "refund".to_string());
        assert!(CheckoutMetadata::from_map(&bad_operation)
            .unwrap_err()
            .contains("operation"));
    }

    #[test]
    fn month_addition_follows_the_calendar() {
        let base = Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap();

        // Chrono clamps to the end of shorter months.
        let plus_one = add_active_months(base, 1).unwrap();
        assert_eq!(plus_one, Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap());

        let plus_three = add_active_months(base, 3).unwrap();
        assert_eq!(plus_three, Utc.with_ymd_and_hms(2026, 4, 30, 10, 0, 0).unwrap());

        assert!(add_active_months(base, -1).is_none());
    }

    #[tokio::test]
    async fn activation_checkout_carries_offer_and_tier_metadata() {
        let offer = sample_offer(None);
        let offer_id = offer.id;

        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_create_checkout_session()
            .withf(move |line_item, metadata| {
                line_item.amount == 4_900
                    && metadata.get("offer_id").map(String::as_str)
                        == Some(offer_id.to_string().as_str())
                    && metadata.get("operation").map(String::as_str) == Some("activation")
                    && metadata.get("active_months").map(String::as_str) == Some("1")
            })
            .returning(|_, _| {
                Ok(CheckoutSession {
                    id: "cs_test_123".to_string(),
                    url: Some("https://checkout.stripe.com/c/pay/cs_test_123".to_string()),
                })
            });

        let service = PaymentService::new(lazy_pool(), Arc::new(gateway));
        let session_id = service
            .start_checkout(&offer, &sample_tier(), PaymentOperation::Activation)
            .await
            .unwrap();

        assert_eq!(session_id, "cs_test_123");
    }

    #[tokio::test]
    async fn extension_requires_a_stored_expiry() {
        let offer = sample_offer(None);
        let gateway = MockStripeGateway::new();
        let service = PaymentService::new(lazy_pool(), Arc::new(gateway));

        let result = service
            .start_checkout(&offer, &sample_tier(), PaymentOperation::Extend)
            .await;

        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn extension_metadata_chains_from_the_stored_expiry() {
        let current = Utc.with_ymd_and_hms(2026, 6, 15, 9, 30, 0).unwrap();
        let offer = sample_offer(Some(current));
        let expected = time::to_rfc3339(current);

        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_create_checkout_session()
            .withf(move |_, metadata| {
                metadata.get("operation").map(String::as_str) == Some("extend")
                    && metadata.get("current_active_until").map(String::as_str)
                        == Some(expected.as_str())
            })
            .returning(|_, _| {
                Ok(CheckoutSession {
                    id: "cs_test_456".to_string(),
                    url: None,
                })
            });

        let service = PaymentService::new(lazy_pool(), Arc::new(gateway));
        let session_id = service
            .start_checkout(&offer, &sample_tier(), PaymentOperation::Extend)
            .await
            .unwrap();

        assert_eq!(session_id, "cs_test_456");
    }

    #[tokio::test]
    async fn unrelated_events_are_ignored_without_touching_storage() {
        let gateway = MockStripeGateway::new();
        let service = PaymentService::new(lazy_pool(), Arc::new(gateway));

        let event = StripeEvent {
            id: Some("evt_1".to_string()),
            event_type: "invoice.created".to_string(),
            data: crate::services::stripe_service::StripeEventData {
                object: serde_json::json!({}),
            },
        };

        let outcome = service.apply_event(&event).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn completed_sessions_without_metadata_are_rejected() {
        let gateway = MockStripeGateway::new();
        let service = PaymentService::new(lazy_pool(), Arc::new(gateway));

        let event = StripeEvent {
            id: Some("evt_2".to_string()),
            event_type: CHECKOUT_COMPLETED_EVENT.to_string(),
            data: crate::services::stripe_service::StripeEventData {
                object: serde_json::json!({ "id": "cs_1" }),
            },
        };

        let result = service.apply_event(&event).await;

        assert!(matches!(result, Err(Error::BadRequest(_))));
    }
}
