pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::database::cache::{ListingCache, OFFERS_CACHE_TTL};
use crate::services::application_service::ApplicationService;
use crate::services::mailer_service::MailerService;
use crate::services::offer_service::OfferService;
use crate::services::payment_service::PaymentService;
use crate::services::stripe_service::{StripeClient, StripeGateway};
use crate::services::user_service::UserService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub offer_service: OfferService,
    pub user_service: UserService,
    pub payment_service: PaymentService,
    pub application_service: ApplicationService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = config::get_config();
        let stripe: Arc<dyn StripeGateway> = Arc::new(StripeClient::new(
            config.stripe_secret_key.clone(),
            config.stripe_webhook_secret.clone(),
            format!(
                "{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}",
                config.cors_uri
            ),
            format!("{}/payment-cancel", config.cors_uri),
        ));
        Self::with_gateway(pool, stripe)
    }

    /// Wiring seam used by tests to swap the Stripe client for a
    /// mock.
    pub fn with_gateway(pool: PgPool, stripe: Arc<dyn StripeGateway>) -> Self {
        let config = config::get_config();
        let cache = ListingCache::new(OFFERS_CACHE_TTL);
        let mailer = MailerService::new(
            config.email_relay_url.clone(),
            config.email_user.clone(),
            config.email_pass.clone(),
        );

        Self {
            offer_service: OfferService::new(pool.clone(), cache),
            user_service: UserService::new(pool.clone(), mailer.clone()),
            payment_service: PaymentService::new(pool.clone(), stripe),
            application_service: ApplicationService::new(pool.clone(), mailer),
            pool,
        }
    }
}
