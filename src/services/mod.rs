pub mod application_service;
pub mod mailer_service;
pub mod offer_service;
pub mod payment_service;
pub mod stripe_service;
pub mod sweeper_service;
pub mod user_service;
