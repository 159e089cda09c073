use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use jobremote_backend::config::{get_config, init_config};
use jobremote_backend::database::pool::create_pool;
use jobremote_backend::middleware::cors::restricted_cors;
use jobremote_backend::middleware::rate_limit::{auth_limit_middleware, new_auth_limiter};
use jobremote_backend::routes;
use jobremote_backend::services::sweeper_service::{OfferSweeper, SWEEP_SCHEDULE};
use jobremote_backend::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let scheduler = JobScheduler::new().await?;
    let sweeper = OfferSweeper::new(app_state.pool.clone());
    let sweep_job = Job::new_async(SWEEP_SCHEDULE, move |_id, _scheduler| {
        let sweeper = sweeper.clone();
        Box::pin(async move {
            match sweeper.run_once().await {
                Ok(outcome) => {
                    info!(
                        revoked = outcome.revoked,
                        purged = outcome.purged,
                        "Nightly offer sweep finished"
                    );
                }
                Err(e) => error!(error = %e, "Nightly offer sweep failed"),
            }
        })
    })?;
    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    let auth_limiter = new_auth_limiter();

    let api = Router::new()
        .route("/offers", get(routes::offers::list_offers))
        .route("/offer", post(routes::offers::create_offer))
        .route(
            "/offer/:id",
            get(routes::offers::get_offer)
                .patch(routes::offers::update_offer)
                .delete(routes::offers::delete_offer),
        )
        .route("/offers/apply", post(routes::offers::apply_to_offer))
        .route("/offers/:id/payment", post(routes::offers::pay_for_offer))
        .route("/offers/:id/extend", post(routes::offers::extend_offer))
        .route("/webhook", post(routes::webhook::handle_stripe_webhook))
        .route(
            "/users/me",
            get(routes::users::get_me)
                .patch(routes::users::update_me)
                .delete(routes::users::delete_me),
        )
        .route("/users/me/offers", get(routes::offers::my_offers))
        .route("/users/me/applications", get(routes::offers::my_applications))
        .route("/dictionaries/technologies", get(routes::dictionaries::technologies))
        .route("/dictionaries/localizations", get(routes::dictionaries::localizations))
        .route("/dictionaries/experiences", get(routes::dictionaries::experiences))
        .route(
            "/dictionaries/employment-types",
            get(routes::dictionaries::employment_types),
        )
        .route(
            "/dictionaries/contract-types",
            get(routes::dictionaries::contract_types),
        )
        .route("/dictionaries/currencies", get(routes::dictionaries::currencies));

    // Account routes share a per-client fixed window to slow down
    // credential stuffing.
    let account_api = Router::new()
        .route("/users/register", post(routes::users::register))
        .route("/users/login", post(routes::users::login))
        .route("/users/me/password", post(routes::users::change_password))
        .route(
            "/users/password-reset",
            post(routes::users::request_password_reset),
        )
        .route(
            "/users/password-reset/confirm",
            post(routes::users::confirm_password_reset),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth_limiter,
            auth_limit_middleware,
        ));

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .merge(api)
        .merge(account_api)
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .with_state(app_state)
        .layer(restricted_cors(&config.cors_uri)?)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
