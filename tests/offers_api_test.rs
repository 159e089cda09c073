use std::env;
use std::sync::Once;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use jobremote_backend::utils::token::issue_session_token;
use jobremote_backend::{config, routes, AppState};

const BOUNDARY: &str = "test-boundary-1d8f0a62c9";

static INIT: Once = Once::new();

fn setup_env() {
    INIT.call_once(|| {
        env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
        env::set_var("DATABASE_URL", "postgres://postgres@127.0.0.1:1/jobremote_test");
        env::set_var("JWT_SECRET", "integration-test-secret");
        env::set_var("STRIPE_SECRET_KEY", "sk_test_123");
        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test_secret");
        env::set_var("CORS_URI", "http://localhost:3000");
        env::set_var("EMAIL_RELAY_URL", "http://127.0.0.1:9/send");
        env::set_var("EMAIL_USER", "mailer@example.test");
        env::set_var("EMAIL_PASS", "secret");
        let _ = config::init_config();
    });
}

// Nothing listens on the configured database address, so requests are
// exercised up to their first query and validation failures short
// before it.
fn test_app() -> Router {
    setup_env();
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy("postgres://postgres@127.0.0.1:1/jobremote_test")
        .expect("lazy pool");
    let state = AppState::new(pool);
    Router::new()
        .route("/offers", get(routes::offers::list_offers))
        .route("/offer", post(routes::offers::create_offer))
        .route("/offers/apply", post(routes::offers::apply_to_offer))
        .with_state(state)
}

fn bearer() -> String {
    setup_env();
    let token = issue_session_token(Uuid::new_v4()).unwrap();
    format!("Bearer {}", token)
}

fn text_part(body: &mut String, name: &str, value: &str) {
    body.push_str(&format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
        BOUNDARY, name, value
    ));
}

fn file_part(body: &mut String, name: &str, filename: &str, content: &str) {
    body.push_str(&format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n{}\r\n",
        BOUNDARY, name, filename, content
    ));
}

fn finish(body: &mut String) {
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
}

fn offer_form(min_salary: &str, max_salary: &str, experience: &str) -> String {
    let mut body = String::new();
    text_part(&mut body, "title", "Senior Rust Engineer");
    text_part(&mut body, "content", "Build and operate our payments platform.");
    text_part(&mut body, "companyName", "Acme Sp. z o.o.");
    text_part(&mut body, "experience", experience);
    text_part(&mut body, "localization", "Remote");
    text_part(&mut body, "employmentType", "Full-time");
    text_part(&mut body, "contractType", "B2B");
    text_part(&mut body, "technologies", "Rust");
    text_part(&mut body, "minSalary", min_salary);
    text_part(&mut body, "maxSalary", max_salary);
    text_part(&mut body, "currency", "USD");
    text_part(&mut body, "pricing", "standard");
    finish(&mut body);
    body
}

fn multipart_request(uri: &str, token: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        "content-type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header("authorization", token);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn listing_failure_is_reported_without_internals() {
    let response = test_app()
        .oneshot(Request::builder().uri("/offers").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "Failed to retrieve offers");
}

#[tokio::test]
async fn unknown_sort_key_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/offers?sort=oldest")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "Unknown sort key: oldest");
}

#[tokio::test]
async fn non_numeric_salary_filter_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/offers?minSalary=lots")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "minSalary must be a number");
}

#[tokio::test]
async fn posting_an_offer_requires_a_session() {
    let body = offer_form("3000", "5000", "Senior");
    let response = test_app()
        .oneshot(multipart_request("/offer", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "Missing or malformed Authorization header");
}

#[tokio::test]
async fn inverted_salary_range_is_rejected() {
    let token = bearer();
    let body = offer_form("5000", "3000", "Senior");
    let response = test_app()
        .oneshot(multipart_request("/offer", Some(&token), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "minSalary must be lower than maxSalary");
}

#[tokio::test]
async fn non_numeric_offer_salary_is_rejected() {
    let token = bearer();
    let body = offer_form("plenty", "5000", "Senior");
    let response = test_app()
        .oneshot(multipart_request("/offer", Some(&token), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "minSalary must be a number");
}

#[tokio::test]
async fn unknown_experience_level_is_rejected() {
    let token = bearer();
    let body = offer_form("3000", "5000", "Wizard");
    let response = test_app()
        .oneshot(multipart_request("/offer", Some(&token), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "Unknown experience level: Wizard");
}

#[tokio::test]
async fn missing_required_field_is_rejected() {
    let token = bearer();
    let mut body = String::new();
    text_part(&mut body, "title", "Senior Rust Engineer");
    finish(&mut body);

    let response = test_app()
        .oneshot(multipart_request("/offer", Some(&token), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "Content is required");
}

#[tokio::test]
async fn valid_offer_stops_at_the_database() {
    // Every validation passes; the pricing tier lookup is the first
    // query and fails because the database is unreachable.
    let token = bearer();
    let body = offer_form("3000", "5000", "Senior");
    let response = test_app()
        .oneshot(multipart_request("/offer", Some(&token), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["msg"], "An unexpected error occurred");
}

#[tokio::test]
async fn application_without_cv_is_rejected() {
    let mut body = String::new();
    text_part(&mut body, "name", "Jan Kowalski");
    text_part(&mut body, "email", "jan@example.com");
    text_part(&mut body, "offerId", &Uuid::new_v4().to_string());
    finish(&mut body);

    let response = test_app()
        .oneshot(multipart_request("/offers/apply", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["msg"], "CV file is required");
}

#[tokio::test]
async fn application_with_disallowed_cv_type_is_rejected() {
    let mut body = String::new();
    text_part(&mut body, "name", "Jan Kowalski");
    text_part(&mut body, "email", "jan@example.com");
    text_part(&mut body, "offerId", &Uuid::new_v4().to_string());
    file_part(&mut body, "cv", "resume.exe", "MZ binary");
    finish(&mut body);

    let response = test_app()
        .oneshot(multipart_request("/offers/apply", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["msg"].as_str().unwrap().contains(".exe"));
}

#[tokio::test]
async fn application_with_invalid_email_is_rejected() {
    let mut body = String::new();
    text_part(&mut body, "name", "Jan Kowalski");
    text_part(&mut body, "email", "not-an-email");
    text_part(&mut body, "offerId", &Uuid::new_v4().to_string());
    file_part(&mut body, "cv", "resume.pdf", "%PDF-1.4 content");
    finish(&mut body);

    let response = test_app()
        .oneshot(multipart_request("/offers/apply", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["msg"], "Invalid email address");
}

#[tokio::test]
async fn application_with_malformed_offer_id_is_rejected() {
    let mut body = String::new();
    text_part(&mut body, "name", "Jan Kowalski");
    text_part(&mut body, "email", "jan@example.com");
    text_part(&mut body, "offerId", "first-one");
    file_part(&mut body, "cv", "resume.pdf", "%PDF-1.4 content");
    finish(&mut body);

    let response = test_app()
        .oneshot(multipart_request("/offers/apply", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["msg"], "offerId must be a valid UUID");
}
