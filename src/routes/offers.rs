use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

use crate::dto::offer_dto::{
    CreateOfferData, MyOfferResponse, OfferListQuery, OfferListResponse, OfferResponse,
    OfferSummary, UpdateOfferPayload,
};
use crate::error::{Error, Result};
use crate::middleware::auth::{AuthUser, OptionalAuthUser};
use crate::models::reference;
use crate::services::application_service::ApplicationInput;
use crate::services::payment_service::PaymentOperation;
use crate::utils::upload;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/offers",
    params(
        ("page" = Option<i64>, Query, description = "Page number, 1-based"),
        ("limit" = Option<i64>, Query, description = "Page size, capped at 100"),
        ("employmentType" = Option<String>, Query, description = "Comma-separated employment types"),
        ("localization" = Option<String>, Query, description = "Comma-separated locations"),
        ("experience" = Option<String>, Query, description = "Comma-separated experience levels"),
        ("technologies" = Option<String>, Query, description = "Comma-separated technologies"),
        ("contractType" = Option<String>, Query, description = "Comma-separated contract types"),
        ("keyword" = Option<String>, Query, description = "Substring match on title and content"),
        ("minSalary" = Option<String>, Query, description = "Lower bound on the salary range"),
        ("sort" = Option<String>, Query, description = "latest, salary_asc or salary_desc")
    ),
    responses(
        (status = 200, description = "Paginated offer listing", body = Json<OfferListResponse>),
        (status = 400, description = "Unparseable filter or sort key")
    )
)]
#[axum::debug_handler]
pub async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<OfferListQuery>,
) -> Result<Json<OfferListResponse>> {
    let filters = query.filters()?;
    let sort = query.sort()?;
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(10);

    let result = state.offer_service.list(page, limit, &filters, sort).await?;
    Ok(Json(OfferListResponse::from(result)))
}

#[utoipa::path(
    get,
    path = "/offer/{id}",
    params(("id" = Uuid, Path, description = "Offer ID")),
    responses(
        (status = 200, description = "Offer detail", body = Json<OfferResponse>),
        (status = 404, description = "Offer not found")
    )
)]
#[axum::debug_handler]
pub async fn get_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let offer = state.offer_service.get_by_id(id).await?;
    Ok(Json(json!({
        "offer": OfferResponse::from(&offer),
        "msg": "Offer retrieved successfully",
    })))
}

/// Multipart create: text fields plus an optional `logo` file. The
/// offer is stored unpaid and a checkout session id is returned for
/// the frontend redirect.
#[axum::debug_handler]
pub async fn create_offer(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let mut title = None;
    let mut content = None;
    let mut company_name = None;
    let mut redirect_link = None;
    let mut experience = None;
    let mut localization = None;
    let mut employment_type = None;
    let mut contract_type = None;
    let mut technologies_raw = None;
    let mut min_salary_raw = None;
    let mut max_salary_raw = None;
    let mut currency = None;
    let mut min_salary_year_raw = None;
    let mut max_salary_year_raw = None;
    let mut pricing = None;
    let mut logo: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "logo" => {
                let filename = field.file_name().unwrap_or("logo").to_string();
                let data = field.bytes().await?;
                logo = Some((filename, data));
            }
            "title" => title = Some(field.text().await?),
            "content" => content = Some(field.text().await?),
            "companyName" => company_name = Some(field.text().await?),
            "redirectLink" => redirect_link = Some(field.text().await?),
            "experience" => experience = Some(field.text().await?),
            "localization" => localization = Some(field.text().await?),
            "employmentType" => employment_type = Some(field.text().await?),
            "contractType" => contract_type = Some(field.text().await?),
            "technologies" => technologies_raw = Some(field.text().await?),
            "minSalary" => min_salary_raw = Some(field.text().await?),
            "maxSalary" => max_salary_raw = Some(field.text().await?),
            "currency" => currency = Some(field.text().await?),
            "minSalaryYear" => min_salary_year_raw = Some(field.text().await?),
            "maxSalaryYear" => max_salary_year_raw = Some(field.text().await?),
            "pricing" => pricing = Some(field.text().await?),
            _ => {}
        }
    }

    let title = require_field(title, "Title is required")?;
    let content = require_field(content, "Content is required")?;
    let company_name = require_field(company_name, "companyName is required")?;
    let experience = require_field(experience, "experience is required")?;
    let localization = require_field(localization, "localization is required")?;
    let employment_type = require_field(employment_type, "employmentType is required")?;
    let contract_type = require_field(contract_type, "contractType is required")?;
    let technologies_raw = require_field(technologies_raw, "technologies is required")?;
    let min_salary_raw = require_field(min_salary_raw, "minSalary is required")?;
    let max_salary_raw = require_field(max_salary_raw, "maxSalary is required")?;
    let currency = require_field(currency, "currency is required")?;
    let pricing = require_field(pricing, "pricing is required")?;

    let min_salary = min_salary_raw
        .parse::<Decimal>()
        .map_err(|_| Error::BadRequest("minSalary must be a number".to_string()))?;
    let max_salary = max_salary_raw
        .parse::<Decimal>()
        .map_err(|_| Error::BadRequest("maxSalary must be a number".to_string()))?;
    if min_salary.is_sign_negative() {
        return Err(Error::BadRequest("minSalary cannot be negative".to_string()));
    }
    if min_salary >= max_salary {
        return Err(Error::BadRequest(
            "minSalary must be lower than maxSalary".to_string(),
        ));
    }
    let min_salary_year = parse_optional_decimal(min_salary_year_raw, "minSalaryYear")?;
    let max_salary_year = parse_optional_decimal(max_salary_year_raw, "maxSalaryYear")?;

    ensure_allowed(reference::EXPERIENCES, &experience, "experience level")?;
    ensure_allowed(reference::LOCALIZATIONS, &localization, "localization")?;
    ensure_allowed(reference::EMPLOYMENT_TYPES, &employment_type, "employment type")?;
    ensure_allowed(reference::CONTRACT_TYPES, &contract_type, "contract type")?;
    ensure_allowed(reference::CURRENCIES, &currency, "currency")?;

    let technologies = crate::filters::parse_multi(&technologies_raw);
    if technologies.is_empty() {
        return Err(Error::BadRequest(
            "At least one technology is required".to_string(),
        ));
    }
    for technology in &technologies {
        ensure_allowed(reference::TECHNOLOGIES, technology, "technology")?;
    }

    let redirect_link = match redirect_link.map(|link| link.trim().to_string()) {
        Some(link) if !link.is_empty() => {
            validate_redirect_link(&link)?;
            Some(link)
        }
        _ => None,
    };

    // Tier lookup precedes the logo write and the insert so an
    // unknown pricing code leaves nothing behind.
    let tier = state.payment_service.get_payment_type(&pricing).await?;

    let logo = match logo {
        Some((filename, data)) => Some(upload::save_logo_file(&filename, &data).await?),
        None => None,
    };

    let data = CreateOfferData {
        title,
        content,
        company_name,
        logo,
        redirect_link,
        experience,
        localization,
        employment_type,
        contract_type,
        technologies,
        min_salary,
        max_salary,
        currency: currency.to_uppercase(),
        min_salary_year,
        max_salary_year,
        pricing,
    };
    let offer = state.offer_service.create(auth.user_id, data).await?;
    let session_id = state
        .payment_service
        .start_checkout(&offer, &tier, PaymentOperation::Activation)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "msg": "Your offer has been posted. Complete the payment to activate it.",
            "sessionId": session_id,
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_offer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOfferPayload>,
) -> Result<Json<Value>> {
    payload.validate()?;
    validate_update_payload(&payload)?;

    let offer = state.offer_service.update(id, auth.user_id, &payload).await?;
    Ok(Json(json!({
        "offer": OfferResponse::from(&offer),
        "msg": "Offer updated successfully",
    })))
}

#[axum::debug_handler]
pub async fn delete_offer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.offer_service.soft_delete(id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-opens checkout for an offer that was posted but never paid.
#[axum::debug_handler]
pub async fn pay_for_offer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let offer = state.offer_service.get_owned(id, auth.user_id).await?;
    if offer.is_paid {
        return Err(Error::BadRequest("Offer is already active".to_string()));
    }

    let tier = state.payment_service.get_payment_type(&offer.pricing).await?;
    let session_id = state
        .payment_service
        .start_checkout(&offer, &tier, PaymentOperation::Activation)
        .await?;

    Ok(Json(json!({
        "msg": "Checkout session created",
        "sessionId": session_id,
    })))
}

/// Extends the visibility window of an active offer; the new window
/// chains onto the stored expiry.
#[axum::debug_handler]
pub async fn extend_offer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let offer = state.offer_service.get_owned(id, auth.user_id).await?;
    if !offer.is_paid {
        return Err(Error::BadRequest(
            "Only active offers can be extended".to_string(),
        ));
    }

    let tier = state.payment_service.get_payment_type(&offer.pricing).await?;
    let session_id = state
        .payment_service
        .start_checkout(&offer, &tier, PaymentOperation::Extend)
        .await?;

    Ok(Json(json!({
        "msg": "Checkout session created",
        "sessionId": session_id,
    })))
}

/// Anonymous applications are allowed; a valid bearer token links the
/// application to the account's history.
#[axum::debug_handler]
pub async fn apply_to_offer(
    State(state): State<AppState>,
    user: OptionalAuthUser,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let mut name = None;
    let mut email = None;
    let mut introduction = None;
    let mut offer_id_raw = None;
    let mut cv: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        match field_name.as_str() {
            "cv" => {
                let filename = field.file_name().unwrap_or("cv").to_string();
                let data = field.bytes().await?;
                cv = Some((filename, data));
            }
            "name" => name = Some(field.text().await?),
            "email" => email = Some(field.text().await?),
            "introduction" => introduction = Some(field.text().await?),
            "offerId" => offer_id_raw = Some(field.text().await?),
            _ => {}
        }
    }

    let name = require_field(name, "Name is required")?;
    let email = require_field(email, "Email is required")?;
    if !email.validate_email() {
        return Err(Error::BadRequest("Invalid email address".to_string()));
    }
    let offer_id_raw = require_field(offer_id_raw, "offerId is required")?;
    let offer_id = Uuid::parse_str(&offer_id_raw)
        .map_err(|_| Error::BadRequest("offerId must be a valid UUID".to_string()))?;

    let (cv_filename, cv_data) = cv.ok_or_else(|| Error::NotFound("CV file is required".to_string()))?;
    upload::validate_upload(&cv_filename, &cv_data, upload::CV_EXTENSIONS)?;

    state
        .application_service
        .submit(ApplicationInput {
            offer_id,
            name,
            email,
            introduction: introduction.filter(|text| !text.trim().is_empty()),
            cv_filename,
            cv_data,
            user_id: user.0,
        })
        .await?;

    Ok(Json(json!({ "msg": "Application submitted successfully" })))
}

#[axum::debug_handler]
pub async fn my_offers(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>> {
    let offers = state.offer_service.list_by_owner(auth.user_id).await?;
    let offers: Vec<MyOfferResponse> = offers.iter().map(MyOfferResponse::from).collect();
    Ok(Json(json!({
        "offers": offers,
        "msg": "Offers retrieved successfully",
    })))
}

#[axum::debug_handler]
pub async fn my_applications(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>> {
    let offers = state.offer_service.list_applied(auth.user_id).await?;
    let offers: Vec<OfferSummary> = offers.iter().map(OfferSummary::from).collect();
    Ok(Json(json!({
        "offers": offers,
        "msg": "Applications retrieved successfully",
    })))
}

fn require_field(value: Option<String>, message: &str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(Error::BadRequest(message.to_string())),
    }
}

fn parse_optional_decimal(raw: Option<String>, field: &str) -> Result<Option<Decimal>> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => {
            let value = raw
                .trim()
                .parse::<Decimal>()
                .map_err(|_| Error::BadRequest(format!("{} must be a number", field)))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}

fn ensure_allowed(list: &[&str], value: &str, label: &str) -> Result<()> {
    if reference::is_allowed(list, value) {
        Ok(())
    } else {
        Err(Error::BadRequest(format!("Unknown {}: {}", label, value)))
    }
}

fn validate_redirect_link(link: &str) -> Result<()> {
    let url = Url::parse(link)
        .map_err(|_| Error::BadRequest("redirectLink must be a valid URL".to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::BadRequest(
            "Only HTTP and HTTPS redirect links are allowed".to_string(),
        ));
    }
    Ok(())
}

fn validate_update_payload(payload: &UpdateOfferPayload) -> Result<()> {
    if let Some(experience) = &payload.experience {
        ensure_allowed(reference::EXPERIENCES, experience, "experience level")?;
    }
    if let Some(localization) = &payload.localization {
        ensure_allowed(reference::LOCALIZATIONS, localization, "localization")?;
    }
    if let Some(employment_type) = &payload.employment_type {
        ensure_allowed(reference::EMPLOYMENT_TYPES, employment_type, "employment type")?;
    }
    if let Some(contract_type) = &payload.contract_type {
        ensure_allowed(reference::CONTRACT_TYPES, contract_type, "contract type")?;
    }
    if let Some(currency) = &payload.currency {
        ensure_allowed(reference::CURRENCIES, currency, "currency")?;
    }
    if let Some(technologies) = &payload.technologies {
        if technologies.is_empty() {
            return Err(Error::BadRequest(
                "At least one technology is required".to_string(),
            ));
        }
        for technology in technologies {
            ensure_allowed(reference::TECHNOLOGIES, technology, "technology")?;
        }
    }
    if let Some(link) = &payload.redirect_link {
        validate_redirect_link(link)?;
    }
    Ok(())
}
