use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::filters::{parse_multi, OfferFilter, OfferSort};
use crate::models::offer::Offer;
use crate::services::offer_service::OfferPageResult;
use crate::utils::upload::StoredLogo;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferLogo {
    pub key: String,
    pub url: String,
    pub name: String,
}

fn logo_of(offer: &Offer) -> Option<OfferLogo> {
    match (&offer.logo_key, &offer.logo_url, &offer.logo_name) {
        (Some(key), Some(url), Some(name)) => Some(OfferLogo {
            key: key.clone(),
            url: url.clone(),
            name: name.clone(),
        }),
        _ => None,
    }
}

/// Listing card: everything the board needs except the description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSummary {
    pub id: Uuid,
    pub title: String,
    pub company_name: String,
    pub logo: Option<OfferLogo>,
    pub redirect_link: Option<String>,
    pub experience: String,
    pub localization: String,
    pub employment_type: String,
    pub contract_type: String,
    pub technologies: Vec<String>,
    pub min_salary: Decimal,
    pub max_salary: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Offer> for OfferSummary {
    fn from(offer: &Offer) -> Self {
        Self {
            id: offer.id,
            title: offer.title.clone(),
            company_name: offer.company_name.clone(),
            logo: logo_of(offer),
            redirect_link: offer.redirect_link.clone(),
            experience: offer.experience.clone(),
            localization: offer.localization.clone(),
            employment_type: offer.employment_type.clone(),
            contract_type: offer.contract_type.clone(),
            technologies: offer.technologies.clone(),
            min_salary: offer.min_salary,
            max_salary: offer.max_salary,
            currency: offer.currency.clone(),
            created_at: offer.created_at,
        }
    }
}

/// Full public view of a single offer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub company_name: String,
    pub logo: Option<OfferLogo>,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Offer> for OfferResponse {
    fn from(offer: &Offer) -> Self {
        Self {
            id: offer.id,
            title: offer.title.clone(),
            content: offer.content.clone(),
            company_name: offer.company_name.clone(),
            logo: logo_of(offer),
            redirect_link: offer.redirect_link.clone(),
            experience: offer.experience.clone(),
            localization: offer.localization.clone(),
            employment_type: offer.employment_type.clone(),
            contract_type: offer.contract_type.clone(),
            technologies: offer.technologies.clone(),
            min_salary: offer.min_salary,
            max_salary: offer.max_salary,
            currency: offer.currency.clone(),
            min_salary_year: offer.min_salary_year,
            max_salary_year: offer.max_salary_year,
            created_at: offer.created_at,
            updated_at: offer.updated_at,
        }
    }
}

/// Owner view: adds payment lifecycle state to the public fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyOfferResponse {
    #[serde(flatten)]
    pub offer: OfferResponse,
    pub pricing: String,
    pub is_paid: bool,
    pub active_until: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
}

impl From<&Offer> for MyOfferResponse {
    fn from(offer: &Offer) -> Self {
        Self {
            offer: OfferResponse::from(offer),
            pricing: offer.pricing.clone(),
            is_paid: offer.is_paid,
            active_until: offer.active_until,
            expire_at: offer.expire_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferListResponse {
    pub offers: Vec<OfferSummary>,
    pub msg: String,
    pub pagination: PaginationInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
}

impl From<OfferPageResult> for OfferListResponse {
    fn from(result: OfferPageResult) -> Self {
        let msg = if result.offers.is_empty() {
            "No offers found".to_string()
        } else {
            "Offers retrieved successfully".to_string()
        };
        Self {
            offers: result.offers.iter().map(OfferSummary::from).collect(),
            msg,
            pagination: PaginationInfo {
                total: result.total,
                page: result.page,
                pages: result.pages,
            },
            from_cache: result.from_cache,
        }
    }
}

/// Raw listing query. Multi-value filters arrive comma-separated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfferListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub employment_type: Option<String>,
    pub localization: Option<String>,
    pub experience: Option<String>,
    pub technologies: Option<String>,
    pub contract_type: Option<String>,
    pub keyword: Option<String>,
    pub min_salary: Option<String>,
    pub sort: Option<String>,
}

impl OfferListQuery {
    pub fn filters(&self) -> Result<Vec<OfferFilter>> {
        let mut filters = Vec::new();
        if let Some(raw) = &self.employment_type {
            push_multi(&mut filters, raw, OfferFilter::EmploymentTypes);
        }
        if let Some(raw) = &self.localization {
            push_multi(&mut filters, raw, OfferFilter::Localizations);
        }
        if let Some(raw) = &self.experience {
            push_multi(&mut filters, raw, OfferFilter::Experiences);
        }
        if let Some(raw) = &self.technologies {
            push_multi(&mut filters, raw, OfferFilter::Technologies);
        }
        if let Some(raw) = &self.contract_type {
            push_multi(&mut filters, raw, OfferFilter::ContractTypes);
        }
        if let Some(keyword) = &self.keyword {
            if !keyword.trim().is_empty() {
                filters.push(OfferFilter::Keyword(keyword.trim().to_string()));
            }
        }
        if let Some(raw) = &self.min_salary {
            let raw = raw.trim();
            if !raw.is_empty() {
                let amount: Decimal = raw
                    .parse()
                    .map_err(|_| Error::BadRequest("minSalary must be a number".to_string()))?;
                filters.push(OfferFilter::MinSalary(amount));
            }
        }
        Ok(filters)
    }

    pub fn sort(&self) -> Result<OfferSort> {
        match &self.sort {
            None => Ok(OfferSort::default()),
            Some(raw) if raw.trim().is_empty() => Ok(OfferSort::default()),
            Some(raw) => OfferSort::parse(raw.trim())
                .ok_or_else(|| Error::BadRequest(format!("Unknown sort key: {}", raw))),
        }
    }
}

fn push_multi<F>(filters: &mut Vec<OfferFilter>, raw: &str, wrap: F)
where
    F: FnOnce(Vec<String>) -> OfferFilter,
{
    let values = parse_multi(raw);
    if !values.is_empty() {
        filters.push(wrap(values));
    }
}

/// Validated offer fields collected from the multipart create form.
#[derive(Debug, Clone)]
pub struct CreateOfferData {
    pub title: String,
    pub content: String,
    pub company_name: String,
    pub logo: Option<StoredLogo>,
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
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOfferPayload {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Content cannot be empty"))]
    pub content: Option<String>,
    #[validate(length(min = 1, message = "Company name cannot be empty"))]
    pub company_name: Option<String>,
    pub redirect_link: Option<String>,
    pub experience: Option<String>,
    pub localization: Option<String>,
    pub employment_type: Option<String>,
    pub contract_type: Option<String>,
    pub technologies: Option<Vec<String>>,
    pub min_salary: Option<Decimal>,
    pub max_salary: Option<Decimal>,
    pub currency: Option<String>,
    pub min_salary_year: Option<Decimal>,
    pub max_salary_year: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_separated_filters_are_split() {
        let query = OfferListQuery {
            localization: Some("Remote,Warsaw".to_string()),
            technologies: Some("Rust, TypeScript".to_string()),
            ..Default::default()
        };

        let filters = query.filters().unwrap();

        assert_eq!(
            filters,
            vec![
                OfferFilter::Localizations(vec!["Remote".to_string(), "Warsaw".to_string()]),
                OfferFilter::Technologies(vec!["Rust".to_string(), "TypeScript".to_string()]),
            ]
        );
    }

    #[test]
    fn empty_and_blank_parameters_produce_no_filters() {
        let query = OfferListQuery {
            employment_type: Some("  ,".to_string()),
            keyword: Some("   ".to_string()),
            min_salary: Some("".to_string()),
            ..Default::default()
        };

        assert!(query.filters().unwrap().is_empty());
    }

    #[test]
    fn unparseable_min_salary_is_a_bad_request() {
        let query = OfferListQuery {
            min_salary: Some("lots".to_string()),
            ..Default::default()
        };

        assert!(matches!(query.filters(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn unknown_sort_keys_are_rejected() {
        let query = OfferListQuery {
            sort: Some("oldest".to_string()),
            ..Default::default()
        };

        assert!(matches!(query.sort(), Err(Error::BadRequest(_))));

        let default_query = OfferListQuery::default();
        assert_eq!(default_query.sort().unwrap(), OfferSort::Latest);
    }

    #[test]
    fn empty_pages_report_no_offers_found() {
        let result = OfferPageResult {
            offers: vec![],
            total: 0,
            page: 1,
            limit: 10,
            pages: 0,
            from_cache: Some(false),
        };

        let response = OfferListResponse::from(result);

        assert_eq!(response.msg, "No offers found");
        assert_eq!(response.pagination.total, 0);
        assert_eq!(response.from_cache, Some(false));
    }
}
