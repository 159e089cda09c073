//! Static vocabularies the frontend renders as filter and form
//! dropdowns.

use axum::Json;
use serde_json::{json, Value};

use crate::models::reference;

#[axum::debug_handler]
pub async fn technologies() -> Json<Value> {
    Json(json!({ "items": reference::TECHNOLOGIES }))
}

#[axum::debug_handler]
pub async fn localizations() -> Json<Value> {
    Json(json!({ "items": reference::LOCALIZATIONS }))
}

#[axum::debug_handler]
pub async fn experiences() -> Json<Value> {
    Json(json!({ "items": reference::EXPERIENCES }))
}

#[axum::debug_handler]
pub async fn employment_types() -> Json<Value> {
    Json(json!({ "items": reference::EMPLOYMENT_TYPES }))
}

#[axum::debug_handler]
pub async fn contract_types() -> Json<Value> {
    Json(json!({ "items": reference::CONTRACT_TYPES }))
}

#[axum::debug_handler]
pub async fn currencies() -> Json<Value> {
    Json(json!({ "items": reference::CURRENCIES }))
}
