use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use validator::Validate;

use crate::dto::user_dto::{
    ChangePasswordPayload, LoginPayload, RegisterPayload, ResetConfirmPayload,
    ResetRequestPayload, UpdateProfilePayload, UserResponse,
};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::AppState;

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let user = state.user_service.register(&payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": UserResponse::from(&user),
            "msg": "Account created successfully",
        })),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<Value>> {
    let token = state
        .user_service
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(json!({
        "token": token,
        "msg": "Logged in successfully",
    })))
}

#[axum::debug_handler]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>> {
    let user = state.user_service.get_profile(auth.user_id).await?;
    Ok(Json(json!({
        "user": UserResponse::from(&user),
        "msg": "Profile retrieved successfully",
    })))
}

#[axum::debug_handler]
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<Value>> {
    payload.validate()?;

    let user = state
        .user_service
        .update_profile(auth.user_id, &payload)
        .await?;
    Ok(Json(json!({
        "user": UserResponse::from(&user),
        "msg": "Profile updated successfully",
    })))
}

#[axum::debug_handler]
pub async fn delete_me(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode> {
    state.user_service.soft_delete(auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<Json<Value>> {
    payload.validate()?;

    state
        .user_service
        .change_password(auth.user_id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(Json(json!({ "msg": "Password changed successfully" })))
}

/// Answers 200 whether or not the email maps to an account.
#[axum::debug_handler]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequestPayload>,
) -> Result<Json<Value>> {
    payload.validate()?;

    state
        .user_service
        .request_password_reset(&payload.email)
        .await?;
    Ok(Json(json!({
        "msg": "If the email belongs to an account, a reset link has been sent",
    })))
}

#[axum::debug_handler]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetConfirmPayload>,
) -> Result<Json<Value>> {
    payload.validate()?;

    state
        .user_service
        .confirm_password_reset(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(json!({ "msg": "Password reset successfully" })))
}
