use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use validator::Validate;

use crate::dto::auth_dto::{EmailLoginPayload, RegisterAdminPayload, StudentLoginPayload};
use crate::error::Result;
use crate::extract::ApiJson;
use crate::AppState;

pub async fn register_admin(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterAdminPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let admin = state.auth_service.register_admin(payload).await?;
    Ok((StatusCode::CREATED, Json(admin)))
}

pub async fn login_admin(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EmailLoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state
        .auth_service
        .login_admin(&payload.email, &payload.password)
        .await?;
    Ok(Json(response))
}

pub async fn login_staff(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<EmailLoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state
        .auth_service
        .login_staff(&payload.email, &payload.password)
        .await?;
    Ok(Json(response))
}

pub async fn login_student(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<StudentLoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state
        .auth_service
        .login_student(&payload.reg_no, &payload.password)
        .await?;
    Ok(Json(response))
}
