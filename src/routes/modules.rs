use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::module_dto::{
    AssignModulePayload, CreateModulePayload, UpdateModulePayload, VenueRoster,
};
use crate::error::Result;
use crate::extract::ApiJson;
use crate::AppState;

pub async fn create_module(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateModulePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let module = state.module_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

pub async fn list_modules(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.module_service.list().await?))
}

pub async fn get_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.module_service.get(id).await?))
}

pub async fn update_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateModulePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    Ok(Json(state.module_service.update(id, payload).await?))
}

pub async fn complete_module(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.module_service.complete(id).await?))
}

pub async fn assign_module(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AssignModulePayload>,
) -> Result<impl IntoResponse> {
    let roster = VenueRoster::try_from(payload.venues)?;
    let response = state.module_service.assign(payload.module_id, roster).await?;
    Ok(Json(response))
}
