use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::dto::staff_dto::{
    AssignStaffPayload, CreateStaffPayload, CreateVenuePayload, StatusQuery, UnassignStaffPayload,
};
use crate::error::Result;
use crate::extract::ApiJson;
use crate::AppState;

pub async fn create_staff(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateStaffPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let staff = state.staff_service.create_staff(payload).await?;
    Ok((StatusCode::CREATED, Json(staff)))
}

pub async fn list_staff(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.staff_service.list_staff(query.status).await?))
}

pub async fn create_venue(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateVenuePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let venue = state.staff_service.create_venue(payload).await?;
    Ok((StatusCode::CREATED, Json(venue)))
}

pub async fn list_venues(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.staff_service.list_venues(query.status).await?))
}

#[utoipa::path(
    post,
    path = "/admin/assign-staff",
    request_body = AssignStaffPayload,
    responses(
        (status = 200, description = "Staff and venue are now assigned to each other"),
        (status = 404, description = "Staff or venue not found"),
        (status = 409, description = "Staff or venue is already assigned"),
    ),
    security(("bearer" = []))
)]
pub async fn assign_staff(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AssignStaffPayload>,
) -> Result<impl IntoResponse> {
    let response = state
        .staff_service
        .assign(payload.staff_id, payload.venue_id)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/admin/unassign-staff",
    request_body = UnassignStaffPayload,
    responses(
        (status = 200, description = "Staff and venue released"),
        (status = 400, description = "Staff is not assigned"),
        (status = 404, description = "Staff not found"),
    ),
    security(("bearer" = []))
)]
pub async fn unassign_staff(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UnassignStaffPayload>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.staff_service.unassign(payload.staff_id).await?))
}

#[utoipa::path(
    post,
    path = "/admin/unassign-all",
    responses(
        (status = 200, description = "Reset counts", body = crate::dto::staff_dto::UnassignAllResponse),
    ),
    security(("bearer" = []))
)]
pub async fn unassign_all(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.staff_service.unassign_all().await?))
}
