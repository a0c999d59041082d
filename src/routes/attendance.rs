use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};

use crate::dto::attendance_dto::{
    ExistingAttendanceQuery, MarkAttendancePayload, StaffMarkAttendancePayload,
};
use crate::error::Result;
use crate::extract::ApiJson;
use crate::middleware::auth::CurrentUser;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/admin/mark-attendance",
    request_body = MarkAttendancePayload,
    responses(
        (status = 200, description = "Per-student results and summary counts", body = crate::dto::attendance_dto::MarkAttendanceResponse),
        (status = 400, description = "Invalid date, session or attendance batch"),
    ),
    security(("bearer" = []))
)]
pub async fn mark_attendance(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<MarkAttendancePayload>,
) -> Result<impl IntoResponse> {
    let outcome = state.attendance_service.mark_as_admin(payload).await?;
    let response = outcome.response;
    state.notification_service.dispatch_absence_notices(
        outcome.absent_emails,
        response.date,
        response.session,
    );
    Ok(Json(response))
}

pub async fn existing_attendance(
    State(state): State<AppState>,
    Query(query): Query<ExistingAttendanceQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.attendance_service.existing(query).await?))
}

#[utoipa::path(
    post,
    path = "/staff/mark-attendance",
    request_body = StaffMarkAttendancePayload,
    responses(
        (status = 200, description = "Per-student results for the listed students", body = crate::dto::attendance_dto::MarkAttendanceResponse),
        (status = 400, description = "Invalid date or session"),
        (status = 403, description = "Caller is not assigned to a venue"),
    ),
    security(("bearer" = []))
)]
pub async fn staff_mark_attendance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(payload): ApiJson<StaffMarkAttendancePayload>,
) -> Result<impl IntoResponse> {
    let venue_id = state.staff_service.require_venue(user.id).await?;
    let response = state
        .attendance_service
        .mark_as_staff(venue_id, payload)
        .await?;
    Ok(Json(response))
}

pub async fn attendance_history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let venue_id = state.staff_service.require_venue(user.id).await?;
    Ok(Json(state.attendance_service.history(venue_id).await?))
}
