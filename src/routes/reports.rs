use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::dto::report_dto::{LeaderboardQuery, LeaderboardResponse};
use crate::error::Result;
use crate::middleware::auth::{CurrentUser, Role};
use crate::services::export_service::ExportService;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/admin/modules/{id}/leaderboard",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Students ranked by average score", body = LeaderboardResponse),
        (status = 404, description = "Module not found"),
    ),
    security(("bearer" = []))
)]
pub async fn module_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let leaderboard = state.leaderboard_service.for_module(id).await?;
    Ok(Json(LeaderboardResponse { leaderboard }))
}

pub async fn venue_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let leaderboard = state.leaderboard_service.for_venue(id).await?;
    Ok(Json(LeaderboardResponse { leaderboard }))
}

pub async fn export_module_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let module = state.module_service.get(id).await?;
    let leaderboard = state.leaderboard_service.for_module(id).await?;
    let buffer = ExportService::leaderboard_xlsx(&module, &leaderboard)?;

    let filename = format!(
        "leaderboard_{}_{}.xlsx",
        module.title.replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
        chrono::Utc::now().format("%Y%m%d")
    );
    let disposition = format!("attachment; filename=\"{}\"", filename);

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}

pub async fn staff_venue_leaderboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let venue_id = state.staff_service.require_venue(user.id).await?;
    let leaderboard = state.leaderboard_service.for_venue(venue_id).await?;
    Ok(Json(LeaderboardResponse { leaderboard }))
}

/// Students always see their own position; admins may ask for anyone's.
#[utoipa::path(
    get,
    path = "/student/module/{moduleId}/leaderboard",
    params(
        ("moduleId" = Uuid, Path, description = "Module id"),
        ("studentId" = Option<Uuid>, Query, description = "Student whose position is returned"),
    ),
    responses(
        (status = 200, description = "Ranked list plus the caller's position", body = crate::dto::report_dto::StudentLeaderboardResponse),
        (status = 404, description = "Module not found"),
    ),
    security(("bearer" = []))
)]
pub async fn student_module_leaderboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(module_id): Path<Uuid>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse> {
    let student_id = match user.role {
        Role::Student => Some(user.id),
        _ => query.student_id,
    };
    let response = state
        .leaderboard_service
        .for_student(module_id, student_id)
        .await?;
    Ok(Json(response))
}
