use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::dto::attendance_dto::{
    AdminAttendanceItem, MarkAttendancePayload, MarkAttendanceResponse, MarkStatus, MarkSummary,
    StaffAttendanceItem, StaffMarkAttendancePayload, StudentMarkResult,
};
use crate::dto::report_dto::{LeaderboardEntry, LeaderboardResponse, StudentLeaderboardResponse};
use crate::dto::score_dto::{BulkScoreResponse, ScoreRowSuccess, ScoreUpdateResponse, UploadScorePayload};
use crate::dto::staff_dto::{AssignStaffPayload, UnassignAllResponse, UnassignStaffPayload};
use crate::dto::RowFailure;
use crate::models::progress::{ExamScore, Observation, Session};
use crate::models::student::{Batch, Department, StudentSummary};
use crate::services::reconciliation::{AttendanceSummary, DayStatus};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::attendance::mark_attendance,
        crate::routes::attendance::staff_mark_attendance,
        crate::routes::scores::upload_scores,
        crate::routes::scores::upload_score,
        crate::routes::reports::module_leaderboard,
        crate::routes::reports::student_module_leaderboard,
        crate::routes::venues::assign_staff,
        crate::routes::venues::unassign_staff,
        crate::routes::venues::unassign_all,
    ),
    components(schemas(
        AdminAttendanceItem,
        MarkAttendancePayload,
        MarkAttendanceResponse,
        MarkStatus,
        MarkSummary,
        StaffAttendanceItem,
        StaffMarkAttendancePayload,
        StudentMarkResult,
        LeaderboardEntry,
        LeaderboardResponse,
        StudentLeaderboardResponse,
        BulkScoreResponse,
        ScoreRowSuccess,
        ScoreUpdateResponse,
        UploadScorePayload,
        AssignStaffPayload,
        UnassignStaffPayload,
        UnassignAllResponse,
        RowFailure,
        ExamScore,
        Observation,
        Session,
        Batch,
        Department,
        StudentSummary,
        AttendanceSummary,
        DayStatus,
    )),
    modifiers(&BearerAuth),
    tags((name = "training", description = "Attendance, scores, rankings and staff assignment"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
