use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::dto::score_dto::UploadScorePayload;
use crate::error::{Error, Result};
use crate::extract::ApiJson;
use crate::routes::uploads::UploadForm;
use crate::services::import_service::ImportService;
use crate::services::reconciliation::parse_exam_index;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/admin/upload-scores",
    responses(
        (status = 200, description = "Per-row results; marks are stored doubled", body = crate::dto::score_dto::BulkScoreResponse),
        (status = 400, description = "Missing fields or required columns"),
        (status = 404, description = "Module not found"),
    ),
    security(("bearer" = []))
)]
pub async fn upload_scores(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = UploadForm::read(multipart).await?;
    let module_id = Uuid::parse_str(form.field("moduleId")?)
        .map_err(|_| Error::BadRequest("moduleId must be a UUID".into()))?;
    let exam_index = parse_exam_index(form.field("examIndex")?)
        .ok_or_else(|| Error::BadRequest("examIndex must be a whole number".into()))?;

    let parsed = ImportService::parse_score_rows(&form.file)?;
    let response = state
        .score_service
        .upload_bulk(module_id, exam_index, parsed)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/admin/upload-score",
    request_body = UploadScorePayload,
    responses(
        (status = 200, description = "Score stored as submitted", body = crate::dto::score_dto::ScoreUpdateResponse),
        (status = 404, description = "Student, progress record or exam not found"),
    ),
    security(("bearer" = []))
)]
pub async fn upload_score(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UploadScorePayload>,
) -> Result<impl IntoResponse> {
    let response = state
        .score_service
        .upload_single(
            payload.student_id,
            payload.module_id,
            payload.exam_index.0,
            payload.score,
        )
        .await?;
    Ok(Json(response))
}
