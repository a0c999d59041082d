use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::student_dto::{RegisterStudentPayload, StudentListQuery, UpdateBatchPayload};
use crate::error::Result;
use crate::extract::ApiJson;
use crate::routes::uploads::UploadForm;
use crate::services::import_service::ImportService;
use crate::AppState;

pub async fn create_student(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterStudentPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let student = state.student_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn bulk_register_students(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = UploadForm::read(multipart).await?;
    let parsed = ImportService::parse_student_rows(&form.file)?;
    tracing::info!(file = ?form.file_name, rows = parsed.total(), "student upload parsed");
    let response = state.student_service.bulk_register(parsed).await?;
    Ok(Json(response))
}

pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<StudentListQuery>,
) -> Result<impl IntoResponse> {
    let students = state.student_service.list(&query).await?;
    Ok(Json(students))
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.student_service.detail(id).await?))
}

pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.student_service.delete(id).await?))
}

pub async fn update_batch(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateBatchPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let response = state
        .student_service
        .update_batch(&payload.student_ids, payload.batch)
        .await?;
    Ok(Json(response))
}
