use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use crate::error::Result;
use crate::middleware::auth::CurrentUser;
use crate::AppState;

pub async fn profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    user.ensure_self_or_admin(student_id)?;
    Ok(Json(state.student_service.detail(student_id).await?))
}

pub async fn module_performance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((student_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    user.ensure_self_or_admin(student_id)?;
    let response = state
        .student_service
        .module_performance(student_id, module_id)
        .await?;
    Ok(Json(response))
}
