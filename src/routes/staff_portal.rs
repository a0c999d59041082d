use axum::{extract::State, response::IntoResponse, Extension, Json};

use crate::error::Result;
use crate::middleware::auth::CurrentUser;
use crate::AppState;

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.staff_service.profile(user.id).await?))
}

pub async fn venue_students(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let venue_id = state.staff_service.require_venue(user.id).await?;
    Ok(Json(state.student_service.venue_students(venue_id).await?))
}
