pub mod attendance_dto;
pub mod auth_dto;
pub mod module_dto;
pub mod report_dto;
pub mod score_dto;
pub mod staff_dto;
pub mod student_dto;

use serde::Serialize;
use utoipa::ToSchema;

/// One rejected row of a bulk upload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowFailure {
    /// 1-based data row, header excluded.
    pub row: usize,
    pub key: Option<String>,
    pub reason: String,
}
