use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::dto::RowFailure;
use crate::models::module::TrainingModule;
use crate::models::progress::{AttendanceEntry, ExamScore};
use crate::models::student::{Batch, Department, Student, StudentSummary};
use crate::services::reconciliation::AttendanceSummary;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStudentPayload {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub reg_no: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    pub batch: Batch,
    #[validate(range(min = 1990, max = 2100))]
    pub passout_year: i32,
    pub department: Department,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentListQuery {
    pub batch: Option<Batch>,
    pub department: Option<Department>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchPayload {
    #[validate(length(min = 1))]
    pub student_ids: Vec<Uuid>,
    pub batch: Batch,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatchResponse {
    pub batch: Batch,
    pub requested: usize,
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRegisterResponse {
    pub message: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub created: Vec<StudentSummary>,
    pub failures: Vec<RowFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStudentResponse {
    pub student_id: Uuid,
    pub progress_records_deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledModule {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetailResponse {
    pub student: Student,
    pub modules: Vec<EnrolledModule>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePerformanceResponse {
    pub module: TrainingModule,
    pub venue_id: Uuid,
    pub exam_scores: Vec<ExamScore>,
    pub average_score: f64,
    pub attendance: Vec<AttendanceEntry>,
    pub attendance_summary: AttendanceSummary,
}
