use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::progress::{Observation, Session};
use crate::models::student::StudentSummary;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminAttendanceItem {
    pub student_id: Uuid,
    pub venue_id: Uuid,
    pub present: bool,
    /// On-duty excused.
    #[serde(default)]
    pub od: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendancePayload {
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub date: String,
    pub session: Session,
    /// Narrows the roster to one module's progress records.
    pub module_id: Option<Uuid>,
    pub attendance_data: Vec<AdminAttendanceItem>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaffAttendanceItem {
    pub student_id: Uuid,
    pub present: bool,
    #[serde(default)]
    pub od: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaffMarkAttendancePayload {
    pub date: String,
    pub session: Session,
    pub attendance_data: Vec<StaffAttendanceItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MarkStatus {
    Updated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentMarkResult {
    pub student_id: Uuid,
    pub venue_id: Uuid,
    pub status: MarkStatus,
    pub present: bool,
    pub on_duty: bool,
    /// True when the student was absent from the submitted list.
    pub by_omission: bool,
    pub records_updated: usize,
    #[serde(skip)]
    pub notify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StudentMarkResult {
    pub fn new(student_id: Uuid, venue_id: Uuid, observation: Observation, by_omission: bool) -> Self {
        Self {
            student_id,
            venue_id,
            status: MarkStatus::Updated,
            present: observation.present,
            on_duty: observation.on_duty,
            by_omission,
            records_updated: 0,
            notify: false,
            message: None,
        }
    }

    pub fn skipped(mut self, message: impl Into<String>) -> Self {
        self.status = MarkStatus::Skipped;
        self.message = Some(message.into());
        self
    }

    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = MarkStatus::Failed;
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkSummary {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub absence_notifications: usize,
}

impl MarkSummary {
    pub fn from_results(results: &[StudentMarkResult]) -> Self {
        let mut summary = MarkSummary {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.status {
                MarkStatus::Updated => summary.updated += 1,
                MarkStatus::Skipped => summary.skipped += 1,
                MarkStatus::Failed => summary.failed += 1,
            }
            if r.notify {
                summary.absence_notifications += 1;
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceResponse {
    pub message: String,
    pub date: NaiveDate,
    pub session: Session,
    pub results: Vec<StudentMarkResult>,
    pub summary: MarkSummary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingAttendanceQuery {
    pub date: String,
    pub session: Session,
    pub venue_id: Option<Uuid>,
    pub module_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedObservation {
    pub present: bool,
    pub on_duty: bool,
    pub venue_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingAttendanceResponse {
    pub date: NaiveDate,
    pub session: Session,
    pub records: BTreeMap<Uuid, RecordedObservation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceHistoryDay {
    pub date: NaiveDate,
    pub present: Vec<StudentSummary>,
    pub absent: Vec<StudentSummary>,
    pub on_duty: Vec<StudentSummary>,
    pub partial: Vec<StudentSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceHistoryResponse {
    pub venue_id: Uuid,
    pub attendance_history: Vec<AttendanceHistoryDay>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn od_defaults_to_false() {
        let item: StaffAttendanceItem = serde_json::from_value(serde_json::json!({
            "studentId": Uuid::nil(),
            "present": true
        }))
        .unwrap();
        assert!(!item.od);
    }

    #[test]
    fn summary_counts_statuses() {
        let id = Uuid::new_v4();
        let mut absent = StudentMarkResult::new(id, id, Observation::ABSENT, true);
        absent.notify = true;
        let results = vec![
            absent,
            StudentMarkResult::new(id, id, Observation::ABSENT, false).skipped("no record"),
            StudentMarkResult::new(id, id, Observation::ABSENT, false).failed("db"),
        ];
        let summary = MarkSummary::from_results(&results);
        assert_eq!(
            (summary.total, summary.updated, summary.skipped, summary.failed, summary.absence_notifications),
            (3, 1, 1, 1, 1)
        );
    }
}
