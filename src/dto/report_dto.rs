use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::student::StudentSummary;
use crate::services::reconciliation::AttendanceSummary;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub student: StudentSummary,
    pub module_id: Uuid,
    pub venue_id: Uuid,
    pub average_score: f64,
    pub attendance: AttendanceSummary,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentLeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub my_position: Option<LeaderboardEntry>,
}
