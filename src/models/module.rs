use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TrainingModule {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub duration_days: i32,
    pub exams_count: i32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingModule {
    pub const COLUMNS: &'static str = "id, title, description, duration_days, exams_count, completed, created_at, updated_at";
}
