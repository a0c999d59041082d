use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::staff::AssignmentStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Venue {
    pub const COLUMNS: &'static str = "id, name, capacity, status, created_at, updated_at";
}

impl Venue {
    pub fn assignment_status(&self) -> AssignmentStatus {
        self.status.parse().unwrap_or(AssignmentStatus::Unassigned)
    }
}
