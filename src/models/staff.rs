use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Unassigned,
    Assigned,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Unassigned => "unassigned",
            AssignmentStatus::Assigned => "assigned",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unassigned" => Ok(AssignmentStatus::Unassigned),
            "assigned" => Ok(AssignmentStatus::Assigned),
            other => Err(format!("unknown assignment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: String,
    pub venue_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub const COLUMNS: &'static str = "id, name, email, password_hash, status, venue_id, created_at, updated_at";
}

impl Staff {
    pub fn assignment_status(&self) -> AssignmentStatus {
        self.status.parse().unwrap_or(AssignmentStatus::Unassigned)
    }

    /// Assigned staff always carry a venue reference.
    pub fn assigned_venue(&self) -> Option<Uuid> {
        match self.assignment_status() {
            AssignmentStatus::Assigned => self.venue_id,
            AssignmentStatus::Unassigned => None,
        }
    }
}
