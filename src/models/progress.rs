use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    Forenoon,
    Afternoon,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Forenoon => "forenoon",
            Session::Afternoon => "afternoon",
        }
    }

    pub fn other(self) -> Session {
        match self {
            Session::Forenoon => Session::Afternoon,
            Session::Afternoon => Session::Forenoon,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Session {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forenoon" | "fn" => Ok(Session::Forenoon),
            "afternoon" | "an" => Ok(Session::Afternoon),
            other => Err(format!("unknown session '{}'", other)),
        }
    }
}

/// One caller-supplied observation for a student in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub present: bool,
    pub on_duty: bool,
}

impl Observation {
    pub const ABSENT: Observation = Observation {
        present: false,
        on_duty: false,
    };

    pub fn is_absent(&self) -> bool {
        !self.present && !self.on_duty
    }
}

/// Stored state of one session of one attendance day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionMark {
    #[default]
    Unset,
    Recorded {
        present: bool,
        #[serde(rename = "onDuty")]
        on_duty: bool,
        notified: bool,
    },
}

impl SessionMark {
    /// Unset sessions read as not present and not excused.
    pub fn observation(&self) -> Observation {
        match *self {
            SessionMark::Unset => Observation::ABSENT,
            SessionMark::Recorded {
                present, on_duty, ..
            } => Observation { present, on_duty },
        }
    }

    pub fn recorded(&self) -> Option<Observation> {
        match self {
            SessionMark::Unset => None,
            SessionMark::Recorded { .. } => Some(self.observation()),
        }
    }

    pub fn is_recorded_absent(&self) -> bool {
        self.recorded().map(|o| o.is_absent()).unwrap_or(false)
    }

    pub fn notified(&self) -> bool {
        matches!(self, SessionMark::Recorded { notified: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub forenoon: SessionMark,
    #[serde(default)]
    pub afternoon: SessionMark,
    /// Flat single-session flag carried by records written before sessions existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,
}

impl AttendanceEntry {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            forenoon: SessionMark::Unset,
            afternoon: SessionMark::Unset,
            present: None,
        }
    }

    pub fn session(&self, session: Session) -> &SessionMark {
        match session {
            Session::Forenoon => &self.forenoon,
            Session::Afternoon => &self.afternoon,
        }
    }

    pub fn session_mut(&mut self, session: Session) -> &mut SessionMark {
        match session {
            Session::Forenoon => &mut self.forenoon,
            Session::Afternoon => &mut self.afternoon,
        }
    }

    /// True for entries that only carry the legacy flat flag.
    pub fn is_legacy(&self) -> bool {
        self.present.is_some()
            && self.forenoon == SessionMark::Unset
            && self.afternoon == SessionMark::Unset
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExamScore {
    pub exam: i32,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProgress {
    pub id: Uuid,
    pub student_id: Uuid,
    pub module_id: Uuid,
    pub venue_id: Uuid,
    pub attendance: Json<Vec<AttendanceEntry>>,
    pub exam_scores: Json<Vec<ExamScore>>,
    pub average_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingProgress {
    pub const COLUMNS: &'static str = "id, student_id, module_id, venue_id, attendance, exam_scores, average_score, created_at, updated_at";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_mark_wire_shape() {
        let mark = SessionMark::Recorded {
            present: false,
            on_duty: true,
            notified: false,
        };
        let value = serde_json::to_value(mark).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"status": "recorded", "present": false, "onDuty": true, "notified": false})
        );
        let unset = serde_json::to_value(SessionMark::Unset).unwrap();
        assert_eq!(unset, serde_json::json!({"status": "unset"}));
    }

    #[test]
    fn legacy_entry_without_sessions_deserializes() {
        let entry: AttendanceEntry =
            serde_json::from_value(serde_json::json!({"date": "2024-03-04", "present": true}))
                .unwrap();
        assert!(entry.is_legacy());
        assert_eq!(entry.forenoon, SessionMark::Unset);
    }

    #[test]
    fn session_parses_short_forms() {
        assert_eq!("FN".parse::<Session>().unwrap(), Session::Forenoon);
        assert_eq!("afternoon".parse::<Session>().unwrap(), Session::Afternoon);
        assert!("evening".parse::<Session>().is_err());
    }
}
