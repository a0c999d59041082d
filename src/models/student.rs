use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Batch {
    Service,
    Dream,
    #[serde(rename = "Super Dream")]
    SuperDream,
    Marquee,
}

impl Batch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Batch::Service => "Service",
            Batch::Dream => "Dream",
            Batch::SuperDream => "Super Dream",
            Batch::Marquee => "Marquee",
        }
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Batch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "service" => Ok(Batch::Service),
            "dream" => Ok(Batch::Dream),
            "superdream" => Ok(Batch::SuperDream),
            "marquee" => Ok(Batch::Marquee),
            _ => Err(format!("unknown batch '{}'", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Department {
    Cse,
    It,
    Ece,
    Eee,
    Mech,
    Civil,
    Aids,
    Aiml,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Cse => "CSE",
            Department::It => "IT",
            Department::Ece => "ECE",
            Department::Eee => "EEE",
            Department::Mech => "MECH",
            Department::Civil => "CIVIL",
            Department::Aids => "AIDS",
            Department::Aiml => "AIML",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CSE" => Ok(Department::Cse),
            "IT" => Ok(Department::It),
            "ECE" => Ok(Department::Ece),
            "EEE" => Ok(Department::Eee),
            "MECH" => Ok(Department::Mech),
            "CIVIL" => Ok(Department::Civil),
            "AIDS" => Ok(Department::Aids),
            "AIML" => Ok(Department::Aiml),
            _ => Err(format!("unknown department '{}'", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub reg_no: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub batch: String,
    pub passout_year: i32,
    pub department: String,
    pub num_trainings_completed: i32,
    /// Enrolled module ids, in enrollment order.
    pub trainings: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub const COLUMNS: &'static str = "id, name, reg_no, email, password_hash, batch, passout_year, department, num_trainings_completed, trainings, created_at, updated_at";
}

/// Public subset of a student used in rosters and rankings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: Uuid,
    pub name: String,
    pub reg_no: String,
    pub email: String,
    pub batch: String,
    pub department: String,
    pub passout_year: i32,
}

impl StudentSummary {
    pub const COLUMNS: &'static str = "id, name, reg_no, email, batch, department, passout_year";
}

impl From<&Student> for StudentSummary {
    fn from(s: &Student) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            reg_no: s.reg_no.clone(),
            email: s.email.clone(),
            batch: s.batch.clone(),
            department: s.department.clone(),
            passout_year: s.passout_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_parses_loose_spellings() {
        assert_eq!("Super Dream".parse::<Batch>().unwrap(), Batch::SuperDream);
        assert_eq!("super_dream".parse::<Batch>().unwrap(), Batch::SuperDream);
        assert_eq!(" marquee ".parse::<Batch>().unwrap(), Batch::Marquee);
        assert!("Platinum".parse::<Batch>().is_err());
    }

    #[test]
    fn batch_serializes_with_space() {
        let json = serde_json::to_string(&Batch::SuperDream).unwrap();
        assert_eq!(json, "\"Super Dream\"");
        let back: Batch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Batch::SuperDream);
    }

    #[test]
    fn department_wire_names_are_uppercase() {
        assert_eq!(serde_json::to_string(&Department::Aiml).unwrap(), "\"AIML\"");
        assert_eq!("cse".parse::<Department>().unwrap(), Department::Cse);
        assert!(serde_json::from_str::<Department>("\"cse\"").is_err());
    }
}
