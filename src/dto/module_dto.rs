use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::module::TrainingModule;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateModulePayload {
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0, max = 365))]
    pub duration_days: i32,
    #[validate(range(min = 0, max = 50))]
    pub exams_count: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModulePayload {
    #[validate(length(min = 1))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, max = 365))]
    pub duration_days: Option<i32>,
    #[validate(range(min = 0, max = 50))]
    pub exams_count: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueStudents {
    pub venue_id: Uuid,
    pub student_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignModulePayload {
    pub module_id: Uuid,
    pub venues: Vec<VenueStudents>,
}

/// Venue → students mapping after validation: at least one venue, each venue
/// listed once, each student under exactly one venue, no empty venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueRoster(Vec<(Uuid, BTreeSet<Uuid>)>);

impl VenueRoster {
    pub fn venue_ids(&self) -> Vec<Uuid> {
        self.0.iter().map(|(venue, _)| *venue).collect()
    }

    pub fn student_count(&self) -> usize {
        self.0.iter().map(|(_, students)| students.len()).sum()
    }

    /// (venue, student) pairs in request order.
    pub fn pairs(&self) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
        self.0
            .iter()
            .flat_map(|(venue, students)| students.iter().map(move |s| (*venue, *s)))
    }
}

impl TryFrom<Vec<VenueStudents>> for VenueRoster {
    type Error = Error;

    fn try_from(groups: Vec<VenueStudents>) -> Result<Self> {
        if groups.is_empty() {
            return Err(Error::BadRequest("At least one venue is required".into()));
        }

        let mut seen_students: HashMap<Uuid, Uuid> = HashMap::new();
        let mut roster: Vec<(Uuid, BTreeSet<Uuid>)> = Vec::with_capacity(groups.len());

        for group in groups {
            if roster.iter().any(|(venue, _)| *venue == group.venue_id) {
                return Err(Error::BadRequest(format!(
                    "Venue {} is listed more than once",
                    group.venue_id
                )));
            }
            if group.student_ids.is_empty() {
                return Err(Error::BadRequest(format!(
                    "Venue {} has no students",
                    group.venue_id
                )));
            }
            let mut students = BTreeSet::new();
            for student in group.student_ids {
                if let Some(other) = seen_students.insert(student, group.venue_id) {
                    if other != group.venue_id {
                        return Err(Error::BadRequest(format!(
                            "Student {} is listed under two venues",
                            student
                        )));
                    }
                }
                students.insert(student);
            }
            roster.push((group.venue_id, students));
        }

        Ok(VenueRoster(roster))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignStatus {
    Created,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResult {
    pub student_id: Uuid,
    pub venue_id: Uuid,
    pub status: AssignStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignModuleResponse {
    pub module_id: Uuid,
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<AssignResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteModuleResponse {
    pub module: TrainingModule,
    pub students_credited: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(venue: Uuid, students: &[Uuid]) -> VenueStudents {
        VenueStudents {
            venue_id: venue,
            student_ids: students.to_vec(),
        }
    }

    #[test]
    fn roster_accepts_disjoint_groups() {
        let (v1, v2) = (Uuid::new_v4(), Uuid::new_v4());
        let (s1, s2, s3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let roster =
            VenueRoster::try_from(vec![group(v1, &[s1, s2, s1]), group(v2, &[s3])]).unwrap();
        assert_eq!(roster.venue_ids(), vec![v1, v2]);
        assert_eq!(roster.student_count(), 3);
        assert_eq!(roster.pairs().filter(|(v, _)| *v == v2).count(), 1);
    }

    #[test]
    fn roster_rejects_shared_students_and_repeated_venues() {
        let (v1, v2) = (Uuid::new_v4(), Uuid::new_v4());
        let s1 = Uuid::new_v4();
        assert!(VenueRoster::try_from(vec![group(v1, &[s1]), group(v2, &[s1])]).is_err());
        assert!(VenueRoster::try_from(vec![group(v1, &[s1]), group(v1, &[Uuid::new_v4()])]).is_err());
        assert!(VenueRoster::try_from(vec![group(v1, &[])]).is_err());
        assert!(VenueRoster::try_from(vec![]).is_err());
    }
}
