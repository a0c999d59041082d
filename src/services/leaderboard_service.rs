use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::dto::report_dto::{LeaderboardEntry, StudentLeaderboardResponse};
use crate::error::{Error, Result};
use crate::models::progress::TrainingProgress;
use crate::models::student::StudentSummary;
use crate::services::reconciliation::{rank_descending, summarize_attendance};
use crate::services::student_service::load_summaries;

/// Ranks progress records by average score. Records whose student no longer
/// resolves are dropped before ranking.
pub fn build_leaderboard(
    records: Vec<TrainingProgress>,
    students: &HashMap<Uuid, StudentSummary>,
) -> Vec<LeaderboardEntry> {
    let resolved: Vec<(StudentSummary, TrainingProgress)> = records
        .into_iter()
        .filter_map(|p| students.get(&p.student_id).cloned().map(|s| (s, p)))
        .collect();

    rank_descending(resolved, |(_, p)| p.average_score)
        .into_iter()
        .map(|(rank, (student, progress))| LeaderboardEntry {
            rank,
            student,
            module_id: progress.module_id,
            venue_id: progress.venue_id,
            average_score: progress.average_score,
            attendance: summarize_attendance(&progress.attendance),
        })
        .collect()
}

pub fn position(board: &[LeaderboardEntry], student_id: Uuid) -> Option<LeaderboardEntry> {
    board.iter().find(|e| e.student.id == student_id).cloned()
}

#[derive(Clone)]
pub struct LeaderboardService {
    pool: PgPool,
}

impl LeaderboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn for_module(&self, module_id: Uuid) -> Result<Vec<LeaderboardEntry>> {
        self.ensure_exists("modules", module_id, "Module not found").await?;
        let records = sqlx::query_as::<_, TrainingProgress>(&format!(
            "SELECT {} FROM training_progress WHERE module_id = $1 ORDER BY created_at, id",
            TrainingProgress::COLUMNS
        ))
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;
        self.rank(records).await
    }

    pub async fn for_venue(&self, venue_id: Uuid) -> Result<Vec<LeaderboardEntry>> {
        self.ensure_exists("venues", venue_id, "Venue not found").await?;
        let records = sqlx::query_as::<_, TrainingProgress>(&format!(
            "SELECT {} FROM training_progress WHERE venue_id = $1 ORDER BY created_at, id",
            TrainingProgress::COLUMNS
        ))
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;
        self.rank(records).await
    }

    pub async fn for_student(
        &self,
        module_id: Uuid,
        student_id: Option<Uuid>,
    ) -> Result<StudentLeaderboardResponse> {
        let leaderboard = self.for_module(module_id).await?;
        let my_position = student_id.and_then(|id| position(&leaderboard, id));
        Ok(StudentLeaderboardResponse {
            leaderboard,
            my_position,
        })
    }

    async fn rank(&self, records: Vec<TrainingProgress>) -> Result<Vec<LeaderboardEntry>> {
        let mut ids: Vec<Uuid> = records.iter().map(|p| p.student_id).collect();
        ids.sort();
        ids.dedup();
        let students = load_summaries(&self.pool, &ids).await?;
        Ok(build_leaderboard(records, &students))
    }

    async fn ensure_exists(&self, table: &'static str, id: Uuid, message: &str) -> Result<()> {
        let found: Option<(Uuid,)> = sqlx::query_as(&format!("SELECT id FROM {} WHERE id = $1", table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(message.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn student(name: &str) -> StudentSummary {
        StudentSummary {
            id: Uuid::new_v4(),
            name: name.into(),
            reg_no: format!("REG-{}", name),
            email: format!("{}@college.edu", name.to_lowercase()),
            batch: "Dream".into(),
            department: "CSE".into(),
            passout_year: 2025,
        }
    }

    fn progress(student_id: Uuid, module_id: Uuid, average_score: f64) -> TrainingProgress {
        TrainingProgress {
            id: Uuid::new_v4(),
            student_id,
            module_id,
            venue_id: Uuid::nil(),
            attendance: Json(Vec::new()),
            exam_scores: Json(Vec::new()),
            average_score,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let module = Uuid::new_v4();
        let people = [student("Asha"), student("Ravi"), student("Meena"), student("Kiran")];
        let scores = [70.0, 90.0, 70.0, 50.0];
        let records = people
            .iter()
            .zip(scores)
            .map(|(s, score)| progress(s.id, module, score))
            .collect();
        let lookup: HashMap<Uuid, StudentSummary> = people.iter().map(|s| (s.id, s.clone())).collect();

        let board = build_leaderboard(records, &lookup);
        let ranked: Vec<(usize, &str, f64)> = board
            .iter()
            .map(|e| (e.rank, e.student.name.as_str(), e.average_score))
            .collect();
        assert_eq!(
            ranked,
            vec![(1, "Ravi", 90.0), (2, "Asha", 70.0), (3, "Meena", 70.0), (4, "Kiran", 50.0)]
        );
        assert_eq!(board[0].attendance.percentage, 0);

        let mine = position(&board, people[2].id).unwrap();
        assert_eq!(mine.rank, 3);
        assert!(position(&board, Uuid::new_v4()).is_none());
    }

    #[test]
    fn unresolved_students_are_left_out() {
        let known = student("Asha");
        let records = vec![progress(known.id, Uuid::nil(), 10.0), progress(Uuid::new_v4(), Uuid::nil(), 99.0)];
        let lookup = HashMap::from([(known.id, known.clone())]);
        let board = build_leaderboard(records, &lookup);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].rank, 1);
    }
}
