use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::dto::module_dto::{
    AssignModuleResponse, AssignResult, AssignStatus, CompleteModuleResponse, CreateModulePayload,
    UpdateModulePayload, VenueRoster,
};
use crate::error::{Error, Result};
use crate::models::module::TrainingModule;
use crate::models::progress::AttendanceEntry;
use crate::services::reconciliation::initial_exam_scores;

#[derive(Clone)]
pub struct ModuleService {
    pool: PgPool,
}

impl ModuleService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: CreateModulePayload) -> Result<TrainingModule> {
        let module = sqlx::query_as::<_, TrainingModule>(&format!(
            r#"
            INSERT INTO modules (title, description, duration_days, exams_count)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            TrainingModule::COLUMNS
        ))
        .bind(payload.title.trim())
        .bind(payload.description.trim())
        .bind(payload.duration_days)
        .bind(payload.exams_count)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(module_id = %module.id, exams = module.exams_count, "module created");
        Ok(module)
    }

    pub async fn list(&self) -> Result<Vec<TrainingModule>> {
        let modules = sqlx::query_as::<_, TrainingModule>(&format!(
            "SELECT {} FROM modules ORDER BY created_at DESC",
            TrainingModule::COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(modules)
    }

    pub async fn get(&self, id: Uuid) -> Result<TrainingModule> {
        sqlx::query_as::<_, TrainingModule>(&format!(
            "SELECT {} FROM modules WHERE id = $1",
            TrainingModule::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Module not found".into()))
    }

    /// The exam count is frozen once any progress record exists for the module,
    /// since records carry one score entry per exam.
    pub async fn update(&self, id: Uuid, payload: UpdateModulePayload) -> Result<TrainingModule> {
        let current = self.get(id).await?;

        if let Some(count) = payload.exams_count {
            if count != current.exams_count {
                let (enrolled,): (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM training_progress WHERE module_id = $1")
                        .bind(id)
                        .fetch_one(&self.pool)
                        .await?;
                if enrolled > 0 {
                    return Err(Error::Conflict(
                        "examsCount cannot change after students are assigned".into(),
                    ));
                }
            }
        }

        let module = sqlx::query_as::<_, TrainingModule>(&format!(
            r#"
            UPDATE modules SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                duration_days = COALESCE($4, duration_days),
                exams_count = COALESCE($5, exams_count),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TrainingModule::COLUMNS
        ))
        .bind(id)
        .bind(payload.title.as_deref().map(str::trim))
        .bind(payload.description.as_deref().map(str::trim))
        .bind(payload.duration_days)
        .bind(payload.exams_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(module)
    }

    /// Flags the module completed and credits every enrolled student once.
    pub async fn complete(&self, id: Uuid) -> Result<CompleteModuleResponse> {
        let mut tx = self.pool.begin().await?;

        let module = sqlx::query_as::<_, TrainingModule>(&format!(
            r#"
            UPDATE modules SET completed = TRUE, updated_at = NOW()
            WHERE id = $1 AND completed = FALSE
            RETURNING {}
            "#,
            TrainingModule::COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(module) = module else {
            let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM modules WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => Error::Conflict("Module is already completed".into()),
                None => Error::NotFound("Module not found".into()),
            });
        };

        let credited = sqlx::query(
            r#"
            UPDATE students SET num_trainings_completed = num_trainings_completed + 1, updated_at = NOW()
            WHERE id IN (SELECT student_id FROM training_progress WHERE module_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        tracing::info!(module_id = %id, credited, "module completed");
        Ok(CompleteModuleResponse {
            module,
            students_credited: credited,
        })
    }

    /// Enrolls each (venue, student) pair of the roster in the module.
    /// The roster is fully validated before anything is written; after that,
    /// each student is created or skipped independently.
    pub async fn assign(&self, module_id: Uuid, roster: VenueRoster) -> Result<AssignModuleResponse> {
        let module = self.get(module_id).await?;

        let venue_ids = roster.venue_ids();
        let known_venues: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM venues WHERE id = ANY($1)")
            .bind(&venue_ids)
            .fetch_all(&self.pool)
            .await?;
        let known_venues: HashSet<Uuid> = known_venues.into_iter().map(|(id,)| id).collect();
        if let Some(missing) = venue_ids.iter().find(|v| !known_venues.contains(v)) {
            return Err(Error::NotFound(format!("Venue {} not found", missing)));
        }

        let student_ids: Vec<Uuid> = roster.pairs().map(|(_, s)| s).collect();
        let known_students: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM students WHERE id = ANY($1)")
            .bind(&student_ids)
            .fetch_all(&self.pool)
            .await?;
        let known_students: HashSet<Uuid> = known_students.into_iter().map(|(id,)| id).collect();

        let mut results = Vec::with_capacity(student_ids.len());
        for (venue_id, student_id) in roster.pairs() {
            let outcome = if known_students.contains(&student_id) {
                self.enroll(&module, venue_id, student_id).await
            } else {
                Err(Error::NotFound("Student not found".into()))
            };
            let result = match outcome {
                Ok(true) => AssignResult {
                    student_id,
                    venue_id,
                    status: AssignStatus::Created,
                    message: None,
                },
                Ok(false) => AssignResult {
                    student_id,
                    venue_id,
                    status: AssignStatus::Skipped,
                    message: Some("Student is already enrolled in this module".into()),
                },
                Err(err) => {
                    tracing::warn!(student_id = %student_id, venue_id = %venue_id, error = %err, "module assignment failed");
                    AssignResult {
                        student_id,
                        venue_id,
                        status: AssignStatus::Failed,
                        message: Some(err.to_string()),
                    }
                }
            };
            results.push(result);
        }

        let count = |status: AssignStatus| results.iter().filter(|r| r.status == status).count();
        let response = AssignModuleResponse {
            module_id,
            total: results.len(),
            created: count(AssignStatus::Created),
            skipped: count(AssignStatus::Skipped),
            failed: count(AssignStatus::Failed),
            results,
        };
        tracing::info!(
            module_id = %module_id,
            created = response.created,
            skipped = response.skipped,
            failed = response.failed,
            "module assignment finished"
        );
        Ok(response)
    }

    /// Returns false when the student already holds a record for the module.
    async fn enroll(&self, module: &TrainingModule, venue_id: Uuid, student_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO training_progress (student_id, module_id, venue_id, attendance, exam_scores, average_score)
            VALUES ($1, $2, $3, $4, $5, 0)
            ON CONFLICT (student_id, module_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(student_id)
        .bind(module.id)
        .bind(venue_id)
        .bind(Json(Vec::<AttendanceEntry>::new()))
        .bind(Json(initial_exam_scores(module.exams_count)))
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE students
            SET trainings = array_append(trainings, $2), updated_at = NOW()
            WHERE id = $1 AND NOT ($2 = ANY(trainings))
            "#,
        )
        .bind(student_id)
        .bind(module.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
