use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::dto::student_dto::{
    BulkRegisterResponse, DeleteStudentResponse, EnrolledModule, ModulePerformanceResponse,
    RegisterStudentPayload, StudentDetailResponse, StudentListQuery, UpdateBatchResponse,
};
use crate::dto::RowFailure;
use crate::error::{Error, Result};
use crate::models::module::TrainingModule;
use crate::models::progress::TrainingProgress;
use crate::models::student::{Batch, Student, StudentSummary};
use crate::services::import_service::{ParsedRows, StudentRow};
use crate::services::reconciliation::summarize_attendance;
use crate::utils::crypto::hash_password;

/// Summaries for `ids`, keyed by student id. Unknown ids are absent from the map.
pub async fn load_summaries(pool: &PgPool, ids: &[Uuid]) -> Result<HashMap<Uuid, StudentSummary>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, StudentSummary>(&format!(
        "SELECT {} FROM students WHERE id = ANY($1)",
        StudentSummary::COLUMNS
    ))
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|s| (s.id, s)).collect())
}

#[derive(Clone)]
pub struct StudentService {
    pool: PgPool,
}

impl StudentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: RegisterStudentPayload) -> Result<Student> {
        let password_hash = hash_password(&payload.password)?;
        let student = sqlx::query_as::<_, Student>(&format!(
            r#"
            INSERT INTO students (name, reg_no, email, password_hash, batch, passout_year, department)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            Student::COLUMNS
        ))
        .bind(payload.name.trim())
        .bind(payload.reg_no.trim())
        .bind(payload.email.trim().to_lowercase())
        .bind(password_hash)
        .bind(payload.batch.as_str())
        .bind(payload.passout_year)
        .bind(payload.department.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match Error::from(e) {
            Error::Conflict(_) => Error::Conflict(format!(
                "Student with registration number {} already exists",
                payload.reg_no.trim()
            )),
            other => other,
        })?;
        tracing::info!(student_id = %student.id, reg_no = %student.reg_no, "student registered");
        Ok(student)
    }

    /// Creates each parsed row independently; a failing row never stops the rest.
    pub async fn bulk_register(&self, parsed: ParsedRows<StudentRow>) -> Result<BulkRegisterResponse> {
        let total = parsed.total();
        let mut failures = parsed.failures;
        let mut created = Vec::with_capacity(parsed.rows.len());

        for row in parsed.rows {
            let row_no = row.row;
            let reg_no = row.reg_no.clone();
            let payload = RegisterStudentPayload {
                name: row.name,
                reg_no: row.reg_no,
                email: row.email,
                password: row.password,
                batch: row.batch,
                passout_year: row.passout_year,
                department: row.department,
            };
            match self.create(payload).await {
                Ok(student) => created.push(StudentSummary::from(&student)),
                Err(err) => {
                    tracing::warn!(row = row_no, reg_no = %reg_no, error = %err, "bulk register row failed");
                    failures.push(RowFailure {
                        row: row_no,
                        key: Some(reg_no),
                        reason: err.to_string(),
                    });
                }
            }
        }

        failures.sort_by_key(|f| f.row);
        tracing::info!(total, created = created.len(), failed = failures.len(), "bulk student registration finished");
        Ok(BulkRegisterResponse {
            message: format!("Registered {} of {} students", created.len(), total),
            total,
            succeeded: created.len(),
            failed: failures.len(),
            created,
            failures,
        })
    }

    pub async fn list(&self, query: &StudentListQuery) -> Result<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(&format!(
            r#"
            SELECT {} FROM students
            WHERE ($1::text IS NULL OR batch = $1)
              AND ($2::text IS NULL OR department = $2)
            ORDER BY reg_no
            "#,
            Student::COLUMNS
        ))
        .bind(query.batch.map(|b| b.as_str()))
        .bind(query.department.map(|d| d.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    pub async fn get(&self, id: Uuid) -> Result<Student> {
        sqlx::query_as::<_, Student>(&format!("SELECT {} FROM students WHERE id = $1", Student::COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Student not found".into()))
    }

    /// Profile plus the title and completion flag of each enrolled module.
    pub async fn detail(&self, id: Uuid) -> Result<StudentDetailResponse> {
        let student = self.get(id).await?;
        let modules = sqlx::query_as::<_, TrainingModule>(&format!(
            "SELECT {} FROM modules WHERE id = ANY($1)",
            TrainingModule::COLUMNS
        ))
        .bind(&student.trainings)
        .fetch_all(&self.pool)
        .await?;

        let by_id: HashMap<Uuid, TrainingModule> = modules.into_iter().map(|m| (m.id, m)).collect();
        let modules = student
            .trainings
            .iter()
            .filter_map(|id| by_id.get(id))
            .map(|m| EnrolledModule {
                id: m.id,
                title: m.title.clone(),
                completed: m.completed,
            })
            .collect();

        Ok(StudentDetailResponse { student, modules })
    }

    /// Removes the student together with every progress record they own.
    pub async fn delete(&self, id: Uuid) -> Result<DeleteStudentResponse> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM students WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound("Student not found".into()));
        }

        let progress = sqlx::query("DELETE FROM training_progress WHERE student_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(student_id = %id, progress_records = progress, "student deleted");
        Ok(DeleteStudentResponse {
            student_id: id,
            progress_records_deleted: progress,
        })
    }

    pub async fn update_batch(&self, ids: &[Uuid], batch: Batch) -> Result<UpdateBatchResponse> {
        let updated = sqlx::query("UPDATE students SET batch = $1, updated_at = NOW() WHERE id = ANY($2)")
            .bind(batch.as_str())
            .bind(ids)
            .execute(&self.pool)
            .await?
            .rows_affected();
        tracing::info!(batch = %batch, requested = ids.len(), updated, "student batch updated");
        Ok(UpdateBatchResponse {
            batch,
            requested: ids.len(),
            updated,
        })
    }

    pub async fn module_performance(
        &self,
        student_id: Uuid,
        module_id: Uuid,
    ) -> Result<ModulePerformanceResponse> {
        let module = sqlx::query_as::<_, TrainingModule>(&format!(
            "SELECT {} FROM modules WHERE id = $1",
            TrainingModule::COLUMNS
        ))
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Module not found".into()))?;

        let progress = sqlx::query_as::<_, TrainingProgress>(&format!(
            "SELECT {} FROM training_progress WHERE student_id = $1 AND module_id = $2",
            TrainingProgress::COLUMNS
        ))
        .bind(student_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Student is not enrolled in this module".into()))?;

        let attendance = progress.attendance.0;
        Ok(ModulePerformanceResponse {
            module,
            venue_id: progress.venue_id,
            exam_scores: progress.exam_scores.0,
            average_score: progress.average_score,
            attendance_summary: summarize_attendance(&attendance),
            attendance,
        })
    }

    /// Distinct students holding at least one progress record at the venue.
    pub async fn venue_students(&self, venue_id: Uuid) -> Result<Vec<StudentSummary>> {
        let students = sqlx::query_as::<_, StudentSummary>(
            r#"
            SELECT s.id, s.name, s.reg_no, s.email, s.batch, s.department, s.passout_year
            FROM students s
            WHERE EXISTS (
                SELECT 1 FROM training_progress tp
                WHERE tp.student_id = s.id AND tp.venue_id = $1
            )
            ORDER BY s.reg_no
            "#,
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }
}
