use sqlx::types::Json;
use sqlx::PgPool;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::dto::score_dto::{BulkScoreResponse, ScoreRowSuccess, ScoreUpdateResponse};
use crate::dto::RowFailure;
use crate::error::{Error, Result};
use crate::models::progress::ExamScore;
use crate::services::import_service::{ParsedRows, ScoreRow};
use crate::services::reconciliation::{set_exam_score, stored_score, ScoreSource};

/// Overwrites one exam score of the (student, module) record under a row lock
/// and stores the recomputed average. Returns the new average.
async fn write_exam_score(
    pool: &PgPool,
    student_id: Uuid,
    module_id: Uuid,
    exam_index: i32,
    score: f64,
) -> Result<f64> {
    let mut tx = pool.begin().await?;

    let record: Option<(Uuid, Json<Vec<ExamScore>>)> = sqlx::query_as(
        r#"
        SELECT id, exam_scores FROM training_progress
        WHERE student_id = $1 AND module_id = $2
        FOR UPDATE
        "#,
    )
    .bind(student_id)
    .bind(module_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (id, Json(mut scores)) =
        record.ok_or_else(|| Error::NotFound("Training progress not found".into()))?;
    let average = set_exam_score(&mut scores, exam_index, score)
        .ok_or_else(|| Error::NotFound(format!("Exam {} not found in progress record", exam_index)))?;

    sqlx::query(
        "UPDATE training_progress SET exam_scores = $2, average_score = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(Json(scores))
    .bind(average)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(average)
}

#[derive(Clone)]
pub struct ScoreService {
    pool: PgPool,
}

impl ScoreService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Single score update; the value is stored as submitted.
    pub async fn upload_single(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        exam_index: i32,
        score: f64,
    ) -> Result<ScoreUpdateResponse> {
        if !score.is_finite() {
            return Err(Error::BadRequest("score must be a number".into()));
        }

        let student: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM students WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        if student.is_none() {
            return Err(Error::NotFound("Student not found".into()));
        }

        let stored = stored_score(score, ScoreSource::Individual);
        let average_score = write_exam_score(&self.pool, student_id, module_id, exam_index, stored).await?;
        tracing::info!(student_id = %student_id, module_id = %module_id, exam_index, "exam score updated");
        Ok(ScoreUpdateResponse {
            student_id,
            module_id,
            exam_index,
            score: stored,
            average_score,
        })
    }

    /// Spreadsheet upload for one exam of one module. Rows are independent:
    /// each success is kept regardless of other rows.
    pub async fn upload_bulk(
        &self,
        module_id: Uuid,
        exam_index: i32,
        parsed: ParsedRows<ScoreRow>,
    ) -> Result<BulkScoreResponse> {
        let module: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM modules WHERE id = $1")
            .bind(module_id)
            .fetch_optional(&self.pool)
            .await?;
        if module.is_none() {
            return Err(Error::NotFound("Module not found".into()));
        }

        let total = parsed.total();
        let mut failures = parsed.failures;
        let mut results = Vec::with_capacity(parsed.rows.len());
        let mut tasks = JoinSet::new();

        for row in parsed.rows {
            let pool = self.pool.clone();
            tasks.spawn(async move {
                let outcome = Self::apply_row(&pool, module_id, exam_index, &row).await;
                (row, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(success))) => results.push(success),
                Ok((row, Err(err))) => {
                    tracing::warn!(row = row.row, reg_no = %row.reg_no, error = %err, "score row failed");
                    failures.push(RowFailure {
                        row: row.row,
                        key: Some(row.reg_no),
                        reason: err.to_string(),
                    });
                }
                Err(err) => tracing::error!(error = %err, "score task aborted"),
            }
        }

        results.sort_by_key(|r: &ScoreRowSuccess| r.row);
        failures.sort_by_key(|f| f.row);
        tracing::info!(
            module_id = %module_id,
            exam_index,
            total,
            succeeded = results.len(),
            failed = failures.len(),
            "score upload finished"
        );

        Ok(BulkScoreResponse {
            message: format!("Updated {} of {} scores", results.len(), total),
            module_id,
            exam_index,
            total,
            succeeded: results.len(),
            failed: failures.len(),
            results,
            failures,
        })
    }

    async fn apply_row(
        pool: &PgPool,
        module_id: Uuid,
        exam_index: i32,
        row: &ScoreRow,
    ) -> Result<ScoreRowSuccess> {
        let student: (Uuid, String) = sqlx::query_as("SELECT id, name FROM students WHERE reg_no = $1")
            .bind(&row.reg_no)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Student {} not found", row.reg_no)))?;

        let stored = stored_score(row.mark, ScoreSource::BulkUpload);
        let average_score = write_exam_score(pool, student.0, module_id, exam_index, stored).await?;

        Ok(ScoreRowSuccess {
            row: row.row,
            reg_no: row.reg_no.clone(),
            name: if row.name.is_empty() { student.1 } else { row.name.clone() },
            student_id: student.0,
            raw_mark: row.mark,
            stored_score: stored,
            average_score,
        })
    }
}
