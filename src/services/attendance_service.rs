use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::dto::attendance_dto::{
    AttendanceHistoryDay, AttendanceHistoryResponse, ExistingAttendanceQuery,
    ExistingAttendanceResponse, MarkAttendancePayload, MarkAttendanceResponse, MarkSummary,
    RecordedObservation, StaffMarkAttendancePayload, StudentMarkResult,
};
use crate::error::{Error, Result};
use crate::models::progress::{AttendanceEntry, Observation, Session};
use crate::services::reconciliation::{
    classify_day, mark_session, recorded_observation, DayStatus, NotifyPolicy,
};
use crate::services::student_service::load_summaries;
use crate::utils::time::require_day;

/// Everything the dispatcher needs after an admin mark: the response plus
/// the addresses of students who just became absent.
pub struct MarkOutcomeBatch {
    pub response: MarkAttendanceResponse,
    pub absent_emails: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct MarkJob {
    student_id: Uuid,
    venue_id: Uuid,
    module_id: Option<Uuid>,
    observation: Observation,
    by_omission: bool,
}

impl MarkJob {
    fn result(&self) -> StudentMarkResult {
        StudentMarkResult::new(self.student_id, self.venue_id, self.observation, self.by_omission)
    }
}

/// One planned write, or a result that needs no write.
enum Planned {
    Write(MarkJob),
    Done(StudentMarkResult),
}

/// Builds the per-student plan for a full-roster mark. Listed students not on
/// their venue's roster are skipped; roster students nobody listed are marked
/// absent by omission.
fn plan_roster_marks(
    payload: &MarkAttendancePayload,
    rosters: &HashMap<Uuid, Vec<Uuid>>,
) -> Result<Vec<Planned>> {
    if payload.attendance_data.is_empty() {
        return Err(Error::BadRequest("attendanceData must not be empty".into()));
    }

    let mut listed = HashSet::new();
    let mut venue_order: Vec<Uuid> = Vec::new();
    for item in &payload.attendance_data {
        if !listed.insert(item.student_id) {
            return Err(Error::BadRequest(format!(
                "Student {} appears more than once in attendanceData",
                item.student_id
            )));
        }
        if !venue_order.contains(&item.venue_id) {
            venue_order.push(item.venue_id);
        }
    }

    let mut plan = Vec::with_capacity(payload.attendance_data.len());
    for item in &payload.attendance_data {
        let job = MarkJob {
            student_id: item.student_id,
            venue_id: item.venue_id,
            module_id: payload.module_id,
            observation: Observation {
                present: item.present,
                on_duty: item.od,
            },
            by_omission: false,
        };
        let on_roster = rosters
            .get(&item.venue_id)
            .map(|r| r.contains(&item.student_id))
            .unwrap_or(false);
        plan.push(if on_roster {
            Planned::Write(job)
        } else {
            Planned::Done(job.result().skipped("No training progress for this student at the venue"))
        });
    }

    for venue_id in venue_order {
        let Some(roster) = rosters.get(&venue_id) else {
            continue;
        };
        for student_id in roster.iter().filter(|s| !listed.contains(*s)) {
            plan.push(Planned::Write(MarkJob {
                student_id: *student_id,
                venue_id,
                module_id: payload.module_id,
                observation: Observation::ABSENT,
                by_omission: true,
            }));
        }
    }

    Ok(plan)
}

/// Builds the plan for a partial-list mark at one venue. Only listed students
/// are touched: repeats and students without progress at the venue are
/// skipped, and nobody is marked by omission.
fn plan_partial_marks(
    venue_id: Uuid,
    payload: &StaffMarkAttendancePayload,
    roster: &[Uuid],
) -> Vec<Planned> {
    let mut seen = HashSet::new();
    payload
        .attendance_data
        .iter()
        .map(|item| {
            let job = MarkJob {
                student_id: item.student_id,
                venue_id,
                module_id: None,
                observation: Observation {
                    present: item.present,
                    on_duty: item.od,
                },
                by_omission: false,
            };
            if !seen.insert(item.student_id) {
                Planned::Done(job.result().skipped("Duplicate entry in attendanceData"))
            } else if roster.contains(&item.student_id) {
                Planned::Write(job)
            } else {
                Planned::Done(job.result().skipped("No training progress for this student at your venue"))
            }
        })
        .collect()
}

/// Writes one observation into every matching progress record of the student,
/// each under a row lock. Returns (records updated, newly absent).
async fn apply_mark(
    pool: &PgPool,
    date: NaiveDate,
    session: Session,
    job: MarkJob,
    policy: NotifyPolicy,
) -> Result<(usize, bool)> {
    let mut tx = pool.begin().await?;

    let records: Vec<(Uuid, Json<Vec<AttendanceEntry>>)> = sqlx::query_as(
        r#"
        SELECT id, attendance FROM training_progress
        WHERE student_id = $1 AND venue_id = $2 AND ($3::uuid IS NULL OR module_id = $3)
        ORDER BY created_at
        FOR UPDATE
        "#,
    )
    .bind(job.student_id)
    .bind(job.venue_id)
    .bind(job.module_id)
    .fetch_all(&mut *tx)
    .await?;

    let updated = records.len();
    let mut notify = false;
    for (id, Json(mut attendance)) in records {
        let outcome = mark_session(&mut attendance, date, session, job.observation, policy);
        notify |= outcome.notify;
        sqlx::query("UPDATE training_progress SET attendance = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(Json(attendance))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok((updated, notify))
}

#[derive(Clone)]
pub struct AttendanceService {
    pool: PgPool,
}

impl AttendanceService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Full-roster mark for every venue named in the batch.
    pub async fn mark_as_admin(&self, payload: MarkAttendancePayload) -> Result<MarkOutcomeBatch> {
        let date = require_day(&payload.date)?;
        if payload.attendance_data.is_empty() {
            return Err(Error::BadRequest("attendanceData must not be empty".into()));
        }

        let venue_ids: Vec<Uuid> = payload
            .attendance_data
            .iter()
            .map(|i| i.venue_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let rosters = self.rosters(&venue_ids, payload.module_id).await?;
        let plan = plan_roster_marks(&payload, &rosters)?;

        let results = self
            .execute(date, payload.session, plan, NotifyPolicy::Track)
            .await;

        let notify_ids: Vec<Uuid> = results
            .iter()
            .filter(|r| r.notify)
            .map(|r| r.student_id)
            .collect();
        let summaries = load_summaries(&self.pool, &notify_ids).await?;
        let absent_emails = notify_ids
            .iter()
            .filter_map(|id| summaries.get(id))
            .map(|s| s.email.clone())
            .collect();

        let summary = MarkSummary::from_results(&results);
        tracing::info!(
            date = %date,
            session = %payload.session,
            total = summary.total,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            absences = summary.absence_notifications,
            "attendance marked by admin"
        );

        Ok(MarkOutcomeBatch {
            response: MarkAttendanceResponse {
                message: "Attendance marked".into(),
                date,
                session: payload.session,
                results,
                summary,
            },
            absent_emails,
        })
    }

    /// Partial-list mark at the staff member's own venue. Unlisted students
    /// are untouched and no absence emails are produced.
    pub async fn mark_as_staff(
        &self,
        venue_id: Uuid,
        payload: StaffMarkAttendancePayload,
    ) -> Result<MarkAttendanceResponse> {
        let date = require_day(&payload.date)?;
        if payload.attendance_data.is_empty() {
            return Err(Error::BadRequest("attendanceData must not be empty".into()));
        }

        let rosters = self.rosters(&[venue_id], None).await?;
        let roster = rosters.get(&venue_id).cloned().unwrap_or_default();

        let plan = plan_partial_marks(venue_id, &payload, &roster);

        let results = self
            .execute(date, payload.session, plan, NotifyPolicy::Ignore)
            .await;
        let summary = MarkSummary::from_results(&results);
        tracing::info!(
            venue_id = %venue_id,
            date = %date,
            session = %payload.session,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "attendance marked by staff"
        );

        Ok(MarkAttendanceResponse {
            message: "Attendance marked".into(),
            date,
            session: payload.session,
            results,
            summary,
        })
    }

    /// Runs the planned writes concurrently; results keep plan order.
    async fn execute(
        &self,
        date: NaiveDate,
        session: Session,
        plan: Vec<Planned>,
        policy: NotifyPolicy,
    ) -> Vec<StudentMarkResult> {
        let mut results = Vec::with_capacity(plan.len());
        let mut tasks = JoinSet::new();

        for (index, planned) in plan.into_iter().enumerate() {
            match planned {
                Planned::Done(result) => results.push(result),
                Planned::Write(job) => {
                    results.push(job.result().failed("Attendance write did not complete"));
                    let pool = self.pool.clone();
                    tasks.spawn(async move {
                        let outcome = apply_mark(&pool, date, session, job, policy).await;
                        (index, job, outcome)
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, job, outcome) = match joined {
                Ok(done) => done,
                Err(err) => {
                    tracing::error!(error = %err, "attendance task aborted");
                    continue;
                }
            };
            results[index] = match outcome {
                Ok((0, _)) => job.result().skipped("No training progress for this student at the venue"),
                Ok((records, notify)) => {
                    let mut result = job.result();
                    result.records_updated = records;
                    result.notify = notify;
                    result
                }
                Err(err) => {
                    tracing::warn!(student_id = %job.student_id, error = %err, "attendance write failed");
                    job.result().failed(err.to_string())
                }
            };
        }

        results
    }

    /// Distinct students holding progress at each venue, in registration order.
    async fn rosters(
        &self,
        venue_ids: &[Uuid],
        module_id: Option<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT DISTINCT tp.venue_id, tp.student_id, s.reg_no
            FROM training_progress tp
            JOIN students s ON s.id = tp.student_id
            WHERE tp.venue_id = ANY($1) AND ($2::uuid IS NULL OR tp.module_id = $2)
            ORDER BY s.reg_no
            "#,
        )
        .bind(venue_ids)
        .bind(module_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rosters: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (venue_id, student_id) in rows {
            let roster = rosters.entry(venue_id).or_default();
            if !roster.contains(&student_id) {
                roster.push(student_id);
            }
        }
        Ok(rosters)
    }

    pub async fn existing(&self, query: ExistingAttendanceQuery) -> Result<ExistingAttendanceResponse> {
        let date = require_day(&query.date)?;

        let rows: Vec<(Uuid, Uuid, Json<Vec<AttendanceEntry>>)> = sqlx::query_as(
            r#"
            SELECT student_id, venue_id, attendance FROM training_progress
            WHERE ($1::uuid IS NULL OR venue_id = $1) AND ($2::uuid IS NULL OR module_id = $2)
            ORDER BY created_at
            "#,
        )
        .bind(query.venue_id)
        .bind(query.module_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = BTreeMap::new();
        for (student_id, venue_id, Json(attendance)) in rows {
            if let Some(obs) = recorded_observation(&attendance, date, query.session) {
                records.entry(student_id).or_insert(RecordedObservation {
                    present: obs.present,
                    on_duty: obs.on_duty,
                    venue_id,
                });
            }
        }

        Ok(ExistingAttendanceResponse {
            date,
            session: query.session,
            records,
        })
    }

    /// Day-by-day buckets for the venue, newest date first.
    pub async fn history(&self, venue_id: Uuid) -> Result<AttendanceHistoryResponse> {
        let rows: Vec<(Uuid, Json<Vec<AttendanceEntry>>)> = sqlx::query_as(
            "SELECT student_id, attendance FROM training_progress WHERE venue_id = $1 ORDER BY created_at",
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_date: BTreeMap<NaiveDate, Vec<(Uuid, DayStatus)>> = BTreeMap::new();
        for (student_id, Json(attendance)) in &rows {
            for entry in attendance {
                let day = by_date.entry(entry.date).or_default();
                if !day.iter().any(|(s, _)| s == student_id) {
                    day.push((*student_id, classify_day(entry)));
                }
            }
        }

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|(id, _)| *id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let summaries = load_summaries(&self.pool, &ids).await?;

        let attendance_history = by_date
            .into_iter()
            .rev()
            .map(|(date, marks)| {
                let mut day = AttendanceHistoryDay {
                    date,
                    present: Vec::new(),
                    absent: Vec::new(),
                    on_duty: Vec::new(),
                    partial: Vec::new(),
                };
                for (student_id, status) in marks {
                    let Some(summary) = summaries.get(&student_id).cloned() else {
                        continue;
                    };
                    match status {
                        DayStatus::Present => day.present.push(summary),
                        DayStatus::Absent => day.absent.push(summary),
                        DayStatus::OnDuty => day.on_duty.push(summary),
                        DayStatus::Partial => day.partial.push(summary),
                    }
                }
                day
            })
            .collect();

        Ok(AttendanceHistoryResponse {
            venue_id,
            attendance_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::attendance_dto::{AdminAttendanceItem, MarkStatus, StaffAttendanceItem};

    fn item(student_id: Uuid, venue_id: Uuid, present: bool) -> AdminAttendanceItem {
        AdminAttendanceItem {
            student_id,
            venue_id,
            present,
            od: false,
        }
    }

    fn payload(items: Vec<AdminAttendanceItem>) -> MarkAttendancePayload {
        MarkAttendancePayload {
            date: "2024-07-01".into(),
            session: Session::Forenoon,
            module_id: None,
            attendance_data: items,
        }
    }

    #[test]
    fn unlisted_roster_students_are_absent_by_omission() {
        let venue = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rosters = HashMap::from([(venue, vec![a, b])]);
        let plan = plan_roster_marks(&payload(vec![item(a, venue, true), item(c, venue, true)]), &rosters).unwrap();

        assert_eq!(plan.len(), 3);
        match &plan[0] {
            Planned::Write(job) => assert!(job.observation.present && !job.by_omission),
            Planned::Done(_) => panic!("listed roster student must be written"),
        }
        match &plan[1] {
            Planned::Done(result) => {
                assert_eq!(result.student_id, c);
                assert_eq!(result.status, MarkStatus::Skipped);
            }
            Planned::Write(_) => panic!("student without progress must be skipped"),
        }
        match &plan[2] {
            Planned::Write(job) => {
                assert_eq!(job.student_id, b);
                assert!(job.by_omission);
                assert!(job.observation.is_absent());
            }
            Planned::Done(_) => panic!("omitted student must be marked absent"),
        }
    }

    #[test]
    fn duplicate_or_empty_batches_are_rejected() {
        let venue = Uuid::new_v4();
        let a = Uuid::new_v4();
        let rosters = HashMap::from([(venue, vec![a])]);
        assert!(matches!(
            plan_roster_marks(&payload(vec![item(a, venue, true), item(a, venue, false)]), &rosters),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            plan_roster_marks(&payload(vec![]), &rosters),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn listed_student_is_not_omitted_at_another_venue() {
        let (v1, v2) = (Uuid::new_v4(), Uuid::new_v4());
        let a = Uuid::new_v4();
        let rosters = HashMap::from([(v1, vec![a]), (v2, vec![a])]);
        let plan = plan_roster_marks(&payload(vec![item(a, v1, true), item(Uuid::new_v4(), v2, true)]), &rosters).unwrap();
        let omitted = plan
            .iter()
            .filter(|p| matches!(p, Planned::Write(job) if job.by_omission))
            .count();
        assert_eq!(omitted, 0);
    }

    fn staff_payload(items: &[(Uuid, bool)]) -> StaffMarkAttendancePayload {
        StaffMarkAttendancePayload {
            date: "2024-07-01".into(),
            session: Session::Afternoon,
            attendance_data: items
                .iter()
                .map(|(student_id, present)| StaffAttendanceItem {
                    student_id: *student_id,
                    present: *present,
                    od: false,
                })
                .collect(),
        }
    }

    #[test]
    fn partial_marks_leave_unlisted_students_alone() {
        let venue = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let plan = plan_partial_marks(venue, &staff_payload(&[(a, false)]), &[a, b, c]);

        assert_eq!(plan.len(), 1);
        match &plan[0] {
            Planned::Write(job) => {
                assert_eq!(job.student_id, a);
                assert_eq!(job.venue_id, venue);
                assert!(job.observation.is_absent());
                assert!(!job.by_omission);
            }
            Planned::Done(_) => panic!("listed roster student must be written"),
        }
    }

    #[test]
    fn partial_marks_skip_repeats_and_strangers() {
        let venue = Uuid::new_v4();
        let (a, stranger) = (Uuid::new_v4(), Uuid::new_v4());
        let plan = plan_partial_marks(
            venue,
            &staff_payload(&[(a, true), (stranger, true), (a, false)]),
            &[a],
        );

        assert_eq!(plan.len(), 3);
        assert!(matches!(&plan[0], Planned::Write(job) if job.observation.present));
        for (planned, expected) in plan[1..].iter().zip([stranger, a]) {
            match planned {
                Planned::Done(result) => {
                    assert_eq!(result.student_id, expected);
                    assert_eq!(result.status, MarkStatus::Skipped);
                    assert!(!result.notify);
                }
                Planned::Write(_) => panic!("repeat or stranger must not be written"),
            }
        }
    }
}
