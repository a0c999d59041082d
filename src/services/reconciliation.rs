//! Attendance and score bookkeeping applied to a single progress record.
//!
//! Everything here is storage-free: services load a record, run these
//! functions over it, and persist the result inside one row lock.

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::progress::{AttendanceEntry, ExamScore, Observation, Session, SessionMark};

/// Raw spreadsheet marks are half-weight; bulk uploads store `raw * 2`.
/// Single-score updates store the submitted value unchanged.
pub const BULK_MARK_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyPolicy {
    /// Record whether this mark should produce an absence email.
    Track,
    /// Never produce absence emails (staff marking).
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkOutcome {
    pub created_entry: bool,
    pub previous: SessionMark,
    pub current: SessionMark,
    /// The student became absent for this (date, session) and has not been emailed yet.
    pub notify: bool,
}

/// Collapses entries sharing a calendar date into the first one.
/// Later recorded sessions win; notification flags are never lost.
pub fn merge_duplicate_dates(attendance: &mut Vec<AttendanceEntry>) -> usize {
    let before = attendance.len();
    let mut merged: Vec<AttendanceEntry> = Vec::with_capacity(before);
    for entry in attendance.drain(..) {
        match merged.iter_mut().find(|e| e.date == entry.date) {
            Some(existing) => {
                for session in [Session::Forenoon, Session::Afternoon] {
                    let incoming = *entry.session(session);
                    let slot = existing.session_mut(session);
                    let notified = slot.notified() || incoming.notified();
                    if let SessionMark::Recorded {
                        present, on_duty, ..
                    } = incoming
                    {
                        *slot = SessionMark::Recorded {
                            present,
                            on_duty,
                            notified,
                        };
                    }
                }
                if entry.present.is_some() {
                    existing.present = entry.present;
                }
            }
            None => merged.push(entry),
        }
    }
    *attendance = merged;
    before - attendance.len()
}

/// Writes `observation` into the named session of the entry for `date`,
/// creating the entry when the day has not been recorded yet. The other
/// session of the day is never touched, except on a legacy single-flag day
/// where it inherits the old flag.
pub fn mark_session(
    attendance: &mut Vec<AttendanceEntry>,
    date: NaiveDate,
    session: Session,
    observation: Observation,
    policy: NotifyPolicy,
) -> MarkOutcome {
    merge_duplicate_dates(attendance);

    let (index, created_entry) = match attendance.iter().position(|e| e.date == date) {
        Some(index) => (index, false),
        None => {
            attendance.push(AttendanceEntry::new(date));
            (attendance.len() - 1, true)
        }
    };

    let entry = &mut attendance[index];
    if entry.is_legacy() {
        let present = entry.present == Some(true);
        *entry.session_mut(session.other()) = SessionMark::Recorded {
            present,
            on_duty: false,
            notified: false,
        };
    }
    // Once a session is written the day follows the two-session model.
    entry.present = None;

    let slot = entry.session_mut(session);
    let previous = *slot;
    let already_notified = previous.notified();
    let notify = policy == NotifyPolicy::Track
        && observation.is_absent()
        && !previous.is_recorded_absent()
        && !already_notified;

    *slot = SessionMark::Recorded {
        present: observation.present,
        on_duty: observation.on_duty,
        notified: already_notified || notify,
    };

    MarkOutcome {
        created_entry,
        previous,
        current: *slot,
        notify,
    }
}

/// Recorded observation for (date, session), if any.
pub fn recorded_observation(
    attendance: &[AttendanceEntry],
    date: NaiveDate,
    session: Session,
) -> Option<Observation> {
    attendance
        .iter()
        .find(|e| e.date == date)
        .and_then(|e| e.session(session).recorded())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum DayStatus {
    Present,
    Absent,
    OnDuty,
    Partial,
}

pub fn classify_day(entry: &AttendanceEntry) -> DayStatus {
    if entry.is_legacy() {
        return if entry.present == Some(true) {
            DayStatus::Present
        } else {
            DayStatus::Absent
        };
    }

    let forenoon = entry.forenoon.observation();
    let afternoon = entry.afternoon.observation();
    if forenoon.on_duty || afternoon.on_duty {
        DayStatus::OnDuty
    } else if forenoon.present && afternoon.present {
        DayStatus::Present
    } else if !forenoon.present && !afternoon.present {
        DayStatus::Absent
    } else {
        DayStatus::Partial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub present: u32,
    pub absent: u32,
    pub on_duty: u32,
    pub partial: u32,
    pub total: u32,
    pub percentage: u32,
}

pub fn summarize_attendance(attendance: &[AttendanceEntry]) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();
    for entry in attendance {
        summary.total += 1;
        match classify_day(entry) {
            DayStatus::Present => summary.present += 1,
            DayStatus::Absent => summary.absent += 1,
            DayStatus::OnDuty => summary.on_duty += 1,
            DayStatus::Partial => summary.partial += 1,
        }
    }
    summary.percentage = attendance_percentage(summary.present, summary.total);
    summary
}

pub fn attendance_percentage(present: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((present as f64 / total as f64) * 100.0).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    BulkUpload,
    Individual,
}

pub fn stored_score(raw: f64, source: ScoreSource) -> f64 {
    match source {
        ScoreSource::BulkUpload => raw * BULK_MARK_MULTIPLIER,
        ScoreSource::Individual => raw,
    }
}

/// Mean over every exam entry, ungraded (zero) entries included.
pub fn average_score(scores: &[ExamScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64
}

/// Overwrites the score of exam `exam` and returns the recomputed average,
/// or `None` when the record has no entry for that exam.
pub fn set_exam_score(scores: &mut [ExamScore], exam: i32, value: f64) -> Option<f64> {
    let entry = scores.iter_mut().find(|s| s.exam == exam)?;
    entry.score = value;
    Some(average_score(scores))
}

/// Zero-score entries for exams `1..=count`, created with the progress record.
pub fn initial_exam_scores(count: i32) -> Vec<ExamScore> {
    (1..=count.max(0))
        .map(|exam| ExamScore { exam, score: 0.0 })
        .collect()
}

/// Accepts `2`, `"2"`, `"2.0"`; rejects fractional and non-numeric values.
pub fn parse_exam_index(raw: &str) -> Option<i32> {
    let value: f64 = raw.trim().parse().ok()?;
    exam_index_from_f64(value)
}

pub fn exam_index_from_f64(value: f64) -> Option<i32> {
    if value.is_finite() && value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Stable sort by descending key; rank is the 1-based position afterwards,
/// so equal keys keep enumeration order and consecutive ranks.
pub fn rank_descending<T>(mut items: Vec<T>, key: impl Fn(&T) -> f64) -> Vec<(usize, T)> {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| (i + 1, item))
        .collect()
}
