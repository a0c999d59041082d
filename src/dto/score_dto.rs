use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::RowFailure;
use crate::services::reconciliation::{exam_index_from_f64, parse_exam_index};

/// Exam number accepted as `2`, `2.0` or `"2"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExamIndex(pub i32);

impl<'de> Deserialize<'de> for ExamIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        let index = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => exam_index_from_f64(n),
            Raw::Text(s) => parse_exam_index(&s),
        };
        index
            .map(ExamIndex)
            .ok_or_else(|| serde::de::Error::custom("examIndex must be a whole number"))
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadScorePayload {
    pub student_id: Uuid,
    pub module_id: Uuid,
    #[schema(value_type = i32)]
    pub exam_index: ExamIndex,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdateResponse {
    pub student_id: Uuid,
    pub module_id: Uuid,
    pub exam_index: i32,
    pub score: f64,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRowSuccess {
    pub row: usize,
    pub reg_no: String,
    pub name: String,
    pub student_id: Uuid,
    pub raw_mark: f64,
    pub stored_score: f64,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkScoreResponse {
    pub message: String,
    pub module_id: Uuid,
    pub exam_index: i32,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ScoreRowSuccess>,
    pub failures: Vec<RowFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_index_accepts_numbers_and_strings() {
        let from_num: ExamIndex = serde_json::from_str("2").unwrap();
        let from_float: ExamIndex = serde_json::from_str("2.0").unwrap();
        let from_text: ExamIndex = serde_json::from_str("\"2\"").unwrap();
        assert_eq!(from_num, ExamIndex(2));
        assert_eq!(from_float, ExamIndex(2));
        assert_eq!(from_text, ExamIndex(2));
        assert!(serde_json::from_str::<ExamIndex>("2.5").is_err());
        assert!(serde_json::from_str::<ExamIndex>("\"first\"").is_err());
    }
}
