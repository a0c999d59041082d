use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;

use crate::dto::RowFailure;
use crate::error::{Error, Result};
use crate::models::student::{Batch, Department};

pub const STUDENT_COLUMNS: [&str; 7] = [
    "name",
    "regNo",
    "email",
    "password",
    "batch",
    "passoutYear",
    "department",
];

pub const SCORE_COLUMNS: [&str; 2] = ["regNo", "mark"];

#[derive(Debug, Clone, PartialEq)]
pub struct StudentRow {
    pub row: usize,
    pub name: String,
    pub reg_no: String,
    pub email: String,
    pub password: String,
    pub batch: Batch,
    pub passout_year: i32,
    pub department: Department,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub row: usize,
    pub reg_no: String,
    pub name: String,
    pub mark: f64,
}

#[derive(Debug, Clone)]
pub struct ParsedRows<T> {
    pub rows: Vec<T>,
    pub failures: Vec<RowFailure>,
}

impl<T> ParsedRows<T> {
    pub fn total(&self) -> usize {
        self.rows.len() + self.failures.len()
    }
}

/// Maps normalized header names to column positions.
struct HeaderIndex(HashMap<String, usize>);

impl HeaderIndex {
    fn normalize(name: &str) -> String {
        name.trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn new(headers: &StringRecord) -> Self {
        let mut map = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            map.entry(Self::normalize(h)).or_insert(i);
        }
        Self(map)
    }

    fn require(&self, columns: &[&str]) -> Result<()> {
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !self.0.contains_key(&Self::normalize(c)))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::BadRequest(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )))
        }
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        self.0
            .get(&Self::normalize(column))
            .and_then(|i| record.get(*i))
            .unwrap_or("")
            .trim()
    }
}

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(data)
}

/// A row the reader could not decode; later rows are still read.
fn unreadable_row(row: usize, err: &csv::Error) -> RowFailure {
    RowFailure {
        row,
        key: None,
        reason: format!("unreadable row: {}", err),
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

pub struct ImportService;

impl ImportService {
    /// Header problems abort the whole upload; row problems are collected.
    pub fn parse_student_rows(data: &[u8]) -> Result<ParsedRows<StudentRow>> {
        let mut rdr = reader(data);
        let index = HeaderIndex::new(rdr.headers()?);
        index.require(&STUDENT_COLUMNS)?;

        let mut parsed = ParsedRows {
            rows: Vec::new(),
            failures: Vec::new(),
        };

        for (i, record) in rdr.records().enumerate() {
            let row = i + 1;
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    parsed.failures.push(unreadable_row(row, &err));
                    continue;
                }
            };
            if is_blank(&record) {
                continue;
            }
            let reg_no = index.get(&record, "regNo").to_string();
            match Self::student_from_record(row, &index, &record) {
                Ok(student) => parsed.rows.push(student),
                Err(reason) => parsed.failures.push(RowFailure {
                    row,
                    key: (!reg_no.is_empty()).then_some(reg_no),
                    reason,
                }),
            }
        }

        Ok(parsed)
    }

    fn student_from_record(
        row: usize,
        index: &HeaderIndex,
        record: &StringRecord,
    ) -> std::result::Result<StudentRow, String> {
        for column in STUDENT_COLUMNS {
            if index.get(record, column).is_empty() {
                return Err(format!("{} is required", column));
            }
        }

        let email = index.get(record, "email");
        if !email.contains('@') {
            return Err(format!("invalid email '{}'", email));
        }
        let passout_year = index
            .get(record, "passoutYear")
            .parse::<i32>()
            .map_err(|_| format!("invalid passoutYear '{}'", index.get(record, "passoutYear")))?;

        Ok(StudentRow {
            row,
            name: index.get(record, "name").to_string(),
            reg_no: index.get(record, "regNo").to_string(),
            email: email.to_lowercase(),
            password: index.get(record, "password").to_string(),
            batch: index.get(record, "batch").parse()?,
            passout_year,
            department: index.get(record, "department").parse()?,
        })
    }

    pub fn parse_score_rows(data: &[u8]) -> Result<ParsedRows<ScoreRow>> {
        let mut rdr = reader(data);
        let index = HeaderIndex::new(rdr.headers()?);
        index.require(&SCORE_COLUMNS)?;

        let mut parsed = ParsedRows {
            rows: Vec::new(),
            failures: Vec::new(),
        };

        for (i, record) in rdr.records().enumerate() {
            let row = i + 1;
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    parsed.failures.push(unreadable_row(row, &err));
                    continue;
                }
            };
            if is_blank(&record) {
                continue;
            }
            let reg_no = index.get(&record, "regNo");
            let raw_mark = index.get(&record, "mark");
            if reg_no.is_empty() {
                parsed.failures.push(RowFailure {
                    row,
                    key: None,
                    reason: "regNo is required".into(),
                });
                continue;
            }
            match raw_mark.parse::<f64>() {
                Ok(mark) if mark.is_finite() => parsed.rows.push(ScoreRow {
                    row,
                    reg_no: reg_no.to_string(),
                    name: index.get(&record, "name").to_string(),
                    mark,
                }),
                _ => parsed.failures.push(RowFailure {
                    row,
                    key: Some(reg_no.to_string()),
                    reason: format!("invalid mark '{}'", raw_mark),
                }),
            }
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_rows_with_loose_headers() {
        let data = "Name, Reg No ,Email,Password,Batch,Passout Year,Department\n\
                    Asha,21CS001,asha@college.edu,secret1,super dream,2025,cse\n\
                    Ravi,21CS002,ravi@college.edu,secret2,Platinum,2025,CSE\n\
                    ,,,,,,\n\
                    Meena,21CS003,not-an-email,secret3,Dream,2025,ECE\n";
        let parsed = ImportService::parse_student_rows(data.as_bytes()).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].batch, Batch::SuperDream);
        assert_eq!(parsed.rows[0].department, Department::Cse);
        assert_eq!(parsed.failures.len(), 2);
        assert_eq!(parsed.failures[0].row, 2);
        assert_eq!(parsed.failures[0].key.as_deref(), Some("21CS002"));
        assert_eq!(parsed.failures[1].row, 4);
        assert_eq!(parsed.total(), 3);
    }

    #[test]
    fn missing_student_columns_abort() {
        let data = "name,email\nAsha,asha@college.edu\n";
        let err = ImportService::parse_student_rows(data.as_bytes()).unwrap_err();
        match err {
            Error::BadRequest(msg) => {
                assert!(msg.contains("regNo"));
                assert!(msg.contains("department"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn score_rows_keep_bad_marks_as_failures() {
        let data = "regNo,name,mark\n21CS001,Asha,42\n21CS002,Ravi,absent\n,Nobody,10\n21CS003,,37.5\n";
        let parsed = ImportService::parse_score_rows(data.as_bytes()).unwrap();
        let marks: Vec<_> = parsed.rows.iter().map(|r| (r.reg_no.as_str(), r.mark)).collect();
        assert_eq!(marks, vec![("21CS001", 42.0), ("21CS003", 37.5)]);
        assert_eq!(parsed.failures.len(), 2);
        assert!(parsed.failures[1].key.is_none());
    }

    #[test]
    fn undecodable_row_does_not_sink_the_upload() {
        let data: &[u8] = b"regNo,name,mark\n21CS001,Asha,30\n21CS002,\xff\xfe,40\n21CS003,Ravi,25\n";
        let parsed = ImportService::parse_score_rows(data).unwrap();
        let marks: Vec<_> = parsed.rows.iter().map(|r| (r.row, r.reg_no.as_str())).collect();
        assert_eq!(marks, vec![(1, "21CS001"), (3, "21CS003")]);
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].row, 2);
        assert!(parsed.failures[0].reason.contains("unreadable"));
        assert_eq!(parsed.total(), 3);

        let students: &[u8] = b"name,regNo,email,password,batch,passoutYear,department\n\
            Asha,21CS001,asha@college.edu,secret1,Dream,2025,CSE\n\
            \xff,21CS002,ravi@college.edu,secret2,Dream,2025,CSE\n\
            Meena,21CS003,meena@college.edu,secret3,Marquee,2025,ECE\n";
        let parsed = ImportService::parse_student_rows(students).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].row, 2);
    }

    #[test]
    fn score_upload_needs_mark_column() {
        let data = "regNo,name\n21CS001,Asha\n";
        assert!(matches!(
            ImportService::parse_score_rows(data.as_bytes()),
            Err(Error::BadRequest(_))
        ));
    }
}
