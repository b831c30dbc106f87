use crate::error::ReportError;
use crate::types::{DateRecord, DepartmentRecord, RawRecord};
use crate::util::{canonical_month, parse_count_safe, value_as_trimmed};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

pub const DATE_STATS_KEY: &str = "date_stats";
pub const DEPARTMENT_STATS_KEY: &str = "department_stats";

const MONTH_KEYS: &[&str] = &["month", "date"];
const REQUESTS_KEYS: &[&str] = &["requests", "total", "totalrequests"];
const CLOSED_KEYS: &[&str] = &["closed", "closedcount"];
const DEPARTMENT_KEYS: &[&str] = &["department", "dept"];
const STATUS_KEYS: &[&str] = &["status", "requeststatus"];
const RECORD_DATE_KEYS: &[&str] = &["recorddate", "requestdate", "date"];
const COUNT_KEYS: &[&str] = &["count"];

/// Both record sets exactly as the upstream parser produced them.
#[derive(Debug, Clone, Default)]
pub struct RawInput {
    pub date_stats: Vec<Value>,
    pub department_stats: Vec<Value>,
}

impl RawInput {
    pub fn from_value(value: Value) -> Result<Self, ReportError> {
        let Value::Object(mut map) = value else {
            return Err(ReportError::NotAMapping);
        };
        let date_stats = take_sequence(&mut map, DATE_STATS_KEY)?;
        let department_stats = take_sequence(&mut map, DEPARTMENT_STATS_KEY)?;
        Ok(Self {
            date_stats,
            department_stats,
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self, ReportError> {
        Self::from_value(serde_json::from_str(s)?)
    }
}

fn take_sequence(map: &mut RawRecord, key: &'static str) -> Result<Vec<Value>, ReportError> {
    match map.remove(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ReportError::InputShape(key)),
        None => Err(ReportError::MissingRecordSet(key)),
    }
}

pub fn load_input(path: impl AsRef<Path>) -> Result<Value, ReportError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub skipped_rows: usize,
}

fn key_norm(k: &str) -> String {
    k.chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Look up the first alias present in `rec`, ignoring case and separators.
fn field<'a>(rec: &'a RawRecord, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| {
        rec.get(*alias)
            .or_else(|| rec.iter().find(|(k, _)| key_norm(k) == *alias).map(|(_, v)| v))
    })
}

pub fn normalize_date_records(rows: &[Value]) -> (Vec<DateRecord>, NormalizeReport) {
    let mut report = NormalizeReport {
        total_rows: rows.len(),
        ..Default::default()
    };
    let mut out = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let Some(rec) = row.as_object() else {
            debug!(row = idx, "skipping date row: not a record");
            report.skipped_rows += 1;
            continue;
        };
        let Some(month) = value_as_trimmed(field(rec, MONTH_KEYS)) else {
            debug!(row = idx, "skipping date row: missing month");
            report.skipped_rows += 1;
            continue;
        };
        out.push(DateRecord {
            month: canonical_month(&month),
            requests: parse_count_safe(field(rec, REQUESTS_KEYS)),
            closed: parse_count_safe(field(rec, CLOSED_KEYS)),
        });
    }

    report.kept_rows = out.len();
    (out, report)
}

pub fn normalize_department_records(rows: &[Value]) -> (Vec<DepartmentRecord>, NormalizeReport) {
    let mut report = NormalizeReport {
        total_rows: rows.len(),
        ..Default::default()
    };
    let mut out = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let Some(rec) = row.as_object() else {
            debug!(row = idx, "skipping department row: not a record");
            report.skipped_rows += 1;
            continue;
        };
        let department = value_as_trimmed(field(rec, DEPARTMENT_KEYS));
        let status = value_as_trimmed(field(rec, STATUS_KEYS));
        let (Some(department), Some(status)) = (department, status) else {
            debug!(row = idx, "skipping department row: missing department or status");
            report.skipped_rows += 1;
            continue;
        };
        out.push(DepartmentRecord {
            department,
            status,
            record_date: value_as_trimmed(field(rec, RECORD_DATE_KEYS)).unwrap_or_default(),
            count: parse_count_safe(field(rec, COUNT_KEYS)),
        });
    }

    report.kept_rows = out.len();
    (out, report)
}
